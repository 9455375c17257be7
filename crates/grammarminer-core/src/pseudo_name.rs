//! Structured encode/decode of internal non-terminal names (Component B).
//!
//! Two shapes of pseudo-name exist:
//! - a method-call name, `<funcname_ID>`, where `funcname` may carry a
//!   trailing epsilon marker (`%`) to signal deletability;
//! - a control (if/while) name,
//!   `<method:ctrl_cid_alt[?]@s1,s2,...>`, where `?` marks the optional-empty
//!   flag and the `@`-list is the enclosing-conditional stack.
//!
//! The exact delimiters are internal to this codec; callers never build a
//! pseudo-name by hand, only through [`MethodName`]/[`ControlName`] and
//! their `encode`/`decode` pair.

use std::fmt;

use crate::error::PseudoNameError;

const EPSILON_MARKER: char = '%';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    If,
    While,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::If => write!(f, "if"),
            ControlKind::While => write!(f, "while"),
        }
    }
}

impl std::str::FromStr for ControlKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "if" => Ok(ControlKind::If),
            "while" => Ok(ControlKind::While),
            other => Err(other.to_string()),
        }
    }
}

/// A method-call pseudo-name: `<funcname_ID>`, optionally epsilon-marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodName {
    pub name: String,
    pub id: u32,
    pub epsilon: bool,
}

impl MethodName {
    pub fn encode(&self) -> String {
        let marker = if self.epsilon { EPSILON_MARKER.to_string() } else { String::new() };
        format!("<{}{}_{}>", self.name, marker, self.id)
    }

    pub fn decode(s: &str) -> Result<Self, PseudoNameError> {
        let inner = strip_delimiters(s)?;
        let (name_part, id_part) = inner
            .rsplit_once('_')
            .ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let id: u32 = id_part
            .parse()
            .map_err(|_| PseudoNameError::InvalidId(s.to_string(), "id"))?;
        let (name, epsilon) = match name_part.strip_suffix(EPSILON_MARKER) {
            Some(stripped) => (stripped.to_string(), true),
            None => (name_part.to_string(), false),
        };
        Ok(MethodName { name, id, epsilon })
    }
}

/// A control (if/while) pseudo-name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlName {
    pub method: String,
    pub ctrl: ControlKind,
    pub cid: u32,
    pub alt: u32,
    pub can_empty: bool,
    /// Enclosing-conditional alt-index stack, outermost first.
    pub stack: Vec<i32>,
}

impl ControlName {
    pub fn encode(&self) -> String {
        let flag = if self.can_empty { "?" } else { "" };
        let stack = self
            .stack
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "<{}:{}_{}_{}{}@{}>",
            self.method, self.ctrl, self.cid, self.alt, flag, stack
        )
    }

    pub fn decode(s: &str) -> Result<Self, PseudoNameError> {
        let inner = strip_delimiters(s)?;
        let (head, stack_part) = inner
            .split_once('@')
            .ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let (method_ctrl, fields) = head
            .split_once('_')
            .ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let (method, ctrl_str) = method_ctrl
            .split_once(':')
            .ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let ctrl: ControlKind = ctrl_str
            .parse()
            .map_err(|bad| PseudoNameError::UnknownControlKind(s.to_string(), bad))?;

        let mut parts = fields.splitn(2, '_');
        let cid_str = parts.next().ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let alt_field = parts.next().ok_or_else(|| PseudoNameError::MalformedFields(s.to_string()))?;
        let cid: u32 = cid_str
            .parse()
            .map_err(|_| PseudoNameError::InvalidId(s.to_string(), "cid"))?;

        let (alt_str, can_empty) = match alt_field.strip_suffix('?') {
            Some(stripped) => (stripped, true),
            None => (alt_field, false),
        };
        let alt: u32 = alt_str
            .parse()
            .map_err(|_| PseudoNameError::InvalidId(s.to_string(), "alt"))?;

        let stack = if stack_part.is_empty() {
            Vec::new()
        } else {
            stack_part
                .split(',')
                .map(|p| p.parse::<i32>().map_err(|_| PseudoNameError::InvalidId(s.to_string(), "stack")))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(ControlName { method, ctrl, cid, alt, can_empty, stack })
    }
}

fn strip_delimiters(s: &str) -> Result<&str, PseudoNameError> {
    let rest = s
        .strip_prefix('<')
        .ok_or_else(|| PseudoNameError::MissingOpenDelimiter(s.to_string()))?;
    rest.strip_suffix('>')
        .ok_or_else(|| PseudoNameError::MissingCloseDelimiter(s.to_string()))
}

/// A decoded pseudo-name of either shape. Returns an error only when `s`
/// doesn't even have the `<...>` shape; callers that know which kind they
/// expect should call [`MethodName::decode`]/[`ControlName::decode`]
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoName {
    Method(MethodName),
    Control(ControlName),
}

impl PseudoName {
    pub fn decode(s: &str) -> Result<Self, PseudoNameError> {
        if s.contains(':') {
            ControlName::decode(s).map(PseudoName::Control)
        } else {
            MethodName::decode(s).map(PseudoName::Method)
        }
    }

    pub fn encode(&self) -> String {
        match self {
            PseudoName::Method(m) => m.encode(),
            PseudoName::Control(c) => c.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_name_round_trips() {
        let name = MethodName { name: "parse_value".into(), id: 12, epsilon: false };
        let encoded = name.encode();
        assert_eq!(MethodName::decode(&encoded).unwrap(), name);
    }

    #[test]
    fn method_name_round_trips_with_epsilon_marker() {
        let name = MethodName { name: "parse_opt".into(), id: 3, epsilon: true };
        let encoded = name.encode();
        assert!(encoded.contains('%'));
        assert_eq!(MethodName::decode(&encoded).unwrap(), name);
    }

    #[test]
    fn control_name_round_trips() {
        let name = ControlName {
            method: "main".into(),
            ctrl: ControlKind::If,
            cid: 3,
            alt: 0,
            can_empty: false,
            stack: vec![-1, -1],
        };
        let encoded = name.encode();
        assert_eq!(ControlName::decode(&encoded).unwrap(), name);
    }

    #[test]
    fn control_name_round_trips_with_can_empty_and_empty_stack() {
        let name = ControlName {
            method: "loop_body".into(),
            ctrl: ControlKind::While,
            cid: 7,
            alt: 2,
            can_empty: true,
            stack: vec![],
        };
        let encoded = name.encode();
        assert_eq!(encoded, "<loop_body:while_7_2?@>");
        assert_eq!(ControlName::decode(&encoded).unwrap(), name);
    }

    #[test]
    fn generic_decode_dispatches_on_shape() {
        let method = MethodName { name: "f".into(), id: 1, epsilon: false };
        match PseudoName::decode(&method.encode()).unwrap() {
            PseudoName::Method(decoded) => assert_eq!(decoded, method),
            PseudoName::Control(_) => panic!("expected a method name"),
        }
    }

    #[test]
    fn rejects_missing_delimiters() {
        assert!(MethodName::decode("f_1>").is_err());
        assert!(MethodName::decode("<f_1").is_err());
    }

    #[test]
    fn rejects_unknown_control_kind() {
        let err = ControlName::decode("<main:unless_1_0@>").unwrap_err();
        assert!(matches!(err, PseudoNameError::UnknownControlKind(_, _)));
    }
}
