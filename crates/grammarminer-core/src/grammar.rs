//! The grammar data model (§3) and the ASCII character lattice used by
//! token generalization (§4.8).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single symbol on the right-hand side of a rule.
///
/// Serializes as a bare JSON string, using the same angle-bracket
/// convention [`Token::nonterminal`] enforces on construction: a
/// non-terminal reads `<name>`, a terminal is any other string. A plain
/// `#[serde(untagged)]` derive can't distinguish the two on the way back in
/// (both variants are newtype-over-`String`, so deserialization would
/// always resolve to whichever variant is declared first); the manual
/// `Deserialize` below classifies the string by that same convention
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Token {
    NonTerminal(String),
    Terminal(String),
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.starts_with('<') && s.ends_with('>') {
            Ok(Token::NonTerminal(s))
        } else {
            Ok(Token::Terminal(s))
        }
    }
}

impl Token {
    pub fn nonterminal(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.starts_with('<') {
            Token::NonTerminal(name)
        } else {
            Token::NonTerminal(format!("<{name}>"))
        }
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        Token::Terminal(text.into())
    }

    pub fn class(class: AsciiClass, plus: bool) -> Self {
        let suffix = if plus { "+" } else { "" };
        Token::Terminal(format!("[__ASCII_{}__]{suffix}", class.tag()))
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Token::NonTerminal(_))
    }

    pub fn nonterminal_name(&self) -> Option<&str> {
        match self {
            Token::NonTerminal(name) => Some(name),
            Token::Terminal(_) => None,
        }
    }

    /// If this terminal is an ASCII character-class token (optionally
    /// widened with `+`), returns the class and whether it's widened.
    pub fn as_class(&self) -> Option<(AsciiClass, bool)> {
        let Token::Terminal(text) = self else { return None };
        let (body, plus) = match text.strip_suffix('+') {
            Some(stripped) => (stripped, true),
            None => (text.as_str(), false),
        };
        let tag = body.strip_prefix("[__ASCII_")?.strip_suffix("__]")?;
        AsciiClass::from_tag(tag).map(|class| (class, plus))
    }
}

/// A right-hand side: an ordered sequence of tokens. The empty rule (zero
/// tokens) is the epsilon alternative.
pub type Rule = Vec<Token>;

/// `Map<NonTerminal, List<Rule>>`, built append-only and then rewritten by
/// whole-grammar passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grammar {
    pub start: String,
    pub rules: IndexMap<String, Vec<Rule>>,
}

impl Grammar {
    pub fn new(start: impl Into<String>) -> Self {
        Grammar { start: start.into(), rules: IndexMap::new() }
    }

    /// Adds `rule` as an alternative of `name`, deduplicating.
    pub fn add_rule(&mut self, name: impl Into<String>, rule: Rule) {
        let alts = self.rules.entry(name.into()).or_default();
        if !alts.contains(&rule) {
            alts.push(rule);
        }
    }

    pub fn has_rules(&self, name: &str) -> bool {
        self.rules.get(name).is_some_and(|alts| !alts.is_empty())
    }

    pub fn is_nullable_directly(&self, name: &str) -> bool {
        self.rules
            .get(name)
            .is_some_and(|alts| alts.iter().any(|r| r.is_empty()))
    }

    /// All non-terminal names referenced anywhere on a right-hand side,
    /// regardless of whether they're defined.
    pub fn referenced_nonterminals(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for alts in self.rules.values() {
            for rule in alts {
                for tok in rule {
                    if let Some(name) = tok.nonterminal_name() {
                        out.push(name);
                    }
                }
            }
        }
        out
    }
}

/// The final output document, `parsing_g.json` in §6: the grammar plus the
/// bookkeeping fields the CLI/report tooling reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarDocument {
    pub start: String,
    pub grammar: IndexMap<String, Vec<Rule>>,
    pub command: String,
    pub no_tested_inputs: u64,
}

impl GrammarDocument {
    pub fn from_grammar(grammar: &Grammar, command: impl Into<String>, no_tested_inputs: u64) -> Self {
        GrammarDocument {
            start: grammar.start.clone(),
            grammar: grammar.rules.clone(),
            command: command.into(),
            no_tested_inputs,
        }
    }
}

/// A node of the ASCII character lattice (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsciiClass {
    Digit,
    HexDigit,
    AsciiLower,
    AsciiUpper,
    Letter,
    Alphanum,
    Whitespace,
    Punct,
    AlphanumPunct,
    Printable,
}

impl AsciiClass {
    pub fn tag(self) -> &'static str {
        match self {
            AsciiClass::Digit => "DIGIT",
            AsciiClass::HexDigit => "HEXDIGIT",
            AsciiClass::AsciiLower => "LOWER",
            AsciiClass::AsciiUpper => "UPPER",
            AsciiClass::Letter => "LETTER",
            AsciiClass::Alphanum => "ALPHANUM",
            AsciiClass::Whitespace => "WHITESPACE",
            AsciiClass::Punct => "PUNCT",
            AsciiClass::AlphanumPunct => "ALPHANUM_PUNCT",
            AsciiClass::Printable => "PRINTABLE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "DIGIT" => AsciiClass::Digit,
            "HEXDIGIT" => AsciiClass::HexDigit,
            "LOWER" => AsciiClass::AsciiLower,
            "UPPER" => AsciiClass::AsciiUpper,
            "LETTER" => AsciiClass::Letter,
            "ALPHANUM" => AsciiClass::Alphanum,
            "WHITESPACE" => AsciiClass::Whitespace,
            "PUNCT" => AsciiClass::Punct,
            "ALPHANUM_PUNCT" => AsciiClass::AlphanumPunct,
            "PRINTABLE" => AsciiClass::Printable,
            _ => return None,
        })
    }

    /// The immediate parent in the lattice, or `None` at the top
    /// (`Printable`).
    pub fn parent(self) -> Option<AsciiClass> {
        match self {
            AsciiClass::Digit => Some(AsciiClass::HexDigit),
            AsciiClass::HexDigit => Some(AsciiClass::Alphanum),
            AsciiClass::AsciiLower => Some(AsciiClass::Letter),
            AsciiClass::AsciiUpper => Some(AsciiClass::Letter),
            AsciiClass::Letter => Some(AsciiClass::Alphanum),
            AsciiClass::Alphanum => Some(AsciiClass::AlphanumPunct),
            AsciiClass::Whitespace => Some(AsciiClass::Printable),
            AsciiClass::Punct => Some(AsciiClass::AlphanumPunct),
            AsciiClass::AlphanumPunct => Some(AsciiClass::Printable),
            AsciiClass::Printable => None,
        }
    }

    /// The most specific class a concrete character belongs to.
    pub fn classify(c: char) -> AsciiClass {
        if c.is_ascii_digit() {
            AsciiClass::Digit
        } else if c.is_ascii_hexdigit() {
            AsciiClass::HexDigit
        } else if c.is_ascii_lowercase() {
            AsciiClass::AsciiLower
        } else if c.is_ascii_uppercase() {
            AsciiClass::AsciiUpper
        } else if c.is_ascii_whitespace() {
            AsciiClass::Whitespace
        } else if c.is_ascii_punctuation() {
            AsciiClass::Punct
        } else {
            AsciiClass::Printable
        }
    }

    /// True if `c` is a member of this class.
    pub fn contains(self, c: char) -> bool {
        self.members().contains(&c)
    }

    /// The concrete characters making up this class.
    pub fn members(self) -> Vec<char> {
        match self {
            AsciiClass::Digit => ('0'..='9').collect(),
            AsciiClass::HexDigit => "0123456789abcdefABCDEF".chars().collect(),
            AsciiClass::AsciiLower => ('a'..='z').collect(),
            AsciiClass::AsciiUpper => ('A'..='Z').collect(),
            AsciiClass::Letter => ('a'..='z').chain('A'..='Z').collect(),
            AsciiClass::Alphanum => ('a'..='z').chain('A'..='Z').chain('0'..='9').collect(),
            AsciiClass::Whitespace => vec![' ', '\t', '\n', '\r'],
            AsciiClass::Punct => (0x21u8..=0x7e)
                .map(|b| b as char)
                .filter(|c| c.is_ascii_punctuation())
                .collect(),
            AsciiClass::AlphanumPunct => {
                let mut v = AsciiClass::Alphanum.members();
                v.extend(AsciiClass::Punct.members());
                v
            }
            AsciiClass::Printable => (0x20u8..=0x7e).map(|b| b as char).collect(),
        }
    }
}
