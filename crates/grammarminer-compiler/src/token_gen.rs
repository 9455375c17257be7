//! Token generalizer (Component H, §4.8): widens single-character terminals
//! up the ASCII character lattice, and then tests whether a run of two and
//! four characters of the settled class is also accepted, recording a `+`
//! (one-or-more) token when it is.
//!
//! Runs on the post-assembly, pre-token-generalization grammar (`mined_g`);
//! its output feeds compaction and the parsing enhancer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grammarminer_core::{AsciiClass, Grammar, Token};
use grammarminer_vm::{focus, LimitFuzzer, Oracle};

use crate::error::MineError;

const MARKER_NAME: &str = "<__GENERALIZE__>";
/// Outside the printable-ASCII range every grammar literal lives in, so a
/// generated carrier can never contain it except where we put it.
const MARKER_SENTINEL: char = '\u{f8ff}';
const MAX_CHECKS: usize = 100;
const CARRIER_MAX_DEPTH: usize = 4;

fn call_oracle(oracle: &mut dyn Oracle, bytes: &[u8], calls: &mut u64) -> Result<bool, MineError> {
    *calls += 1;
    oracle
        .accepts(bytes)
        .map_err(|source| MineError::Oracle { phase: "token generalization", source })
}

/// One single-character terminal position still eligible for widening.
struct Position {
    nonterminal: String,
    rule_index: usize,
    token_index: usize,
}

fn substitute_marker(carrier: &[u8], start: usize, len: usize, replacement: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(carrier.len() + replacement.len());
    out.extend_from_slice(&carrier[..start]);
    out.extend_from_slice(replacement.as_bytes());
    out.extend_from_slice(&carrier[start + len..]);
    out
}

/// Finds the single occurrence of the sentinel in `bytes`. More than one or
/// zero occurrences means this carrier can't be used to test the position.
fn find_marker(bytes: &[u8]) -> Option<(usize, usize)> {
    let needle = MARKER_SENTINEL.to_string().into_bytes();
    let mut hits = bytes.windows(needle.len()).enumerate().filter(|(_, w)| *w == needle.as_slice());
    let (first, _) = hits.next()?;
    if hits.next().is_some() {
        return None;
    }
    Some((first, needle.len()))
}

fn build_marker_grammar(grammar: &Grammar, pos: &Position) -> Grammar {
    let mut marked = grammar.clone();
    marked.rules.get_mut(&pos.nonterminal).expect("position's nonterminal exists")[pos.rule_index]
        [pos.token_index] = Token::nonterminal(MARKER_NAME);
    marked.add_rule(MARKER_NAME, vec![Token::terminal(MARKER_SENTINEL.to_string())]);
    marked
}

/// Fuzzes the grammar, focused on reaching the marker, until a carrier is
/// found whose marker position, filled back in with the original character
/// `c`, is oracle-accepted — or `MAX_CHECKS` attempts are exhausted. The
/// sentinel only ever locates the position; every byte string actually
/// shown to the oracle has a real character substituted in.
fn find_carrier(
    marker_grammar: &Grammar,
    c: char,
    rng_seed: u64,
    attempt_seed: u64,
    oracle: &mut dyn Oracle,
    calls: &mut u64,
) -> Result<Option<(Vec<u8>, usize, usize)>, MineError> {
    let focused = focus(marker_grammar, MARKER_NAME);
    if !focused.rules.contains_key(MARKER_NAME) {
        return Ok(None);
    }
    for attempt in 0..MAX_CHECKS as u64 {
        let seed = rng_seed ^ attempt_seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(attempt);
        let mut fuzzer = LimitFuzzer::new(&focused, CARRIER_MAX_DEPTH, StdRng::seed_from_u64(seed));
        let Ok(bytes) = fuzzer.generate(&focused.start) else { continue };
        let Some((start, len)) = find_marker(&bytes) else { continue };
        let baseline = substitute_marker(&bytes, start, len, &c.to_string());
        if call_oracle(oracle, &baseline, calls)? {
            return Ok(Some((bytes, start, len)));
        }
    }
    Ok(None)
}

/// True iff every member of `class` is accepted when substituted at the
/// marker position.
fn class_fully_accepted(
    carrier: &[u8],
    start: usize,
    len: usize,
    class: AsciiClass,
    oracle: &mut dyn Oracle,
    calls: &mut u64,
) -> Result<bool, MineError> {
    for member in class.members() {
        let candidate = substitute_marker(carrier, start, len, &member.to_string());
        if !call_oracle(oracle, &candidate, calls)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Climbs the lattice from `classify(initial)` as far as the oracle accepts
/// every member of the next class up, then tests length widening. Per §4.8
/// step 3, the *first* test is whether the literal's own leaf class is
/// interchangeable with it at this position; only then is `kind` ever
/// treated as a class at all. Returns `None` on an impasse at that first
/// test, leaving the position a bare literal (no length widening either).
fn climb_and_widen(
    carrier: &[u8],
    start: usize,
    len: usize,
    initial: char,
    rng: &mut StdRng,
    oracle: &mut dyn Oracle,
    calls: &mut u64,
) -> Result<Option<(AsciiClass, bool)>, MineError> {
    let leaf = AsciiClass::classify(initial);
    if !class_fully_accepted(carrier, start, len, leaf, oracle, calls)? {
        return Ok(None);
    }

    let mut kind = leaf;
    loop {
        let Some(parent) = kind.parent() else { break };
        if class_fully_accepted(carrier, start, len, parent, oracle, calls)? {
            kind = parent;
        } else {
            break;
        }
    }

    let plus = widen_length(carrier, start, len, kind, rng, oracle, calls)?;
    Ok(Some((kind, plus)))
}

fn widen_length(
    carrier: &[u8],
    start: usize,
    len: usize,
    kind: AsciiClass,
    rng: &mut StdRng,
    oracle: &mut dyn Oracle,
    calls: &mut u64,
) -> Result<bool, MineError> {
    let members = kind.members();
    for count in [2usize, 4] {
        let text: String = (0..count).map(|_| members[rng.gen_range(0..members.len())]).collect();
        let candidate = substitute_marker(carrier, start, len, &text);
        if !call_oracle(oracle, &candidate, calls)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// If the token immediately before `pos` in `rule` is an already-widened
/// `X+` whose class contains `c`, the current position can be folded into
/// it without any oracle calls.
fn coalesce_with_prior(rule: &[Token], pos: usize, c: char) -> Option<Token> {
    if pos == 0 {
        return None;
    }
    let (class, plus) = rule[pos - 1].as_class()?;
    if plus && class.contains(c) {
        Some(Token::class(class, true))
    } else {
        None
    }
}

/// Drops consecutive duplicate `X+` tokens left over once adjacent
/// positions have all folded into the same widened class.
fn dedup_consecutive_plus(rule: &mut Vec<Token>) {
    let mut i = 1;
    while i < rule.len() {
        let dup = match (rule[i - 1].as_class(), rule[i].as_class()) {
            (Some((a, true)), Some((b, true))) => a == b,
            _ => false,
        };
        if dup {
            rule.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Runs §4.8 over every eligible single-character terminal in `grammar`,
/// rewriting it in place with a class or class-plus token wherever the
/// oracle sustains the widening. Returns the number of oracle calls made.
pub fn generalize_tokens(
    grammar: &mut Grammar,
    rng_seed: u64,
    oracle: &mut dyn Oracle,
) -> Result<u64, MineError> {
    let mut calls = 0u64;
    let mut attempt_seed = 0u64;
    let names: Vec<String> = grammar.rules.keys().cloned().collect();

    for name in names {
        let rule_count = grammar.rules.get(&name).map(Vec::len).unwrap_or(0);
        for rule_index in 0..rule_count {
            let mut pos = 0usize;
            loop {
                let rule_len = grammar.rules[&name][rule_index].len();
                if pos >= rule_len {
                    break;
                }

                let tok = grammar.rules[&name][rule_index][pos].clone();
                let Token::Terminal(text) = &tok else {
                    pos += 1;
                    continue;
                };
                if tok.as_class().is_some() {
                    pos += 1;
                    continue;
                }
                let mut chars = text.chars();
                let (Some(c), None) = (chars.next(), chars.next()) else {
                    pos += 1;
                    continue;
                };

                if let Some(folded) = coalesce_with_prior(&grammar.rules[&name][rule_index], pos, c) {
                    grammar.rules.get_mut(&name).unwrap()[rule_index][pos] = folded;
                    pos += 1;
                    continue;
                }

                attempt_seed += 1;
                let position = Position { nonterminal: name.clone(), rule_index, token_index: pos };
                let marker_grammar = build_marker_grammar(grammar, &position);
                let carrier = find_carrier(&marker_grammar, c, rng_seed, attempt_seed, oracle, &mut calls)?;

                if let Some((carrier, start, len)) = carrier {
                    let mut rng = StdRng::seed_from_u64(rng_seed ^ attempt_seed.rotate_left(17));
                    if let Some((kind, plus)) =
                        climb_and_widen(&carrier, start, len, c, &mut rng, oracle, &mut calls)?
                    {
                        grammar.rules.get_mut(&name).unwrap()[rule_index][pos] = Token::class(kind, plus);
                    }
                }
                // on impasse (no accepted carrier, or the literal's own leaf
                // class isn't fully accepted) the literal is left in place
                pos += 1;
            }
        }
    }

    for alts in grammar.rules.values_mut() {
        for rule in alts.iter_mut() {
            dedup_consecutive_plus(rule);
        }
    }

    Ok(calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grammarminer_vm::OracleError;

    /// Accepts anything whose single generalizable character stays within
    /// ASCII digits, simulating a SUT that expects a numeric field.
    struct DigitsOnly;
    impl Oracle for DigitsOnly {
        fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(bytes.iter().all(|&b| b.is_ascii_digit()))
        }
    }

    fn digit_grammar() -> Grammar {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::terminal("3")]);
        g
    }

    #[test]
    fn widens_a_digit_literal_to_the_digit_class() {
        let mut g = digit_grammar();
        let mut oracle = DigitsOnly;
        let tested = generalize_tokens(&mut g, 7, &mut oracle).unwrap();
        assert!(tested > 0);
        let tok = &g.rules["<start>"][0][0];
        let (class, _) = tok.as_class().expect("token widened to a class");
        assert_eq!(class, AsciiClass::Digit);
    }

    #[test]
    fn widens_length_when_repeated_members_are_also_accepted() {
        let mut g = digit_grammar();
        let mut oracle = DigitsOnly;
        generalize_tokens(&mut g, 7, &mut oracle).unwrap();
        let tok = &g.rules["<start>"][0][0];
        let (_, plus) = tok.as_class().unwrap();
        assert!(plus);
    }

    #[test]
    fn coalesces_adjacent_positions_of_the_same_class() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::terminal("1"), Token::terminal("2")]);
        let mut oracle = DigitsOnly;
        generalize_tokens(&mut g, 3, &mut oracle).unwrap();
        let rule = &g.rules["<start>"][0];
        assert_eq!(rule.len(), 1);
        let (class, plus) = rule[0].as_class().unwrap();
        assert_eq!(class, AsciiClass::Digit);
        assert!(plus);
    }

    /// Accepts only the literal digit `3`, rejecting every sibling digit —
    /// a SUT that is not actually interchangeable across its own leaf class.
    struct OnlyThreeAccepted;
    impl Oracle for OnlyThreeAccepted {
        fn accepts(&mut self, bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(bytes == b"3")
        }
    }

    #[test]
    fn leaf_class_rejection_leaves_the_literal_unwidened() {
        let mut g = digit_grammar();
        let mut oracle = OnlyThreeAccepted;
        generalize_tokens(&mut g, 7, &mut oracle).unwrap();
        // `0`..`9` are not actually interchangeable with `3` under this
        // oracle, so the position must never be promoted to `Digit` (or
        // any other class) even though `3` itself is a digit.
        assert_eq!(g.rules["<start>"][0], vec![Token::terminal("3")]);
    }

    struct RejectAll;
    impl Oracle for RejectAll {
        fn accepts(&mut self, _bytes: &[u8]) -> Result<bool, OracleError> {
            Ok(false)
        }
    }

    #[test]
    fn leaves_the_literal_in_place_on_a_generalization_impasse() {
        let mut g = digit_grammar();
        let mut oracle = RejectAll;
        generalize_tokens(&mut g, 1, &mut oracle).unwrap();
        assert_eq!(g.rules["<start>"][0], vec![Token::terminal("3")]);
    }
}
