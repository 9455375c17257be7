//! Parsing-grammar enhancement (§4.9 step 10): the last pass before a
//! grammar is handed to a parser or fuzzer. Two rewrites:
//!
//! - every ASCII character-class terminal (`[__ASCII_X__]`, optionally
//!   widened with a trailing `+`) is replaced by a reference to a defined
//!   non-terminal whose alternatives are the class's member characters;
//! - every widened (`+`) class token additionally gets a right-recursive
//!   `<..._PLUS>` non-terminal so the fuzzer/parser can produce runs of
//!   more than one member character.

use grammarminer_core::{AsciiClass, Grammar, Token};

fn class_name(class: AsciiClass) -> String {
    format!("<__ASCII_{}__>", class.tag())
}

fn plus_name(class: AsciiClass) -> String {
    format!("<__ASCII_{}_PLUS__>", class.tag())
}

fn ensure_class_rule(grammar: &mut Grammar, class: AsciiClass) {
    let name = class_name(class);
    if grammar.has_rules(&name) {
        return;
    }
    for member in class.members() {
        grammar.add_rule(name.clone(), vec![Token::terminal(member.to_string())]);
    }
}

fn ensure_plus_rule(grammar: &mut Grammar, class: AsciiClass) {
    let name = plus_name(class);
    if grammar.has_rules(&name) {
        return;
    }
    ensure_class_rule(grammar, class);
    let single = Token::NonTerminal(class_name(class));
    grammar.add_rule(name.clone(), vec![single.clone()]);
    grammar.add_rule(name, vec![single, Token::NonTerminal(plus_name(class))]);
}

/// Rewrites every rule's tokens in place, expanding ASCII-class terminals
/// and materializing whatever helper non-terminals they reference.
pub fn enhance_for_parsing(grammar: &mut Grammar) {
    let names: Vec<String> = grammar.rules.keys().cloned().collect();
    for name in names {
        let alts = grammar.rules.get(&name).cloned().unwrap_or_default();
        let mut rewritten = Vec::with_capacity(alts.len());
        for rule in alts {
            let mut new_rule = Vec::with_capacity(rule.len());
            for tok in rule {
                match tok.as_class() {
                    Some((class, true)) => {
                        ensure_plus_rule(grammar, class);
                        new_rule.push(Token::NonTerminal(plus_name(class)));
                    }
                    Some((class, false)) => {
                        ensure_class_rule(grammar, class);
                        new_rule.push(Token::NonTerminal(class_name(class)));
                    }
                    None => new_rule.push(tok),
                }
            }
            rewritten.push(new_rule);
        }
        grammar.rules.insert(name, rewritten);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_a_plain_class_token_into_a_character_alternation() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::class(AsciiClass::Digit, false)]);

        enhance_for_parsing(&mut g);

        let name = class_name(AsciiClass::Digit);
        assert_eq!(g.rules["<start>"], vec![vec![Token::NonTerminal(name.clone())]]);
        assert_eq!(g.rules[&name].len(), 10);
    }

    #[test]
    fn expands_a_widened_class_token_into_a_right_recursive_pair() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::class(AsciiClass::AsciiLower, true)]);

        enhance_for_parsing(&mut g);

        let plus = plus_name(AsciiClass::AsciiLower);
        assert_eq!(g.rules["<start>"], vec![vec![Token::NonTerminal(plus.clone())]]);
        assert_eq!(g.rules[&plus].len(), 2);
        assert!(g.rules[&plus].iter().any(|r| r.len() == 1));
        assert!(g.rules[&plus].iter().any(|r| r.len() == 2));
    }

    #[test]
    fn reuses_one_class_definition_across_multiple_occurrences() {
        let mut g = Grammar::new("<start>");
        g.add_rule("<start>", vec![Token::class(AsciiClass::Digit, false), Token::class(AsciiClass::Digit, false)]);
        enhance_for_parsing(&mut g);
        // only one non-terminal definition exists for the class regardless of occurrence count
        assert_eq!(g.rules.keys().filter(|k| k.contains("DIGIT")).count(), 1);
    }
}
