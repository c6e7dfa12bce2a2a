//! Label selector parsing and matching.
//!
//! Implements the equality-based and set-based selector grammar used by the
//! orchestrator when listing resources:
//!
//! ```text
//! selector    := "" | requirement ("," requirement)*
//! requirement := "!" key
//!              | key
//!              | key ("=" | "==" | "!=") value
//!              | key ("in" | "notin") "(" value ("," value)* ")"
//!              | key (">" | "<") integer
//! ```
//!
//! Requirements are ANDed. An empty selector matches every label set.
//!
//! The cluster applies selectors server-side; this module exists so that
//! configuration can be validated at startup and so that in-memory clusters
//! used in tests filter exactly like the real one.

use crate::error::CommonError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Maximum length of a label value (and of the name part of a key).
const MAX_LABEL_NAME_LENGTH: usize = 63;

/// Operator of a single requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
    GreaterThan,
    LessThan,
}

/// One `key op values` clause of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: BTreeSet<String>,
}

impl Requirement {
    /// Whether the given label set satisfies this requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => value.map_or(true, |v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::GreaterThan | Operator::LessThan => {
                let Some(actual) = value.and_then(|v| v.parse::<i64>().ok()) else {
                    return false;
                };
                self.values
                    .iter()
                    .filter_map(|v| v.parse::<i64>().ok())
                    .all(|bound| {
                        if self.operator == Operator::GreaterThan {
                            actual > bound
                        } else {
                            actual < bound
                        }
                    })
            }
        }
    }
}

/// A parsed label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector expression. Surrounding whitespace is ignored and an
    /// empty string yields the match-everything selector.
    pub fn parse(selector: &str) -> Result<Self, CommonError> {
        Parser::new(selector).parse().map_err(|reason| CommonError::InvalidLabelSelector {
            selector: selector.to_string(),
            reason,
        })
    }

    /// True if this selector places no constraint on labels.
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether the given label set satisfies every requirement.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .requirements
            .iter()
            .map(|r| {
                let joined = r.values.iter().cloned().collect::<Vec<_>>().join(",");
                match r.operator {
                    Operator::Equals => format!("{}={}", r.key, joined),
                    Operator::NotEquals => format!("{}!={}", r.key, joined),
                    Operator::In => format!("{} in ({})", r.key, joined),
                    Operator::NotIn => format!("{} notin ({})", r.key, joined),
                    Operator::Exists => r.key.clone(),
                    Operator::DoesNotExist => format!("!{}", r.key),
                    Operator::GreaterThan => format!("{}>{}", r.key, joined),
                    Operator::LessThan => format!("{}<{}", r.key, joined),
                }
            })
            .collect();
        write!(f, "{}", rendered.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Identifier(String),
    Comma,
    OpenParen,
    CloseParen,
    Equals,
    DoubleEquals,
    NotEquals,
    Bang,
    GreaterThan,
    LessThan,
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Identifier(s) => format!("'{s}'"),
            Token::Comma => "','".to_string(),
            Token::OpenParen => "'('".to_string(),
            Token::CloseParen => "')'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::DoubleEquals => "'=='".to_string(),
            Token::NotEquals => "'!='".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::GreaterThan => "'>'".to_string(),
            Token::LessThan => "'<'".to_string(),
            Token::End => "end of input".to_string(),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Token, String> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((start, c)) = self.chars.next() else {
            return Ok(Token::End);
        };

        let token = match c {
            ',' => Token::Comma,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '>' => Token::GreaterThan,
            '<' => Token::LessThan,
            '=' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    Token::DoubleEquals
                } else {
                    Token::Equals
                }
            }
            '!' => {
                if self.chars.next_if(|(_, c)| *c == '=').is_some() {
                    Token::NotEquals
                } else {
                    Token::Bang
                }
            }
            c if is_identifier_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some((idx, c)) = self.chars.next_if(|(_, c)| is_identifier_char(*c)) {
                    end = idx + c.len_utf8();
                }
                let ident = self.input.get(start..end).unwrap_or_default();
                Token::Identifier(ident.to_string())
            }
            other => return Err(format!("unexpected character '{other}' at position {start}")),
        };
        Ok(token)
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            lookahead: None,
        }
    }

    fn peek(&mut self) -> Result<&Token, String> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.get_or_insert(Token::End))
    }

    fn advance(&mut self) -> Result<Token, String> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn parse(mut self) -> Result<LabelSelector, String> {
        let mut requirements = Vec::new();
        if *self.peek()? == Token::End {
            return Ok(LabelSelector { requirements });
        }

        loop {
            requirements.push(self.parse_requirement()?);
            match self.advance()? {
                Token::End => break,
                Token::Comma => {}
                other => return Err(format!("expected ',' or end of input, found {}", other.describe())),
            }
        }

        Ok(LabelSelector { requirements })
    }

    fn parse_requirement(&mut self) -> Result<Requirement, String> {
        if *self.peek()? == Token::Bang {
            self.advance()?;
            let key = self.parse_key()?;
            return Ok(Requirement {
                key,
                operator: Operator::DoesNotExist,
                values: BTreeSet::new(),
            });
        }

        let key = self.parse_key()?;

        let operator = match self.peek()? {
            Token::Comma | Token::End => {
                return Ok(Requirement {
                    key,
                    operator: Operator::Exists,
                    values: BTreeSet::new(),
                })
            }
            Token::Equals | Token::DoubleEquals => Operator::Equals,
            Token::NotEquals => Operator::NotEquals,
            Token::GreaterThan => Operator::GreaterThan,
            Token::LessThan => Operator::LessThan,
            Token::Identifier(word) if word == "in" => Operator::In,
            Token::Identifier(word) if word == "notin" => Operator::NotIn,
            other => return Err(format!("expected operator after key '{key}', found {}", other.describe())),
        };
        self.advance()?;

        let values = match operator {
            Operator::In | Operator::NotIn => self.parse_value_set()?,
            Operator::GreaterThan | Operator::LessThan => {
                let value = self.parse_value()?;
                if value.parse::<i64>().is_err() {
                    return Err(format!("value '{value}' for key '{key}' must be an integer"));
                }
                BTreeSet::from([value])
            }
            _ => BTreeSet::from([self.parse_value()?]),
        };

        Ok(Requirement {
            key,
            operator,
            values,
        })
    }

    fn parse_key(&mut self) -> Result<String, String> {
        match self.advance()? {
            Token::Identifier(key) => {
                validate_key(&key)?;
                Ok(key)
            }
            other => Err(format!("expected label key, found {}", other.describe())),
        }
    }

    /// A single value. An empty value is allowed (`key=`).
    fn parse_value(&mut self) -> Result<String, String> {
        match self.peek()? {
            Token::Identifier(_) => {}
            Token::Comma | Token::End | Token::CloseParen => return Ok(String::new()),
            other => return Err(format!("expected label value, found {}", other.describe())),
        }
        match self.advance()? {
            Token::Identifier(value) => {
                validate_value(&value)?;
                Ok(value)
            }
            other => Err(format!("expected label value, found {}", other.describe())),
        }
    }

    fn parse_value_set(&mut self) -> Result<BTreeSet<String>, String> {
        match self.advance()? {
            Token::OpenParen => {}
            other => return Err(format!("expected '(' to start value set, found {}", other.describe())),
        }

        // "()" is the set holding only the empty value, as the API server reads it
        let mut values = BTreeSet::new();
        loop {
            values.insert(self.parse_value()?);
            match self.advance()? {
                Token::Comma => {}
                Token::CloseParen => break,
                other => return Err(format!("expected ',' or ')' in value set, found {}", other.describe())),
            }
        }
        Ok(values)
    }
}

fn validate_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.contains('/') {
            return Err(format!("invalid key prefix in '{key}'"));
        }
    }
    if name.is_empty() || name.len() > MAX_LABEL_NAME_LENGTH || name.contains('/') {
        return Err(format!("invalid label key '{key}'"));
    }
    if !starts_and_ends_alphanumeric(name) {
        return Err(format!(
            "label key '{key}' must begin and end with an alphanumeric character"
        ));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.len() > MAX_LABEL_NAME_LENGTH {
        return Err(format!(
            "label value '{value}' exceeds {MAX_LABEL_NAME_LENGTH} characters"
        ));
    }
    if value.contains('/') {
        return Err(format!("label value '{value}' must not contain '/'"));
    }
    if !value.is_empty() && !starts_and_ends_alphanumeric(value) {
        return Err(format!(
            "label value '{value}' must begin and end with an alphanumeric character"
        ));
    }
    Ok(())
}

fn starts_and_ends_alphanumeric(s: &str) -> bool {
    let first = s.chars().next();
    let last = s.chars().next_back();
    first.is_some_and(|c| c.is_ascii_alphanumeric()) && last.is_some_and(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        let selector = LabelSelector::parse("").unwrap();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[])));
        assert!(selector.matches(&labels(&[("app", "web")])));

        let whitespace = LabelSelector::parse("   ").unwrap();
        assert!(whitespace.is_empty());
    }

    #[test]
    fn test_equality() {
        let selector = LabelSelector::parse("label1=value1").unwrap();
        assert!(selector.matches(&labels(&[("label1", "value1")])));
        assert!(!selector.matches(&labels(&[("label1", "value2")])));
        assert!(!selector.matches(&labels(&[])));

        let double = LabelSelector::parse("label1 == value1").unwrap();
        assert_eq!(double, selector);
    }

    #[test]
    fn test_inequality_matches_missing_key() {
        let selector = LabelSelector::parse("tier!=frontend").unwrap();
        assert!(selector.matches(&labels(&[("tier", "backend")])));
        assert!(selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("tier", "frontend")])));
    }

    #[test]
    fn test_set_membership() {
        let selector = LabelSelector::parse("label1 in (value1,value2)").unwrap();
        assert!(selector.matches(&labels(&[("label1", "value1")])));
        assert!(selector.matches(&labels(&[("label1", "value2")])));
        assert!(!selector.matches(&labels(&[("label1", "value3")])));
        assert!(!selector.matches(&labels(&[])));
    }

    #[test]
    fn test_set_membership_with_spaces() {
        let selector = LabelSelector::parse("env in ( prod , staging )").unwrap();
        assert!(selector.matches(&labels(&[("env", "staging")])));
    }

    #[test]
    fn test_set_exclusion() {
        let selector = LabelSelector::parse("env notin (prod)").unwrap();
        assert!(selector.matches(&labels(&[("env", "dev")])));
        assert!(selector.matches(&labels(&[])));
        assert!(!selector.matches(&labels(&[("env", "prod")])));
    }

    #[test]
    fn test_existence() {
        let exists = LabelSelector::parse("app").unwrap();
        assert!(exists.matches(&labels(&[("app", "")])));
        assert!(!exists.matches(&labels(&[])));

        let absent = LabelSelector::parse("!app").unwrap();
        assert!(absent.matches(&labels(&[])));
        assert!(!absent.matches(&labels(&[("app", "x")])));
    }

    #[test]
    fn test_numeric_comparison() {
        let selector = LabelSelector::parse("replicas>2").unwrap();
        assert!(selector.matches(&labels(&[("replicas", "3")])));
        assert!(!selector.matches(&labels(&[("replicas", "2")])));
        assert!(!selector.matches(&labels(&[("replicas", "many")])));

        assert!(LabelSelector::parse("replicas<two").is_err());
    }

    #[test]
    fn test_requirements_are_anded() {
        let selector = LabelSelector::parse("app=web,tier in (a,b),!canary").unwrap();
        assert_eq!(selector.requirements().len(), 3);
        assert!(selector.matches(&labels(&[("app", "web"), ("tier", "a")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "c")])));
        assert!(!selector.matches(&labels(&[
            ("app", "web"),
            ("tier", "a"),
            ("canary", "true")
        ])));
    }

    #[test]
    fn test_empty_value_matches_empty_label() {
        let selector = LabelSelector::parse("app=").unwrap();
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
    }

    #[test]
    fn test_empty_value_set_holds_empty_value() {
        let selector = LabelSelector::parse("app in ()").unwrap();
        let requirement = selector.requirements().first().unwrap();
        assert_eq!(requirement.operator, Operator::In);
        assert_eq!(requirement.values, BTreeSet::from([String::new()]));
        assert!(selector.matches(&labels(&[("app", "")])));
        assert!(!selector.matches(&labels(&[("app", "web")])));
        assert!(!selector.matches(&labels(&[])));

        let excluded = LabelSelector::parse("app notin ()").unwrap();
        assert!(excluded.matches(&labels(&[("app", "web")])));
        assert!(!excluded.matches(&labels(&[("app", "")])));
    }

    #[test]
    fn test_prefixed_key() {
        let selector = LabelSelector::parse("app.kubernetes.io/name=api").unwrap();
        assert!(selector.matches(&labels(&[("app.kubernetes.io/name", "api")])));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "=value",
            "key in value",
            "key in (a,b",
            "key=a=b",
            "key@=v",
            ",",
            "key=,",
            "-key=v",
            "a/b/c=v",
            "key=val/ue",
        ] {
            let result = LabelSelector::parse(bad);
            assert!(
                matches!(result, Err(CommonError::InvalidLabelSelector { ref selector, .. }) if selector == bad),
                "expected '{}' to be rejected, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_display_is_reparseable() {
        let selector = LabelSelector::parse("b notin (y,x), a=1, !c").unwrap();
        let rendered = selector.to_string();
        assert_eq!(rendered, "b notin (x,y),a=1,!c");
        assert_eq!(LabelSelector::parse(&rendered).unwrap(), selector);
    }
}
