//! Member filter expressions.
//!
//! A filter is a conjunction of comparisons:
//!
//! ```text
//! start_time >= '2001-01-03' AND name != 'a3'
//! ```
//!
//! Fields are `start_time`, `end_time`, `name`, and `semantic_label`; operators
//! are `= != < <= > >=`. Values may be single- or double-quoted, or bare words.
//! A clause on a missing `end_time` or `semantic_label` never matches.

use std::cmp::Ordering;

use tscube_core::collection::RasterMapDescriptor;
use tscube_core::time::{TemporalType, Timestamp};

use crate::error::{IoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    StartTime,
    EndTime,
    Name,
    SemanticLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Time(Timestamp),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Field,
    pub op: CmpOp,
    operand: Operand,
}

impl Clause {
    fn matches(&self, m: &RasterMapDescriptor) -> bool {
        match (&self.field, &self.operand) {
            (Field::StartTime, Operand::Time(t)) => self.op.holds(m.extent.start.cmp(t)),
            (Field::EndTime, Operand::Time(t)) => {
                m.extent.end.is_some_and(|end| self.op.holds(end.cmp(t)))
            }
            (Field::Name, Operand::Text(s)) => self.op.holds(m.id.as_str().cmp(s.as_str())),
            (Field::SemanticLabel, Operand::Text(s)) => m
                .semantic_label
                .as_deref()
                .is_some_and(|label| self.op.holds(label.cmp(s.as_str()))),
            _ => false,
        }
    }
}

/// Parsed conjunction of clauses; the empty filter matches every member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberFilter {
    clauses: Vec<Clause>,
}

impl MemberFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse `expr`; time literals are read in the collection's temporal type.
    pub fn parse(expr: &str, temporal_type: TemporalType) -> Result<Self> {
        let tokens = tokenize(expr)?;
        let mut clauses = Vec::new();
        let mut it = tokens.into_iter().peekable();

        while it.peek().is_some() {
            let field = match it.next() {
                Some(Token::Word(w)) => parse_field(&w)?,
                other => return Err(unexpected("field name", other)),
            };
            let op = match it.next() {
                Some(Token::Op(op)) => op,
                other => return Err(unexpected("comparison operator", other)),
            };
            let raw = match it.next() {
                Some(Token::Word(w)) | Some(Token::Quoted(w)) => w,
                other => return Err(unexpected("value", other)),
            };
            let operand = match field {
                Field::StartTime | Field::EndTime => {
                    Operand::Time(Timestamp::parse(&raw, temporal_type)?)
                }
                Field::Name | Field::SemanticLabel => Operand::Text(raw),
            };
            clauses.push(Clause { field, op, operand });

            match it.next() {
                None => break,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("and") => {
                    if it.peek().is_none() {
                        return Err(IoError::Filter("dangling AND".into()));
                    }
                }
                other => return Err(unexpected("AND", other)),
            }
        }

        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, m: &RasterMapDescriptor) -> bool {
        self.clauses.iter().all(|c| c.matches(m))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Op(CmpOp),
}

fn tokenize(expr: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '\'' | '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some(ch) => s.push(ch),
                        None => return Err(IoError::Filter(format!("unterminated {c} quote"))),
                    }
                }
                out.push(Token::Quoted(s));
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let eq = chars.peek() == Some(&'=');
                if eq {
                    chars.next();
                }
                let op = match (c, eq) {
                    ('=', _) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Ge,
                    _ => return Err(IoError::Filter("'!' must be followed by '='".into())),
                };
                out.push(Token::Op(op));
            }
            _ => {
                let mut s = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "=!<>'\"".contains(ch) {
                        break;
                    }
                    s.push(ch);
                    chars.next();
                }
                out.push(Token::Word(s));
            }
        }
    }
    Ok(out)
}

fn parse_field(w: &str) -> Result<Field> {
    match w.to_ascii_lowercase().as_str() {
        "start_time" => Ok(Field::StartTime),
        "end_time" => Ok(Field::EndTime),
        "name" => Ok(Field::Name),
        "semantic_label" => Ok(Field::SemanticLabel),
        other => Err(IoError::Filter(format!("unknown field '{other}'"))),
    }
}

fn unexpected(wanted: &str, got: Option<Token>) -> IoError {
    match got {
        Some(t) => IoError::Filter(format!("expected {wanted}, found {t:?}")),
        None => IoError::Filter(format!("expected {wanted}, found end of input")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tscube_core::cell::CellType;
    use tscube_core::collection::MapId;
    use tscube_core::time::TemporalExtent;

    fn day(d: &str) -> Timestamp {
        Timestamp::parse(d, TemporalType::Absolute).unwrap()
    }

    fn member(id: &str, start: &str, end: Option<&str>, label: Option<&str>) -> RasterMapDescriptor {
        RasterMapDescriptor {
            id: MapId::new(id),
            extent: TemporalExtent {
                start: day(start),
                end: end.map(day),
            },
            cell_type: CellType::Float64,
            semantic_label: label.map(str::to_string),
        }
    }

    #[test]
    fn empty_expression_matches_everything() {
        let f = MemberFilter::parse("   ", TemporalType::Absolute).unwrap();
        assert!(f.is_empty());
        assert!(f.matches(&member("a1", "2001-01-01", None, None)));
    }

    #[test]
    fn conjunction_of_time_and_name() {
        let f = MemberFilter::parse(
            "start_time >= '2001-01-03' and name != \"a3\"",
            TemporalType::Absolute,
        )
        .unwrap();
        assert_eq!(f.clauses().len(), 2);
        assert!(!f.matches(&member("a1", "2001-01-01", None, None)));
        assert!(f.matches(&member("a2", "2001-01-03", None, None)));
        assert!(!f.matches(&member("a3", "2001-01-05", None, None)));
    }

    #[test]
    fn missing_optional_fields_never_match() {
        let f = MemberFilter::parse("end_time < '2002-01-01'", TemporalType::Absolute).unwrap();
        assert!(!f.matches(&member("a", "2001-01-01", None, None)));
        assert!(f.matches(&member("a", "2001-01-01", Some("2001-01-03"), None)));

        let f = MemberFilter::parse("semantic_label = red", TemporalType::Absolute).unwrap();
        assert!(!f.matches(&member("a", "2001-01-01", None, None)));
        assert!(f.matches(&member("a", "2001-01-01", None, Some("red"))));
    }

    #[test]
    fn relative_literals_are_integers() {
        let f = MemberFilter::parse("start_time < 10", TemporalType::Relative).unwrap();
        let m = RasterMapDescriptor {
            id: MapId::new("r"),
            extent: TemporalExtent::instant(Timestamp::Relative(5)),
            cell_type: CellType::Int32,
            semantic_label: None,
        };
        assert!(f.matches(&m));
        assert!(MemberFilter::parse("start_time < 'soon'", TemporalType::Relative).is_err());
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in [
            "colour = 'red'",
            "name 'a1'",
            "name = 'a1' AND",
            "name = 'a1' OR name = 'a2'",
            "name = 'a1",
            "name ! 'a1'",
        ] {
            assert!(
                MemberFilter::parse(bad, TemporalType::Absolute).is_err(),
                "accepted {bad:?}"
            );
        }
    }
}
