//! Recommendation-condition expressions.
//!
//! A tiny grammar over the single numeric variable `score`:
//!
//! ```text
//! expr       := or
//! or         := and (("or" | "||") and)*
//! and        := not (("and" | "&&") not)*
//! not        := ("not" | "!") not | primary
//! primary    := "(" expr ")" | "true" | "false" | comparison
//! comparison := operand (cmp operand)+
//! operand    := "score" | ["-"] number
//! cmp        := "<" | "<=" | ">" | ">=" | "==" | "!="
//! ```
//!
//! Chained comparisons (`0 <= score < 50`) are read pairwise and joined with
//! `and`. There is no arithmetic, no calls and no other variables.

use thiserror::Error;

/// Errors produced while parsing a condition expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unknown variable '{name}' at offset {offset} (only `score` is available)")]
    UnknownVariable { name: String, offset: usize },

    #[error("expected {expected} at offset {offset}")]
    UnexpectedToken {
        expected: &'static str,
        offset: usize,
    },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Score,
    Number(f64),
}

impl Operand {
    fn value(self, score: f64) -> f64 {
        match self {
            Operand::Score => score,
            Operand::Number(n) => n,
        }
    }
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(bool),
    /// `operands[0] ops[0] operands[1] ops[1] operands[2] ...`
    Compare {
        operands: Vec<Operand>,
        ops: Vec<CmpOp>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a condition string.
    pub fn parse(input: &str) -> Result<Expr, ExprError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ExprError::UnexpectedToken {
                expected: "end of expression",
                offset: tok.offset,
            }),
        }
    }

    /// Evaluate against a score. Pure and total.
    pub fn eval(&self, score: f64) -> bool {
        match self {
            Expr::Literal(b) => *b,
            Expr::Compare { operands, ops } => ops.iter().enumerate().all(|(i, op)| {
                op.apply(operands[i].value(score), operands[i + 1].value(score))
            }),
            Expr::Not(inner) => !inner.eval(score),
            Expr::And(lhs, rhs) => lhs.eval(score) && rhs.eval(score),
            Expr::Or(lhs, rhs) => lhs.eval(score) || rhs.eval(score),
        }
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(condition: &str, score: f64) -> Result<bool, ExprError> {
    Ok(Expr::parse(condition)?.eval(score))
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Score,
    True,
    False,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Minus,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let offset = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = input.get(i..i + 2);
        let kind = match (c, two) {
            (_, Some("<=")) => Some((TokenKind::Cmp(CmpOp::Le), 2)),
            (_, Some(">=")) => Some((TokenKind::Cmp(CmpOp::Ge), 2)),
            (_, Some("==")) => Some((TokenKind::Cmp(CmpOp::Eq), 2)),
            (_, Some("!=")) => Some((TokenKind::Cmp(CmpOp::Ne), 2)),
            (_, Some("&&")) => Some((TokenKind::And, 2)),
            (_, Some("||")) => Some((TokenKind::Or, 2)),
            ('<', _) => Some((TokenKind::Cmp(CmpOp::Lt), 1)),
            ('>', _) => Some((TokenKind::Cmp(CmpOp::Gt), 1)),
            ('!', _) => Some((TokenKind::Not, 1)),
            ('-', _) => Some((TokenKind::Minus, 1)),
            ('(', _) => Some((TokenKind::LParen, 1)),
            (')', _) => Some((TokenKind::RParen, 1)),
            _ => None,
        };
        if let Some((kind, len)) = kind {
            tokens.push(Token { kind, offset });
            i += len;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let text = &input[start..i];
            let n = text.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(n),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &input[start..i];
            let kind = match word {
                "score" => TokenKind::Score,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "true" | "True" => TokenKind::True,
                "false" | "False" => TokenKind::False,
                other => {
                    return Err(ExprError::UnknownVariable {
                        name: other.to_string(),
                        offset: start,
                    })
                }
            };
            tokens.push(Token {
                kind,
                offset: start,
            });
            continue;
        }

        let ch = input[i..].chars().next().unwrap_or(c);
        return Err(ExprError::UnexpectedChar { ch, offset });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let Some(tok) = self.peek().cloned() else {
            return Err(ExprError::UnexpectedEnd {
                expected: "a comparison",
            });
        };
        match tok.kind {
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(ExprError::UnexpectedToken {
                        expected: "')'",
                        offset: other.offset,
                    }),
                    None => Err(ExprError::UnexpectedEnd { expected: "')'" }),
                }
            }
            TokenKind::True => {
                self.pos += 1;
                Ok(Expr::Literal(true))
            }
            TokenKind::False => {
                self.pos += 1;
                Ok(Expr::Literal(false))
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut operands = vec![self.parse_operand()?];
        let mut ops = Vec::new();

        while let Some(Token {
            kind: TokenKind::Cmp(op),
            ..
        }) = self.peek().cloned()
        {
            self.pos += 1;
            ops.push(op);
            operands.push(self.parse_operand()?);
        }

        if ops.is_empty() {
            return match self.peek() {
                Some(tok) => Err(ExprError::UnexpectedToken {
                    expected: "a comparison operator",
                    offset: tok.offset,
                }),
                None => Err(ExprError::UnexpectedEnd {
                    expected: "a comparison operator",
                }),
            };
        }

        Ok(Expr::Compare { operands, ops })
    }

    fn parse_operand(&mut self) -> Result<Operand, ExprError> {
        let negative = self.eat(&TokenKind::Minus);
        match self.next() {
            Some(Token {
                kind: TokenKind::Number(n),
                ..
            }) => Ok(Operand::Number(if negative { -n } else { n })),
            Some(Token {
                kind: TokenKind::Score,
                offset,
            }) => {
                if negative {
                    Err(ExprError::UnexpectedToken {
                        expected: "a number after '-'",
                        offset,
                    })
                } else {
                    Ok(Operand::Score)
                }
            }
            Some(tok) => Err(ExprError::UnexpectedToken {
                expected: "`score` or a number",
                offset: tok.offset,
            }),
            None => Err(ExprError::UnexpectedEnd {
                expected: "`score` or a number",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_comparisons() {
        assert!(evaluate("score < 50", 20.0).unwrap());
        assert!(!evaluate("score < 50", 50.0).unwrap());
        assert!(evaluate("score >= 50", 50.0).unwrap());
        assert!(evaluate("score == 0", 0.0).unwrap());
        assert!(evaluate("score != 0", 1.0).unwrap());
        assert!(evaluate("70 <= score", 85.0).unwrap());
    }

    #[test]
    fn boolean_combinators() {
        let expr = Expr::parse("score >= 29 and score <= 50").unwrap();
        assert!(expr.eval(40.0));
        assert!(!expr.eval(60.0));

        let expr = Expr::parse("score < 10 || score > 90").unwrap();
        assert!(expr.eval(5.0));
        assert!(expr.eval(95.0));
        assert!(!expr.eval(50.0));

        let expr = Expr::parse("not (score > 50)").unwrap();
        assert!(expr.eval(50.0));
        assert!(!expr.eval(51.0));

        assert!(evaluate("!(score > 50) && true", 10.0).unwrap());
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // false or (true and true)
        assert!(evaluate("score > 100 or score > 1 and score < 10", 5.0).unwrap());
        // (false) or (true and false)
        assert!(!evaluate("score > 100 or score > 1 and score < 3", 5.0).unwrap());
    }

    #[test]
    fn chained_comparison() {
        let expr = Expr::parse("0 <= score < 29").unwrap();
        assert!(expr.eval(0.0));
        assert!(expr.eval(28.9));
        assert!(!expr.eval(29.0));
        assert!(!expr.eval(-1.0));
    }

    #[test]
    fn negative_numbers() {
        assert!(evaluate("score > -1.5", -1.0).unwrap());
        assert!(!evaluate("score > -1.5", -2.0).unwrap());
    }

    #[test]
    fn rejects_other_variables() {
        let err = Expr::parse("__import__('os')").unwrap_err();
        assert!(matches!(err, ExprError::UnknownVariable { .. }));

        let err = Expr::parse("age > 3").unwrap_err();
        assert_eq!(
            err,
            ExprError::UnknownVariable {
                name: "age".into(),
                offset: 0
            }
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(
            Expr::parse("score").unwrap_err(),
            ExprError::UnexpectedEnd { .. }
        ));
        assert!(matches!(
            Expr::parse("score >").unwrap_err(),
            ExprError::UnexpectedEnd { .. }
        ));
        assert!(matches!(
            Expr::parse("(score > 1").unwrap_err(),
            ExprError::UnexpectedEnd { .. }
        ));
        assert!(matches!(
            Expr::parse("score > 1 )").unwrap_err(),
            ExprError::UnexpectedToken { offset: 10, .. }
        ));
        assert!(matches!(
            Expr::parse("score + 1 > 2").unwrap_err(),
            ExprError::UnexpectedChar { ch: '+', offset: 6 }
        ));
        assert!(matches!(
            Expr::parse("score > 1.2.3").unwrap_err(),
            ExprError::InvalidNumber { .. }
        ));
        assert!(Expr::parse("").is_err());
    }

    #[test]
    fn literals() {
        assert!(evaluate("true", 0.0).unwrap());
        assert!(!evaluate("False", 0.0).unwrap());
    }
}
