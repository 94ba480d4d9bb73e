//! Infix text form of expression trees.
//!
//! Rendering is fully parenthesised (`((x + 3) * y)`), so `parse(render(t))`
//! rebuilds `t` exactly. The parser also accepts conventional infix written
//! by hand or returned by an external rewriter: operator precedence
//! (`+ -` < `* / %` < `^`, with `^` right-associative), optional
//! parentheses, decimal literals and unary minus.

use crate::gp::expr::{BinOp, Expr, Variable, MAX_DEPTH};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Recursion budget of the parser.
///
/// A fully parenthesised tree of depth `d` needs at most `2d + 2` nested
/// `expression` calls: one for each `(` and one for each right operand.
const MAX_NESTING: usize = 2 * MAX_DEPTH + 2;

/// Error raised while parsing the text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input ended where an operand was expected.
    #[error("unexpected end of input")]
    UnexpectedEnd,
    /// A character that cannot start or continue an expression.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset in the input.
        offset: usize,
    },
    /// An identifier that is not one of the known variables.
    #[error("unknown variable {name:?} at offset {offset}")]
    UnknownVariable {
        /// The identifier as written.
        name: String,
        /// Byte offset in the input.
        offset: usize,
    },
    /// A numeric literal that is not a finite number.
    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber {
        /// The literal as written.
        text: String,
        /// Byte offset in the input.
        offset: usize,
    },
    /// Parentheses nested deeper than the parser allows.
    #[error("expression nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(c) => write!(f, "{c}"),
            Self::Var(v) => f.write_str(v.name()),
            Self::Op(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
        }
    }
}

impl FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        let expr = parser.expression(0)?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(expr),
            Some((offset, found)) => Err(ParseError::UnexpectedChar { found, offset }),
        }
    }
}

impl From<Expr> for String {
    fn from(expr: Expr) -> Self {
        expr.to_string()
    }
}

impl TryFrom<String> for Expr {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Binding power of an infix operator: (left, right).
const fn binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Add | BinOp::Sub => (1, 2),
        BinOp::Mul | BinOp::Div | BinOp::Mod => (3, 4),
        // right-associative
        BinOp::Pow => (6, 5),
    }
}

const fn op_for(c: char) -> Option<BinOp> {
    match c {
        '+' => Some(BinOp::Add),
        '-' => Some(BinOp::Sub),
        '*' => Some(BinOp::Mul),
        '/' => Some(BinOp::Div),
        '^' => Some(BinOp::Pow),
        '%' => Some(BinOp::Mod),
        _ => None,
    }
}

/// Precedence-climbing parser over the input characters.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.input[self.pos..]
            .chars()
            .next()
            .map(|c| (self.pos, c))
    }

    fn bump(&mut self) {
        if let Some((_, c)) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some((_, c)) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump();
        }
    }

    fn expression(&mut self, min_power: u8) -> Result<Expr, ParseError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(ParseError::TooDeep);
        }
        let mut lhs = self.operand()?;
        loop {
            self.skip_whitespace();
            let Some((_, c)) = self.peek() else {
                break;
            };
            let Some(op) = op_for(c) else {
                break;
            };
            let (left_power, right_power) = binding_power(op);
            if left_power < min_power {
                break;
            }
            self.bump();
            let rhs = self.expression(right_power)?;
            lhs = Expr::op(op, lhs, rhs);
        }
        self.nesting -= 1;
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let (offset, c) = self.peek().ok_or(ParseError::UnexpectedEnd)?;
        match c {
            '(' => {
                self.bump();
                let inner = self.expression(0)?;
                self.skip_whitespace();
                match self.peek() {
                    Some((_, ')')) => {
                        self.bump();
                        Ok(inner)
                    }
                    Some((offset, found)) => Err(ParseError::UnexpectedChar { found, offset }),
                    None => Err(ParseError::UnexpectedEnd),
                }
            }
            '-' => {
                self.bump();
                match self.peek() {
                    // negative literal
                    Some((_, d)) if d.is_ascii_digit() || d == '.' => {
                        let value = self.number(offset)?;
                        Ok(Expr::Const(-value))
                    }
                    _ => {
                        // unary minus binds tighter than everything but `^`
                        let operand = self.expression(5)?;
                        Ok(Expr::op(BinOp::Sub, Expr::Const(0.0), operand))
                    }
                }
            }
            d if d.is_ascii_digit() || d == '.' => Ok(Expr::Const(self.number(offset)?)),
            a if a.is_ascii_alphabetic() => {
                let start = self.pos;
                while let Some((_, c)) = self.peek() {
                    if !c.is_ascii_alphanumeric() && c != '_' {
                        break;
                    }
                    self.bump();
                }
                let name = &self.input[start..self.pos];
                Variable::from_name(name)
                    .map(Expr::Var)
                    .ok_or_else(|| ParseError::UnknownVariable {
                        name: name.to_string(),
                        offset: start,
                    })
            }
            found => Err(ParseError::UnexpectedChar { found, offset }),
        }
    }

    fn number(&mut self, offset: usize) -> Result<f64, ParseError> {
        let start = self.pos;
        while let Some((_, c)) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                self.bump();
            } else if matches!(c, 'e' | 'E') {
                self.bump();
                if matches!(self.peek(), Some((_, '+' | '-'))) {
                    self.bump();
                }
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(ParseError::InvalidNumber {
                text: text.to_string(),
                offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RandomStream;

    fn parse(s: &str) -> Expr {
        s.parse().unwrap()
    }

    #[test]
    fn test_render() {
        let expr = Expr::op(
            BinOp::Mul,
            Expr::op(BinOp::Add, Expr::Var(Variable::X), Expr::Const(3.0)),
            Expr::Const(-2.5),
        );
        assert_eq!(expr.to_string(), "((x + 3) * -2.5)");
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("x + 2 * y"), parse("(x + (2 * y))"));
        assert_eq!(parse("x - y - z"), parse("((x - y) - z)"));
        assert_eq!(parse("x ^ y ^ 2"), parse("(x ^ (y ^ 2))"));
        assert_eq!(parse("x % 3 / n"), parse("((x % 3) / n)"));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(parse("-3"), Expr::Const(-3.0));
        assert_eq!(
            parse("-x"),
            Expr::op(BinOp::Sub, Expr::Const(0.0), Expr::Var(Variable::X))
        );
        assert_eq!(parse("(x - -3)"), Expr::op(BinOp::Sub, Expr::Var(Variable::X), Expr::Const(-3.0)));
    }

    #[test]
    fn test_exponent_literals() {
        assert_eq!(parse("1e3"), Expr::Const(1000.0));
        assert_eq!(parse("2.5E-1"), Expr::Const(0.25));
    }

    #[test]
    fn test_errors() {
        assert_eq!("".parse::<Expr>(), Err(ParseError::UnexpectedEnd));
        assert_eq!("(x + 1".parse::<Expr>(), Err(ParseError::UnexpectedEnd));
        assert!(matches!(
            "foo + 1".parse::<Expr>(),
            Err(ParseError::UnknownVariable { .. })
        ));
        assert!(matches!(
            "x + 1)".parse::<Expr>(),
            Err(ParseError::UnexpectedChar { found: ')', .. })
        ));
        assert!(matches!(
            "1.2.3".parse::<Expr>(),
            Err(ParseError::InvalidNumber { .. })
        ));
        let deep = format!("{}x{}", "(".repeat(2000), ")".repeat(2000));
        assert_eq!(deep.parse::<Expr>(), Err(ParseError::TooDeep));
    }

    #[test]
    fn test_roundtrip_random_trees() {
        let mut rng = RandomStream::new(2024);
        for _ in 0..500 {
            let tree = Expr::random(&mut rng, 5);
            assert_eq!(parse(&tree.to_string()), tree);
        }
    }

    fn chain(depth: usize, nest_right: bool) -> Expr {
        let mut tree = Expr::Var(Variable::X);
        for _ in 0..depth {
            tree = if nest_right {
                Expr::op(BinOp::Add, Expr::Const(1.0), tree)
            } else {
                Expr::op(BinOp::Mul, tree, Expr::Var(Variable::Y))
            };
        }
        tree
    }

    #[test]
    fn test_deep_trees_survive_serde() {
        for depth in [200, MAX_DEPTH] {
            for nest_right in [true, false] {
                let tree = chain(depth, nest_right);
                let json = serde_json::to_string(&tree).unwrap();
                let back: Expr = serde_json::from_str(&json).unwrap();
                assert_eq!(back.depth(), depth);
                assert_eq!(back, tree);
            }
        }
    }

    #[test]
    fn test_rejects_trees_past_max_depth() {
        let text = chain(MAX_DEPTH + 1, true).to_string();
        assert_eq!(text.parse::<Expr>(), Err(ParseError::TooDeep));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let expr = parse("(x + 3)");
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, "\"(x + 3)\"");
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
        assert!(serde_json::from_str::<Expr>("\"(x +\"").is_err());
    }
}
