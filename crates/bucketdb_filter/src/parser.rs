//! Recursive-descent parser.
//!
//! ```text
//! or      = and ( "||" and )*
//! and     = eq ( "&&" eq )*
//! eq      = cmp ( ( "==" | "!=" ) cmp )*
//! cmp     = add ( ( "<" | "<=" | ">" | ">=" ) add )*
//! add     = mul ( ( "+" | "-" ) mul )*
//! mul     = unary ( ( "*" | "/" | "%" ) unary )*
//! unary   = ( "!" | "-" ) unary | primary
//! primary = path | literal | "(" or ")" | "$" name "(" [ or ( "," or )* ] ")"
//! ```
//!
//! Every construct that nests (parentheses, unary operators, call
//! arguments, each operator in a chain) counts one level against
//! [`MAX_DEPTH`], which bounds both this parser's recursion and the
//! evaluator's.

use crate::MAX_DEPTH;
use crate::ast::{BinaryOp, Expr, Function, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{tokenize, Spanned, Token};
use serde_json::Value;

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ParseError::new(0, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
        depth: 0,
    };
    let expr = parser.or()?;
    if let Some((token, at)) = parser.tokens.get(parser.pos) {
        return Err(ParseError::new(*at, format!("unexpected {}", describe(token))));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
    depth: usize,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Path(_) => "path".to_string(),
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::True => "'true'".to_string(),
        Token::False => "'false'".to_string(),
        Token::Null => "'null'".to_string(),
        Token::Function(name) => format!("function ${name}"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
        other => format!("operator {other:?}"),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, at)| *at)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), ParseError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::new(self.position(), format!("expected {what}")))
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(
                self.position(),
                format!("expression nested deeper than {MAX_DEPTH} levels"),
            ));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr, ParseError>,
        ops: &[(Token, BinaryOp)],
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        let mut wraps = 0;
        'outer: loop {
            for (token, op) in ops {
                if self.peek() == Some(token) {
                    self.enter()?;
                    wraps += 1;
                    self.pos += 1;
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            self.leave(wraps);
            return Ok(left);
        }
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::and, &[(Token::Or, BinaryOp::Or)])
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(Self::equality, &[(Token::And, BinaryOp::And)])
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Self::comparison,
            &[(Token::Eq, BinaryOp::Eq), (Token::Ne, BinaryOp::Ne)],
        )
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Self::additive,
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Le, BinaryOp::Le),
                (Token::Gt, BinaryOp::Gt),
                (Token::Ge, BinaryOp::Ge),
            ],
        )
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Self::multiplicative,
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            Self::unary,
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
        )
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.primary(),
        };
        self.enter()?;
        self.pos += 1;
        let operand = self.unary()?;
        self.leave(1);
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let at = self.position();
        let Some((token, _)) = self.advance() else {
            return Err(ParseError::new(at, "unexpected end of expression"));
        };
        match token {
            Token::Path(segments) => Ok(Expr::Path(segments)),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::LParen => {
                self.enter()?;
                let inner = self.or()?;
                self.expect(&Token::RParen, "')'")?;
                self.leave(1);
                Ok(inner)
            }
            Token::Function(name) => self.call(&name, at),
            other => Err(ParseError::new(at, format!("unexpected {}", describe(&other)))),
        }
    }

    fn call(&mut self, name: &str, at: usize) -> Result<Expr, ParseError> {
        let function = Function::lookup(name)
            .ok_or_else(|| ParseError::new(at, format!("unknown function ${name}")))?;
        self.expect(&Token::LParen, "'(' after function name")?;

        self.enter()?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.or()?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "')' to close call")?;
        self.leave(1);

        if args.len() != function.arity() {
            return Err(ParseError::new(
                at,
                format!(
                    "{} takes {} argument(s), got {}",
                    function.name(),
                    function.arity(),
                    args.len()
                ),
            ));
        }
        Ok(Expr::Call(function, args))
    }
}
