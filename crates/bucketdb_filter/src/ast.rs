//! Parsed filter expressions.

use serde_json::Value;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `.name` or `.["name"]`
    Field(String),
    /// `[n]`
    Index(usize),
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `-`
    Neg,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `||`
    Or,
    /// `&&`
    And,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
}

impl BinaryOp {
    /// The operator as written.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

/// Built-in functions, called as `$name(args)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `$len(x)`: length of a string, array or object; 0 for null.
    Len,
    /// `$has(container, key)`: object has key, or array has index.
    Has,
    /// `$contains(haystack, needle)`: substring, array element, or object key.
    Contains,
    /// `$lower(s)`
    Lower,
    /// `$upper(s)`
    Upper,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Self::Len,
            "has" => Self::Has,
            "contains" => Self::Contains,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            _ => return None,
        })
    }

    /// The function's name including the `$`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Len => "$len",
            Self::Has => "$has",
            Self::Contains => "$contains",
            Self::Lower => "$lower",
            Self::Upper => "$upper",
        }
    }

    pub(crate) const fn arity(self) -> usize {
        match self {
            Self::Len | Self::Lower | Self::Upper => 1,
            Self::Has | Self::Contains => 2,
        }
    }
}

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A path into the document; empty means the whole document.
    Path(Vec<Segment>),
    /// A constant.
    Literal(Value),
    /// A unary operation.
    Unary(UnaryOp, Box<Expr>),
    /// A binary operation.
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// A built-in function call.
    Call(Function, Vec<Expr>),
}
