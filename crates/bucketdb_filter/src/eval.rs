//! Expression evaluation.

use crate::ast::{BinaryOp, Expr, Function, Segment, UnaryOp};
use crate::error::{EvalError, EvalResult};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// What `.` refers to during evaluation.
#[derive(Clone, Copy)]
pub(crate) enum Root<'a> {
    Value(&'a Value),
    Object(&'a Map<String, Value>),
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn eval(expr: &Expr, root: Root<'_>) -> EvalResult<Value> {
    match expr {
        Expr::Path(segments) => Ok(resolve(root, segments)),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Unary(op, operand) => unary(*op, eval(operand, root)?),
        Expr::Binary(BinaryOp::And, left, right) => {
            if expect_bool("&&", eval(left, root)?)? {
                Ok(Value::Bool(expect_bool("&&", eval(right, root)?)?))
            } else {
                Ok(Value::Bool(false))
            }
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if expect_bool("||", eval(left, root)?)? {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(expect_bool("||", eval(right, root)?)?))
            }
        }
        Expr::Binary(op, left, right) => binary(*op, eval(left, root)?, eval(right, root)?),
        Expr::Call(function, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, root))
                .collect::<EvalResult<Vec<_>>>()?;
            call(*function, args)
        }
    }
}

/// Follows a path; anything missing along the way is `null`.
fn resolve(root: Root<'_>, segments: &[Segment]) -> Value {
    let (mut current, rest): (&Value, &[Segment]) = match root {
        Root::Value(value) => (value, segments),
        Root::Object(map) => match segments.split_first() {
            None => return Value::Object(map.clone()),
            Some((Segment::Field(name), rest)) => match map.get(name) {
                Some(value) => (value, rest),
                None => return Value::Null,
            },
            Some((Segment::Index(_), _)) => return Value::Null,
        },
    };
    for segment in rest {
        let next = match (segment, current) {
            (Segment::Field(name), Value::Object(map)) => map.get(name),
            (Segment::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn expect_bool(op: &'static str, value: Value) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            op,
            left: kind(&other),
            right: "-",
        }),
    }
}

/// A number split into the two arithmetic domains.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(n: &Number) -> Self {
        match n.as_i64() {
            Some(i) => Num::Int(i),
            None => Num::Float(n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn into_value(self) -> EvalResult<Value> {
        match self {
            Num::Int(i) => Ok(Value::Number(i.into())),
            Num::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .ok_or(EvalError::NonFinite),
        }
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (Num::of(a), Num::of(b)) {
        (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
        // u64 beyond i64 lands here as a float; compare exactly when both are unsigned.
        _ => match (a.as_u64(), b.as_u64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Num::of(a).as_f64().partial_cmp(&Num::of(b).as_f64()),
        },
    }
}

/// Equality where numbers compare by value across integer and float.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loosely_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| loosely_equal(x, y)))
        }
        _ => a == b,
    }
}

fn unary(op: UnaryOp, value: Value) -> EvalResult<Value> {
    match (op, &value) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Number(n)) => match Num::of(n) {
            Num::Int(i) => match i.checked_neg() {
                Some(neg) => Num::Int(neg).into_value(),
                None => Num::Float(-(i as f64)).into_value(),
            },
            Num::Float(f) => Num::Float(-f).into_value(),
        },
        (UnaryOp::Not, _) => Err(EvalError::TypeMismatch {
            op: "!",
            left: kind(&value),
            right: "-",
        }),
        (UnaryOp::Neg, _) => Err(EvalError::TypeMismatch {
            op: "-",
            left: kind(&value),
            right: "-",
        }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    let mismatch = |left: &Value, right: &Value| EvalError::TypeMismatch {
        op: op.symbol(),
        left: kind(left),
        right: kind(right),
    };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!loosely_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
                (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
                _ => return Err(mismatch(&left, &right)),
            };
            let result = ordering.is_some_and(|ord| match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            });
            Ok(Value::Bool(result))
        }
        BinaryOp::Add => match (&left, &right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Number(a), Value::Number(b)) => {
                arithmetic(op, Num::of(a), Num::of(b))?.into_value()
            }
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => {
                arithmetic(op, Num::of(a), Num::of(b))?.into_value()
            }
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::And | BinaryOp::Or => {
            let both = expect_bool(op.symbol(), left)? && expect_bool(op.symbol(), right)?;
            Ok(Value::Bool(both))
        }
    }
}

fn arithmetic(op: BinaryOp, a: Num, b: Num) -> EvalResult<Num> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_rem(y).filter(|r| *r == 0).and_then(|_| x.checked_div(y))
            }
            BinaryOp::Rem => {
                if y == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                x.checked_rem(y)
            }
            _ => None,
        };
        if let Some(n) = exact {
            return Ok(Num::Int(n));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div | BinaryOp::Rem if y == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => return Err(EvalError::NonFinite),
    };
    Ok(Num::Float(result))
}

fn call(function: Function, mut args: Vec<Value>) -> EvalResult<Value> {
    let name = function.name();
    let one_arg_mismatch = |value: &Value| EvalError::TypeMismatch {
        op: name,
        left: kind(value),
        right: "-",
    };

    match function {
        Function::Len => {
            let len = match &args[0] {
                Value::Null => 0,
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => return Err(one_arg_mismatch(other)),
            };
            Ok(Value::Number((len as u64).into()))
        }
        Function::Lower | Function::Upper => match args.swap_remove(0) {
            Value::String(s) if function == Function::Lower => Ok(Value::String(s.to_lowercase())),
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            other => Err(one_arg_mismatch(&other)),
        },
        Function::Has => {
            let (container, key) = (&args[0], &args[1]);
            match (container, key) {
                (Value::Object(map), Value::String(k)) => Ok(Value::Bool(map.contains_key(k))),
                (Value::Array(items), Value::Number(n)) => Ok(Value::Bool(
                    n.as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .is_some_and(|i| i < items.len()),
                )),
                _ => Err(EvalError::TypeMismatch {
                    op: name,
                    left: kind(container),
                    right: kind(key),
                }),
            }
        }
        Function::Contains => {
            let (haystack, needle) = (&args[0], &args[1]);
            match (haystack, needle) {
                (Value::String(h), Value::String(n)) => Ok(Value::Bool(h.contains(n.as_str()))),
                (Value::Array(items), _) => Ok(Value::Bool(
                    items.iter().any(|item| loosely_equal(item, needle)),
                )),
                (Value::Object(map), Value::String(k)) => Ok(Value::Bool(map.contains_key(k))),
                _ => Err(EvalError::TypeMismatch {
                    op: name,
                    left: kind(haystack),
                    right: kind(needle),
                }),
            }
        }
    }
}
