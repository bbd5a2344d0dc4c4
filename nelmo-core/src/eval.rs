//! Tree-walking evaluator.
//!
//! Mirrors the semantics of the generated JavaScript closely enough to
//! run programs without a host engine: logical operators return the
//! deciding operand, `/` always divides in floating point and member
//! access indexes records by key and strings by position.

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{ComparisonOp, Expr, ExprKind, Literal, LogicalOp, NumericOp};
use crate::error::CoreError;
use crate::value::{Closure, Value};

/// Deepest chain of nested evaluations, calls included.
pub const MAX_EVALUATION_DEPTH: usize = 128;

/// Runtime bindings. Defines add to it; calls run in a copy extended
/// with the parameters.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    names: HashMap<String, Value>,
    depth: usize,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.names.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names.get(name)
    }
}

impl Expr {
    pub fn evaluate(&self, env: &mut Environment) -> Result<Value, CoreError> {
        if env.depth >= MAX_EVALUATION_DEPTH {
            return Err(CoreError::runtime("evaluation nested too deeply"));
        }
        env.depth += 1;
        let result = self.evaluate_kind(env);
        env.depth -= 1;
        result
    }

    fn evaluate_kind(&self, env: &mut Environment) -> Result<Value, CoreError> {
        match self.kind() {
            ExprKind::Constant(literal) => Ok(Value::from(literal)),
            ExprKind::Name(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| CoreError::runtime(format!("'{name}' is not defined"))),
            ExprKind::Comparison { left, op, right } => {
                let left = left.evaluate(env)?;
                let right = right.evaluate(env)?;
                compare(*op, &left, &right).map(Value::Bool)
            }
            ExprKind::Logical { left, op, right } => {
                let left = left.evaluate(env)?;
                let decided = match op {
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::And => !left.is_truthy(),
                };
                if decided { Ok(left) } else { right.evaluate(env) }
            }
            ExprKind::Numeric { left, op, right } => {
                let left = left.evaluate(env)?;
                let right = right.evaluate(env)?;
                arithmetic(*op, &left, &right)
            }
            ExprKind::Define { name, value } => {
                let value = value.evaluate(env)?;
                env.define(name.clone(), value.clone());
                Ok(value)
            }
            ExprKind::Apply { exprs, .. } => {
                let Some((callee, args)) = exprs.split_first() else {
                    return Err(CoreError::runtime("empty application"));
                };
                let callee = callee.evaluate(env)?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(env))
                    .collect::<Result<Vec<_>, _>>()?;
                call(&callee, args, env)
            }
            ExprKind::Dot { left, right } => {
                let target = left.evaluate(env)?;
                let key = member_key(right, env)?;
                member(&target, key)
            }
            ExprKind::AnonymousFunction { params, body } => Ok(Value::Function(Rc::new(Closure {
                params: params.clone(),
                body: Rc::clone(body),
                bound: Vec::new(),
            }))),
            ExprKind::NamedFunction { name, .. } => Err(CoreError::runtime(format!(
                "function declaration '{name}' can only be compiled"
            ))),
        }
    }
}

/// Calls a function value.
///
/// Fewer arguments than parameters yield a partially applied closure;
/// surplus arguments are passed on to the result.
pub fn call(callee: &Value, mut args: Vec<Value>, env: &Environment) -> Result<Value, CoreError> {
    match callee {
        Value::Function(closure) => {
            let missing = closure.params.len() - closure.bound.len();
            let mut bound = closure.bound.clone();

            if args.len() < missing {
                bound.extend(args);
                return Ok(Value::Function(Rc::new(Closure {
                    params: closure.params.clone(),
                    body: Rc::clone(&closure.body),
                    bound,
                })));
            }

            let rest = args.split_off(missing);
            bound.extend(args);

            let mut scope = env.clone();
            for (param, value) in closure.params.iter().zip(bound) {
                scope.define(param.clone(), value);
            }
            let result = closure.body.evaluate(&mut scope)?;

            if rest.is_empty() {
                Ok(result)
            } else {
                call(&result, rest, env)
            }
        }
        Value::Native(native) => native.call(&args),
        other => Err(CoreError::runtime(format!(
            "{} is not a function",
            other.type_name()
        ))),
    }
}

enum Key {
    Field(String),
    Index(i64),
}

// Names and literals on the right of `.` are keys, not lookups.
fn member_key(right: &Expr, env: &mut Environment) -> Result<Key, CoreError> {
    match right.kind() {
        ExprKind::Name(name) => Ok(Key::Field(name.clone())),
        ExprKind::Constant(Literal::String(key)) => Ok(Key::Field(key.clone())),
        ExprKind::Constant(Literal::Int(index)) => Ok(Key::Index(*index)),
        _ => match right.evaluate(env)? {
            Value::String(key) => Ok(Key::Field(key)),
            Value::Int(index) => Ok(Key::Index(index)),
            other => Err(CoreError::runtime(format!(
                "cannot use {} as a member key",
                other.type_name()
            ))),
        },
    }
}

fn member(target: &Value, key: Key) -> Result<Value, CoreError> {
    match (target, key) {
        (Value::Record(members), Key::Field(field)) => members
            .get(&field)
            .cloned()
            .ok_or_else(|| CoreError::runtime(format!("no member '{field}'"))),
        (Value::Record(members), Key::Index(index)) => members
            .get(&index.to_string())
            .cloned()
            .ok_or_else(|| CoreError::runtime(format!("no member '{index}'"))),
        (Value::String(text), Key::Index(index)) => usize::try_from(index)
            .ok()
            .and_then(|index| text.chars().nth(index))
            .map(|ch| Value::String(ch.to_string()))
            .ok_or_else(|| CoreError::runtime(format!("index {index} out of range"))),
        (Value::String(text), Key::Field(field)) if field == "length" => {
            Ok(Value::Int(text.chars().count() as i64))
        }
        (target, Key::Field(field)) => Err(CoreError::runtime(format!(
            "{} has no member '{field}'",
            target.type_name()
        ))),
        (target, Key::Index(index)) => Err(CoreError::runtime(format!(
            "cannot index {} with {index}",
            target.type_name()
        ))),
    }
}

fn compare(op: ComparisonOp, left: &Value, right: &Value) -> Result<bool, CoreError> {
    let ordering = match op {
        ComparisonOp::Equal => return Ok(left.loosely_equals(right)),
        ComparisonOp::NotEqual => return Ok(!left.loosely_equals(right)),
        _ => match (left, right) {
            (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
            (Value::Int(left), Value::Int(right)) => Some(left.cmp(right)),
            _ => match (number(left), number(right)) {
                (Some(left), Some(right)) => left.as_float().partial_cmp(&right.as_float()),
                _ => {
                    return Err(CoreError::runtime(format!(
                        "cannot compare {} with {}",
                        left.type_name(),
                        right.type_name()
                    )));
                }
            },
        },
    };

    // NaN compares false with everything.
    let Some(ordering) = ordering else {
        return Ok(false);
    };

    Ok(match op {
        ComparisonOp::Less => ordering.is_lt(),
        ComparisonOp::LessEqual => ordering.is_le(),
        ComparisonOp::Greater => ordering.is_gt(),
        ComparisonOp::GreaterEqual => ordering.is_ge(),
        ComparisonOp::Equal => ordering.is_eq(),
        ComparisonOp::NotEqual => ordering.is_ne(),
    })
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_float(self) -> f64 {
        match self {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Int(value) => Some(Number::Int(*value)),
        Value::Float(value) => Some(Number::Float(*value)),
        _ => None,
    }
}

fn arithmetic(op: NumericOp, left: &Value, right: &Value) -> Result<Value, CoreError> {
    let (Some(lhs), Some(rhs)) = (number(left), number(right)) else {
        return Err(CoreError::runtime(format!(
            "'{}' needs numbers, found {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };

    let overflow = || CoreError::runtime(format!("integer overflow in '{}'", op.symbol()));

    match (op, lhs, rhs) {
        (NumericOp::Equal, _, _) => Ok(Value::Bool(left.loosely_equals(right))),
        (NumericOp::Divide, _, _) => Ok(Value::Float(lhs.as_float() / rhs.as_float())),

        (NumericOp::IntegerDivide | NumericOp::Modulo, Number::Int(_), Number::Int(0)) => {
            Err(CoreError::runtime("division by zero"))
        }
        (NumericOp::IntegerDivide, Number::Int(a), Number::Int(b)) => {
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::Int(quotient - 1))
            } else {
                Ok(Value::Int(quotient))
            }
        }
        (NumericOp::IntegerDivide, _, _) => {
            let quotient = (lhs.as_float() / rhs.as_float()).floor();
            if quotient.is_finite() {
                Ok(Value::Int(quotient as i64))
            } else {
                Err(CoreError::runtime("division by zero"))
            }
        }
        (NumericOp::Modulo, Number::Int(a), Number::Int(b)) => {
            a.checked_rem(b).map(Value::Int).ok_or_else(overflow)
        }

        (NumericOp::Power, Number::Int(a), Number::Int(b)) if b >= 0 => u32::try_from(b)
            .ok()
            .and_then(|exponent| a.checked_pow(exponent))
            .map(Value::Int)
            .ok_or_else(overflow),
        (NumericOp::Power, _, _) => Ok(Value::Float(lhs.as_float().powf(rhs.as_float()))),

        (_, Number::Int(a), Number::Int(b)) => {
            let result = match op {
                NumericOp::Add => a.checked_add(b),
                NumericOp::Subtract => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        (_, _, _) => {
            let (a, b) = (lhs.as_float(), rhs.as_float());
            Ok(Value::Float(match op {
                NumericOp::Add => a + b,
                NumericOp::Subtract => a - b,
                NumericOp::Modulo => a % b,
                _ => a * b,
            }))
        }
    }
}
