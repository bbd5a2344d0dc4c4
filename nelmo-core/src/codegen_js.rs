//! JavaScript backend.
//!
//! Every node renders to a JavaScript expression or statement. A
//! non-atomic operand is wrapped in parentheses when embedded in an
//! operator; constants, names and applications never are.

use core::fmt::Write;

use crate::ast::{ComparisonOp, Expr, ExprKind, Literal, NumericOp};

/// Leftmost name of a member chain that refers to the host namespace.
pub const NATIVE_NAMESPACE: &str = "Native";

impl Expr {
    /// Renders this node as JavaScript source.
    pub fn compile(&self) -> String {
        match self.kind() {
            ExprKind::Constant(literal) => compile_literal(literal),
            ExprKind::Name(name) => name.clone(),
            ExprKind::Comparison { left, op, right } => {
                let symbol = match op {
                    ComparisonOp::Equal => "===",
                    ComparisonOp::NotEqual => "!==",
                    other => other.symbol(),
                };
                infix(left, symbol, right)
            }
            ExprKind::Logical { left, op, right } => infix(left, op.symbol(), right),
            ExprKind::Numeric { left, op, right } => match op {
                NumericOp::Power => format!(
                    "Math.pow({}, {})",
                    compile_operand(left),
                    compile_operand(right)
                ),
                NumericOp::Equal => infix(left, "===", right),
                other => infix(left, other.symbol(), right),
            },
            ExprKind::Define { name, value } => format!("var {name} = {}", value.compile()),
            ExprKind::Apply { exprs, .. } => {
                let mut parts = exprs.iter().map(Expr::compile);
                let callee = parts.next().unwrap_or_default();
                let args: Vec<String> = parts.collect();
                format!("{callee}({})", args.join(", "))
            }
            ExprKind::Dot { left, right } => {
                let left_code = left.compile();
                if left_code == NATIVE_NAMESPACE {
                    return right.compile();
                }
                match right.kind() {
                    ExprKind::Name(name) => format!("{left_code}.{name}"),
                    _ => format!("{left_code}[{}]", right.compile()),
                }
            }
            ExprKind::AnonymousFunction { params, body } => format!(
                "(function ({}) {{ return {}; }})",
                params.join(", "),
                body.compile()
            ),
            ExprKind::NamedFunction { name, params, body } => format!(
                "function {name}({}) {{ return {}; }}",
                params.join(", "),
                body.compile()
            ),
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::Constant(_) | ExprKind::Name(_) | ExprKind::Apply { .. }
        )
    }
}

fn compile_operand(expr: &Expr) -> String {
    let code = expr.compile();
    if expr.is_atomic() {
        code
    } else {
        format!("({code})")
    }
}

fn infix(left: &Expr, symbol: &str, right: &Expr) -> String {
    format!("{} {symbol} {}", compile_operand(left), compile_operand(right))
}

fn compile_literal(literal: &Literal) -> String {
    match literal {
        Literal::Int(value) => value.to_string(),
        Literal::Float(value) => value.to_string(),
        Literal::String(value) => quote(value),
        Literal::Bool(value) => value.to_string(),
    }
}

/// Quotes a string the way `JSON.stringify` does.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            ch if (ch as u32) < 0x20 => {
                let _ = write!(quoted, "\\u{:04x}", ch as u32);
            }
            ch => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}
