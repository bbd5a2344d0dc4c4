//! Typed expression tree.
//!
//! Nodes are built bottom-up by the parser and never change afterwards.
//! Each node carries its static type, computed once by the constructor;
//! `None` stands for a type the checker does not know (undeclared names,
//! member access, comparisons, logical operators). Constructors that
//! validate operand types fail immediately with a `CoreError::TypeError`;
//! an operand of unknown type is let through.
//!
//! Code generation lives in `codegen_js`, evaluation in `eval`.

use std::rc::Rc;

use crate::error::CoreError;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::INT,
            Literal::Float(_) => Type::FLOAT,
            Literal::String(_) => Type::STRING,
            Literal::Bool(_) => Type::BOOL,
        }
    }
}

/// Arithmetic operators. `Equal` is the numeric flavour of `==`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
    Power,
    Equal,
}

impl NumericOp {
    pub fn symbol(self) -> &'static str {
        match self {
            NumericOp::Add => "+",
            NumericOp::Subtract => "-",
            NumericOp::Multiply => "*",
            NumericOp::Divide => "/",
            NumericOp::IntegerDivide => "//",
            NumericOp::Modulo => "%",
            NumericOp::Power => "^",
            NumericOp::Equal => "==",
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            NumericOp::IntegerDivide | NumericOp::Modulo => Type::INT,
            NumericOp::Divide => Type::FLOAT,
            NumericOp::Equal => Type::BOOL,
            _ => Type::NUMBER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "==",
            ComparisonOp::NotEqual => "/=",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    Or,
    And,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::Or => "||",
            LogicalOp::And => "&&",
        }
    }
}

/// Expression node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Constant(Literal),
    Name(String),
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Numeric {
        left: Box<Expr>,
        op: NumericOp,
        right: Box<Expr>,
    },
    Define {
        name: String,
        value: Box<Expr>,
    },
    /// `exprs[0]` applied to `exprs[1..]`.
    Apply {
        exprs: Vec<Expr>,
        /// Every term is a bare name (`f x y`), so the application can
        /// turn into a function definition when followed by `=`.
        all_names: bool,
    },
    Dot {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `\a b -> body`. The body is shared with the closures that
    /// evaluating the node creates.
    AnonymousFunction {
        params: Vec<String>,
        body: Rc<Expr>,
    },
    /// `f a b = body`; compile-only.
    NamedFunction {
        name: String,
        params: Vec<String>,
        body: Box<Expr>,
    },
}

/// Expression node: its kind plus its static type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    kind: ExprKind,
    ty: Option<Type>,
}

impl Expr {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    pub fn constant(literal: Literal) -> Expr {
        let ty = literal.ty();
        Expr {
            kind: ExprKind::Constant(literal),
            ty: Some(ty),
        }
    }

    pub fn name(name: impl Into<String>, ty: Option<Type>) -> Expr {
        Expr {
            kind: ExprKind::Name(name.into()),
            ty,
        }
    }

    pub fn comparison(left: Expr, op: ComparisonOp, right: Expr) -> Result<Expr, CoreError> {
        if !is_comparable(&left) || !is_comparable(&right) {
            return Err(CoreError::invalid_operation(format_args!(
                "'{}' needs comparable operands, found {} and {}",
                op.symbol(),
                describe(&left),
                describe(&right),
            )));
        }

        Ok(Expr {
            kind: ExprKind::Comparison {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            ty: None,
        })
    }

    pub fn logical(left: Expr, op: LogicalOp, right: Expr) -> Expr {
        Expr {
            kind: ExprKind::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            ty: None,
        }
    }

    pub fn numeric(left: Expr, op: NumericOp, right: Expr) -> Result<Expr, CoreError> {
        if !is_numeric(&left) || !is_numeric(&right) {
            return Err(CoreError::invalid_operation(format_args!(
                "'{}' needs numeric operands, found {} and {}",
                op.symbol(),
                describe(&left),
                describe(&right),
            )));
        }

        Ok(Expr {
            kind: ExprKind::Numeric {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            ty: Some(op.result_type()),
        })
    }

    /// Binds `name` to `value`, checking it against a declared type.
    pub fn define(
        name: impl Into<String>,
        value: Expr,
        expected: Option<&Type>,
    ) -> Result<Expr, CoreError> {
        let name = name.into();

        if let (Some(expected), Some(actual)) = (expected, value.ty()) {
            if !actual.equals(expected) {
                return Err(CoreError::invalid_value(format_args!(
                    "'{name}' is declared as {expected} but defined as {actual}"
                )));
            }
        }

        let ty = value.ty.clone().or_else(|| expected.cloned());
        Ok(Expr {
            kind: ExprKind::Define {
                name,
                value: Box::new(value),
            },
            ty,
        })
    }

    /// Applies `exprs[0]` to the remaining terms.
    ///
    /// `expected` is the chained type of the arguments (see
    /// [`argument_type`]); when given, the callee's type must accept it.
    pub fn apply(exprs: Vec<Expr>, expected: Option<&Type>) -> Result<Expr, CoreError> {
        let Some(callee) = exprs.first() else {
            return Err(CoreError::ParseError(
                "an application needs a function".to_string(),
            ));
        };

        let mut ty = callee.ty.clone();
        if let Some(callee_ty) = &ty {
            let rejected = match expected {
                Some(expected) => !callee_ty.accepts(expected),
                None => exprs.len() > 1 && !callee_ty.is_function(),
            };
            if rejected {
                return Err(CoreError::invalid_value(format_args!(
                    "cannot apply {} of type {callee_ty} to {}",
                    describe_term(callee),
                    expected.map_or_else(|| "its arguments".to_string(), ToString::to_string),
                )));
            }
        }

        for _ in 1..exprs.len() {
            ty = ty.as_ref().and_then(Type::output).cloned();
        }

        let all_names = exprs
            .iter()
            .all(|expr| matches!(expr.kind, ExprKind::Name(_)));

        Ok(Expr {
            kind: ExprKind::Apply { exprs, all_names },
            ty,
        })
    }

    pub fn dot(left: Expr, right: Expr) -> Expr {
        Expr {
            kind: ExprKind::Dot {
                left: Box::new(left),
                right: Box::new(right),
            },
            ty: None,
        }
    }

    /// Parameters carry no declared types, so the function's own type
    /// is unknown.
    pub fn anonymous_function(params: Vec<String>, body: Expr) -> Expr {
        Expr {
            kind: ExprKind::AnonymousFunction {
                params,
                body: Rc::new(body),
            },
            ty: None,
        }
    }

    pub fn named_function(
        name: impl Into<String>,
        params: Vec<String>,
        body: Expr,
        ty: Option<Type>,
    ) -> Expr {
        Expr {
            kind: ExprKind::NamedFunction {
                name: name.into(),
                params,
                body: Box::new(body),
            },
            ty,
        }
    }

    /// Names of an all-names application, head first.
    pub fn application_names(&self) -> Option<Vec<String>> {
        let ExprKind::Apply {
            exprs,
            all_names: true,
        } = &self.kind
        else {
            return None;
        };

        exprs
            .iter()
            .map(|expr| match &expr.kind {
                ExprKind::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Chains the types of call arguments into the shape `Type::accepts`
/// expects: one argument gives its own type, several give
/// `a1 -> a2 -> ... -> an`. `None` when any argument type is unknown.
pub fn argument_type(args: &[Expr]) -> Option<Type> {
    let (last, init) = args.split_last()?;
    let mut chained = last.ty.clone()?;
    for arg in init.iter().rev() {
        chained = Type::function(arg.ty.clone()?, chained);
    }
    Some(chained)
}

fn is_numeric(expr: &Expr) -> bool {
    expr.ty.as_ref().is_none_or(Type::is_numeric)
}

fn is_comparable(expr: &Expr) -> bool {
    expr.ty.as_ref().is_none_or(Type::is_comparable)
}

fn describe(expr: &Expr) -> String {
    match &expr.ty {
        Some(ty) => ty.to_string(),
        None => "an untyped value".to_string(),
    }
}

fn describe_term(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Name(name) => format!("'{name}'"),
        _ => "expression".to_string(),
    }
}
