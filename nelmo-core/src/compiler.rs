use tracing::debug;

use crate::ast::Expr;
use crate::context::Context;
use crate::error::CoreError;
use crate::eval::Environment;
use crate::parser::{Parsed, Parser};
use crate::value::Value;

/// Parses every top-level expression of `source`, skipping declarations.
pub fn parse_source(source: &str) -> Result<Vec<Expr>, CoreError> {
    parse_source_with(source, Context::new())
}

/// Like [`parse_source`], starting from a context that already declares
/// host types and values.
pub fn parse_source_with(source: &str, context: Context) -> Result<Vec<Expr>, CoreError> {
    let mut parser = Parser::with_context(source, context);
    let mut exprs = Vec::new();
    let mut declarations = 0usize;

    loop {
        match parser.parse_expression()? {
            Parsed::Expression(expr) => exprs.push(expr),
            Parsed::Declaration => declarations += 1,
            Parsed::EndOfInput => break,
        }
    }

    debug!(expressions = exprs.len(), declarations, "parsed source");
    Ok(exprs)
}

/// Compiles `source` to JavaScript, one statement per expression.
pub fn compile_source(source: &str) -> Result<String, CoreError> {
    let exprs = parse_source(source)?;
    Ok(compile_exprs(&exprs))
}

pub fn compile_exprs(exprs: &[Expr]) -> String {
    if exprs.is_empty() {
        return String::new();
    }

    let statements: Vec<String> = exprs.iter().map(Expr::compile).collect();
    let mut output = statements.join(";\n");
    output.push_str(";\n");
    output
}

/// Evaluates the first expression of `source` in a fresh environment.
pub fn evaluate_source(source: &str) -> Result<Value, CoreError> {
    evaluate_source_in(source, &mut Environment::new())
}

pub fn evaluate_source_in(source: &str, env: &mut Environment) -> Result<Value, CoreError> {
    let mut parser = Parser::new(source);
    loop {
        match parser.parse_expression()? {
            Parsed::Expression(expr) => return expr.evaluate(env),
            Parsed::Declaration => continue,
            Parsed::EndOfInput => {
                return Err(CoreError::runtime("source contains no expression"));
            }
        }
    }
}

/// Evaluates every expression of `source` in order and returns the value
/// of the last one.
pub fn evaluate_program(source: &str) -> Result<Value, CoreError> {
    evaluate_program_in(source, &mut Environment::new())
}

pub fn evaluate_program_in(source: &str, env: &mut Environment) -> Result<Value, CoreError> {
    let exprs = parse_source(source)?;
    evaluate_exprs(&exprs, env)
}

/// Evaluates already parsed expressions in order, returning the value of
/// the last one.
pub fn evaluate_exprs(exprs: &[Expr], env: &mut Environment) -> Result<Value, CoreError> {
    let mut last = None;
    for expr in exprs {
        last = Some(expr.evaluate(env)?);
    }
    debug!(statements = exprs.len(), "evaluated program");
    last.ok_or_else(|| CoreError::runtime("source contains no expression"))
}
