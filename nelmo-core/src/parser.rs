//! Layout-aware precedence-climbing parser.
//!
//! Binary operators live on two tiers: `+ -` on tier 0, every other
//! operator on tier 1. Juxtaposed terms (application) and `.` chains
//! bind tighter than both. `=` and `:` are handled once a whole tier-0
//! expression has been read.
//!
//! Nesting is bounded: every parenthesized group, nested body, operator
//! fold and member access counts one level towards `MAX_NESTING_DEPTH`,
//! so the trees handed to codegen and evaluation stay shallow.

use tracing::{debug, trace};

use crate::ast::{ComparisonOp, Expr, ExprKind, Literal, LogicalOp, NumericOp, argument_type};
use crate::context::Context;
use crate::error::CoreError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::types::Type;

/// Outcome of parsing one top-level expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Expression(Expr),
    /// A type alias or annotation; registered in the context, nothing to emit.
    Declaration,
    EndOfInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOperator {
    Numeric(NumericOp),
    Comparison(ComparisonOp),
    Logical(LogicalOp),
}

impl BinaryOperator {
    fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => BinaryOperator::Numeric(NumericOp::Add),
            "-" => BinaryOperator::Numeric(NumericOp::Subtract),
            "*" => BinaryOperator::Numeric(NumericOp::Multiply),
            "/" => BinaryOperator::Numeric(NumericOp::Divide),
            "//" => BinaryOperator::Numeric(NumericOp::IntegerDivide),
            "%" => BinaryOperator::Numeric(NumericOp::Modulo),
            "^" => BinaryOperator::Numeric(NumericOp::Power),
            "==" => BinaryOperator::Comparison(ComparisonOp::Equal),
            "/=" => BinaryOperator::Comparison(ComparisonOp::NotEqual),
            "<" => BinaryOperator::Comparison(ComparisonOp::Less),
            "<=" => BinaryOperator::Comparison(ComparisonOp::LessEqual),
            ">" => BinaryOperator::Comparison(ComparisonOp::Greater),
            ">=" => BinaryOperator::Comparison(ComparisonOp::GreaterEqual),
            "||" => BinaryOperator::Logical(LogicalOp::Or),
            "&&" => BinaryOperator::Logical(LogicalOp::And),
            _ => return None,
        };
        Some(op)
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Numeric(NumericOp::Add | NumericOp::Subtract) => 0,
            _ => 1,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Numeric(op) => op.symbol(),
            BinaryOperator::Comparison(op) => op.symbol(),
            BinaryOperator::Logical(op) => op.symbol(),
        }
    }

    fn build(self, left: Expr, right: Expr) -> Result<Expr, CoreError> {
        match self {
            BinaryOperator::Numeric(op) => Expr::numeric(left, op, right),
            BinaryOperator::Comparison(op) => Expr::comparison(left, op, right),
            BinaryOperator::Logical(op) => Ok(Expr::logical(left, op, right)),
        }
    }
}

/// Highest operator tier; anything above is application.
const MAX_PRECEDENCE: u8 = 1;

/// Deepest expression or type the parser builds.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    context: Context,
    depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self::with_context(source, Context::new())
    }

    /// Parses against a context that may already declare types and values.
    pub fn with_context(source: &'src str, context: Context) -> Self {
        Parser {
            lexer: Lexer::new(source),
            context,
            depth: 0,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn into_context(self) -> Context {
        self.context
    }

    /// Parses the next top-level expression, including the line end (or
    /// delimiter) that follows it.
    pub fn parse_expression(&mut self) -> Result<Parsed, CoreError> {
        loop {
            self.lexer.skip_whitespaces(true);

            if let Some(parsed) = self.parse_unterminated()? {
                self.expect_terminator()?;
                return Ok(parsed);
            }

            match self.lexer.next_token()? {
                None => return Ok(Parsed::EndOfInput),
                Some(token) if token.kind == TokenKind::EndOfExpression => continue,
                Some(token) => return Err(unexpected(&token)),
            }
        }
    }

    // `None` when no expression starts at the current token; that token is
    // left in the stream.
    fn parse_unterminated(&mut self) -> Result<Option<Parsed>, CoreError> {
        if self.try_parse_token(TokenKind::Name, "type")? {
            self.parse_type_alias()?;
            return Ok(Some(Parsed::Declaration));
        }

        if self.try_parse_token(TokenKind::Symbol, "\\")? {
            return self.parse_anonymous_function().map(|expr| Some(Parsed::Expression(expr)));
        }

        let Some(expr) = self.parse_binary(0)? else {
            return Ok(None);
        };

        if self.try_parse_token(TokenKind::Symbol, ":")? {
            self.parse_annotation(&expr)?;
            return Ok(Some(Parsed::Declaration));
        }

        if self.try_parse_token(TokenKind::Symbol, "=")? {
            return self.parse_definition(expr).map(|expr| Some(Parsed::Expression(expr)));
        }

        Ok(Some(Parsed::Expression(expr)))
    }

    /// An expression nested in a larger construct: a parenthesized group,
    /// a definition's value or a function body.
    fn parse_inner_expression(&mut self) -> Result<Expr, CoreError> {
        self.nested(Self::parse_nested_expression)
    }

    fn parse_nested_expression(&mut self) -> Result<Expr, CoreError> {
        match self.parse_unterminated()? {
            Some(Parsed::Expression(expr)) => Ok(expr),
            Some(_) => Err(CoreError::ParseError(
                "a declaration cannot appear inside an expression".to_string(),
            )),
            None => {
                let found = self.lexer.next_token()?;
                Err(match found {
                    Some(token) if token.kind != TokenKind::EndOfExpression => {
                        CoreError::ParseError(format!("Expected an expression, found '{}'", token.value))
                    }
                    _ => CoreError::ParseError("Expected an expression".to_string()),
                })
            }
        }
    }

    /// Runs `parse` one nesting level deeper.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn descend(&mut self) -> Result<(), CoreError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(CoreError::ParseError(
                "expression nested too deeply".to_string(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn expect_terminator(&mut self) -> Result<(), CoreError> {
        match self.lexer.next_token()? {
            None => Ok(()),
            Some(token) if token.kind == TokenKind::EndOfExpression => Ok(()),
            Some(token) if token.kind == TokenKind::Delimiter => {
                self.lexer.push_token(token);
                Ok(())
            }
            Some(token) => Err(unexpected(&token)),
        }
    }

    fn parse_type_alias(&mut self) -> Result<(), CoreError> {
        let name = self.parse_name()?;
        self.expect_token(TokenKind::Symbol, "=")?;
        let ty = self.parse_type()?;
        debug!(%name, %ty, "type alias declared");
        self.context.set_type(name, ty);
        Ok(())
    }

    fn parse_annotation(&mut self, target: &Expr) -> Result<(), CoreError> {
        let ExprKind::Name(name) = target.kind() else {
            return Err(CoreError::ParseError(
                "a type annotation needs a name on its left".to_string(),
            ));
        };
        let ty = self.parse_type()?;
        debug!(%name, %ty, "value type declared");
        self.context.set_value(name.clone(), ty);
        Ok(())
    }

    fn parse_type(&mut self) -> Result<Type, CoreError> {
        self.nested(Self::parse_function_type)
    }

    fn parse_function_type(&mut self) -> Result<Type, CoreError> {
        let input = self.parse_type_atom()?;
        if self.try_parse_token(TokenKind::Symbol, "->")? {
            let output = self.parse_type()?;
            return Ok(Type::function(input, output));
        }
        Ok(input)
    }

    fn parse_type_atom(&mut self) -> Result<Type, CoreError> {
        match self.lexer.next_token()? {
            Some(token) if token.is(TokenKind::Delimiter, "(") => {
                let ty = self.parse_type()?;
                self.expect_token(TokenKind::Delimiter, ")")?;
                Ok(ty)
            }
            Some(token) if token.is(TokenKind::Name, "List") => {
                Ok(Type::list(self.nested(Self::parse_type_atom)?))
            }
            Some(token) if token.kind == TokenKind::Name => self.resolve_type(&token.value),
            Some(token) => Err(CoreError::ParseError(format!(
                "Expected a type, found '{}'",
                token.value
            ))),
            None => Err(CoreError::ParseError("Expected a type".to_string())),
        }
    }

    fn resolve_type(&self, name: &str) -> Result<Type, CoreError> {
        Type::from_string(name)
            .or_else(|| self.context.type_of(name).cloned())
            .ok_or_else(|| CoreError::TypeError(format!("Unknown type '{name}'")))
    }

    fn parse_anonymous_function(&mut self) -> Result<Expr, CoreError> {
        let mut params = Vec::new();
        while let Some(name) = self.try_parse_name()? {
            params.push(name);
        }
        self.expect_token(TokenKind::Symbol, "->")?;
        let body = self.parse_inner_expression()?;
        Ok(Expr::anonymous_function(params, body))
    }

    fn parse_definition(&mut self, target: Expr) -> Result<Expr, CoreError> {
        if let Some(names) = target.application_names() {
            return self.parse_named_function(names);
        }

        let ExprKind::Name(name) = target.kind() else {
            return Err(CoreError::ParseError(
                "invalid assignment target; expected a name".to_string(),
            ));
        };
        let name = name.clone();

        let declared = self.context.value(&name).cloned();
        let value = self.parse_inner_expression()?;
        let define = Expr::define(name.as_str(), value, declared.as_ref())?;

        if declared.is_none() {
            if let Some(ty) = define.ty() {
                trace!(%name, %ty, "inferred value type");
                self.context.set_value(name, ty.clone());
            }
        }

        Ok(define)
    }

    fn parse_named_function(&mut self, names: Vec<String>) -> Result<Expr, CoreError> {
        let mut names = names.into_iter();
        let Some(name) = names.next() else {
            return Err(CoreError::ParseError("missing function name".to_string()));
        };
        let params: Vec<String> = names.collect();
        let declared = self.context.value(&name).cloned();

        debug!(%name, params = params.len(), "entering function scope");
        self.context.enter_scope();
        let body = self
            .bind_parameters(&name, &params, declared.as_ref())
            .and_then(|()| self.parse_inner_expression());
        self.context.exit_scope();

        Ok(Expr::named_function(name, params, body?, declared))
    }

    fn bind_parameters(
        &mut self,
        name: &str,
        params: &[String],
        declared: Option<&Type>,
    ) -> Result<(), CoreError> {
        let Some(declared) = declared else {
            return Ok(());
        };

        let mut remaining = declared;
        for param in params {
            let Type::Function { input, output } = remaining else {
                return Err(CoreError::invalid_value(format_args!(
                    "'{name}' is declared as {declared}, which takes fewer than {} parameters",
                    params.len()
                )));
            };
            self.context.set_value(param.clone(), (**input).clone());
            remaining = output;
        }
        Ok(())
    }

    fn parse_binary(&mut self, level: u8) -> Result<Option<Expr>, CoreError> {
        if level > MAX_PRECEDENCE {
            return self.parse_sequence();
        }

        let Some(expr) = self.parse_binary(level + 1)? else {
            return Ok(None);
        };

        // Each fold deepens the left spine; the levels are released once
        // the chain ends.
        let depth = self.depth;
        let folded = self.fold_operators(level, expr);
        self.depth = depth;
        folded.map(Some)
    }

    fn fold_operators(&mut self, level: u8, mut expr: Expr) -> Result<Expr, CoreError> {
        while let Some(token) = self.lexer.next_token()? {
            let operator = match token.kind {
                TokenKind::Symbol => BinaryOperator::from_symbol(&token.value),
                _ => None,
            };
            let Some(operator) = operator.filter(|op| op.precedence() == level) else {
                self.lexer.push_token(token);
                break;
            };

            self.descend()?;
            let Some(right) = self.parse_binary(level + 1)? else {
                return Err(CoreError::ParseError(format!(
                    "Expected an operand after '{}'",
                    operator.symbol()
                )));
            };
            expr = operator.build(expr, right)?;
        }

        Ok(expr)
    }

    fn parse_sequence(&mut self) -> Result<Option<Expr>, CoreError> {
        let Some(first) = self.parse_term()? else {
            return Ok(None);
        };

        let mut terms = vec![first];
        while let Some(term) = self.parse_term()? {
            terms.push(term);
        }

        if terms.len() == 1 {
            return Ok(terms.pop());
        }

        // The head of a function definition (`f x y = ...`) is not checked
        // as an application.
        if self.next_is(TokenKind::Symbol, "=")? {
            let names: Option<Vec<String>> = terms
                .iter()
                .map(|term| match term.kind() {
                    ExprKind::Name(name) => Some(name.clone()),
                    _ => None,
                })
                .collect();
            if let Some(names) = names {
                let untyped = names.into_iter().map(|name| Expr::name(name, None)).collect();
                return Expr::apply(untyped, None).map(Some);
            }
        }

        let expected = argument_type(&terms[1..]);
        Expr::apply(terms, expected.as_ref()).map(Some)
    }

    fn parse_term(&mut self) -> Result<Option<Expr>, CoreError> {
        let Some(expr) = self.parse_simple_term()? else {
            return Ok(None);
        };

        let depth = self.depth;
        let chained = self.parse_members(expr);
        self.depth = depth;
        chained.map(Some)
    }

    fn parse_members(&mut self, mut expr: Expr) -> Result<Expr, CoreError> {
        while self.try_parse_token(TokenKind::Symbol, ".")? {
            self.descend()?;
            let Some(member) = self.parse_simple_term()? else {
                return Err(CoreError::ParseError("Expected a member after '.'".to_string()));
            };
            expr = Expr::dot(expr, member);
        }
        Ok(expr)
    }

    fn parse_simple_term(&mut self) -> Result<Option<Expr>, CoreError> {
        let Some(token) = self.lexer.next_token()? else {
            return Ok(None);
        };

        let expr = match token.kind {
            TokenKind::Delimiter if token.value == "(" => {
                let expr = self.parse_inner_expression()?;
                self.expect_token(TokenKind::Delimiter, ")")?;
                expr
            }
            TokenKind::Integer => {
                let value = token.value.parse::<i64>().map_err(|_| {
                    CoreError::ParseError(format!("integer literal '{}' is out of range", token.value))
                })?;
                Expr::constant(Literal::Int(value))
            }
            TokenKind::Float => {
                let value = token.value.parse::<f64>().map_err(|_| {
                    CoreError::ParseError(format!("invalid float literal '{}'", token.value))
                })?;
                Expr::constant(Literal::Float(value))
            }
            TokenKind::String => Expr::constant(Literal::String(token.value)),
            TokenKind::Name => match token.value.as_str() {
                "True" => Expr::constant(Literal::Bool(true)),
                "False" => Expr::constant(Literal::Bool(false)),
                name => Expr::name(name, self.context.value(name).cloned()),
            },
            _ => {
                self.lexer.push_token(token);
                return Ok(None);
            }
        };

        Ok(Some(expr))
    }

    fn parse_name(&mut self) -> Result<String, CoreError> {
        match self.try_parse_name()? {
            Some(name) => Ok(name),
            None => Err(CoreError::ParseError("Expected a name".to_string())),
        }
    }

    fn try_parse_name(&mut self) -> Result<Option<String>, CoreError> {
        match self.lexer.next_token()? {
            Some(token) if token.kind == TokenKind::Name => Ok(Some(token.value)),
            Some(token) => {
                self.lexer.push_token(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn expect_token(&mut self, kind: TokenKind, value: &str) -> Result<(), CoreError> {
        if self.try_parse_token(kind, value)? {
            Ok(())
        } else {
            Err(CoreError::ParseError(format!("Expected '{value}'")))
        }
    }

    fn try_parse_token(&mut self, kind: TokenKind, value: &str) -> Result<bool, CoreError> {
        match self.lexer.next_token()? {
            Some(token) if token.is(kind, value) => Ok(true),
            Some(token) => {
                self.lexer.push_token(token);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    fn next_is(&mut self, kind: TokenKind, value: &str) -> Result<bool, CoreError> {
        match self.lexer.next_token()? {
            Some(token) => {
                let matched = token.is(kind, value);
                self.lexer.push_token(token);
                Ok(matched)
            }
            None => Ok(false),
        }
    }
}

fn unexpected(token: &Token) -> CoreError {
    CoreError::ParseError(format!(
        "Unexpected '{}' at {}",
        token.value, token.span
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_type() -> Type {
        Type::function(Type::INT, Type::function(Type::INT, Type::INT))
    }

    fn compile_first(source: &str) -> Option<String> {
        match Parser::new(source).parse_expression().expect("parse") {
            Parsed::Expression(expr) => Some(expr.compile()),
            _ => None,
        }
    }

    fn expression(parser: &mut Parser<'_>) -> Expr {
        match parser.parse_expression().expect("parse") {
            Parsed::Expression(expr) => expr,
            other => panic!("expected an expression, got {other:?}"),
        }
    }

    fn with_add(source: &str) -> Parser<'_> {
        let mut context = Context::new();
        context.set_value("add", add_type());
        Parser::with_context(source, context)
    }

    #[test]
    fn empty_source_is_end_of_input() {
        assert_eq!(Parser::new("").parse_expression(), Ok(Parsed::EndOfInput));
        assert_eq!(Parser::new("\n\n  ").parse_expression(), Ok(Parsed::EndOfInput));
    }

    #[test]
    fn parses_literals() {
        assert_eq!(compile_first("42").as_deref(), Some("42"));
        assert_eq!(compile_first("(42)").as_deref(), Some("42"));
        assert_eq!(compile_first("3.14159").as_deref(), Some("3.14159"));
        assert_eq!(compile_first("\"foo\"").as_deref(), Some("\"foo\""));
        assert_eq!(compile_first("True").as_deref(), Some("true"));
        assert_eq!(compile_first("False").as_deref(), Some("false"));
    }

    #[test]
    fn parses_two_lines_as_two_expressions() {
        let mut parser = Parser::new("42\n3");
        assert_eq!(expression(&mut parser).compile(), "42");
        assert_eq!(expression(&mut parser).compile(), "3");
        assert_eq!(parser.parse_expression(), Ok(Parsed::EndOfInput));
    }

    #[test]
    fn parses_typed_application() {
        let mut parser = with_add("add 1 2");
        let expr = expression(&mut parser);
        assert_eq!(expr.compile(), "add(1, 2)");
        assert_eq!(expr.ty(), Some(&Type::INT));
        assert_eq!(parser.parse_expression(), Ok(Parsed::EndOfInput));
    }

    #[test]
    fn rejects_unaccepted_argument() {
        let err = with_add("add 1 \"foo\"").parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::TypeError(message) if message.starts_with("Invalid value")));
    }

    #[test]
    fn continuation_line_extends_application() {
        let mut parser = with_add("add 1\n 2");
        assert_eq!(expression(&mut parser).compile(), "add(1, 2)");
        assert_eq!(parser.parse_expression(), Ok(Parsed::EndOfInput));
    }

    #[test]
    fn parses_dot_chains() {
        assert_eq!(compile_first("foo.bar").as_deref(), Some("foo.bar"));
        assert_eq!(compile_first("numbers.42").as_deref(), Some("numbers[42]"));
        assert_eq!(compile_first("numbers.\"foo\"").as_deref(), Some("numbers[\"foo\"]"));
        assert_eq!(compile_first("numbers.(41 + 1)").as_deref(), Some("numbers[41 + 1]"));
    }

    #[test]
    fn parses_binary_operators() {
        let cases = [
            ("41 + 1", "41 + 1"),
            ("43 - 1", "43 - 1"),
            ("21 * 2", "21 * 2"),
            ("84 / 2", "84 / 2"),
            ("83 % 5", "83 % 5"),
            ("3 ^ 2", "Math.pow(3, 2)"),
            ("3 == 2", "3 === 2"),
            ("\"foo\" /= \"bar\"", "\"foo\" !== \"bar\""),
            ("3 < 2", "3 < 2"),
            ("\"foo\" <= \"bar\"", "\"foo\" <= \"bar\""),
            ("3 > 2", "3 > 2"),
            ("\"foo\" >= \"bar\"", "\"foo\" >= \"bar\""),
            ("False || True", "false || true"),
            ("False && True", "false && true"),
        ];
        for (source, expected) in cases {
            assert_eq!(compile_first(source).as_deref(), Some(expected), "{source}");
        }
    }

    #[test]
    fn folds_left_and_respects_tiers() {
        assert_eq!(compile_first("1 + 2 + 3").as_deref(), Some("(1 + 2) + 3"));
        assert_eq!(compile_first("1 + 2 * 3").as_deref(), Some("1 + (2 * 3)"));
        assert_eq!(compile_first("2 * 3 + 1").as_deref(), Some("(2 * 3) + 1"));
        assert_eq!(compile_first("(1 + 2) * 3").as_deref(), Some("(1 + 2) * 3"));
    }

    #[test]
    fn equality_binds_with_multiplicative_tier() {
        assert_eq!(compile_first("1 + 2 == 3").as_deref(), Some("1 + (2 === 3)"));
        assert_eq!(compile_first("1 == 2 + 3").as_deref(), Some("(1 === 2) + 3"));

        assert_eq!(
            compile_first("\"a\" == \"b\" || False").as_deref(),
            Some("(\"a\" === \"b\") || false")
        );
    }

    #[test]
    fn rejects_string_operand_of_arithmetic() {
        let err = Parser::new("\"foo\" + 1").parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::TypeError(_)));
    }

    #[test]
    fn parses_define() {
        assert_eq!(compile_first("answer = 42").as_deref(), Some("var answer = 42"));
    }

    #[test]
    fn define_records_inferred_type() {
        let mut parser = Parser::new("answer = 42\nanswer + 1");
        expression(&mut parser);
        assert_eq!(parser.context().value("answer"), Some(&Type::INT));
        assert_eq!(expression(&mut parser).compile(), "answer + 1");
    }

    #[test]
    fn rejects_non_name_assignment_target() {
        let err = Parser::new("1 + 2 = 3").parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::ParseError(_)));
    }

    #[test]
    fn registers_type_aliases() {
        let mut parser = Parser::new("type Id = Int\ntype Decoder = Int -> String");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        let context = parser.into_context();
        assert_eq!(context.type_of("Id"), Some(&Type::INT));
        assert_eq!(
            context.type_of("Decoder"),
            Some(&Type::function(Type::INT, Type::STRING))
        );
    }

    #[test]
    fn parses_structured_types() {
        let mut parser = Parser::new(
            "type Id = Int\nids : List Id\napply : (Int -> Int) -> Int -> Int",
        );
        for _ in 0..3 {
            assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        }
        assert_eq!(parser.context().value("ids"), Some(&Type::list(Type::INT)));
        assert_eq!(
            parser.context().value("apply"),
            Some(&Type::function(
                Type::function(Type::INT, Type::INT),
                Type::function(Type::INT, Type::INT)
            ))
        );
    }

    #[test]
    fn unknown_type_name_is_a_type_error() {
        let err = Parser::new("x : Widget").parse_expression().unwrap_err();
        assert_eq!(err, CoreError::TypeError("Unknown type 'Widget'".to_string()));
    }

    #[test]
    fn annotation_then_define() {
        let mut parser = Parser::new("answer : Int\nanswer = 42");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        assert_eq!(parser.context().value("answer"), Some(&Type::INT));
        assert_eq!(expression(&mut parser).compile(), "var answer = 42");
    }

    #[test]
    fn annotation_is_checked_by_define() {
        let mut parser = Parser::new("answer : Int\nanswer = \"foo\"");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        let err = parser.parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::TypeError(message) if message.starts_with("Invalid value")));
    }

    #[test]
    fn parses_anonymous_functions() {
        assert_eq!(
            compile_first("\\n -> add n 1").as_deref(),
            Some("(function (n) { return add(n, 1); })")
        );

        let mut context = Context::new();
        context.set_value("n", Type::INT);
        let mut parser = Parser::with_context("\\n -> n + 1", context);
        assert_eq!(expression(&mut parser).compile(), "(function (n) { return n + 1; })");
    }

    #[test]
    fn anonymous_function_needs_arrow() {
        let err = Parser::new("\\n n + 1").parse_expression().unwrap_err();
        assert_eq!(err, CoreError::ParseError("Expected '->'".to_string()));
    }

    #[test]
    fn parses_named_function_sugar() {
        let mut parser = Parser::new("incr: Int -> Int\nincr n = n + 1");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        let expr = expression(&mut parser);
        assert_eq!(expr.compile(), "function incr(n) { return n + 1; }");
        assert_eq!(expr.ty(), Some(&Type::function(Type::INT, Type::INT)));

        // the parameter binding does not leak out of the body
        assert_eq!(parser.context().value("n"), None);
        assert_eq!(parser.context().depth(), 1);
    }

    #[test]
    fn named_function_with_untyped_parameters() {
        let mut parser = Parser::new("incr: Int -> Int\nincr n = add n 1");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        assert_eq!(
            expression(&mut parser).compile(),
            "function incr(n) { return add(n, 1); }"
        );
    }

    #[test]
    fn named_function_head_ignores_outer_value_types() {
        let mut parser = Parser::new("n = \"s\"\nincr : Int -> Int\nincr n = n + 1");
        expression(&mut parser);
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        assert_eq!(
            expression(&mut parser).compile(),
            "function incr(n) { return n + 1; }"
        );
    }

    #[test]
    fn named_function_with_too_many_parameters() {
        let mut parser = Parser::new("incr : Int -> Int\nincr a b = a");
        assert_eq!(parser.parse_expression(), Ok(Parsed::Declaration));
        let err = parser.parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::TypeError(_)));
        assert_eq!(parser.context().depth(), 1);
    }

    #[test]
    fn definition_may_be_followed_by_more_lines() {
        let mut parser = Parser::new("answer = 42\nanswer");
        assert_eq!(expression(&mut parser).compile(), "var answer = 42");
        assert_eq!(expression(&mut parser).compile(), "answer");
        assert_eq!(parser.parse_expression(), Ok(Parsed::EndOfInput));
    }

    #[test]
    fn unexpected_tokens_are_errors() {
        let err = Parser::new("1 + 2 ->").parse_expression().unwrap_err();
        assert_eq!(err, CoreError::ParseError("Unexpected '->' at 6..8".to_string()));

        let mut parser = Parser::new("42)");
        assert_eq!(expression(&mut parser).compile(), "42");
        assert_eq!(
            parser.parse_expression(),
            Err(CoreError::ParseError("Unexpected ')' at 2..3".to_string()))
        );
    }

    #[test]
    fn structural_syntax_errors() {
        assert!(matches!(
            Parser::new("()").parse_expression(),
            Err(CoreError::ParseError(_))
        ));
        assert!(matches!(
            Parser::new("(1 + 2").parse_expression(),
            Err(CoreError::ParseError(message)) if message == "Expected ')'"
        ));
        assert!(matches!(
            Parser::new("1 +").parse_expression(),
            Err(CoreError::ParseError(_))
        ));
        assert!(matches!(
            Parser::new("foo.").parse_expression(),
            Err(CoreError::ParseError(_))
        ));
    }

    #[test]
    fn lexer_errors_propagate() {
        let err = Parser::new("\"foo").parse_expression().unwrap_err();
        assert!(matches!(err, CoreError::LexError { span, .. } if span.start == 0));
    }

    fn too_deep(result: Result<Parsed, CoreError>) -> bool {
        matches!(result, Err(CoreError::ParseError(message)) if message == "expression nested too deeply")
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let source = vec!["1"; 1000].join(" + ");
        assert!(too_deep(Parser::new(&source).parse_expression()));

        let source = vec!["1"; 40].join(" + ");
        let expected = format!("{}1 + 1){}", "(".repeat(38), " + 1)".repeat(37) + " + 1");
        assert_eq!(compile_first(&source), Some(expected));
    }

    #[test]
    fn deep_parentheses_are_bounded() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(too_deep(Parser::new(&source).parse_expression()));

        let source = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(compile_first(&source).as_deref(), Some("1"));
    }

    #[test]
    fn deep_types_and_member_chains_are_bounded() {
        let arrows = vec!["Int"; 200].join(" -> ");
        assert!(too_deep(Parser::new(&format!("f : {arrows}")).parse_expression()));

        let members = vec!["a"; 200].join(".");
        assert!(too_deep(Parser::new(&members).parse_expression()));
    }

    #[test]
    fn parser_recovers_after_nesting_error() {
        let source = format!("{}1{}\n42", "(".repeat(200), ")".repeat(200));
        let mut parser = Parser::new(&source);
        assert!(too_deep(parser.parse_expression()));
        assert_eq!(parser.depth, 0);
    }
}
