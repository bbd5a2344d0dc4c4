use thiserror::Error;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("lex error at {span}: {message}")]
    LexError { span: Span, message: String },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("type error: {0}")]
    TypeError(String),
    #[error("runtime error: {0}")]
    RuntimeError(String),
}

impl CoreError {
    pub(crate) fn invalid_operation(detail: impl core::fmt::Display) -> Self {
        CoreError::TypeError(format!("Invalid operation: {detail}"))
    }

    pub(crate) fn invalid_value(detail: impl core::fmt::Display) -> Self {
        CoreError::TypeError(format!("Invalid value: {detail}"))
    }

    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        CoreError::RuntimeError(message.into())
    }
}
