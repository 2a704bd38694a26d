use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("FeeError - Parse: {message} at offset {offset}")]
    Parse { offset: usize, message: String },
    #[error("FeeError - UnknownVariable: {0}")]
    UnknownVariable(String),
    #[error("FeeError - UnknownFunction: {0}")]
    UnknownFunction(String),
    #[error("FeeError - WrongArity: {name} expects {expected} argument(s)")]
    WrongArity { name: String, expected: usize },
    #[error("FeeError - TypeMismatch: {0}")]
    TypeMismatch(String),
    #[error("FeeError - DivisionByZero")]
    DivisionByZero,
    #[error("FeeError - Overflow")]
    Overflow,
}
