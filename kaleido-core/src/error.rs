use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("malformed numeric literal '{text}'")]
    MalformedNumber { text: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown token when expecting an expression")]
    ExpectedExpression,
    #[error("expected ')'")]
    ExpectedClosingParen,
    #[error("expected ')' or ',' in argument list")]
    ExpectedArgumentSeparator,
    #[error("expected function name in prototype")]
    ExpectedFunctionName,
    #[error("expected '(' in prototype")]
    ExpectedParamListOpen,
    #[error("expected ')' in prototype")]
    ExpectedParamListClose,
    #[error("unexpected trailing input")]
    TrailingInput,
    #[error("expression nested more than {0} levels deep")]
    NestingTooDeep(usize),
    #[error(transparent)]
    Lex(#[from] LexError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerError {
    #[error("unknown variable name '{0}'")]
    UnknownVariable(String),
    #[error("unknown function referenced '{0}'")]
    UnknownFunction(String),
    #[error("incorrect number of arguments passed to '{callee}': expected {expected}, found {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid binary operator '{0}'")]
    InvalidOperator(char),
    #[error("function '{0}' cannot be redefined")]
    Redefinition(String),
    #[error("function '{name}' was declared with {expected} parameter(s), not {found}")]
    SignatureMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("generated IR for '{name}' failed verification: {reason}")]
    Verification { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("lowering error: {0}")]
    Lower(#[from] LowerError),
}
