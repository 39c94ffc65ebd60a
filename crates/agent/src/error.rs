//! Error types for window assembly.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("No tokenizer known for model '{0}'")]
    UnknownModel(String),

    #[error("Tokenizer unavailable: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown model '{name}' (known: {known})")]
    UnknownModel { name: String, known: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// System, context, and user turns alone exceed the budget.
    #[error("Prompt needs {tokens} tokens but {model} accepts at most {budget}")]
    IrreducibleOverBudget {
        model: String,
        tokens: usize,
        budget: usize,
    },

    #[error(transparent)]
    Token(#[from] TokenError),
}
