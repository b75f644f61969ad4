//! Domain error types.

/// Top-level error type for quantfolio.
#[derive(Debug, thiserror::Error)]
pub enum QuantError {
    #[error("insufficient data for {context}: have {have}, need {need}")]
    InsufficientData {
        context: String,
        have: usize,
        need: usize,
    },

    #[error("infeasible constraints: {reason}")]
    Infeasible { reason: String },

    #[error("{solver} did not converge within {iterations} iterations")]
    NonConvergence { solver: String, iterations: u64 },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        QuantError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn infeasible(reason: impl Into<String>) -> Self {
        QuantError::Infeasible {
            reason: reason.into(),
        }
    }

    pub fn insufficient(context: impl Into<String>, have: usize, need: usize) -> Self {
        QuantError::InsufficientData {
            context: context.into(),
            have,
            need,
        }
    }
}

impl From<&QuantError> for std::process::ExitCode {
    fn from(err: &QuantError) -> Self {
        let code: u8 = match err {
            QuantError::Io(_) | QuantError::Data { .. } => 1,
            QuantError::ConfigParse { .. } | QuantError::ConfigInvalid { .. } => 2,
            QuantError::InvalidInput { .. } => 3,
            QuantError::InsufficientData { .. } => 4,
            QuantError::Infeasible { .. } => 5,
            QuantError::NonConvergence { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
