use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Award or activation against a program id with no definition.
    #[error("Unknown points program: {0}")]
    UnknownProgram(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_program_display() {
        let err = IndexerError::UnknownProgram("credit-claim".to_string());
        assert_eq!(err.to_string(), "Unknown points program: credit-claim");
    }
}
