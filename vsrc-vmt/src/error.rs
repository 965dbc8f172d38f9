//! Material script error types

/// Syntax errors in a KeyValues document
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmtError {
    #[error("Document is empty")]
    Empty,

    #[error("Unexpected end of input on line {line}, expected {expected}")]
    UnexpectedEof { line: usize, expected: &'static str },

    #[error("Unexpected {found} on line {line}, expected {expected}")]
    UnexpectedToken {
        line: usize,
        found: String,
        expected: &'static str,
    },

    #[error("Patch material has no include")]
    PatchWithoutInclude,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            VmtError::UnexpectedEof {
                line: 4,
                expected: "'}'"
            }
            .to_string(),
            "Unexpected end of input on line 4, expected '}'"
        );
    }
}
