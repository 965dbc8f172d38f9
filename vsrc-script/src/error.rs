//! Script error types

use vsrc_vmt::VmtError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Syntax(#[from] VmtError),

    #[error("Document has no '{0}' block")]
    MissingBlock(&'static str),
}
