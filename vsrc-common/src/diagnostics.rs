//! Non-fatal conversion warnings
//!
//! Content anomalies (a bad face, an unknown shader, a missing parameter)
//! are recovered locally and recorded here instead of failing the asset.

use serde::Serialize;

/// A recoverable anomaly recorded against one asset
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    #[error("Degenerate geometry on face {face}: {reason}")]
    DegenerateGeometry { face: u32, reason: String },

    #[error("Face {face} references {what} index {index} out of bounds")]
    InvalidReference {
        face: u32,
        what: &'static str,
        index: i64,
    },

    #[error("Displacement {disp} on face {face} skipped: {reason}")]
    InvalidDisplacement { face: u32, disp: u32, reason: String },

    #[error("Material '{0}' not found, using placeholder")]
    MissingMaterial(String),

    #[error("Unknown shader '{shader}' in material '{material}', falling back to opaque")]
    UnknownShader { material: String, shader: String },

    #[error("Parameter '{key}' has unexpected value '{value}' (expected {expected})")]
    UnexpectedParameter {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Skipped {what}: {reason}")]
    Skipped { what: String, reason: String },
}

/// Ordered list of warnings collected during one conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn skipped(&mut self, what: impl Into<String>, reason: impl Into<String>) {
        self.warn(Warning::Skipped {
            what: what.into(),
            reason: reason.into(),
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
