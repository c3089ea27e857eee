//! Projection configuration
//!
//! Typed options for the projection and un-projection dispatchers, loadable
//! from a YAML document.
//!
//! # Example tessera.yaml
//!
//! ```yaml
//! # Copy non-contiguous host arrays into a row-major buffer instead of failing
//! copy_non_contiguous: true
//!
//! # Reject tensors whose shape disagrees with the declared dims
//! check_shapes: true
//!
//! # Check map outputs against the declared key/value element types
//! validate_map_outputs: true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::TesseraResult;

/// Options shared by projection, un-projection and the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Copy non-contiguous host arrays into an owned row-major buffer.
    /// When false such arrays are rejected instead.
    pub copy_non_contiguous: bool,

    /// Validate tensor shapes against declared dims
    pub check_shapes: bool,

    /// Validate map outputs against declared key/value element types
    pub validate_map_outputs: bool,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            copy_non_contiguous: true,
            check_shapes: true,
            validate_map_outputs: true,
        }
    }
}

impl ProjectionConfig {
    /// Strict configuration: never copy, validate everything
    pub fn strict() -> Self {
        Self {
            copy_non_contiguous: false,
            ..Self::default()
        }
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> TesseraResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let content = std::fs::read_to_string(path)?;
        log::debug!("loading projection config from {:?}", path);
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProjectionConfig::default();
        assert!(config.copy_non_contiguous);
        assert!(config.check_shapes);
        assert!(config.validate_map_outputs);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ProjectionConfig::from_yaml("check_shapes: false\n").unwrap();
        assert!(!config.check_shapes);
        assert!(config.copy_non_contiguous);
        assert!(config.validate_map_outputs);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ProjectionConfig::from_yaml("check_shapes: [1, 2").unwrap_err();
        assert!(matches!(err, crate::error::TesseraError::Config(_)));
    }

    #[test]
    fn test_strict() {
        let config = ProjectionConfig::strict();
        assert!(!config.copy_non_contiguous);
        assert!(config.check_shapes);
    }
}
