//! Error types shared by every stage of the Sobel pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SobelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SobelError {
    /// A configuration field holds an unusable value.
    ///
    /// The filter keeps its previous configuration when this is returned.
    #[error("invalid {field} `{value}`; {expected}")]
    Configuration {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// Serialized options could not be read.
    #[error("failed to parse options: {0}")]
    Parse(String),

    /// Input raster or pixel buffer has an unusable layout.
    #[error("shape error: {0}")]
    Shape(String),

    /// The convolution or reduction backend failed.
    #[error("computation failure: {0}")]
    Computation(String),
}

impl SobelError {
    pub(crate) fn configuration<V, S>(field: &'static str, value: V, supported: S) -> Self
    where
        V: ToString,
        S: IntoIterator,
        S::Item: ToString,
    {
        let supported = supported
            .into_iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        SobelError::Configuration {
            field,
            value: value.to_string(),
            expected: format!("supported values are {{{supported}}}"),
        }
    }

    /// Configuration error for a value that fails a rule rather than a set lookup.
    pub(crate) fn invalid(field: &'static str, value: impl ToString, rule: &str) -> Self {
        SobelError::Configuration {
            field,
            value: value.to_string(),
            expected: rule.to_string(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, SobelError::Configuration { .. } | SobelError::Parse(_))
    }
}
