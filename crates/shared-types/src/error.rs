//! Parse errors of the wire vocabularies.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharedTypeError {
    #[error("'{value}' is not a valid {field}")]
    UnknownValue { field: &'static str, value: String },
}
