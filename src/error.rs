use std::fmt::{self, Display};
use std::io;

/// Provides `SirError` and maps other errors to
/// convert to a `SirError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SirError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// Bad construction input: a probability outside `[0, 1]`, an empty
    /// graph, more initial infections than people, ...
    ConfigurationError(String),
    /// A structural invariant of the contact graph was broken. Always fatal.
    InternalInvariantError(String),
    /// An operation was asked to do something impossible, such as sampling
    /// from an empty set or removing an edge that does not exist.
    InvalidOperationError(String),
}

impl From<io::Error> for SirError {
    fn from(error: io::Error) -> Self {
        SirError::IoError(error)
    }
}

impl From<serde_json::Error> for SirError {
    fn from(error: serde_json::Error) -> Self {
        SirError::JsonError(error)
    }
}

impl From<csv::Error> for SirError {
    fn from(error: csv::Error) -> Self {
        SirError::CSVError(error)
    }
}

impl std::error::Error for SirError {}

impl Display for SirError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SirError::IoError(e) => write!(f, "I/O error: {e}"),
            SirError::JsonError(e) => write!(f, "JSON error: {e}"),
            SirError::CSVError(e) => write!(f, "CSV error: {e}"),
            SirError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            SirError::InternalInvariantError(msg) => write!(f, "Internal invariant violated: {msg}"),
            SirError::InvalidOperationError(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}
