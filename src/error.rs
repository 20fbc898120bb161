#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NaturwbError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("The input polygon does not overlap any reference data")]
    EmptyIntersection,

    #[error("Consistency check failed: {0}")]
    Consistency(String),

    #[error("Group {group} has a total area of zero and can not be normalized")]
    ZeroAreaGroup { group: String },

    #[error("Duplicate key {key} in table {table}")]
    DuplicateKey { table: &'static str, key: String },

    #[error("Reference store query failed: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NaturwbError {
    /// Fatal errors signal an engine defect rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NaturwbError::Consistency(_)
                | NaturwbError::ZeroAreaGroup { .. }
                | NaturwbError::DuplicateKey { .. }
        )
    }
}

pub type Result<T, E = NaturwbError> = std::result::Result<T, E>;

#[cfg(feature = "python")]
impl From<NaturwbError> for PyErr {
    fn from(err: NaturwbError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for NaturwbError {
    fn from(err: PyErr) -> Self {
        NaturwbError::Store(err.to_string())
    }
}
