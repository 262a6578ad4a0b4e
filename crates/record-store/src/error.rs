//! Record storage errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record not found: {table}/{id}")]
    RecordNotFound { table: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}
