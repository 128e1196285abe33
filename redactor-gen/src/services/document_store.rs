//! Document store contract and persistence errors

use async_trait::async_trait;
use thiserror::Error;

use crate::models::DocumentRef;

/// Failures while authorizing against or writing to the document store
///
/// Kept apart from generation errors: content can be generated and still
/// fail to be saved.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Document store is not connected")]
    NotConnected,

    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Document store rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Document store error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl From<redactor_common::Error> for PersistenceError {
    fn from(err: redactor_common::Error) -> Self {
        PersistenceError::Storage(err.to_string())
    }
}

/// Folder lookup and document creation, authorized by an access token
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Id of the folder called `name`, creating it when absent
    async fn find_or_create_folder(
        &self,
        access_token: &str,
        name: &str,
    ) -> Result<String, PersistenceError>;

    /// Create a document from HTML inside `parent_id`
    async fn create_document(
        &self,
        access_token: &str,
        title: &str,
        html: &str,
        parent_id: &str,
    ) -> Result<DocumentRef, PersistenceError>;
}
