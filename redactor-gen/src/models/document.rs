//! Stored document reference

use serde::{Deserialize, Serialize};

/// A document created in the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub link: String,
}
