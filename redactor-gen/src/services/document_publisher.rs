//! Upload of finished articles
//!
//! Refreshes expired credentials, makes sure the target folder exists and
//! creates the document there. A refreshed token is written to the credential
//! store before the upload starts, so it survives a failed upload. When the
//! store was disconnected in the meantime the upload does not happen.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::credential_store::CredentialStore;
use super::document_store::{DocumentStore, PersistenceError};
use super::oauth_client::OAuthClient;
use crate::models::{Credentials, DocumentRef};

/// A stored article and, when a refresh happened, the credentials now in use
#[derive(Debug, Clone)]
pub struct Publication {
    pub document: DocumentRef,
    pub refreshed: Option<Credentials>,
}

pub struct DocumentPublisher {
    store: Arc<dyn DocumentStore>,
    oauth: Arc<OAuthClient>,
    credential_store: Arc<CredentialStore>,
    folder_name: String,
}

impl DocumentPublisher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        oauth: Arc<OAuthClient>,
        credential_store: Arc<CredentialStore>,
        folder_name: String,
    ) -> Self {
        Self {
            store,
            oauth,
            credential_store,
            folder_name,
        }
    }

    /// Current credentials for `session_id`, None once disconnected
    pub async fn current_credentials(
        &self,
        session_id: Option<&str>,
    ) -> Result<Option<Credentials>, PersistenceError> {
        self.credential_store.lookup(session_id).await
    }

    /// Store `html` as a document titled `title`
    pub async fn publish(
        &self,
        session_id: Option<&str>,
        credentials: &Credentials,
        title: &str,
        html: &str,
    ) -> Result<Publication, PersistenceError> {
        let refreshed = if credentials.is_expired(Utc::now()) {
            if !credentials.can_refresh() {
                return Err(PersistenceError::RefreshFailed(
                    "access token expired and no refresh token is stored".to_string(),
                ));
            }
            let fresh = self.oauth.refresh(credentials).await?;
            let persisted = self
                .credential_store
                .update_after_refresh(session_id, &fresh)
                .await?;
            if !persisted {
                return Err(PersistenceError::NotConnected);
            }
            Some(fresh)
        } else {
            None
        };

        let access_token = refreshed
            .as_ref()
            .unwrap_or(credentials)
            .access_token
            .as_str();

        let folder_id = self
            .store
            .find_or_create_folder(access_token, &self.folder_name)
            .await?;
        let document = self
            .store
            .create_document(access_token, title, html, &folder_id)
            .await?;

        info!(document_id = %document.id, title = %title, "Article published");
        Ok(Publication {
            document,
            refreshed,
        })
    }
}
