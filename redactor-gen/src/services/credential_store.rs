//! Credential store with session and durable layers
//!
//! Lookup order: the request's session first, then the durable record in the
//! settings table. Saves write both layers. Refreshes only overwrite layers
//! that still hold a record, so a refresh racing a disconnect cannot reconnect
//! the store. Session entries expire `session_ttl` after their last save.

use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::document_store::PersistenceError;
use crate::db::settings;
use crate::models::Credentials;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct SessionEntry {
    credentials: Credentials,
    saved_at: Instant,
}

pub struct CredentialStore {
    db: SqlitePool,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    session_ttl: Duration,
}

impl CredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self::with_session_ttl(db, DEFAULT_SESSION_TTL)
    }

    pub fn with_session_ttl(db: SqlitePool, session_ttl: Duration) -> Self {
        Self {
            db,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        }
    }

    fn is_live(&self, entry: &SessionEntry) -> bool {
        entry.saved_at.elapsed() < self.session_ttl
    }

    /// Credentials for `session_id`, falling back to the durable record
    pub async fn lookup(
        &self,
        session_id: Option<&str>,
    ) -> Result<Option<Credentials>, PersistenceError> {
        if let Some(id) = session_id {
            if let Some(entry) = self.sessions.read().await.get(id) {
                if self.is_live(entry) {
                    debug!("Credentials found in session");
                    return Ok(Some(entry.credentials.clone()));
                }
            }
        }

        let durable = settings::get_drive_credentials(&self.db).await?;
        if durable.is_some() {
            debug!("Credentials found in durable store");
        }
        Ok(durable)
    }

    /// Store freshly issued credentials in both layers
    pub async fn save(
        &self,
        session_id: Option<&str>,
        credentials: &Credentials,
    ) -> Result<(), PersistenceError> {
        settings::set_drive_credentials(&self.db, credentials).await?;
        if let Some(id) = session_id {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|_, entry| entry.saved_at.elapsed() < self.session_ttl);
            sessions.insert(
                id.to_string(),
                SessionEntry {
                    credentials: credentials.clone(),
                    saved_at: Instant::now(),
                },
            );
        }
        Ok(())
    }

    /// Overwrite the layers that still hold credentials with refreshed ones
    ///
    /// Returns false when neither layer holds a record, meaning the store was
    /// disconnected after the credentials were captured.
    pub async fn update_after_refresh(
        &self,
        session_id: Option<&str>,
        credentials: &Credentials,
    ) -> Result<bool, PersistenceError> {
        let durable = settings::update_drive_credentials(&self.db, credentials).await?;

        let mut in_session = false;
        if let Some(id) = session_id {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(id) {
                if entry.saved_at.elapsed() < self.session_ttl {
                    entry.credentials = credentials.clone();
                    in_session = true;
                }
            }
        }

        if durable || in_session {
            info!(durable, in_session, "Refreshed credentials persisted");
            Ok(true)
        } else {
            warn!("Refreshed credentials dropped: store was disconnected");
            Ok(false)
        }
    }

    /// Drop credentials from the session and the durable record
    pub async fn disconnect(&self, session_id: Option<&str>) -> Result<(), PersistenceError> {
        if let Some(id) = session_id {
            self.sessions.write().await.remove(id);
        }
        settings::delete_drive_credentials(&self.db).await?;
        info!("Document store disconnected");
        Ok(())
    }

    pub async fn is_connected(&self, session_id: Option<&str>) -> Result<bool, PersistenceError> {
        Ok(self.lookup(session_id).await?.is_some())
    }
}
