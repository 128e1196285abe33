//! Settings table accessors
//!
//! Every write is a single `INSERT ... ON CONFLICT DO UPDATE`, so each key is
//! replaced atomically and the last writer wins.

use crate::models::{Credentials, TopicRecord};
use redactor_common::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{Pool, Sqlite};

const DRIVE_CREDENTIALS_KEY: &str = "drive_credentials";
const LAST_TOPIC_KEY: &str = "last_topic";
const PROVIDER_API_KEY: &str = "provider_api_key";

/// Get the durable credential record
pub async fn get_drive_credentials(db: &Pool<Sqlite>) -> Result<Option<Credentials>> {
    get_json_setting(db, DRIVE_CREDENTIALS_KEY).await
}

/// Replace the durable credential record
pub async fn set_drive_credentials(db: &Pool<Sqlite>, credentials: &Credentials) -> Result<()> {
    set_json_setting(db, DRIVE_CREDENTIALS_KEY, credentials).await
}

/// Overwrite the durable credential record only if one exists
///
/// Returns false when the record was deleted in the meantime; nothing is
/// inserted in that case.
pub async fn update_drive_credentials(db: &Pool<Sqlite>, credentials: &Credentials) -> Result<bool> {
    let encoded = serde_json::to_string(credentials)?;
    let result = sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
        .bind(&encoded)
        .bind(DRIVE_CREDENTIALS_KEY)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove the durable credential record
pub async fn delete_drive_credentials(db: &Pool<Sqlite>) -> Result<()> {
    delete_setting(db, DRIVE_CREDENTIALS_KEY).await
}

pub async fn get_last_topic(db: &Pool<Sqlite>) -> Result<Option<TopicRecord>> {
    get_json_setting(db, LAST_TOPIC_KEY).await
}

/// Overwrite the last submitted topic
pub async fn set_last_topic(db: &Pool<Sqlite>, record: &TopicRecord) -> Result<()> {
    set_json_setting(db, LAST_TOPIC_KEY, record).await
}

pub async fn get_provider_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting(db, PROVIDER_API_KEY).await
}

pub async fn set_provider_api_key(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    set_setting(db, PROVIDER_API_KEY, key).await
}

async fn get_json_setting<T: DeserializeOwned>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    match get_setting(db, key).await? {
        Some(value) => {
            let parsed = serde_json::from_str(&value)
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

async fn set_json_setting<T: Serialize>(db: &Pool<Sqlite>, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    set_setting(db, key, &encoded).await
}

async fn get_setting(db: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|(value,)| value))
}

async fn set_setting(db: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}

async fn delete_setting(db: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(db)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    fn credentials(token: &str) -> Credentials {
        Credentials {
            access_token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            token_endpoint: "https://oauth2.example/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec!["drive.file".to_string()],
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_credentials_roundtrip_and_overwrite() {
        let db = setup_test_db().await;
        assert!(get_drive_credentials(&db).await.unwrap().is_none());

        set_drive_credentials(&db, &credentials("first")).await.unwrap();
        set_drive_credentials(&db, &credentials("second")).await.unwrap();

        let stored = get_drive_credentials(&db).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "second");

        delete_drive_credentials(&db).await.unwrap();
        assert!(get_drive_credentials(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_credentials_never_inserts() {
        let db = setup_test_db().await;

        assert!(!update_drive_credentials(&db, &credentials("late")).await.unwrap());
        assert!(get_drive_credentials(&db).await.unwrap().is_none());

        set_drive_credentials(&db, &credentials("first")).await.unwrap();
        assert!(update_drive_credentials(&db, &credentials("refreshed")).await.unwrap());
        let stored = get_drive_credentials(&db).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "refreshed");
    }

    #[tokio::test]
    async fn test_last_topic_overwritten() {
        let db = setup_test_db().await;

        for topic in ["first topic", "second topic"] {
            let record = TopicRecord {
                topic: topic.to_string(),
                title: None,
                submitted_at: Utc::now(),
            };
            set_last_topic(&db, &record).await.unwrap();
        }

        let stored = get_last_topic(&db).await.unwrap().unwrap();
        assert_eq!(stored.topic, "second topic");
    }

    #[tokio::test]
    async fn test_corrupt_record_is_config_error() {
        let db = setup_test_db().await;
        set_setting(&db, DRIVE_CREDENTIALS_KEY, "not json").await.unwrap();

        let result = get_drive_credentials(&db).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
