use super::util::{backend, uid_as_bytes, uid_from_bytes};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// One row per user in `spotify_token`, replaced wholesale on every write.
pub struct MySqlTokenStore {
    pool: MySqlPool,
}

impl MySqlTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTokenStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<TokenRecord, StoreError> {
        let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());
        let owner_bytes: Vec<u8> = row.try_get("user_id").map_err(corrupt)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(corrupt)?;
        Ok(TokenRecord {
            owner: uid_from_bytes(&owner_bytes)?,
            access_token: row.try_get("access_token").map_err(corrupt)?,
            refresh_token: row.try_get("refresh_token").map_err(corrupt)?,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenStore for MySqlTokenStore {
    async fn get(&self, owner: UserId) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT user_id, access_token, refresh_token, expires_at
FROM spotify_token
WHERE user_id = ?
"#,
        )
        .bind(uid_as_bytes(&owner))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO spotify_token (user_id, access_token, refresh_token, expires_at)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    access_token = VALUES(access_token),
    refresh_token = VALUES(refresh_token),
    expires_at = VALUES(expires_at)
"#,
        )
        .bind(uid_as_bytes(&record.owner))
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}
