use super::util::{backend, is_dup_key, uid_as_bytes, uid_from_bytes};
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, StoreError> {
        let corrupt = |e: sqlx::Error| StoreError::Corrupt(e.to_string());
        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(corrupt)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(corrupt)?;
        Ok(UserRecord {
            user_id: uid_from_bytes(&user_id_bytes)?,
            provider_user_id: row.try_get("spotify_id").map_err(corrupt)?,
            display_name: row.try_get("display_name").map_err(corrupt)?,
            email: row.try_get("email").map_err(corrupt)?,
            created_at,
        })
    }

    async fn fetch(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT user_id, spotify_id, display_name, email, created_at
FROM app_user
WHERE user_id = ?
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Self::row_to_record).transpose()
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn get_or_create(&self, user: NewUser) -> Result<(UserRecord, bool), StoreError> {
        let inserted = sqlx::query(
            r#"
INSERT INTO app_user (user_id, spotify_id, display_name, email)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(uid_as_bytes(&user.user_id))
        .bind(&user.provider_user_id)
        .bind(&user.display_name)
        .bind(&user.email)
        .execute(&self.pool)
        .await;

        let created = match inserted {
            Ok(_) => true,
            Err(e) if is_dup_key(&e) => false,
            Err(e) => return Err(backend(e)),
        };

        let record = self.fetch(user.user_id).await?.ok_or_else(|| {
            StoreError::Backend(format!("user {} vanished after insert", user.user_id))
        })?;
        Ok((record, created))
    }

    async fn id_exists(&self, user_id: UserId) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(1)
FROM app_user
WHERE user_id = ?
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(count > 0)
    }
}
