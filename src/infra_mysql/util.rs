use crate::domain_model::UserId;
use crate::domain_port::StoreError;
use sqlx::mysql::MySqlDatabaseError;
use uuid::Uuid;

#[inline]
pub fn uid_as_bytes(id: &UserId) -> &[u8] {
    id.0.as_bytes()
}

#[inline]
pub fn uid_from_bytes(id: &[u8]) -> Result<UserId, StoreError> {
    Ok(UserId(
        Uuid::from_slice(id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
    ))
}

pub fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

pub fn is_dup_key(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db) = err {
        if let Some(mysql_err) = db.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == 1062; // ER_DUP_ENTRY
        }
    }

    false
}
