use discovery_error::{DiscoveryError, ErrorCodes};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQL store error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Document store error: {0}")]
    Document(#[from] object_store::Error),
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Timestamp {0} is out of range")]
    InvalidTimestamp(i64),
    #[error("Invalid document path: {0}")]
    InvalidPath(#[from] object_store::path::Error),
}

impl StorageError {
    pub(crate) fn encode(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| StorageError::Encode { what, source }
    }

    pub(crate) fn decode(what: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| StorageError::Decode { what, source }
    }
}

impl DiscoveryError for StorageError {
    fn code(&self) -> ErrorCodes {
        match self {
            StorageError::Sql(err) => match err {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => ErrorCodes::Unavailable,
                sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => ErrorCodes::DataLoss,
                _ => ErrorCodes::Internal,
            },
            StorageError::Document(_) => ErrorCodes::Internal,
            StorageError::Encode { .. } => ErrorCodes::Internal,
            StorageError::Decode { .. } => ErrorCodes::DataLoss,
            StorageError::InvalidTimestamp(_) => ErrorCodes::DataLoss,
            StorageError::InvalidPath(_) => ErrorCodes::InvalidArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StorageError::Sql(sqlx::Error::PoolTimedOut).code(),
            ErrorCodes::Unavailable
        );
        assert_eq!(
            StorageError::Sql(sqlx::Error::RowNotFound).code(),
            ErrorCodes::Internal
        );
        assert_eq!(
            StorageError::InvalidTimestamp(i64::MAX).code(),
            ErrorCodes::DataLoss
        );
        let bad_json = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        assert_eq!(
            StorageError::decode("ssh public keys")(bad_json).code(),
            ErrorCodes::DataLoss
        );
    }
}
