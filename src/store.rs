use std::{fmt::Debug, path::Path};

use url::Url;

use crate::error_code::ErrorCode;

pub(crate) mod object_store;
mod storage_key;

pub(crate) use storage_key::StorageKey;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in object store")]
    ObjectStore(#[source] ::object_store::Error),

    #[error("Error reading file for upload")]
    Read(#[source] std::io::Error),

    #[error("Failed to build public url")]
    PublicUrl(#[source] url::ParseError),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ObjectStore(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::Read(_) => ErrorCode::OBJECT_IO_ERROR,
            Self::PublicUrl(_) => ErrorCode::PUBLIC_URL_ERROR,
        }
    }
}

impl From<::object_store::Error> for StoreError {
    fn from(value: ::object_store::Error) -> Self {
        Self::ObjectStore(value)
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug + Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Upload the file at `path` to `key`, tagging the object with `content_type`
    async fn save_file(
        &self,
        key: &StorageKey,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError>;

    async fn remove(&self, key: &StorageKey) -> Result<(), StoreError>;

    /// Where clients can fetch the object stored at `key`
    fn public_url(&self, key: &StorageKey) -> Result<Url, StoreError>;
}
