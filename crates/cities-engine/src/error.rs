use cities_core::CoreError;
use cities_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(StorageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CoreError> for CatalogError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => CatalogError::Validation(msg),
            other => CatalogError::Validation(other.to_string()),
        }
    }
}

impl From<StorageError> for CatalogError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Core(core) => core.into(),
            other => CatalogError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
