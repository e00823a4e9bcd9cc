use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown city status: {0}")]
    UnknownStatus(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
