use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient stock for SKU: {sku}")]
    InsufficientStock { sku: String },

    #[error("insufficient capacity for this session")]
    InsufficientCapacity,

    #[error("reservation expired or invalid")]
    ReservationInvalidOrExpired,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("external provider error: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Provider(err.to_string())
    }
}
