pub mod repository;
pub mod identity;
pub mod validation;

pub use identity::IdentityScheme;
pub use repository::{FlightRepository, PointsRepository, RepoError};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    ValidationError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
