use flightline_core::RepoError;
use flightline_shared::Flight;

/// Display strings double as the client-facing response message.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Flight not found")]
    FlightNotFound { flight_id: i64 },

    #[error("Insufficient seats available")]
    InsufficientSeats { requested: i64, available: i64 },

    #[error("Insufficient points")]
    InsufficientPoints { required: f64, balance: f64 },

    #[error("No points record found for this client")]
    PointsNotFound { client_id: String },

    #[error("Invalid seat count {0}")]
    InvalidSeatCount(i64),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] RepoError),

    /// The seat decrement is committed; only the loyalty credit was lost.
    #[error("Reservation recorded but points credit failed: {source}")]
    CreditFailed {
        flight: Box<Flight>,
        #[source]
        source: RepoError,
    },
}

impl BookingError {
    /// The flight whose seat count changed despite the error, if any.
    pub fn committed_flight(&self) -> Option<&Flight> {
        match self {
            BookingError::CreditFailed { flight, .. } => Some(flight.as_ref()),
            _ => None,
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
