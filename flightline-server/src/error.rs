use flightline_booking::BookingError;
use flightline_core::{CoreError, RepoError};
use flightline_proto::{CodecError, ResponseMessage};
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Malformed request: {0}")]
    Malformed(#[from] CodecError),

    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Unknown opcode {0}")]
    UnknownOpcode(u8),

    #[error("Flight not found")]
    FlightNotFound(i64),

    #[error("No flights found")]
    NoFlightsFound,

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] RepoError),
}

impl ServerError {
    /// Every handled error becomes a failure frame echoing `opcode`.
    pub fn into_response(self, opcode: u8) -> ResponseMessage {
        match &self {
            ServerError::Persistence(e) => {
                error!("Store failure while handling opcode {}: {}", opcode, e);
            }
            ServerError::Booking(e @ BookingError::Persistence(_))
            | ServerError::Booking(e @ BookingError::CreditFailed { .. }) => {
                error!("Store failure while handling opcode {}: {}", opcode, e);
            }
            other => debug!("Rejecting opcode {}: {}", opcode, other),
        }
        ResponseMessage::failure(opcode, self.to_string())
    }
}
