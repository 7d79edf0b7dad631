pub mod error;
pub mod ledger;
pub mod reservation;

pub use error::{BookingError, BookingResult};
pub use ledger::PointsLedger;
pub use reservation::{apply_reservation, Reservation, ReservationEngine};
