use flightline_core::FlightRepository;
use flightline_shared::{ClientPoints, Flight};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{BookingError, BookingResult};
use crate::ledger::PointsLedger;

/// Outcome of a successful reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    /// The flight as persisted after the decrement.
    pub flight: Flight,
    pub seats: i64,
    pub cost: f64,
    /// Purchaser's balance after the credit or debit.
    pub points_balance: f64,
}

/// Applies a seat decrement to a fetched flight without touching storage.
pub fn apply_reservation(flight: &Flight, seats: i64) -> BookingResult<Flight> {
    if seats < 1 {
        return Err(BookingError::InvalidSeatCount(seats));
    }
    if !flight.has_seats(seats) {
        return Err(BookingError::InsufficientSeats {
            requested: seats,
            available: flight.seat_availability,
        });
    }

    let mut updated = flight.clone();
    updated.seat_availability -= seats;
    Ok(updated)
}

/// Seat reservations and the loyalty accounting tied to them.
///
/// Every read-check-write runs under `write_lock`, so two reservations
/// against the same flight or client can never interleave even when the
/// caller dispatches requests concurrently.
pub struct ReservationEngine {
    flights: Arc<dyn FlightRepository>,
    ledger: PointsLedger,
    write_lock: Mutex<()>,
}

impl ReservationEngine {
    pub fn new(flights: Arc<dyn FlightRepository>, ledger: PointsLedger) -> Self {
        Self {
            flights,
            ledger,
            write_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &PointsLedger {
        &self.ledger
    }

    async fn fetch_flight(&self, flight_id: i64) -> BookingResult<Flight> {
        self.flights
            .get_flight(flight_id)
            .await?
            .ok_or(BookingError::FlightNotFound { flight_id })
    }

    /// Fetch, check and persist. Callers must hold `write_lock`.
    async fn reserve_seats(&self, flight: &Flight, seats: i64) -> BookingResult<Flight> {
        let updated = apply_reservation(flight, seats)?;
        self.flights.save_flight(&updated).await?;
        Ok(updated)
    }

    /// Cash reservation. Earns `seats × airfare` points for the purchaser.
    pub async fn reserve(
        &self,
        client_id: &str,
        flight_id: i64,
        seats: i64,
    ) -> BookingResult<Reservation> {
        let _guard = self.write_lock.lock().await;

        let flight = self.fetch_flight(flight_id).await?;
        let updated = self.reserve_seats(&flight, seats).await?;
        let cost = updated.cost_of(seats);

        let points_balance = match self.ledger.credit(client_id, cost).await {
            Ok(balance) => balance,
            Err(BookingError::Persistence(source)) => {
                error!(
                    "Flight {} reserved for {} but crediting {:.2} points failed: {}",
                    flight_id, client_id, cost, source
                );
                return Err(BookingError::CreditFailed {
                    flight: Box::new(updated),
                    source,
                });
            }
            Err(e) => return Err(e),
        };

        info!(
            "Reserved {} seat(s) on flight {} for {} ({} left)",
            seats, flight_id, client_id, updated.seat_availability
        );

        Ok(Reservation {
            flight: updated,
            seats,
            cost,
            points_balance,
        })
    }

    /// Points-funded reservation. The balance gate runs before any seat
    /// mutation; if the debit cannot be written afterwards the seats are
    /// handed back.
    pub async fn reserve_with_points(
        &self,
        client_id: &str,
        flight_id: i64,
        seats: i64,
    ) -> BookingResult<Reservation> {
        let _guard = self.write_lock.lock().await;

        let flight = self.fetch_flight(flight_id).await?;
        if seats < 1 {
            return Err(BookingError::InvalidSeatCount(seats));
        }
        let cost = flight.cost_of(seats);
        let account = self
            .ledger
            .account(client_id)
            .await?
            .unwrap_or_else(|| ClientPoints::new(client_id, 0.0));
        if !account.can_afford(cost) {
            return Err(BookingError::InsufficientPoints {
                required: cost,
                balance: account.balance,
            });
        }
        let balance = account.balance;

        let updated = self.reserve_seats(&flight, seats).await?;

        let points_balance = match self.ledger.set_balance(client_id, balance - cost).await {
            Ok(()) => balance - cost,
            Err(e) => {
                warn!(
                    "Debit of {:.2} points for {} failed, releasing {} seat(s) on flight {}",
                    cost, client_id, seats, flight_id
                );
                self.compensate(&updated, seats).await;
                return Err(e);
            }
        };

        info!(
            "Reserved {} seat(s) on flight {} for {} with points ({} left)",
            seats, flight_id, client_id, updated.seat_availability
        );

        Ok(Reservation {
            flight: updated,
            seats,
            cost,
            points_balance,
        })
    }

    /// Returns `seats` to a flight after a failed debit.
    async fn compensate(&self, reserved: &Flight, seats: i64) {
        let mut restored = reserved.clone();
        restored.seat_availability += seats;
        if let Err(e) = self.flights.save_flight(&restored).await {
            error!(
                "Failed to release {} seat(s) on flight {}: {}",
                seats, reserved.id, e
            );
        }
    }
}
