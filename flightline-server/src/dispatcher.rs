use bytes::Bytes;
use chrono::{Duration, Utc};
use flightline_core::CoreError;
use flightline_core::validation::{
    validate_flight_id, validate_monitor_duration, validate_route, validate_seats,
};
use flightline_proto::{
    CodecError, Opcode, RequestMessage, ResponseMessage, MAX_FLIGHTS_PER_RESPONSE,
};
use flightline_shared::Flight;
use flightline_store::app_config::InvocationSemantics;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::state::AppState;

/// Datagrams produced by handling one request.
#[derive(Debug, Default)]
pub struct Outbound {
    /// Sent back to the requesting endpoint.
    pub reply: Option<Bytes>,
    /// Seat-update pushes to monitoring clients.
    pub notifications: Vec<(SocketAddr, Bytes)>,
}

/// What an opcode handler hands back before encoding.
struct Handled {
    response: Option<ResponseMessage>,
    notifications: Vec<(SocketAddr, Bytes)>,
}

impl Handled {
    fn reply(response: ResponseMessage) -> Self {
        Self {
            response: Some(response),
            notifications: Vec::new(),
        }
    }

    fn silent() -> Self {
        Self {
            response: None,
            notifications: Vec::new(),
        }
    }
}

/// Routes decoded requests by opcode.
pub struct Dispatcher {
    state: AppState,
}

impl Dispatcher {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Handles one received datagram end to end.
    pub async fn handle_datagram(&self, datagram: &[u8], src: SocketAddr) -> Outbound {
        let Some(&raw_opcode) = datagram.first() else {
            warn!("Dropping empty datagram from {}", src);
            return Outbound::default();
        };

        let request = match RequestMessage::decode(datagram) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed request from {}: {}", src, e);
                let response = ServerError::from(e).into_response(raw_opcode);
                return Outbound {
                    reply: encode_response(&response),
                    notifications: Vec::new(),
                };
            }
        };

        let dedup = self.state.semantics == InvocationSemantics::AtMostOnce
            && !request.request_id.is_empty();

        if dedup {
            let replies = self.state.replies.lock().await;
            if let Some(cached) = replies.get(src, &request.request_id, Utc::now()) {
                info!(
                    "Duplicate request {} from {}, replaying cached reply",
                    request.request_id, src
                );
                return Outbound {
                    reply: cached.reply.clone(),
                    notifications: Vec::new(),
                };
            }
        }

        let handled = self.dispatch(&request, src).await;
        let reply = handled.response.as_ref().and_then(encode_response);

        if dedup {
            self.state
                .replies
                .lock()
                .await
                .insert(src, &request.request_id, reply.clone(), Utc::now());
        }

        Outbound {
            reply,
            notifications: handled.notifications,
        }
    }

    async fn dispatch(&self, request: &RequestMessage, src: SocketAddr) -> Handled {
        let Some(opcode) = request.opcode() else {
            warn!("Unknown opcode {} from {}", request.opcode, src);
            return Handled::reply(
                ServerError::UnknownOpcode(request.opcode).into_response(request.opcode),
            );
        };
        debug!("{} from {}", opcode, src);

        let client_id = self.state.identity.client_id(&src);
        let raw = opcode.as_u8();

        match opcode {
            Opcode::QueryRoute => Handled::reply(
                self.query_route(request)
                    .await
                    .unwrap_or_else(|e| e.into_response(raw)),
            ),
            Opcode::FlightDetail => Handled::reply(
                self.flight_detail(request)
                    .await
                    .unwrap_or_else(|e| e.into_response(raw)),
            ),
            Opcode::Reserve => self.reserve(request, &client_id).await,
            Opcode::RegisterMonitor => match self.register_monitor(request, src).await {
                Ok(()) => Handled::silent(),
                Err(e) => Handled::reply(e.into_response(raw)),
            },
            Opcode::QueryPoints => Handled::reply(
                self.query_points(&client_id)
                    .await
                    .unwrap_or_else(|e| e.into_response(raw)),
            ),
            Opcode::ReserveWithPoints => self.reserve_with_points(request, &client_id).await,
        }
    }

    async fn query_route(&self, request: &RequestMessage) -> Result<ResponseMessage, ServerError> {
        validate_route(&request.source, &request.destination)?;

        let mut flights = self
            .state
            .flights
            .find_flights_by_route(&request.source, &request.destination)
            .await?;
        if flights.is_empty() {
            return Err(ServerError::NoFlightsFound);
        }

        let matched = flights.len();
        flights.truncate(MAX_FLIGHTS_PER_RESPONSE);
        let mut response = route_response(flights);
        while response.flights.len() > 1
            && matches!(response.encode(), Err(CodecError::FrameTooLarge(_)))
        {
            let mut flights = response.flights;
            flights.pop();
            response = route_response(flights);
        }
        if response.flights.len() < matched {
            warn!(
                "{} flights match {} -> {}, answering with the first {}",
                matched,
                request.source,
                request.destination,
                response.flights.len()
            );
        }
        Ok(response)
    }

    async fn flight_detail(&self, request: &RequestMessage) -> Result<ResponseMessage, ServerError> {
        let flight_id = validate_flight_id(request.id)?;
        let flight = self
            .state
            .flights
            .get_flight(flight_id)
            .await?
            .ok_or(ServerError::FlightNotFound(flight_id))?;

        Ok(ResponseMessage::success(
            Opcode::FlightDetail,
            vec![flight],
            "Flight details retrieved",
        ))
    }

    async fn reserve(&self, request: &RequestMessage, client_id: &str) -> Handled {
        let result = async {
            let flight_id = validate_flight_id(request.id)?;
            let seats = validate_seats(request.seats_to_book)?;
            Ok::<_, ServerError>(self.state.engine.reserve(client_id, flight_id, seats).await?)
        }
        .await;

        self.settle_reservation(Opcode::Reserve, result, "Reservation successful")
            .await
    }

    async fn reserve_with_points(&self, request: &RequestMessage, client_id: &str) -> Handled {
        let result = async {
            let flight_id = validate_flight_id(request.id)?;
            let seats = validate_seats(request.seats_to_book)?;
            Ok::<_, ServerError>(
                self.state
                    .engine
                    .reserve_with_points(client_id, flight_id, seats)
                    .await?,
            )
        }
        .await;

        self.settle_reservation(
            Opcode::ReserveWithPoints,
            result,
            "Reservation with points successful",
        )
        .await
    }

    /// Builds the reply for a reservation attempt and fans out to monitors
    /// whenever a seat count actually changed.
    async fn settle_reservation(
        &self,
        opcode: Opcode,
        result: Result<flightline_booking::Reservation, ServerError>,
        success_message: &str,
    ) -> Handled {
        match result {
            Ok(reservation) => {
                let notifications = self.notify_monitors(&reservation.flight).await;
                Handled {
                    response: Some(ResponseMessage::success(
                        opcode,
                        vec![reservation.flight],
                        success_message,
                    )),
                    notifications,
                }
            }
            Err(e) => {
                let notifications = match &e {
                    ServerError::Booking(booking) => match booking.committed_flight() {
                        Some(flight) => self.notify_monitors(flight).await,
                        None => Vec::new(),
                    },
                    _ => Vec::new(),
                };
                Handled {
                    response: Some(e.into_response(opcode.as_u8())),
                    notifications,
                }
            }
        }
    }

    async fn register_monitor(
        &self,
        request: &RequestMessage,
        src: SocketAddr,
    ) -> Result<(), ServerError> {
        let flight_id = validate_flight_id(request.id)?;
        let seconds =
            validate_monitor_duration(request.monitor_duration, self.state.max_monitor_seconds)?;
        let duration = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "monitor duration {} seconds is out of range",
                    seconds
                ))
            })?;

        let subscription = self
            .state
            .monitors
            .lock()
            .await
            .register(flight_id, src, duration, Utc::now());
        info!(
            "{} monitoring flight {} until {}",
            src, flight_id, subscription.expires_at
        );
        Ok(())
    }

    async fn query_points(&self, client_id: &str) -> Result<ResponseMessage, ServerError> {
        let balance = self.state.engine.ledger().require_balance(client_id).await?;
        Ok(ResponseMessage::success(
            Opcode::QueryPoints,
            Vec::new(),
            format!("Points balance: {:.2}", balance),
        ))
    }

    /// One seat-update frame per live subscription on the flight.
    async fn notify_monitors(&self, flight: &Flight) -> Vec<(SocketAddr, Bytes)> {
        let endpoints = self
            .state
            .monitors
            .lock()
            .await
            .live_subscribers(flight.id, Utc::now());
        if endpoints.is_empty() {
            return Vec::new();
        }

        let Some(frame) = encode_response(&ResponseMessage::seat_update(flight.clone())) else {
            return Vec::new();
        };
        debug!(
            "Notifying {} monitor(s) of flight {} ({} seats)",
            endpoints.len(),
            flight.id,
            flight.seat_availability
        );
        endpoints
            .into_iter()
            .map(|endpoint| (endpoint, frame.clone()))
            .collect()
    }
}

fn route_response(flights: Vec<Flight>) -> ResponseMessage {
    let message = format!("{} flight(s) found", flights.len());
    ResponseMessage::success(Opcode::QueryRoute, flights, message)
}

/// Encodes a response, degrading to a bare failure frame when a record does
/// not fit the wire format.
fn encode_response(response: &ResponseMessage) -> Option<Bytes> {
    match response.encode() {
        Ok(frame) => Some(frame),
        Err(e) => {
            error!("Failed to encode response for opcode {}: {}", response.opcode, e);
            ResponseMessage::failure(response.opcode, "Response could not be encoded")
                .encode()
                .ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightline_proto::StatusCode;
    use flightline_store::{Config, Repositories};

    fn flight(id: i64, source: &str, destination: &str, seats: i64, airfare: f64) -> Flight {
        Flight {
            id,
            source: source.to_string(),
            destination: destination.to_string(),
            departure_time: "2024-05-01 08:30".to_string(),
            airfare,
            seat_availability: seats,
        }
    }

    fn dispatcher_with(flights: Vec<Flight>, config: Config) -> Dispatcher {
        Dispatcher::new(AppState::new(Repositories::in_memory(flights), &config))
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(
            vec![
                flight(7, "SIN", "NRT", 5, 120.0),
                flight(8, "SIN", "NRT", 40, 95.5),
                flight(9, "NRT", "SIN", 12, 130.0),
            ],
            Config::default(),
        )
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    async fn call(dispatcher: &Dispatcher, request: RequestMessage, src: SocketAddr) -> Outbound {
        dispatcher
            .handle_datagram(&request.encode().unwrap(), src)
            .await
    }

    fn reply_of(outbound: &Outbound) -> ResponseMessage {
        ResponseMessage::decode(outbound.reply.as_ref().expect("expected a reply")).unwrap()
    }

    #[tokio::test]
    async fn test_query_by_route() {
        let dispatcher = dispatcher();
        let out = call(&dispatcher, RequestMessage::query_route("SIN", "NRT"), addr(5000)).await;
        let response = reply_of(&out);

        assert_eq!(response.status, StatusCode::Success);
        assert_eq!(response.opcode, 1);
        assert_eq!(response.message, "2 flight(s) found");
        let ids: Vec<i64> = response.flights.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_route_reply_is_trimmed_to_one_datagram() {
        let long = "X".repeat(255);
        let flights = (1..=100)
            .map(|id| Flight {
                departure_time: long.clone(),
                ..flight(id, &long, &long, 10, 99.0)
            })
            .collect();
        let dispatcher = dispatcher_with(flights, Config::default());

        let request = RequestMessage::query_route(long.clone(), long.clone());
        let out = call(&dispatcher, request, addr(5000)).await;
        let frame = out.reply.expect("expected a reply");
        assert!(frame.len() <= flightline_proto::MAX_DATAGRAM_LEN);

        let response = ResponseMessage::decode(&frame).unwrap();
        assert_eq!(response.status, StatusCode::Success);
        assert!(response.flights.len() < 100);
        assert_eq!(
            response.message,
            format!("{} flight(s) found", response.flights.len())
        );
    }

    #[tokio::test]
    async fn test_query_without_matches() {
        let dispatcher = dispatcher();
        let out = call(&dispatcher, RequestMessage::query_route("SIN", "LHR"), addr(5000)).await;
        let response = reply_of(&out);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.message, "No flights found");
    }

    #[tokio::test]
    async fn test_flight_detail() {
        let dispatcher = dispatcher();
        let response = reply_of(&call(&dispatcher, RequestMessage::flight_detail(9), addr(5000)).await);
        assert!(response.is_success());
        assert_eq!(response.flights, vec![flight(9, "NRT", "SIN", 12, 130.0)]);

        let response = reply_of(&call(&dispatcher, RequestMessage::flight_detail(70), addr(5000)).await);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.opcode, 2);
        assert_eq!(response.message, "Flight not found");
    }

    #[tokio::test]
    async fn test_reservation_scenario() {
        let dispatcher = dispatcher();
        let client_a = addr(5001);
        let client_b = addr(5002);

        let response = reply_of(&call(&dispatcher, RequestMessage::reserve(7, 3), client_a).await);
        assert_eq!(response.status, StatusCode::Success);
        assert_eq!(response.message, "Reservation successful");
        assert_eq!(response.flights[0].seat_availability, 2);

        let points = reply_of(&call(&dispatcher, RequestMessage::query_points(), client_a).await);
        assert_eq!(points.message, "Points balance: 360.00");

        let response = reply_of(&call(&dispatcher, RequestMessage::reserve(7, 3), client_b).await);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.message, "Insufficient seats available");

        let detail = reply_of(&call(&dispatcher, RequestMessage::flight_detail(7), client_b).await);
        assert_eq!(detail.flights[0].seat_availability, 2);
    }

    #[tokio::test]
    async fn test_points_reservation() {
        let dispatcher = dispatcher();
        let client = addr(5001);

        // Earn 40 × 95.50 = 3820 points.
        call(&dispatcher, RequestMessage::reserve(8, 40), client).await;

        let response =
            reply_of(&call(&dispatcher, RequestMessage::reserve_with_points(9, 30), client).await);
        assert_eq!(response.message, "Insufficient points");

        let response =
            reply_of(&call(&dispatcher, RequestMessage::reserve_with_points(9, 12), client).await);
        assert_eq!(response.status, StatusCode::Success);
        assert_eq!(response.opcode, 6);
        assert_eq!(response.flights[0].seat_availability, 0);

        let points = reply_of(&call(&dispatcher, RequestMessage::query_points(), client).await);
        assert_eq!(points.message, "Points balance: 2260.00");
    }

    #[tokio::test]
    async fn test_points_query_without_record() {
        let dispatcher = dispatcher();
        let response = reply_of(&call(&dispatcher, RequestMessage::query_points(), addr(5009)).await);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.opcode, 5);
        assert_eq!(response.message, "No points record found for this client");
    }

    #[tokio::test]
    async fn test_monitor_registration_is_silent_and_notified() {
        let dispatcher = dispatcher();
        let watcher = addr(6000);

        let out = call(&dispatcher, RequestMessage::register_monitor(7, 60), watcher).await;
        assert!(out.reply.is_none());
        assert!(out.notifications.is_empty());

        let out = call(&dispatcher, RequestMessage::reserve(7, 1), addr(5001)).await;
        assert_eq!(out.notifications.len(), 1);
        let (endpoint, frame) = &out.notifications[0];
        assert_eq!(*endpoint, watcher);

        let update = ResponseMessage::decode(frame).unwrap();
        assert_eq!(update.opcode, 4);
        assert_eq!(update.message, "Flight 7 seat update: 4");
        assert_eq!(update.flights[0].seat_availability, 4);

        // Other flights stay quiet.
        let out = call(&dispatcher, RequestMessage::reserve(8, 1), addr(5001)).await;
        assert!(out.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_failed_reservation_does_not_notify() {
        let dispatcher = dispatcher();
        call(&dispatcher, RequestMessage::register_monitor(7, 60), addr(6000)).await;

        let out = call(&dispatcher, RequestMessage::reserve(7, 50), addr(5001)).await;
        assert!(out.notifications.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_monitor_duration_is_rejected() {
        let dispatcher = dispatcher();
        let out = call(&dispatcher, RequestMessage::register_monitor(7, 0), addr(6000)).await;
        let response = reply_of(&out);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.opcode, 4);
        assert!(dispatcher.state().monitors.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_huge_monitor_duration_does_not_panic() {
        let mut config = Config::default();
        config.monitor.max_duration_seconds = u64::MAX;
        let dispatcher = dispatcher_with(vec![flight(7, "SIN", "NRT", 5, 120.0)], config);

        let out = call(&dispatcher, RequestMessage::register_monitor(7, i64::MAX), addr(6000)).await;
        let response = reply_of(&out);
        assert_eq!(response.status, StatusCode::Failure);
        assert!(response.message.starts_with("Invalid request: monitor duration"));

        let out = call(
            &dispatcher,
            RequestMessage::register_monitor(7, i64::MAX / 1000),
            addr(6000),
        )
        .await;
        assert!(out.reply.is_none());
        assert_eq!(dispatcher.state().monitors.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_seat_count() {
        let dispatcher = dispatcher();
        let response = reply_of(&call(&dispatcher, RequestMessage::reserve(7, -2), addr(5001)).await);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(
            response.message,
            "Invalid request: seat count must be at least 1, got -2"
        );
    }

    #[tokio::test]
    async fn test_unknown_opcode_gets_failure() {
        let dispatcher = dispatcher();
        let mut request = RequestMessage::query_points();
        request.opcode = 42;
        let response = reply_of(&call(&dispatcher, request, addr(5001)).await);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.opcode, 42);
        assert_eq!(response.message, "Unknown opcode 42");
    }

    #[tokio::test]
    async fn test_malformed_and_empty_datagrams() {
        let dispatcher = dispatcher();

        let out = dispatcher.handle_datagram(&[], addr(5001)).await;
        assert!(out.reply.is_none());

        let out = dispatcher.handle_datagram(b"\x03\x05ab", addr(5001)).await;
        let response = reply_of(&out);
        assert_eq!(response.status, StatusCode::Failure);
        assert_eq!(response.opcode, 3);
        assert!(response.message.starts_with("Malformed request: frame truncated"));
    }

    #[tokio::test]
    async fn test_at_most_once_replays_cached_reply() {
        let dispatcher = dispatcher();
        let client = addr(5001);
        let request = RequestMessage::reserve(7, 2).with_request_id("r-1");

        let first = call(&dispatcher, request.clone(), client).await;
        let second = call(&dispatcher, request, client).await;

        assert_eq!(first.reply, second.reply);
        let detail = reply_of(&call(&dispatcher, RequestMessage::flight_detail(7), client).await);
        assert_eq!(detail.flights[0].seat_availability, 3);
    }

    #[tokio::test]
    async fn test_at_least_once_re_executes() {
        let mut config = Config::default();
        config.invocation.semantics = InvocationSemantics::AtLeastOnce;
        let dispatcher = dispatcher_with(vec![flight(7, "SIN", "NRT", 5, 120.0)], config);
        let client = addr(5001);
        let request = RequestMessage::reserve(7, 2).with_request_id("r-1");

        call(&dispatcher, request.clone(), client).await;
        let second = reply_of(&call(&dispatcher, request, client).await);
        assert_eq!(second.flights[0].seat_availability, 1);
    }
}
