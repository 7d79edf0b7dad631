use bytes::Bytes;
use flightline_shared::Flight;
use std::fmt;

use crate::codec::{CodecError, CodecResult, FrameReader, FrameWriter, MAX_DATAGRAM_LEN};

/// The flight count travels in a single byte.
pub const MAX_FLIGHTS_PER_RESPONSE: usize = u8::MAX as usize;

/// Operation selector carried in the first byte of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    QueryRoute = 1,
    FlightDetail = 2,
    Reserve = 3,
    RegisterMonitor = 4,
    QueryPoints = 5,
    ReserveWithPoints = 6,
}

impl Opcode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::QueryRoute),
            2 => Ok(Opcode::FlightDetail),
            3 => Ok(Opcode::Reserve),
            4 => Ok(Opcode::RegisterMonitor),
            5 => Ok(Opcode::QueryPoints),
            6 => Ok(Opcode::ReserveWithPoints),
            other => Err(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        opcode as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::QueryRoute => "QUERY_ROUTE",
            Opcode::FlightDetail => "FLIGHT_DETAIL",
            Opcode::Reserve => "RESERVE",
            Opcode::RegisterMonitor => "REGISTER_MONITOR",
            Opcode::QueryPoints => "QUERY_POINTS",
            Opcode::ReserveWithPoints => "RESERVE_WITH_POINTS",
        };
        f.write_str(name)
    }
}

/// One decoded request datagram.
///
/// Every request carries the full field set; which fields matter depends on
/// the opcode. The opcode is kept as the raw byte so that frames with an
/// unknown selector can still be decoded and answered.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestMessage {
    pub opcode: u8,
    pub id: i64,
    pub source: String,
    pub destination: String,
    pub departure_time: String,
    pub seats_to_book: i64,
    /// Seconds.
    pub monitor_duration: i64,
    /// Client-chosen identifier used to detect retransmissions. Empty when the
    /// sender does not use one.
    pub request_id: String,
}

impl RequestMessage {
    fn with_opcode(opcode: Opcode) -> Self {
        Self {
            opcode: opcode.as_u8(),
            ..Default::default()
        }
    }

    pub fn query_route(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            ..Self::with_opcode(Opcode::QueryRoute)
        }
    }

    pub fn flight_detail(id: i64) -> Self {
        Self {
            id,
            ..Self::with_opcode(Opcode::FlightDetail)
        }
    }

    pub fn reserve(id: i64, seats: i64) -> Self {
        Self {
            id,
            seats_to_book: seats,
            ..Self::with_opcode(Opcode::Reserve)
        }
    }

    pub fn register_monitor(id: i64, duration_seconds: i64) -> Self {
        Self {
            id,
            monitor_duration: duration_seconds,
            ..Self::with_opcode(Opcode::RegisterMonitor)
        }
    }

    pub fn query_points() -> Self {
        Self::with_opcode(Opcode::QueryPoints)
    }

    pub fn reserve_with_points(id: i64, seats: i64) -> Self {
        Self {
            id,
            seats_to_book: seats,
            ..Self::with_opcode(Opcode::ReserveWithPoints)
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// `None` when the opcode byte is outside the known table.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    pub fn encode(&self) -> CodecResult<Bytes> {
        let mut writer = FrameWriter::new();
        writer.put_u8(self.opcode);
        writer.put_int("id", self.id)?;
        writer.put_str("source", &self.source)?;
        writer.put_str("destination", &self.destination)?;
        writer.put_str("departure_time", &self.departure_time)?;
        writer.put_int("seats_to_book", self.seats_to_book)?;
        writer.put_int("monitor_duration", self.monitor_duration)?;
        // Six-field frames stay byte-identical for senders without request ids.
        if !self.request_id.is_empty() {
            writer.put_str("request_id", &self.request_id)?;
        }
        Ok(writer.finish())
    }

    pub fn decode(frame: &[u8]) -> CodecResult<Self> {
        let mut reader = FrameReader::new(frame);
        let opcode = reader.get_u8("opcode")?;
        let id = reader.get_int("id")?;
        let source = reader.get_string("source")?;
        let destination = reader.get_string("destination")?;
        let departure_time = reader.get_string("departure_time")?;
        let seats_to_book = reader.get_int("seats_to_book")?;
        let monitor_duration = reader.get_int("monitor_duration")?;
        let request_id = if reader.has_remaining() {
            reader.get_string("request_id")?
        } else {
            String::new()
        };

        Ok(Self {
            opcode,
            id,
            source,
            destination,
            departure_time,
            seats_to_book,
            monitor_duration,
            request_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    Failure = 1,
}

impl TryFrom<u8> for StatusCode {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Success),
            1 => Ok(StatusCode::Failure),
            other => Err(CodecError::InvalidStatus(other)),
        }
    }
}

/// One response or notification datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    pub status: StatusCode,
    /// Echoes the request opcode, or names the notification type.
    pub opcode: u8,
    pub flights: Vec<Flight>,
    pub message: String,
}

impl ResponseMessage {
    pub fn success(opcode: Opcode, flights: Vec<Flight>, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Success,
            opcode: opcode.as_u8(),
            flights,
            message: message.into(),
        }
    }

    pub fn failure(opcode: u8, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Failure,
            opcode,
            flights: Vec::new(),
            message: message.into(),
        }
    }

    /// Notification pushed to monitors after a reservation changes a flight.
    pub fn seat_update(flight: Flight) -> Self {
        let message = format!(
            "Flight {} seat update: {}",
            flight.id, flight.seat_availability
        );
        Self::success(Opcode::RegisterMonitor, vec![flight], message)
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusCode::Success
    }

    pub fn encode(&self) -> CodecResult<Bytes> {
        if self.flights.len() > MAX_FLIGHTS_PER_RESPONSE {
            return Err(CodecError::TooManyFlights(self.flights.len()));
        }

        let mut writer = FrameWriter::new();
        writer.put_u8(self.status as u8);
        writer.put_u8(self.opcode);
        writer.put_u8(self.flights.len() as u8);
        for flight in &self.flights {
            write_flight(&mut writer, flight)?;
        }
        writer.put_str("message", &self.message)?;
        if writer.len() > MAX_DATAGRAM_LEN {
            return Err(CodecError::FrameTooLarge(writer.len()));
        }
        Ok(writer.finish())
    }

    pub fn decode(frame: &[u8]) -> CodecResult<Self> {
        let mut reader = FrameReader::new(frame);
        let status = StatusCode::try_from(reader.get_u8("status")?)?;
        let opcode = reader.get_u8("opcode")?;
        let count = reader.get_u8("flight_count")? as usize;

        let mut flights = Vec::with_capacity(count);
        for _ in 0..count {
            flights.push(read_flight(&mut reader)?);
        }
        let message = reader.get_string("message")?;

        Ok(Self {
            status,
            opcode,
            flights,
            message,
        })
    }
}

fn write_flight(writer: &mut FrameWriter, flight: &Flight) -> CodecResult<()> {
    writer.put_int("flight.id", flight.id)?;
    writer.put_str("flight.source", &flight.source)?;
    writer.put_str("flight.destination", &flight.destination)?;
    writer.put_str("flight.departure_time", &flight.departure_time)?;
    writer.put_amount("flight.airfare", flight.airfare)?;
    writer.put_int("flight.seat_availability", flight.seat_availability)?;
    Ok(())
}

fn read_flight(reader: &mut FrameReader<'_>) -> CodecResult<Flight> {
    Ok(Flight {
        id: reader.get_int("flight.id")?,
        source: reader.get_string("flight.source")?,
        destination: reader.get_string("flight.destination")?,
        departure_time: reader.get_string("flight.departure_time")?,
        airfare: reader.get_float("flight.airfare")?,
        seat_availability: reader.get_int("flight.seat_availability")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{MAX_FIELD_LEN, MAX_REQUEST_LEN};

    fn flight(id: i64, seats: i64) -> Flight {
        Flight {
            id,
            source: "SIN".to_string(),
            destination: "NRT".to_string(),
            departure_time: "2024-05-01 08:30".to_string(),
            airfare: 120.0,
            seat_availability: seats,
        }
    }

    #[test]
    fn test_request_wire_bytes() {
        let frame = RequestMessage::reserve(7, 3).encode().unwrap();
        assert_eq!(&frame[..], b"\x03\x017\x00\x00\x00\x013\x010");
    }

    #[test]
    fn test_request_round_trip_with_request_id() {
        let request = RequestMessage::query_route("SIN", "NRT").with_request_id("a1b2");
        let decoded = RequestMessage::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.opcode(), Some(Opcode::QueryRoute));
    }

    #[test]
    fn test_request_without_request_id_field() {
        let decoded = RequestMessage::decode(b"\x02\x0242\x00\x00\x00\x00\x00").unwrap();
        assert_eq!(decoded.opcode(), Some(Opcode::FlightDetail));
        assert_eq!(decoded.id, 42);
        assert_eq!(decoded.seats_to_book, 0);
        assert!(decoded.request_id.is_empty());
    }

    #[test]
    fn test_unknown_opcode_still_decodes() {
        let mut request = RequestMessage::query_points();
        request.opcode = 9;
        let decoded = RequestMessage::decode(&request.encode().unwrap()).unwrap();
        assert_eq!(decoded.opcode, 9);
        assert_eq!(decoded.opcode(), None);
    }

    #[test]
    fn test_truncated_request_rejected() {
        let frame = RequestMessage::reserve(7, 3).encode().unwrap();
        let err = RequestMessage::decode(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { field: "monitor_duration", .. }));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = RequestMessage::decode(b"\x02\x02x1\x00\x00\x00\x00\x00").unwrap_err();
        assert!(matches!(err, CodecError::InvalidNumber { field: "id", .. }));
    }

    #[test]
    fn test_response_wire_bytes() {
        let response = ResponseMessage::success(Opcode::FlightDetail, vec![flight(7, 5)], "ok");
        let frame = response.encode().unwrap();

        let mut expected = vec![0u8, 2, 1];
        expected.extend_from_slice(b"\x017\x03SIN\x03NRT\x102024-05-01 08:30\x06120.00\x015");
        expected.extend_from_slice(b"\x02ok");
        assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn test_response_round_trip() {
        let response = ResponseMessage::success(
            Opcode::QueryRoute,
            vec![flight(1, 10), flight(2, 0)],
            "2 flight(s) found",
        );
        let decoded = ResponseMessage::decode(&response.encode().unwrap()).unwrap();
        assert_eq!(decoded, response);

        let failure = ResponseMessage::failure(3, "Insufficient seats available");
        let decoded = ResponseMessage::decode(&failure.encode().unwrap()).unwrap();
        assert_eq!(decoded, failure);
        assert!(!decoded.is_success());
    }

    #[test]
    fn test_seat_update_notification() {
        let update = ResponseMessage::seat_update(flight(7, 2));
        assert!(update.is_success());
        assert_eq!(update.opcode, Opcode::RegisterMonitor.as_u8());
        assert_eq!(update.message, "Flight 7 seat update: 2");
        assert_eq!(update.flights.len(), 1);
    }

    #[test]
    fn test_response_with_missing_flights_rejected() {
        // Declares two flights but carries none.
        let err = ResponseMessage::decode(b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, CodecError::Truncated { field: "flight.id", .. }));
    }

    #[test]
    fn test_invalid_status_rejected() {
        assert_eq!(
            ResponseMessage::decode(b"\x07\x01\x00\x00").unwrap_err(),
            CodecError::InvalidStatus(7)
        );
    }

    #[test]
    fn test_too_many_flights() {
        let flights = (0..=MAX_FLIGHTS_PER_RESPONSE as i64).map(|id| flight(id, 1)).collect();
        let response = ResponseMessage::success(Opcode::QueryRoute, flights, "");
        assert_eq!(
            response.encode().unwrap_err(),
            CodecError::TooManyFlights(MAX_FLIGHTS_PER_RESPONSE + 1)
        );
    }

    #[test]
    fn test_response_over_datagram_limit() {
        let long = "X".repeat(MAX_FIELD_LEN);
        let flights = (0..MAX_FLIGHTS_PER_RESPONSE as i64)
            .map(|id| Flight {
                source: long.clone(),
                destination: long.clone(),
                departure_time: long.clone(),
                ..flight(id, 1)
            })
            .collect();
        let response = ResponseMessage::success(Opcode::QueryRoute, flights, "255 flight(s) found");
        assert!(matches!(response.encode(), Err(CodecError::FrameTooLarge(_))));
    }

    #[test]
    fn test_longest_request_fits_request_limit() {
        let long = "X".repeat(MAX_FIELD_LEN);
        let mut request = RequestMessage::query_route(long.clone(), long.clone()).with_request_id(long.clone());
        request.departure_time = long;
        request.id = i64::MIN;
        let frame = request.encode().unwrap();
        assert!(frame.len() <= MAX_REQUEST_LEN);
        assert_eq!(RequestMessage::decode(&frame).unwrap(), request);
    }

    #[test]
    fn test_opcode_table() {
        for raw in 1..=6u8 {
            let opcode = Opcode::try_from(raw).unwrap();
            assert_eq!(u8::from(opcode), raw);
        }
        assert_eq!(Opcode::try_from(0), Err(0));
        assert_eq!(Opcode::try_from(7), Err(7));
    }
}
