//! Wire format shared by the flightline server and its clients.
//!
//! Every frame travels as a single datagram. Variable-length fields are a
//! single length byte followed by that many raw bytes, and numbers are carried
//! as decimal text so that one field kind covers the whole frame.
//!
//! ```text
//! request:  opcode(1) id source destination departure seats duration [request_id]
//! response: status(1) opcode(1) count(1) flight*count message
//! flight:   id source destination departure airfare("%.2f") seats
//! ```

pub mod codec;
pub mod message;

pub use codec::{
    CodecError, CodecResult, FrameReader, FrameWriter, MAX_DATAGRAM_LEN, MAX_FIELD_LEN, MAX_REQUEST_LEN,
};
pub use message::{Opcode, RequestMessage, ResponseMessage, StatusCode, MAX_FLIGHTS_PER_RESPONSE};
