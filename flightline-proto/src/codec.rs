use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A length byte caps every field at this many payload bytes.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// Largest well-formed request: the opcode byte plus seven full fields.
pub const MAX_REQUEST_LEN: usize = 1 + 7 * (1 + MAX_FIELD_LEN);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("frame truncated while reading {field}: needed {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("field {field} is not a valid number: {text:?}")]
    InvalidNumber { field: &'static str, text: String },

    #[error("field {field} is {len} bytes, over the 255 byte limit")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("{0} flight records do not fit in one frame")]
    TooManyFlights(usize),

    #[error("unknown status code {0}")]
    InvalidStatus(u8),

    #[error("frame of {0} bytes does not fit in one datagram")]
    FrameTooLarge(usize),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Builds a frame one field at a time.
#[derive(Debug, Default)]
pub struct FrameWriter {
    buf: BytesMut,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Appends a length-prefixed field.
    pub fn put_field(&mut self, field: &'static str, payload: &[u8]) -> CodecResult<()> {
        if payload.len() > MAX_FIELD_LEN {
            return Err(CodecError::FieldTooLong {
                field,
                len: payload.len(),
            });
        }
        self.buf.put_u8(payload.len() as u8);
        self.buf.put_slice(payload);
        Ok(())
    }

    pub fn put_str(&mut self, field: &'static str, value: &str) -> CodecResult<()> {
        self.put_field(field, value.as_bytes())
    }

    pub fn put_int(&mut self, field: &'static str, value: i64) -> CodecResult<()> {
        self.put_str(field, &value.to_string())
    }

    /// Currency amounts always go out with two decimal places.
    pub fn put_amount(&mut self, field: &'static str, value: f64) -> CodecResult<()> {
        self.put_str(field, &format!("{:.2}", value))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Reads fields back out of a received frame.
///
/// The reader only checks that declared lengths are available; it performs no
/// range validation on the values it parses.
#[derive(Debug)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    pub fn get_u8(&mut self, field: &'static str) -> CodecResult<u8> {
        if !self.buf.has_remaining() {
            return Err(CodecError::Truncated {
                field,
                needed: 1,
                available: 0,
            });
        }
        Ok(self.buf.get_u8())
    }

    /// Reads one length-prefixed field and returns its raw payload.
    pub fn get_field(&mut self, field: &'static str) -> CodecResult<&'a [u8]> {
        let len = self.get_u8(field)? as usize;
        if self.buf.remaining() < len {
            return Err(CodecError::Truncated {
                field,
                needed: len,
                available: self.buf.remaining(),
            });
        }
        let buf: &'a [u8] = self.buf;
        let (payload, rest) = buf.split_at(len);
        self.buf = rest;
        Ok(payload)
    }

    pub fn get_string(&mut self, field: &'static str) -> CodecResult<String> {
        let payload = self.get_field(field)?;
        std::str::from_utf8(payload)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { field })
    }

    /// An empty field stands for zero; senders leave unused numbers blank.
    pub fn get_int(&mut self, field: &'static str) -> CodecResult<i64> {
        let text = self.get_string(field)?;
        if text.is_empty() {
            return Ok(0);
        }
        text.trim()
            .parse::<i64>()
            .map_err(|_| CodecError::InvalidNumber { field, text })
    }

    pub fn get_float(&mut self, field: &'static str) -> CodecResult<f64> {
        let text = self.get_string(field)?;
        if text.is_empty() {
            return Ok(0.0);
        }
        text.trim()
            .parse::<f64>()
            .map_err(|_| CodecError::InvalidNumber { field, text })
    }
}
