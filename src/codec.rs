//! RTU and ASCII frame codecs.
//!
//! RTU is the binary framing: `slave_id | function | payload | crc_lo |
//! crc_hi`. ASCII is the text framing: a `:` start delimiter, the same binary
//! body plus an LRC rendered as upper-case hex pairs, and a CR LF terminator.
//! Both directions go through [`Frame`] so the engines never touch wire bytes
//! directly.

use serde::{Deserialize, Serialize};

use crate::checksum::{crc16, lrc};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{Frame, FunctionCode};

/// Minimum RTU frame: id, function, two payload bytes are not required, but
/// a frame must at least carry id, function and the two CRC bytes plus two
/// address/value bytes to mean anything.
pub const MIN_RTU_FRAME: usize = 6;

/// Minimum ASCII frame: `:` + two hex pairs (id, function) + LRC pair + CRLF
/// plus at least one payload pair.
pub const MIN_ASCII_FRAME: usize = 11;

const ASCII_START: u8 = b':';
const ASCII_TRAILER: &[u8] = b"\r\n";

/// Wire framing selected per engine; both ends of a link must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportMode {
    /// Binary framing with CRC16.
    Rtu,
    /// Hex-text framing with LRC.
    Ascii,
}

impl TransportMode {
    pub fn encode(self, frame: &Frame) -> Vec<u8> {
        match self {
            Self::Rtu => encode_rtu(frame),
            Self::Ascii => encode_ascii(frame),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> ModbusResult<Frame> {
        match self {
            Self::Rtu => decode_rtu(bytes),
            Self::Ascii => decode_ascii(bytes),
        }
    }
}

pub fn encode_rtu(frame: &Frame) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + frame.payload.len());
    bytes.push(frame.slave_id);
    bytes.push(frame.function.to_u8());
    bytes.extend_from_slice(&frame.payload);
    let crc = crc16(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes
}

pub fn decode_rtu(bytes: &[u8]) -> ModbusResult<Frame> {
    if bytes.len() < MIN_RTU_FRAME {
        return Err(ModbusError::short_frame(bytes.len(), MIN_RTU_FRAME));
    }
    let (body, check) = bytes.split_at(bytes.len() - 2);
    let expected = crc16(body);
    let actual = u16::from_le_bytes([check[0], check[1]]);
    if expected != actual {
        return Err(ModbusError::checksum_mismatch(expected, actual));
    }
    let function = FunctionCode::from_u8(body[1])?;
    Ok(Frame::new(body[0], function, body[2..].to_vec()))
}

pub fn encode_ascii(frame: &Frame) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + frame.payload.len());
    body.push(frame.slave_id);
    body.push(frame.function.to_u8());
    body.extend_from_slice(&frame.payload);
    let check = lrc(&body);
    body.push(check);

    let mut bytes = Vec::with_capacity(3 + body.len() * 2 + 2);
    bytes.push(ASCII_START);
    bytes.extend_from_slice(hex::encode_upper(&body).as_bytes());
    bytes.extend_from_slice(ASCII_TRAILER);
    bytes
}

pub fn decode_ascii(bytes: &[u8]) -> ModbusResult<Frame> {
    let body = ascii_body(bytes)?;
    if body.len() < 3 {
        return Err(ModbusError::short_frame(body.len(), 3));
    }
    let (data, check) = body.split_at(body.len() - 1);
    let expected = lrc(data);
    if expected != check[0] {
        return Err(ModbusError::checksum_mismatch(
            expected as u16,
            check[0] as u16,
        ));
    }
    let function = FunctionCode::from_u8(data[1])?;
    Ok(Frame::new(data[0], function, data[2..].to_vec()))
}

/// Strip the ASCII delimiters and hex-decode the body, LRC byte included.
///
/// The slave engine runs its validation pipeline over the decoded bytes, so
/// this step is exposed separately from the full [`decode_ascii`].
pub fn ascii_body(bytes: &[u8]) -> ModbusResult<Vec<u8>> {
    if bytes.len() < MIN_ASCII_FRAME {
        return Err(ModbusError::short_frame(bytes.len(), MIN_ASCII_FRAME));
    }
    if bytes[0] != ASCII_START {
        return Err(ModbusError::frame("missing ':' start delimiter"));
    }
    if &bytes[bytes.len() - 2..] != ASCII_TRAILER {
        return Err(ModbusError::frame("missing CR LF terminator"));
    }
    let digits = &bytes[1..bytes.len() - 2];
    if digits.len() % 2 != 0 {
        return Err(ModbusError::OddHexLength { len: digits.len() });
    }
    // Lower-case digits are tolerated on receive; encode always emits upper.
    hex::decode(digits).map_err(|e| ModbusError::frame(format!("bad hex digit: {}", e)))
}
