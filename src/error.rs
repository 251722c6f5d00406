//! Error handling for the serial Modbus engine.
//!
//! Every fallible operation in the crate returns [`ModbusResult`]. The error
//! taxonomy follows the protocol layers: transport failures (`Io`, `Timeout`),
//! framing failures (`ShortFrame`, `ChecksumMismatch`, `OddHexLength`,
//! `Frame`), protocol failures (`UnsupportedFunction`, `Protocol`,
//! `PartialWrite`) and register-model failures (`AddressOutOfRange`).
//!
//! The slave engine treats every validation failure as locally recoverable:
//! the offending frame is dropped and the engine waits for the next one. The
//! master engine surfaces every failure to its caller and never retries on
//! its own — retry policy belongs to the host loop.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Errors produced by the frame codec, register model and engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModbusError {
    /// I/O failure reported by the underlying serial transport.
    #[error("I/O error: {message}")]
    Io { message: String },

    /// No response arrived within the caller's wait budget.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Frame shorter than the minimum for its transport mode.
    #[error("Short frame: {len} bytes, need at least {min}")]
    ShortFrame { len: usize, min: usize },

    /// CRC16 (RTU) or LRC (ASCII) disagreement.
    #[error("Checksum mismatch: expected {expected:#06X}, actual {actual:#06X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// ASCII hex body has an odd number of digits.
    #[error("Odd hex length: {len} digits")]
    OddHexLength { len: usize },

    /// Frame structure violation (bad delimiter, bad hex digit, truncated payload).
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Function code outside the supported set {1, 2, 3, 4, 5, 6, 16}.
    #[error("Unsupported function code: {code:#04X}")]
    UnsupportedFunction { code: u8 },

    /// Register access past the end of a bank.
    #[error("Address out of range: start={start}, count={count}, capacity={capacity}")]
    AddressOutOfRange { start: u16, count: u16, capacity: u16 },

    /// Value failed validation before it reached the wire.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Multi-register write echo acknowledged fewer registers than were sent.
    #[error("Partial write: sent {requested} registers, slave acknowledged {acknowledged}")]
    PartialWrite { requested: u16, acknowledged: u16 },

    /// A slave handle with this identifier is already registered.
    #[error("Duplicate slave id: {slave_id}")]
    DuplicateSlaveId { slave_id: u8 },

    /// Protocol-level violation (mismatched echo, busy engine, unknown slave).
    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl ModbusError {
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), timeout_ms }
    }

    pub fn short_frame(len: usize, min: usize) -> Self {
        Self::ShortFrame { len, min }
    }

    pub fn checksum_mismatch(expected: u16, actual: u16) -> Self {
        Self::ChecksumMismatch { expected, actual }
    }

    pub fn frame<S: Into<String>>(message: S) -> Self {
        Self::Frame { message: message.into() }
    }

    pub fn unsupported_function(code: u8) -> Self {
        Self::UnsupportedFunction { code }
    }

    pub fn address_out_of_range(start: u16, count: u16, capacity: u16) -> Self {
        Self::AddressOutOfRange { start, count, capacity }
    }

    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData { message: message.into() }
    }

    pub fn partial_write(requested: u16, acknowledged: u16) -> Self {
        Self::PartialWrite { requested, acknowledged }
    }

    pub fn duplicate_slave_id(slave_id: u8) -> Self {
        Self::DuplicateSlaveId { slave_id }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol { message: message.into() }
    }

    /// Whether a retry of the failed operation could plausibly succeed.
    ///
    /// Timeouts, transient I/O failures and line-noise checksum failures are
    /// retryable; addressing and framing-structure failures are not — they
    /// will recur until the request or the peer changes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Timeout { .. } | Self::ChecksumMismatch { .. }
        )
    }

    /// Whether the error originated in frame or protocol validation rather
    /// than the transport.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ShortFrame { .. }
                | Self::ChecksumMismatch { .. }
                | Self::OddHexLength { .. }
                | Self::Frame { .. }
                | Self::UnsupportedFunction { .. }
                | Self::PartialWrite { .. }
                | Self::Protocol { .. }
        )
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = ModbusError::timeout("awaiting response", 100);
        assert!(err.is_recoverable());
        assert!(!err.is_protocol_error());

        let err = ModbusError::checksum_mismatch(0xC40B, 0xC40C);
        assert!(err.is_recoverable());
        assert!(err.is_protocol_error());

        let err = ModbusError::address_out_of_range(250, 10, 256);
        assert!(!err.is_recoverable());
        assert!(!err.is_protocol_error());
    }

    #[test]
    fn test_error_display() {
        let err = ModbusError::checksum_mismatch(0x1234, 0x5678);
        let msg = format!("{}", err);
        assert!(msg.contains("0x1234"));
        assert!(msg.contains("0x5678"));

        let err = ModbusError::short_frame(3, 6);
        assert_eq!(format!("{}", err), "Short frame: 3 bytes, need at least 6");
    }
}
