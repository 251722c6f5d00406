//! Logging helpers shared by the engines and the demo binary.

use crate::protocol::Frame;

/// Render a packet as spaced upper-case hex, e.g. `01 03 00 00 00 02 0B C4`.
pub fn format_hex_packet(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Debug-log a frame together with its wire bytes.
pub fn log_frame(direction: &str, frame: &Frame, wire: &[u8]) {
    log::debug!(
        "{} slave={} {} payload={} wire=[{}]",
        direction,
        frame.slave_id,
        frame.function,
        hex::encode_upper(&frame.payload),
        format_hex_packet(wire)
    );
}

/// Initialize `env_logger` once; safe to call repeatedly.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_packet() {
        assert_eq!(format_hex_packet(&[0x01, 0xAB, 0x00]), "01 AB 00");
        assert_eq!(format_hex_packet(&[]), "");
    }
}
