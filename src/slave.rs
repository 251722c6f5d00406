//! Slave engine: polls the line, validates requests, serves the bank.
//!
//! `poll()` is the whole engine: one call inspects the line, handles at most
//! one frame and returns. The validation pipeline short-circuits in a fixed
//! order — length, addressee, checksum, function, range — and every failure
//! silently drops the frame, because on a shared bus an invalid or foreign
//! frame must never provoke a response.

use crate::checksum::{crc16, lrc};
use crate::codec::{ascii_body, TransportMode};
use crate::error::ModbusResult;
use crate::logging::format_hex_packet;
use crate::protocol::{words, Frame, FunctionCode, SlaveId};
use crate::register_bank::RegisterBank;
use crate::transport::SerialTransport;

/// Shortest meaningful decoded request: id, function, two address bytes,
/// at least one value byte and a checksum byte.
const MIN_DECODED_REQUEST: usize = 7;

const MAX_FRAME_READ: usize = crate::MAX_ASCII_FRAME_SIZE;

/// What a single [`SlaveEngine::poll`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No bytes were waiting on the line.
    Idle,
    /// A valid request was served and a response written.
    Responded,
    /// A frame was received and discarded without a response.
    Dropped,
}

/// Counters over everything the engine has seen on the line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaveStats {
    pub frames_handled: u64,
    pub frames_dropped: u64,
    pub short_frames: u64,
    pub foreign_frames: u64,
    pub checksum_errors: u64,
    pub unsupported_functions: u64,
    pub address_errors: u64,
}

/// The slave side of the bus: one identity, one transport, one bank.
pub struct SlaveEngine<T: SerialTransport> {
    slave_id: SlaveId,
    mode: TransportMode,
    transport: T,
    bank: RegisterBank,
    stats: SlaveStats,
}

impl<T: SerialTransport> SlaveEngine<T> {
    pub fn new(slave_id: SlaveId, mode: TransportMode, transport: T, bank: RegisterBank) -> Self {
        Self { slave_id, mode, transport, bank, stats: SlaveStats::default() }
    }

    pub fn slave_id(&self) -> SlaveId {
        self.slave_id
    }

    pub fn stats(&self) -> SlaveStats {
        self.stats
    }

    /// The register bank, for application-side reads and sensor updates.
    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut RegisterBank {
        &mut self.bank
    }

    /// Handle at most one waiting request. Never blocks when the line is
    /// silent, never errors on a bad frame; `Err` only surfaces transport
    /// failures.
    pub fn poll(&mut self) -> ModbusResult<PollOutcome> {
        if self.transport.bytes_available() == 0 {
            return Ok(PollOutcome::Idle);
        }
        let raw = self.transport.read(MAX_FRAME_READ)?;

        // ASCII frames are validated over their hex-decoded body so the
        // pipeline below is mode-independent.
        let decoded = match self.mode {
            TransportMode::Rtu => raw.clone(),
            TransportMode::Ascii => match ascii_body(&raw) {
                Ok(body) => body,
                Err(_) => return Ok(self.drop_frame(&raw, "unframeable ASCII")),
            },
        };

        if decoded.len() < MIN_DECODED_REQUEST {
            self.stats.short_frames += 1;
            return Ok(self.drop_frame(&raw, "short frame"));
        }

        if decoded[0] != self.slave_id {
            // Addressed to another slave; stay silent without logging noise.
            self.stats.foreign_frames += 1;
            self.stats.frames_dropped += 1;
            return Ok(PollOutcome::Dropped);
        }

        if !self.checksum_ok(&decoded) {
            self.stats.checksum_errors += 1;
            return Ok(self.drop_frame(&raw, "checksum mismatch"));
        }

        let function = match FunctionCode::from_u8(decoded[1]) {
            Ok(function) => function,
            Err(_) => {
                self.stats.unsupported_functions += 1;
                return Ok(self.drop_frame(&raw, "unsupported function"));
            }
        };

        let start = u16::from_be_bytes([decoded[2], decoded[3]]);
        let count_or_value = u16::from_be_bytes([decoded[4], decoded[5]]);

        if !self.range_ok(function, start, count_or_value) {
            self.stats.address_errors += 1;
            return Ok(self.drop_frame(&raw, "address out of range"));
        }

        match self.dispatch(&raw, &decoded, function, start, count_or_value)? {
            Some(response) => {
                self.transport.write(&response)?;
                self.stats.frames_handled += 1;
                log::debug!(
                    "slave {}: served {} -> [{}]",
                    self.slave_id,
                    function,
                    format_hex_packet(&response)
                );
                Ok(PollOutcome::Responded)
            }
            None => Ok(self.drop_frame(&raw, "malformed request body")),
        }
    }

    fn drop_frame(&mut self, raw: &[u8], reason: &str) -> PollOutcome {
        self.stats.frames_dropped += 1;
        log::debug!(
            "slave {}: dropped frame ({}): [{}]",
            self.slave_id,
            reason,
            format_hex_packet(raw)
        );
        PollOutcome::Dropped
    }

    /// Verify the trailing checksum of a decoded request.
    fn checksum_ok(&self, decoded: &[u8]) -> bool {
        match self.mode {
            TransportMode::Rtu => {
                let (body, check) = decoded.split_at(decoded.len() - 2);
                crc16(body) == u16::from_le_bytes([check[0], check[1]])
            }
            TransportMode::Ascii => {
                let (body, check) = decoded.split_at(decoded.len() - 1);
                lrc(body) == check[0]
            }
        }
    }

    /// Range rule per function: reads and multi-writes bound the whole span;
    /// single writes carry a value word, not a count, so only the address
    /// itself is checked.
    fn range_ok(&self, function: FunctionCode, start: u16, count_or_value: u16) -> bool {
        let capacity = self.bank.capacity() as u32;
        match function {
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {
                (start as u32) < capacity
            }
            _ => {
                count_or_value > 0 && start as u32 + count_or_value as u32 <= capacity
            }
        }
    }

    /// Execute a validated request and build the wire response, or `None`
    /// when the request body is structurally inconsistent.
    fn dispatch(
        &mut self,
        raw: &[u8],
        decoded: &[u8],
        function: FunctionCode,
        start: u16,
        count_or_value: u16,
    ) -> ModbusResult<Option<Vec<u8>>> {
        let response = match function {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
                let bits = if function == FunctionCode::ReadCoils {
                    self.bank.read_coils(start, count_or_value)?
                } else {
                    self.bank.read_discrete_inputs(start, count_or_value)?
                };
                let packed = words::pack_bits(&bits);
                let mut payload = Vec::with_capacity(1 + packed.len());
                payload.push(packed.len() as u8);
                payload.extend_from_slice(&packed);
                self.mode
                    .encode(&Frame::new(self.slave_id, function, payload))
            }
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                let registers = if function == FunctionCode::ReadHoldingRegisters {
                    self.bank.read_holding_registers(start, count_or_value)?
                } else {
                    self.bank.read_input_registers(start, count_or_value)?
                };
                let data = words::registers_to_bytes(&registers);
                let mut payload = Vec::with_capacity(1 + data.len());
                payload.push(data.len() as u8);
                payload.extend_from_slice(&data);
                self.mode
                    .encode(&Frame::new(self.slave_id, function, payload))
            }
            FunctionCode::WriteSingleCoil => {
                self.bank.write_coil(start, count_or_value != 0)?;
                // Single writes echo the request frame verbatim.
                raw.to_vec()
            }
            FunctionCode::WriteSingleRegister => {
                self.bank.write_holding(start, count_or_value)?;
                raw.to_vec()
            }
            FunctionCode::WriteMultipleRegisters => {
                // decoded: id fc addr_hi addr_lo cnt_hi cnt_lo byte_count data... checksum
                let checksum_len = match self.mode {
                    TransportMode::Rtu => 2,
                    TransportMode::Ascii => 1,
                };
                let byte_count = decoded[6] as usize;
                let data_end = 7 + byte_count;
                if byte_count != count_or_value as usize * 2
                    || decoded.len() < data_end + checksum_len
                {
                    return Ok(None);
                }
                let values = words::bytes_to_registers(&decoded[7..data_end]);
                self.bank.write_holdings(start, &values)?;
                let mut payload = Vec::with_capacity(4);
                payload.extend_from_slice(&start.to_be_bytes());
                payload.extend_from_slice(&count_or_value.to_be_bytes());
                self.mode
                    .encode(&Frame::new(self.slave_id, function, payload))
            }
        };
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_rtu, encode_rtu};
    use crate::transport::MockSerial;

    fn rtu_engine() -> (SlaveEngine<MockSerial>, MockSerial) {
        let (slave_end, line) = MockSerial::pair();
        let engine = SlaveEngine::new(1, TransportMode::Rtu, slave_end, RegisterBank::new(256));
        (engine, line)
    }

    fn send(line: &mut MockSerial, frame: &Frame) {
        line.write(&encode_rtu(frame)).unwrap();
    }

    #[test]
    fn test_idle_when_line_silent() {
        let (mut engine, _line) = rtu_engine();
        assert_eq!(engine.poll().unwrap(), PollOutcome::Idle);
        assert_eq!(engine.stats(), SlaveStats::default());
    }

    #[test]
    fn test_single_register_write_echoes_request() {
        let (mut engine, mut line) = rtu_engine();
        let request = Frame::write_single(1, FunctionCode::WriteSingleRegister, 0, 0x1234);
        send(&mut line, &request);

        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        let echo = line.read(64).unwrap();
        assert_eq!(echo, encode_rtu(&request));
        assert_eq!(
            engine.bank().read_holding_registers(0, 1).unwrap(),
            vec![0x1234]
        );
    }

    #[test]
    fn test_coil_write_any_nonzero_sets() {
        let (mut engine, mut line) = rtu_engine();
        send(&mut line, &Frame::write_single(1, FunctionCode::WriteSingleCoil, 3, 0xFF00));
        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        line.read(64).unwrap();
        assert_eq!(engine.bank().read_coils(3, 1).unwrap(), vec![true]);

        send(&mut line, &Frame::write_single(1, FunctionCode::WriteSingleCoil, 3, 0x0000));
        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        line.read(64).unwrap();
        assert_eq!(engine.bank().read_coils(3, 1).unwrap(), vec![false]);
    }

    #[test]
    fn test_read_registers_response() {
        let (mut engine, mut line) = rtu_engine();
        engine.bank_mut().write_holdings(4, &[0x1111, 0x2222]).unwrap();
        send(&mut line, &Frame::read_request(1, FunctionCode::ReadHoldingRegisters, 4, 2));

        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        let response = decode_rtu(&line.read(64).unwrap()).unwrap();
        assert_eq!(response.slave_id, 1);
        assert_eq!(response.parse_registers().unwrap(), vec![0x1111, 0x2222]);
    }

    #[test]
    fn test_read_coils_packs_lsb_first() {
        let (mut engine, mut line) = rtu_engine();
        engine.bank_mut().write_coil(0, true).unwrap();
        engine.bank_mut().write_coil(2, true).unwrap();
        send(&mut line, &Frame::read_request(1, FunctionCode::ReadCoils, 0, 10));

        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        let response = decode_rtu(&line.read(64).unwrap()).unwrap();
        // 10 coils pack into 2 bytes; bits 0 and 2 set.
        assert_eq!(response.payload, vec![0x02, 0x05, 0x00]);
    }

    #[test]
    fn test_multi_register_write_acknowledges_span() {
        let (mut engine, mut line) = rtu_engine();
        send(&mut line, &Frame::write_multiple(1, 10, &[0xAAAA, 0xBBBB, 0xCCCC]));

        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        let response = decode_rtu(&line.read(64).unwrap()).unwrap();
        assert_eq!(response.function, FunctionCode::WriteMultipleRegisters);
        assert_eq!(response.payload, vec![0x00, 0x0A, 0x00, 0x03]);
        assert_eq!(
            engine.bank().read_holding_registers(10, 3).unwrap(),
            vec![0xAAAA, 0xBBBB, 0xCCCC]
        );
    }

    #[test]
    fn test_foreign_frame_ignored_silently() {
        let (mut engine, mut line) = rtu_engine();
        send(&mut line, &Frame::read_request(2, FunctionCode::ReadHoldingRegisters, 0, 1));

        assert_eq!(engine.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(line.bytes_available(), 0);
        assert_eq!(engine.stats().foreign_frames, 1);
    }

    #[test]
    fn test_corrupted_frame_dropped() {
        let (mut engine, mut line) = rtu_engine();
        let mut bytes = encode_rtu(&Frame::read_request(1, FunctionCode::ReadHoldingRegisters, 0, 1));
        bytes[4] ^= 0x80;
        line.write(&bytes).unwrap();

        assert_eq!(engine.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(line.bytes_available(), 0);
        assert_eq!(engine.stats().checksum_errors, 1);
    }

    #[test]
    fn test_out_of_range_read_dropped() {
        let (mut engine, mut line) = rtu_engine();
        send(&mut line, &Frame::read_request(1, FunctionCode::ReadHoldingRegisters, 250, 10));

        assert_eq!(engine.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(line.bytes_available(), 0);
        assert_eq!(engine.stats().address_errors, 1);
    }

    #[test]
    fn test_short_frame_dropped() {
        let (mut engine, mut line) = rtu_engine();
        line.write(&[0x01, 0x03, 0x00]).unwrap();
        assert_eq!(engine.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(engine.stats().short_frames, 1);
    }

    #[test]
    fn test_unsupported_function_dropped() {
        let (mut engine, mut line) = rtu_engine();
        // 0x0F (write multiple coils) is outside the supported set.
        let mut body = vec![0x01, 0x0F, 0x00, 0x00, 0x00, 0x08, 0x01, 0xFF];
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        line.write(&body).unwrap();

        assert_eq!(engine.poll().unwrap(), PollOutcome::Dropped);
        assert_eq!(line.bytes_available(), 0);
        assert_eq!(engine.stats().unsupported_functions, 1);
    }

    #[test]
    fn test_ascii_round_trip() {
        let (slave_end, mut line) = MockSerial::pair();
        let mut engine =
            SlaveEngine::new(1, TransportMode::Ascii, slave_end, RegisterBank::new(256));
        engine.bank_mut().write_holding(0, 0xBEEF).unwrap();

        let request = Frame::read_request(1, FunctionCode::ReadHoldingRegisters, 0, 1);
        line.write(&crate::codec::encode_ascii(&request)).unwrap();

        assert_eq!(engine.poll().unwrap(), PollOutcome::Responded);
        let raw = line.read(64).unwrap();
        assert_eq!(raw[0], b':');
        let response = crate::codec::decode_ascii(&raw).unwrap();
        assert_eq!(response.parse_registers().unwrap(), vec![0xBEEF]);
    }
}
