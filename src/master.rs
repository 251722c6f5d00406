//! Master engine: issues requests and correlates responses.
//!
//! The engine is strictly synchronous and single-outstanding: one request
//! per slave handle at a time, with a bounded busy-wait for the response.
//! Each registered slave owns its transport and framing mode, so one engine
//! can drive an RTU device and an ASCII device side by side.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use crate::codec::TransportMode;
use crate::error::{ModbusError, ModbusResult};
use crate::logging::log_frame;
use crate::protocol::{words, Frame, FunctionCode, RegisterAddress, RegisterValue, SlaveId};
use crate::transport::SerialTransport;

/// Default bounded wait for a response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest response the engine will pull off the line in one read.
const MAX_FRAME_READ: usize = crate::MAX_ASCII_FRAME_SIZE;

/// Settle delay after the first response bytes arrive, letting the rest of
/// the frame trickle in at line speed.
const SETTLE_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MasterState {
    Idle,
    AwaitingResponse,
}

/// One registered slave: its transport, framing mode and wait budget.
pub struct SlaveHandle {
    slave_id: SlaveId,
    transport: Box<dyn SerialTransport>,
    mode: TransportMode,
    response_timeout: Duration,
    state: MasterState,
}

impl SlaveHandle {
    pub fn new(slave_id: SlaveId, transport: Box<dyn SerialTransport>, mode: TransportMode) -> Self {
        Self {
            slave_id,
            transport,
            mode,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            state: MasterState::Idle,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn slave_id(&self) -> SlaveId {
        self.slave_id
    }
}

/// Cumulative counters across all handles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MasterStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub checksum_errors: u64,
}

/// The master side of the bus.
pub struct MasterEngine {
    slaves: HashMap<SlaveId, SlaveHandle>,
    stats: MasterStats,
}

impl Default for MasterEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterEngine {
    pub fn new() -> Self {
        Self { slaves: HashMap::new(), stats: MasterStats::default() }
    }

    /// Register a slave handle. A second handle with the same id is
    /// rejected and the existing registration is kept.
    pub fn add_slave(&mut self, handle: SlaveHandle) -> ModbusResult<()> {
        let id = handle.slave_id;
        if self.slaves.contains_key(&id) {
            return Err(ModbusError::duplicate_slave_id(id));
        }
        log::info!("Registered slave {} ({:?})", id, handle.mode);
        self.slaves.insert(id, handle);
        Ok(())
    }

    pub fn remove_slave(&mut self, slave_id: SlaveId) -> Option<SlaveHandle> {
        self.slaves.remove(&slave_id)
    }

    pub fn stats(&self) -> MasterStats {
        self.stats
    }

    /// Send a request to a registered slave and wait for its response.
    ///
    /// Validates that the response comes from the addressed slave with the
    /// requested function code; payload interpretation is up to the caller.
    pub fn transact(&mut self, slave_id: SlaveId, request: Frame) -> ModbusResult<Frame> {
        let handle = self
            .slaves
            .get_mut(&slave_id)
            .ok_or_else(|| ModbusError::protocol(format!("slave {} is not registered", slave_id)))?;
        if handle.state != MasterState::Idle {
            return Err(ModbusError::protocol(format!(
                "slave {} already has a request in flight",
                slave_id
            )));
        }

        handle.state = MasterState::AwaitingResponse;
        self.stats.requests_sent += 1;
        let result = Self::exchange(handle, &request);
        handle.state = MasterState::Idle;

        match &result {
            Ok(_) => self.stats.responses_received += 1,
            Err(ModbusError::Timeout { .. }) => self.stats.timeouts += 1,
            Err(ModbusError::ChecksumMismatch { .. }) => self.stats.checksum_errors += 1,
            Err(_) => {}
        }

        let response = result?;
        if response.slave_id != slave_id {
            return Err(ModbusError::protocol(format!(
                "response from slave {} while awaiting slave {}",
                response.slave_id, slave_id
            )));
        }
        if response.function != request.function {
            return Err(ModbusError::protocol(format!(
                "response function {} does not echo request {}",
                response.function, request.function
            )));
        }
        Ok(response)
    }

    /// One request/response exchange on a single handle.
    fn exchange(handle: &mut SlaveHandle, request: &Frame) -> ModbusResult<Frame> {
        // Flush stale bytes left over from a previous timed-out exchange.
        let stale = handle.transport.bytes_available();
        if stale > 0 {
            let dropped = handle.transport.read(stale)?;
            log::warn!(
                "slave {}: discarded {} stale bytes before request",
                handle.slave_id,
                dropped.len()
            );
        }

        let wire = handle.mode.encode(request);
        log_frame("TX", request, &wire);
        handle.transport.write(&wire)?;

        // Bounded wait for the first response bytes.
        let deadline = Instant::now() + handle.response_timeout;
        while handle.transport.bytes_available() == 0 {
            if Instant::now() >= deadline {
                return Err(ModbusError::timeout(
                    format!("awaiting {} response from slave {}", request.function, handle.slave_id),
                    handle.response_timeout.as_millis() as u64,
                ));
            }
            thread::sleep(Duration::from_millis(1));
        }

        // Wait until the byte count stops growing so a frame is not split.
        let mut seen = handle.transport.bytes_available();
        loop {
            thread::sleep(SETTLE_INTERVAL);
            let now = handle.transport.bytes_available();
            if now == seen {
                break;
            }
            seen = now;
        }

        let raw = handle.transport.read(MAX_FRAME_READ)?;
        let response = handle.mode.decode(&raw)?;
        log_frame("RX", &response, &raw);
        Ok(response)
    }

    // Raw bus operations.

    fn check_bit_count(count: u16) -> ModbusResult<()> {
        if count == 0 || count > crate::MAX_COILS_PER_REQUEST {
            return Err(ModbusError::invalid_data(format!(
                "coil count {} outside 1..={}",
                count,
                crate::MAX_COILS_PER_REQUEST
            )));
        }
        Ok(())
    }

    fn check_register_count(count: u16) -> ModbusResult<()> {
        if count == 0 || count > crate::MAX_REGISTERS_PER_REQUEST {
            return Err(ModbusError::invalid_data(format!(
                "register count {} outside 1..={}",
                count,
                crate::MAX_REGISTERS_PER_REQUEST
            )));
        }
        Ok(())
    }

    pub fn read_coils(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        Self::check_bit_count(count)?;
        let request = Frame::read_request(slave_id, FunctionCode::ReadCoils, start, count);
        self.transact(slave_id, request)?.parse_bits(count)
    }

    pub fn read_discrete_inputs(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        Self::check_bit_count(count)?;
        let request = Frame::read_request(slave_id, FunctionCode::ReadDiscreteInputs, start, count);
        self.transact(slave_id, request)?.parse_bits(count)
    }

    pub fn read_holding_registers(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<RegisterValue>> {
        Self::check_register_count(count)?;
        let request =
            Frame::read_request(slave_id, FunctionCode::ReadHoldingRegisters, start, count);
        self.transact(slave_id, request)?.parse_registers()
    }

    pub fn read_input_registers(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<RegisterValue>> {
        Self::check_register_count(count)?;
        let request = Frame::read_request(slave_id, FunctionCode::ReadInputRegisters, start, count);
        self.transact(slave_id, request)?.parse_registers()
    }

    pub fn write_single_coil(
        &mut self,
        slave_id: SlaveId,
        address: RegisterAddress,
        value: bool,
    ) -> ModbusResult<()> {
        let word = if value { 0xFF00 } else { 0x0000 };
        let request = Frame::write_single(slave_id, FunctionCode::WriteSingleCoil, address, word);
        let response = self.transact(slave_id, request.clone())?;
        Self::check_echo(&request, &response)
    }

    pub fn write_single_register(
        &mut self,
        slave_id: SlaveId,
        address: RegisterAddress,
        value: RegisterValue,
    ) -> ModbusResult<()> {
        let request =
            Frame::write_single(slave_id, FunctionCode::WriteSingleRegister, address, value);
        let response = self.transact(slave_id, request.clone())?;
        Self::check_echo(&request, &response)
    }

    pub fn write_multiple_registers(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        values: &[RegisterValue],
    ) -> ModbusResult<()> {
        let requested = values.len() as u16;
        Self::check_register_count(requested)?;
        let request = Frame::write_multiple(slave_id, start, values);
        let response = self.transact(slave_id, request)?;
        if response.payload.len() < 4 {
            return Err(ModbusError::frame(
                "write-multiple acknowledgement payload too short",
            ));
        }
        let echoed_start = u16::from_be_bytes([response.payload[0], response.payload[1]]);
        let acknowledged = u16::from_be_bytes([response.payload[2], response.payload[3]]);
        if echoed_start != start {
            return Err(ModbusError::protocol(format!(
                "write-multiple acknowledged address {} instead of {}",
                echoed_start, start
            )));
        }
        if acknowledged != requested {
            return Err(ModbusError::partial_write(requested, acknowledged));
        }
        Ok(())
    }

    fn check_echo(request: &Frame, response: &Frame) -> ModbusResult<()> {
        if response.payload != request.payload {
            return Err(ModbusError::protocol(format!(
                "single-write echo mismatch: sent {}, got {}",
                hex::encode_upper(&request.payload),
                hex::encode_upper(&response.payload)
            )));
        }
        Ok(())
    }

    // Typed helpers over the raw operations.

    /// Write one 16-bit register.
    pub fn write_integer(
        &mut self,
        slave_id: SlaveId,
        address: RegisterAddress,
        value: u16,
    ) -> ModbusResult<()> {
        self.write_single_register(slave_id, address, value)
    }

    /// Write a 32-bit signed integer as two single-register writes,
    /// most significant word first.
    pub fn write_long(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        value: i32,
    ) -> ModbusResult<()> {
        let regs = words::i32_to_registers(value);
        self.write_single_register(slave_id, start, regs[0])?;
        self.write_single_register(slave_id, start + 1, regs[1])
    }

    pub fn read_long(&mut self, slave_id: SlaveId, start: RegisterAddress) -> ModbusResult<i32> {
        let regs = self.read_holding_registers(slave_id, start, 2)?;
        Ok(words::registers_to_i32([regs[0], regs[1]]))
    }

    /// Write an IEEE-754 binary32 value into two consecutive registers.
    pub fn write_float(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        value: f32,
    ) -> ModbusResult<()> {
        self.write_multiple_registers(slave_id, start, &words::f32_to_registers(value))
    }

    pub fn read_float(&mut self, slave_id: SlaveId, start: RegisterAddress) -> ModbusResult<f32> {
        let regs = self.read_holding_registers(slave_id, start, 2)?;
        Ok(words::registers_to_f32([regs[0], regs[1]]))
    }

    /// Write an IEEE-754 binary64 value into four consecutive registers.
    pub fn write_double(
        &mut self,
        slave_id: SlaveId,
        start: RegisterAddress,
        value: f64,
    ) -> ModbusResult<()> {
        self.write_multiple_registers(slave_id, start, &words::f64_to_registers(value))
    }

    pub fn read_double(&mut self, slave_id: SlaveId, start: RegisterAddress) -> ModbusResult<f64> {
        let regs = self.read_holding_registers(slave_id, start, 4)?;
        Ok(words::registers_to_f64([regs[0], regs[1], regs[2], regs[3]]))
    }
}
