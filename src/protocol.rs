//! Protocol types: function codes, frames and register/word conversions.
//!
//! A [`Frame`] is the transport-independent unit the codec encodes and
//! decodes: slave id, function code and the function-specific payload. The
//! [`words`] module holds the pure conversions between application values and
//! big-endian register words.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModbusError, ModbusResult};

/// Slave (unit) identifier on the shared serial bus.
pub type SlaveId = u8;

/// Register or coil address within a bank.
pub type RegisterAddress = u16;

/// A single 16-bit register value.
pub type RegisterValue = u16;

/// The supported Modbus function codes.
///
/// This is a closed set; any other code on the wire decodes to
/// [`ModbusError::UnsupportedFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionCode {
    /// 0x01 — read coil bits.
    ReadCoils,
    /// 0x02 — read discrete input bits.
    ReadDiscreteInputs,
    /// 0x03 — read holding registers.
    ReadHoldingRegisters,
    /// 0x04 — read input registers.
    ReadInputRegisters,
    /// 0x05 — write a single coil.
    WriteSingleCoil,
    /// 0x06 — write a single holding register.
    WriteSingleRegister,
    /// 0x10 — write multiple holding registers.
    WriteMultipleRegisters,
}

impl FunctionCode {
    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            0x01 => Ok(Self::ReadCoils),
            0x02 => Ok(Self::ReadDiscreteInputs),
            0x03 => Ok(Self::ReadHoldingRegisters),
            0x04 => Ok(Self::ReadInputRegisters),
            0x05 => Ok(Self::WriteSingleCoil),
            0x06 => Ok(Self::WriteSingleRegister),
            0x10 => Ok(Self::WriteMultipleRegisters),
            other => Err(ModbusError::unsupported_function(other)),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleRegisters => 0x10,
        }
    }

    pub fn is_read_function(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }

    pub fn is_write_function(self) -> bool {
        !self.is_read_function()
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadCoils => "ReadCoils",
            Self::ReadDiscreteInputs => "ReadDiscreteInputs",
            Self::ReadHoldingRegisters => "ReadHoldingRegisters",
            Self::ReadInputRegisters => "ReadInputRegisters",
            Self::WriteSingleCoil => "WriteSingleCoil",
            Self::WriteSingleRegister => "WriteSingleRegister",
            Self::WriteMultipleRegisters => "WriteMultipleRegisters",
        };
        write!(f, "{}({:#04X})", name, self.to_u8())
    }
}

/// A decoded Modbus frame, before checksums and transport framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub slave_id: SlaveId,
    pub function: FunctionCode,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(slave_id: SlaveId, function: FunctionCode, payload: Vec<u8>) -> Self {
        Self { slave_id, function, payload }
    }

    /// Read request: `start` and `count` as big-endian words.
    pub fn read_request(
        slave_id: SlaveId,
        function: FunctionCode,
        start: RegisterAddress,
        count: u16,
    ) -> Self {
        let mut payload = Vec::with_capacity(4);
        payload.extend_from_slice(&start.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());
        Self::new(slave_id, function, payload)
    }

    /// Single-write request (fc 0x05 / 0x06): address and value words.
    pub fn write_single(
        slave_id: SlaveId,
        function: FunctionCode,
        address: RegisterAddress,
        value: u16,
    ) -> Self {
        // Same wire layout as a read request.
        Self::read_request(slave_id, function, address, value)
    }

    /// Multi-register write request (fc 0x10): address, register count,
    /// byte count, then the register words.
    pub fn write_multiple(
        slave_id: SlaveId,
        start: RegisterAddress,
        values: &[RegisterValue],
    ) -> Self {
        let count = values.len() as u16;
        let mut payload = Vec::with_capacity(5 + values.len() * 2);
        payload.extend_from_slice(&start.to_be_bytes());
        payload.extend_from_slice(&count.to_be_bytes());
        payload.push((values.len() * 2) as u8);
        for value in values {
            payload.extend_from_slice(&value.to_be_bytes());
        }
        Self::new(slave_id, FunctionCode::WriteMultipleRegisters, payload)
    }

    /// Parse a read-response payload: leading byte count, then big-endian
    /// register words.
    pub fn parse_registers(&self) -> ModbusResult<Vec<RegisterValue>> {
        if self.payload.is_empty() {
            return Err(ModbusError::frame("register response has empty payload"));
        }
        let byte_count = self.payload[0] as usize;
        let data = &self.payload[1..];
        if data.len() < byte_count || byte_count % 2 != 0 {
            return Err(ModbusError::frame(format!(
                "register response byte count {} does not match payload length {}",
                byte_count,
                data.len()
            )));
        }
        Ok(words::bytes_to_registers(&data[..byte_count]))
    }

    /// Parse a bit-read response payload into `count` booleans.
    pub fn parse_bits(&self, count: u16) -> ModbusResult<Vec<bool>> {
        if self.payload.is_empty() {
            return Err(ModbusError::frame("bit response has empty payload"));
        }
        let byte_count = self.payload[0] as usize;
        let needed = (count as usize + 7) / 8;
        let data = &self.payload[1..];
        if byte_count < needed || data.len() < byte_count {
            return Err(ModbusError::frame(format!(
                "bit response carries {} bytes, {} bits requested",
                byte_count, count
            )));
        }
        Ok(words::unpack_bits(&data[..byte_count], count as usize))
    }
}

/// Conversions between application values and register words.
///
/// Composite values span consecutive registers with the most significant
/// word first; within a register the wire order is big-endian.
pub mod words {
    use super::RegisterValue;

    pub fn registers_to_bytes(registers: &[RegisterValue]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(registers.len() * 2);
        for reg in registers {
            bytes.extend_from_slice(&reg.to_be_bytes());
        }
        bytes
    }

    pub fn bytes_to_registers(bytes: &[u8]) -> Vec<RegisterValue> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Pack booleans 8 per byte, least significant bit first.
    pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
        let mut bytes = vec![0u8; (bits.len() + 7) / 8];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    }

    pub fn unpack_bits(bytes: &[u8], count: usize) -> Vec<bool> {
        (0..count)
            .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
            .collect()
    }

    pub fn u32_to_registers(value: u32) -> [RegisterValue; 2] {
        [(value >> 16) as u16, value as u16]
    }

    pub fn registers_to_u32(registers: [RegisterValue; 2]) -> u32 {
        ((registers[0] as u32) << 16) | registers[1] as u32
    }

    pub fn i32_to_registers(value: i32) -> [RegisterValue; 2] {
        u32_to_registers(value as u32)
    }

    pub fn registers_to_i32(registers: [RegisterValue; 2]) -> i32 {
        registers_to_u32(registers) as i32
    }

    pub fn f32_to_registers(value: f32) -> [RegisterValue; 2] {
        u32_to_registers(value.to_bits())
    }

    pub fn registers_to_f32(registers: [RegisterValue; 2]) -> f32 {
        f32::from_bits(registers_to_u32(registers))
    }

    pub fn f64_to_registers(value: f64) -> [RegisterValue; 4] {
        let bits = value.to_bits();
        [
            (bits >> 48) as u16,
            (bits >> 32) as u16,
            (bits >> 16) as u16,
            bits as u16,
        ]
    }

    pub fn registers_to_f64(registers: [RegisterValue; 4]) -> f64 {
        let bits = ((registers[0] as u64) << 48)
            | ((registers[1] as u64) << 32)
            | ((registers[2] as u64) << 16)
            | registers[3] as u64;
        f64::from_bits(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_code_round_trip() {
        for code in [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x10] {
            let function = FunctionCode::from_u8(code).unwrap();
            assert_eq!(function.to_u8(), code);
        }
        assert!(matches!(
            FunctionCode::from_u8(0x0F),
            Err(ModbusError::UnsupportedFunction { code: 0x0F })
        ));
    }

    #[test]
    fn test_read_request_layout() {
        let frame = Frame::read_request(0x01, FunctionCode::ReadHoldingRegisters, 0x0010, 3);
        assert_eq!(frame.payload, vec![0x00, 0x10, 0x00, 0x03]);
    }

    #[test]
    fn test_write_multiple_layout() {
        let frame = Frame::write_multiple(0x01, 0x0004, &[0x1234, 0x5678]);
        assert_eq!(
            frame.payload,
            vec![0x00, 0x04, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn test_parse_registers() {
        let frame = Frame::new(
            0x01,
            FunctionCode::ReadHoldingRegisters,
            vec![0x04, 0x12, 0x34, 0x56, 0x78],
        );
        assert_eq!(frame.parse_registers().unwrap(), vec![0x1234, 0x5678]);

        let bad = Frame::new(0x01, FunctionCode::ReadHoldingRegisters, vec![0x06, 0x00]);
        assert!(bad.parse_registers().is_err());
    }

    #[test]
    fn test_parse_bits() {
        // 10 bits: 1,0,1,1,0,0,0,0 | 1,1 -> bytes [0x0D, 0x03]
        let frame = Frame::new(0x01, FunctionCode::ReadCoils, vec![0x02, 0x0D, 0x03]);
        let bits = frame.parse_bits(10).unwrap();
        assert_eq!(
            bits,
            vec![true, false, true, true, false, false, false, false, true, true]
        );
    }

    #[test]
    fn test_bit_packing_lsb_first() {
        let bits = [true, false, false, false, false, false, false, false, true];
        assert_eq!(words::pack_bits(&bits), vec![0x01, 0x01]);
        assert_eq!(words::unpack_bits(&[0x01, 0x01], 9), bits.to_vec());
    }

    #[test]
    fn test_composite_word_order() {
        assert_eq!(words::u32_to_registers(0x12345678), [0x1234, 0x5678]);
        assert_eq!(words::registers_to_u32([0x1234, 0x5678]), 0x12345678);

        assert_eq!(words::i32_to_registers(-1), [0xFFFF, 0xFFFF]);
        assert_eq!(words::registers_to_i32([0xFFFF, 0xFFFF]), -1);

        let regs = words::f32_to_registers(61.35);
        let bits = 61.35f32.to_bits();
        assert_eq!(regs, [(bits >> 16) as u16, bits as u16]);
        assert_eq!(words::registers_to_f32(regs), 61.35);

        let regs = words::f64_to_registers(-273.15);
        assert_eq!(words::registers_to_f64(regs), -273.15);
    }
}
