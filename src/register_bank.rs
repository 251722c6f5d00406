//! Fixed-capacity register storage for the slave engine.
//!
//! Four independent banks share one capacity: coils and holding registers
//! are writable over the bus, discrete inputs and input registers are
//! read-only over the bus and fed by the hosting application. Every access
//! is bounds-checked against the capacity; there is no sparse storage and
//! unwritten cells read as zero / false.

use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{words, RegisterAddress, RegisterValue};

/// Default number of cells per bank.
pub const DEFAULT_CAPACITY: u16 = 256;

#[derive(Debug, Clone)]
pub struct RegisterBank {
    capacity: u16,
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<RegisterValue>,
    input_registers: Vec<RegisterValue>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RegisterBank {
    pub fn new(capacity: u16) -> Self {
        let n = capacity as usize;
        Self {
            capacity,
            coils: vec![false; n],
            discrete_inputs: vec![false; n],
            holding_registers: vec![0; n],
            input_registers: vec![0; n],
        }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Range check shared by every accessor; computed in u32 so that
    /// `start + count` cannot wrap.
    fn check_range(&self, start: RegisterAddress, count: u16) -> ModbusResult<()> {
        if count == 0 || start as u32 + count as u32 > self.capacity as u32 {
            return Err(ModbusError::address_out_of_range(start, count, self.capacity));
        }
        Ok(())
    }

    pub fn read_coils(&self, start: RegisterAddress, count: u16) -> ModbusResult<Vec<bool>> {
        self.check_range(start, count)?;
        Ok(self.coils[start as usize..(start + count) as usize].to_vec())
    }

    pub fn read_discrete_inputs(
        &self,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<bool>> {
        self.check_range(start, count)?;
        Ok(self.discrete_inputs[start as usize..(start + count) as usize].to_vec())
    }

    pub fn read_holding_registers(
        &self,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<RegisterValue>> {
        self.check_range(start, count)?;
        Ok(self.holding_registers[start as usize..(start + count) as usize].to_vec())
    }

    pub fn read_input_registers(
        &self,
        start: RegisterAddress,
        count: u16,
    ) -> ModbusResult<Vec<RegisterValue>> {
        self.check_range(start, count)?;
        Ok(self.input_registers[start as usize..(start + count) as usize].to_vec())
    }

    pub fn write_coil(&mut self, address: RegisterAddress, value: bool) -> ModbusResult<()> {
        self.check_range(address, 1)?;
        self.coils[address as usize] = value;
        Ok(())
    }

    pub fn write_coils(&mut self, start: RegisterAddress, values: &[bool]) -> ModbusResult<()> {
        self.check_range(start, values.len() as u16)?;
        self.coils[start as usize..start as usize + values.len()].copy_from_slice(values);
        Ok(())
    }

    pub fn write_holding(
        &mut self,
        address: RegisterAddress,
        value: RegisterValue,
    ) -> ModbusResult<()> {
        self.check_range(address, 1)?;
        self.holding_registers[address as usize] = value;
        Ok(())
    }

    pub fn write_holdings(
        &mut self,
        start: RegisterAddress,
        values: &[RegisterValue],
    ) -> ModbusResult<()> {
        self.check_range(start, values.len() as u16)?;
        self.holding_registers[start as usize..start as usize + values.len()]
            .copy_from_slice(values);
        Ok(())
    }

    /// Application-side setter for a bus-read-only discrete input.
    pub fn set_discrete_input(
        &mut self,
        address: RegisterAddress,
        value: bool,
    ) -> ModbusResult<()> {
        self.check_range(address, 1)?;
        self.discrete_inputs[address as usize] = value;
        Ok(())
    }

    /// Application-side setter for a bus-read-only input register.
    pub fn set_input_register(
        &mut self,
        address: RegisterAddress,
        value: RegisterValue,
    ) -> ModbusResult<()> {
        self.check_range(address, 1)?;
        self.input_registers[address as usize] = value;
        Ok(())
    }

    // Composite accessors over consecutive holding registers, most
    // significant word first.

    pub fn write_u32(&mut self, start: RegisterAddress, value: u32) -> ModbusResult<()> {
        self.write_holdings(start, &words::u32_to_registers(value))
    }

    pub fn read_u32(&self, start: RegisterAddress) -> ModbusResult<u32> {
        let regs = self.read_holding_registers(start, 2)?;
        Ok(words::registers_to_u32([regs[0], regs[1]]))
    }

    pub fn write_i32(&mut self, start: RegisterAddress, value: i32) -> ModbusResult<()> {
        self.write_holdings(start, &words::i32_to_registers(value))
    }

    pub fn read_i32(&self, start: RegisterAddress) -> ModbusResult<i32> {
        Ok(self.read_u32(start)? as i32)
    }

    pub fn write_f32(&mut self, start: RegisterAddress, value: f32) -> ModbusResult<()> {
        self.write_holdings(start, &words::f32_to_registers(value))
    }

    pub fn read_f32(&self, start: RegisterAddress) -> ModbusResult<f32> {
        Ok(f32::from_bits(self.read_u32(start)?))
    }

    pub fn write_f64(&mut self, start: RegisterAddress, value: f64) -> ModbusResult<()> {
        self.write_holdings(start, &words::f64_to_registers(value))
    }

    pub fn read_f64(&self, start: RegisterAddress) -> ModbusResult<f64> {
        let regs = self.read_holding_registers(start, 4)?;
        Ok(words::registers_to_f64([regs[0], regs[1], regs[2], regs[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_initialized() {
        let bank = RegisterBank::default();
        assert_eq!(bank.capacity(), 256);
        assert_eq!(bank.read_holding_registers(0, 4).unwrap(), vec![0; 4]);
        assert_eq!(bank.read_coils(0, 4).unwrap(), vec![false; 4]);
    }

    #[test]
    fn test_read_write_round_trip() {
        let mut bank = RegisterBank::new(16);
        bank.write_holding(3, 0x1234).unwrap();
        bank.write_coil(5, true).unwrap();
        bank.set_input_register(0, 42).unwrap();
        bank.set_discrete_input(1, true).unwrap();

        assert_eq!(bank.read_holding_registers(3, 1).unwrap(), vec![0x1234]);
        assert_eq!(bank.read_coils(4, 2).unwrap(), vec![false, true]);
        assert_eq!(bank.read_input_registers(0, 1).unwrap(), vec![42]);
        assert_eq!(bank.read_discrete_inputs(0, 2).unwrap(), vec![false, true]);
    }

    #[test]
    fn test_range_enforced_without_overflow() {
        let bank = RegisterBank::new(256);
        assert!(bank.read_holding_registers(255, 1).is_ok());
        assert!(matches!(
            bank.read_holding_registers(250, 10),
            Err(ModbusError::AddressOutOfRange { start: 250, count: 10, capacity: 256 })
        ));
        // start + count wraps u16 but must still be rejected.
        assert!(bank.read_coils(0xFFFF, 2).is_err());
    }

    #[test]
    fn test_composite_accessors() {
        let mut bank = RegisterBank::new(32);

        bank.write_f32(4, 61.35).unwrap();
        let regs = bank.read_holding_registers(4, 2).unwrap();
        let bits = 61.35f32.to_bits();
        assert_eq!(regs, vec![(bits >> 16) as u16, bits as u16]);
        assert_eq!(bank.read_f32(4).unwrap(), 61.35);

        bank.write_f64(8, -273.15).unwrap();
        assert_eq!(bank.read_f64(8).unwrap(), -273.15);

        bank.write_i32(12, -100_000).unwrap();
        assert_eq!(bank.read_i32(12).unwrap(), -100_000);

        // A double at the end of the bank must not spill.
        assert!(bank.write_f64(30, 1.0).is_err());
    }
}
