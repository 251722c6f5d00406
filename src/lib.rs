//! Modbus RTU/ASCII serial master and slave engines.
//!
//! The crate splits the protocol into layers: [`checksum`] and [`codec`]
//! handle wire framing, [`protocol`] the frame and word model,
//! [`register_bank`] the slave-side data model, and [`master`] / [`slave`]
//! the two engine roles. Transports are pluggable through
//! [`transport::SerialTransport`]; a real port adapter and an in-memory mock
//! pair ship with the crate.
//!
//! # Quick start
//!
//! Wire a master and a slave back to back over the mock pair:
//!
//! ```
//! use modbus_serial::codec::TransportMode;
//! use modbus_serial::master::{MasterEngine, SlaveHandle};
//! use modbus_serial::register_bank::RegisterBank;
//! use modbus_serial::slave::SlaveEngine;
//! use modbus_serial::transport::MockSerial;
//!
//! # fn main() -> modbus_serial::ModbusResult<()> {
//! let (master_end, slave_end) = MockSerial::pair();
//! let mut slave = SlaveEngine::new(1, TransportMode::Rtu, slave_end, RegisterBank::new(256));
//! let mut master = MasterEngine::new();
//! master.add_slave(SlaveHandle::new(1, Box::new(master_end), TransportMode::Rtu))?;
//!
//! // Serve the request from a second thread, as a device on the bus would.
//! let server = std::thread::spawn(move || {
//!     loop {
//!         if slave.poll().unwrap() != modbus_serial::slave::PollOutcome::Idle {
//!             break;
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(1));
//!     }
//! });
//!
//! master.write_single_register(1, 0, 0x1234)?;
//! server.join().unwrap();
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod codec;
pub mod error;
pub mod logging;
pub mod master;
pub mod protocol;
pub mod register_bank;
pub mod slave;
pub mod transport;

pub use codec::TransportMode;
pub use error::{ModbusError, ModbusResult};
pub use master::{MasterEngine, MasterStats, SlaveHandle};
pub use protocol::{Frame, FunctionCode, RegisterAddress, RegisterValue, SlaveId};
pub use register_bank::RegisterBank;
pub use slave::{PollOutcome, SlaveEngine, SlaveStats};
pub use transport::{MockSerial, SerialConfig, SerialPortTransport, SerialTransport};

/// Largest RTU frame the engines expect on the wire.
pub const MAX_RTU_FRAME_SIZE: usize = 256;

/// Largest ASCII frame: start delimiter, hex-doubled body with LRC, CR LF.
pub const MAX_ASCII_FRAME_SIZE: usize = 1 + (MAX_RTU_FRAME_SIZE - 2 + 1) * 2 + 2;

/// Register-count ceiling for a single read or multi-write request.
pub const MAX_REGISTERS_PER_REQUEST: u16 = 125;

/// Coil-count ceiling for a single bit-read request.
pub const MAX_COILS_PER_REQUEST: u16 = 2000;
