//! Loopback demo: a master and a slave wired over the in-memory mock pair.
//!
//! Run with `RUST_LOG=debug cargo run --bin loopback_demo` to watch the
//! frames on the wire.

use std::thread;
use std::time::Duration;

use modbus_serial::codec::TransportMode;
use modbus_serial::logging::init_logger;
use modbus_serial::master::{MasterEngine, SlaveHandle};
use modbus_serial::register_bank::RegisterBank;
use modbus_serial::slave::SlaveEngine;
use modbus_serial::transport::MockSerial;
use modbus_serial::ModbusResult;

fn main() -> ModbusResult<()> {
    init_logger();

    let (master_end, slave_end) = MockSerial::pair();

    let mut slave = SlaveEngine::new(1, TransportMode::Rtu, slave_end, RegisterBank::new(256));
    slave.bank_mut().set_input_register(0, 42)?;

    // The slave runs in its own thread, polling the line like a device
    // firmware loop would.
    let server = thread::spawn(move || loop {
        match slave.poll() {
            Ok(_) => thread::sleep(Duration::from_millis(1)),
            Err(e) => {
                log::error!("slave transport failure: {}", e);
                break;
            }
        }
    });

    let mut master = MasterEngine::new();
    master.add_slave(SlaveHandle::new(1, Box::new(master_end), TransportMode::Rtu))?;

    master.write_single_register(1, 0, 0x1234)?;
    let regs = master.read_holding_registers(1, 0, 1)?;
    log::info!("holding register 0 = {:#06X}", regs[0]);

    master.write_float(1, 4, 61.35)?;
    let temperature = master.read_float(1, 4)?;
    log::info!("float at register 4 = {}", temperature);

    master.write_double(1, 8, -273.15)?;
    log::info!("double round-trip = {}", master.read_double(1, 8)?);

    master.write_long(1, 16, -100_000)?;
    log::info!("long round-trip = {}", master.read_long(1, 16)?);

    let inputs = master.read_input_registers(1, 0, 1)?;
    log::info!("input register 0 = {}", inputs[0]);

    log::info!("master stats: {:?}", master.stats());

    // The slave thread loops forever; the demo just exits.
    drop(server);
    Ok(())
}
