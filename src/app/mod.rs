//! Application core: orchestration with zero I/O.
//!
//! This module wires the gate pipeline together: classification, the
//! actuation firewall, the decision ledger and the pattern archive.  All
//! interaction with the outside world happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! clocks or transports.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
