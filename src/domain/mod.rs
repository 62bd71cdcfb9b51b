//! Domain model: entities, commands, events and the ports the application layer drives.

pub mod balance;
pub mod channel;
pub mod command;
pub mod confirmation;
pub mod event;
pub mod iban;
pub mod ledger;
pub mod lifecycle;
pub mod ports;
pub mod rejection;
