//! Application layer: command handlers, the router that dispatches to them and
//! publishes their events, and the sharded service that feeds the router.

pub mod account_creation;
pub mod money_transfer;
pub mod router;
pub mod service;
