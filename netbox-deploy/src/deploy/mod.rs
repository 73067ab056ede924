//! Deployment module

pub mod fsm;
pub mod tag;
pub mod trigger;
