//! Platform REST API

pub mod apps;
pub mod builds;
pub mod client;
pub mod setups;
