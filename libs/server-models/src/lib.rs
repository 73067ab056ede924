//! netbox-deploy server models

pub mod models;

pub use models::*;
