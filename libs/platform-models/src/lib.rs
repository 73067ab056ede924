//! Heroku platform API records

pub mod models;

pub use models::*;
