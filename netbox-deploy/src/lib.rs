//! netbox-deploy library
//!
//! Source tarball rewriting, the source blob server and the Heroku platform
//! client used to deploy and track Netbox instances.

pub mod app;
pub mod apps;
pub mod archive;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
