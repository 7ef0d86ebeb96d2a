//! Gatekeep: request authorization, session and security header gate

pub mod auth;
pub mod config;
pub mod gate;
pub mod http_server;
pub mod policy;
pub mod utils;

pub use config::Config;
pub use gate::{Admission, Gate, RequestDescriptor};
