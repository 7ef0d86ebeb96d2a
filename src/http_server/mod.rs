//! Demo HTTP surface wiring the gate in front of a few routes

pub mod middleware;
pub mod routes;
pub mod server;

pub use server::{create_router, HttpServer};
