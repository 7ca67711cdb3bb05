//! Status and control API.

pub mod server;
mod v0;

pub use server::{SharedState, build_router, serve};
