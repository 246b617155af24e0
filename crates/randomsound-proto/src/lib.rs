//! Types shared between the randomsound player and server.

pub mod config;
pub mod filter;
pub mod platform;
pub mod protocol;
pub mod state;
