//! IPC module for dialer-UI communication

mod codec;
mod protocol;
mod server;

pub use server::Server;
