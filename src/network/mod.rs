//! Networking: the TCP gateway chat bridges connect to
//!
//! This module provides:
//! - TCP server for bridges (default port 55333 with auto-increment)
//! - Length-prefixed JSON protocol for requests and notices

pub mod protocol;
pub mod server;

pub use server::{Server, DEFAULT_PORT};
