//! dhcp-sentinel core library
//!
//! This crate provides the types shared by every part of the rogue DHCP
//! detector: the error taxonomy, hardware addresses, captured packets,
//! interface lookup and the process-wide shutdown signal.

pub mod error;
pub mod interface;
pub mod packet;
pub mod shutdown;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use interface::Interface;
pub use packet::{LinkType, Packet};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use types::*;
