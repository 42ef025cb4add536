//! # Adapters Module
//!
//! Infrastructure adapters implementing the outbound ports.

pub mod clock;
pub mod sweeper;
pub mod transport;
