//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API the trusted application uses
//! - **Outbound (Driven)**: the call-dispatch transport, the caller handle and the clock

pub mod inbound;
pub mod outbound;
