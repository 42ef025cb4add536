//! # Domain Layer
//!
//! Envelope signing, replay tracking, origin and policy decisions.
//! No I/O; time comes in through the `Clock` port.

pub mod entities;
pub mod errors;
pub mod keys;
pub mod origin;
pub mod policy;
pub mod replay;
pub mod signer;
