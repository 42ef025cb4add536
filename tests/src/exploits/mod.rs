//! # Attack Simulations
//!
//! Each test plays an attacker that controls some part of the front-end or
//! the channel and checks that the gateway refuses before the handler runs.

pub mod forgery;
