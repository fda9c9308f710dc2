//! Per-pin GPIO interrupt dispatch over a shared interrupt line.
//!
//! On LPC40xx-class parts every pin-edge interrupt of the two
//! interrupt-capable GPIO ports arrives on a single vector. This crate maps
//! that one vector back to per-(line, pin, edge) handlers: application code
//! attaches a handler during start-up, the vector entry point calls
//! [`PinInt::dispatch`], and dispatch resolves the hardware status registers
//! to exactly one source, runs the handler and acknowledges the pending bit.
//!
//! The register block itself sits behind the [`PinIntRegs`] trait so the
//! dispatch logic can run against the real peripheral on target and against a
//! fake on the host.

#![no_std]
#![deny(missing_docs)]

pub mod dispatch;

pub use dispatch::{DispatchError, Edge, EdgeHandler, Line, PinInt, PinIntRegs, PinIntSource};

#[cfg(test)]
#[macro_use]
extern crate std;
