//! Interrupt-driven UART receive bridge.
//!
//! A UART receive interrupt runs at a priority above every task, so the byte
//! it pulls out of the receive buffer register has to cross an execution
//! boundary before normal code can look at it. This crate provides that
//! crossing: a bounded, critical-section guarded byte queue
//! ([`queue::RxQueue`]) whose producer half is owned by the receive interrupt
//! handler ([`bridge::RxBridge`]) and whose consumer half is awaited from
//! task context, optionally bounded by a timeout from any
//! [`rtic_time::Monotonic`].
//!
//! Polled operation ([`bridge::PolledUart`]) is the mutually exclusive
//! alternative for channels that never enable the receive interrupt; both
//! modes consume the register handle so they cannot be mixed on one channel.

#![no_std]
#![deny(missing_docs)]

pub mod bridge;
pub mod queue;

pub use bridge::{Cause, PolledUart, RxBridge, UartRegs};
pub use queue::{Full, RxConsumer, RxProducer, RxQueue, Timeout};

/// Re-export for use in macros.
pub use portable_atomic;

#[cfg(test)]
#[macro_use]
extern crate std;
