//! The callback registry, status resolver and interrupt dispatcher.

/// One of the two interrupt-capable GPIO controller groups.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// The first interrupt-capable line (GPIO0 on LPC40xx).
    A,
    /// The second interrupt-capable line (GPIO2 on LPC40xx).
    B,
}

/// The signal transition that triggers an interrupt on a pin.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// High-to-low transition.
    Falling,
    /// Low-to-high transition.
    Rising,
}

/// Identifies exactly one handler slot. Produced fresh by each resolve.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinIntSource {
    /// The controller line the interrupt arrived on.
    pub line: Line,
    /// Pin number within the line, `0..32`.
    pub pin: u8,
    /// The edge that fired.
    pub edge: Edge,
}

/// A pin-edge interrupt handler.
///
/// Handlers are invoked synchronously from interrupt context: the dispatcher
/// provides no isolation between itself and the handler body. An
/// implementation must not block, must not wait on anything a task holds, and
/// must complete in short, bounded time. The type system cannot enforce this;
/// it is a hard interface precondition.
pub trait EdgeHandler: Sync {
    /// Called once per serviced interrupt on the attached (line, pin, edge).
    fn on_edge(&self);
}

impl<F> EdgeHandler for F
where
    F: Fn() + Sync,
{
    fn on_edge(&self) {
        self()
    }
}

/// Access to the pin-interrupt register block.
///
/// On target this is a thin wrapper over the GPIO interrupt peripheral; the
/// methods take `&self` because hardware registers are interior-mutable by
/// nature. Host tests substitute a fake.
pub trait PinIntRegs {
    /// Read the pending-status mask for one (line, edge) register.
    fn pending(&self, line: Line, edge: Edge) -> u32;

    /// Set the given bits in the interrupt-enable register for (line, edge).
    /// Bits already set stay set.
    fn enable(&self, line: Line, edge: Edge, mask: u32);

    /// Acknowledge the pending condition for one pin of a line.
    ///
    /// The hardware has a single clear register per line, so this clears the
    /// pin's pending state for both edges. Enable bits are unaffected.
    fn clear(&self, line: Line, pin: u8);
}

/// Dispatch failed; the hardware state did not match the registry.
///
/// Both cases are configuration bugs in the caller's interrupt wiring, not
/// runtime conditions to retry.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The vector fired but no status register holds a pending bit.
    ///
    /// Nothing was serviced and no register was written.
    Spurious,
    /// An interrupt fired on a slot with no attached handler.
    ///
    /// The pending bit was cleared anyway so the vector does not wedge
    /// re-entering on the same source.
    NoHandler(PinIntSource),
}

// Scan priority when several status registers are pending at once. A line's
// falling-edge register always beats its rising-edge register, and line A
// beats line B. A source that re-asserts faster than it is drained can starve
// everything after it in this list.
const SCAN_ORDER: [(Line, Edge); 4] = [
    (Line::A, Edge::Falling),
    (Line::A, Edge::Rising),
    (Line::B, Edge::Falling),
    (Line::B, Edge::Rising),
];

const PINS_PER_LINE: usize = 32;
const BANKS: usize = 4;

/// Pin-interrupt dispatch context: the handler registry plus the registers.
///
/// Created once during single-threaded start-up, populated with
/// [`attach`](Self::attach), then shared immutably with the vector handler
/// for the lifetime of the system. The `&mut self`/`&self` split is what
/// makes the registry safe to read from interrupt context without locking:
/// all mutation happens before the ISR can observe the table.
pub struct PinInt<R> {
    regs: R,
    handlers: [[Option<&'static dyn EdgeHandler>; PINS_PER_LINE]; BANKS],
}

impl<R: PinIntRegs> PinInt<R> {
    /// Create a dispatch context with an empty registry.
    pub const fn new(regs: R) -> Self {
        Self {
            regs,
            handlers: [[None; PINS_PER_LINE]; BANKS],
        }
    }

    fn bank(line: Line, edge: Edge) -> usize {
        (line as usize) << 1 | edge as usize
    }

    /// Attach a handler for one (line, pin, edge) slot and arm its interrupt.
    ///
    /// Setting the hardware enable bit is part of attach on purpose: a
    /// handler without an armed source is useless, so from the caller's view
    /// the two are one operation. A later attach for the same slot silently
    /// replaces the earlier handler; only the newest one will ever run.
    ///
    /// # Panics
    ///
    /// Panics if `pin >= 32`.
    pub fn attach(&mut self, line: Line, pin: u8, edge: Edge, handler: &'static dyn EdgeHandler) {
        assert!(
            (pin as usize) < PINS_PER_LINE,
            "pin {} out of range for a 32-pin line",
            pin
        );

        self.handlers[Self::bank(line, edge)][pin as usize] = Some(handler);
        self.regs.enable(line, edge, 1 << pin);
    }

    /// Service one pending pin interrupt. This is the vector entry point.
    ///
    /// Each invocation is resolve, lookup, invoke, acknowledge: the pending
    /// registers are scanned in fixed priority order (line A falling, line A
    /// rising, line B falling, line B rising) and within the winning register
    /// the **most significant** set bit wins. Exactly one source is serviced
    /// per call; remaining pending bits stay set and are picked up when the
    /// still-asserted line re-enters the vector.
    ///
    /// The pending bit for the serviced pin is cleared only after the handler
    /// has returned, so a back-to-back edge on the same pin re-pends instead
    /// of being lost, while the handler itself cannot be re-entered for the
    /// source it is servicing.
    pub fn dispatch(&self) -> Result<PinIntSource, DispatchError> {
        let source = self.resolve().ok_or(DispatchError::Spurious)?;

        match self.handlers[Self::bank(source.line, source.edge)][source.pin as usize] {
            Some(handler) => {
                handler.on_edge();
                self.regs.clear(source.line, source.pin);
                Ok(source)
            }
            None => {
                self.regs.clear(source.line, source.pin);
                Err(DispatchError::NoHandler(source))
            }
        }
    }

    fn resolve(&self) -> Option<PinIntSource> {
        for (line, edge) in SCAN_ORDER {
            let status = self.regs.pending(line, edge);
            if status != 0 {
                let pin = (31 - status.leading_zeros()) as u8;
                return Some(PinIntSource { line, pin, edge });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::Cell;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::boxed::Box;
    use std::rc::Rc;
    use std::sync::Arc;

    #[derive(Default)]
    struct RegState {
        pending: [Cell<u32>; 4],
        enabled: [Cell<u32>; 4],
    }

    #[derive(Clone, Default)]
    struct FakeRegs(Rc<RegState>);

    impl FakeRegs {
        fn raise(&self, line: Line, edge: Edge, pin: u8) {
            let bank = PinInt::<FakeRegs>::bank(line, edge);
            let reg = &self.0.pending[bank];
            reg.set(reg.get() | 1 << pin);
        }

        fn pending_bits(&self, line: Line, edge: Edge) -> u32 {
            self.0.pending[PinInt::<FakeRegs>::bank(line, edge)].get()
        }

        fn enabled_bits(&self, line: Line, edge: Edge) -> u32 {
            self.0.enabled[PinInt::<FakeRegs>::bank(line, edge)].get()
        }
    }

    impl PinIntRegs for FakeRegs {
        fn pending(&self, line: Line, edge: Edge) -> u32 {
            self.0.pending[PinInt::<FakeRegs>::bank(line, edge)].get()
        }

        fn enable(&self, line: Line, edge: Edge, mask: u32) {
            let reg = &self.0.enabled[PinInt::<FakeRegs>::bank(line, edge)];
            reg.set(reg.get() | mask);
        }

        fn clear(&self, line: Line, pin: u8) {
            // One clear register per line: both edge banks drop the pin.
            for edge in [Edge::Falling, Edge::Rising] {
                let reg = &self.0.pending[PinInt::<FakeRegs>::bank(line, edge)];
                reg.set(reg.get() & !(1 << pin));
            }
        }
    }

    fn counting_handler() -> (Arc<AtomicUsize>, &'static dyn EdgeHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler = Box::leak(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        (count, handler)
    }

    #[test]
    fn attach_then_dispatch_runs_exactly_that_handler() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs.clone());

        let (hits, handler) = counting_handler();
        let (other_hits, other) = counting_handler();

        pinint.attach(Line::A, 4, Edge::Falling, handler);
        pinint.attach(Line::A, 4, Edge::Rising, other);
        pinint.attach(Line::B, 4, Edge::Falling, other);

        regs.raise(Line::A, Edge::Falling, 4);

        let source = pinint.dispatch().unwrap();
        assert_eq!(
            source,
            PinIntSource {
                line: Line::A,
                pin: 4,
                edge: Edge::Falling
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(other_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reattach_replaces_the_previous_handler() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs.clone());

        let (old_hits, old) = counting_handler();
        let (new_hits, new) = counting_handler();

        pinint.attach(Line::B, 9, Edge::Rising, old);
        pinint.attach(Line::B, 9, Edge::Rising, new);

        regs.raise(Line::B, Edge::Rising, 9);
        pinint.dispatch().unwrap();

        assert_eq!(old_hits.load(Ordering::SeqCst), 0);
        assert_eq!(new_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_clears_pending_but_not_enable() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs.clone());

        let (_, handler) = counting_handler();
        pinint.attach(Line::A, 17, Edge::Rising, handler);
        assert_eq!(regs.enabled_bits(Line::A, Edge::Rising), 1 << 17);

        regs.raise(Line::A, Edge::Rising, 17);
        pinint.dispatch().unwrap();

        assert_eq!(regs.pending_bits(Line::A, Edge::Rising), 0);
        assert_eq!(regs.enabled_bits(Line::A, Edge::Rising), 1 << 17);
    }

    #[test]
    fn highest_pin_wins_within_one_register() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs.clone());

        let (hits3, h3) = counting_handler();
        let (hits7, h7) = counting_handler();
        pinint.attach(Line::A, 3, Edge::Falling, h3);
        pinint.attach(Line::A, 7, Edge::Falling, h7);

        regs.raise(Line::A, Edge::Falling, 3);
        regs.raise(Line::A, Edge::Falling, 7);

        // Pin 7 is serviced first, pin 3 stays pending for the next pass.
        assert_eq!(pinint.dispatch().unwrap().pin, 7);
        assert_eq!(hits7.load(Ordering::SeqCst), 1);
        assert_eq!(hits3.load(Ordering::SeqCst), 0);
        assert_eq!(regs.pending_bits(Line::A, Edge::Falling), 1 << 3);

        assert_eq!(pinint.dispatch().unwrap().pin, 3);
        assert_eq!(hits3.load(Ordering::SeqCst), 1);
        assert_eq!(regs.pending_bits(Line::A, Edge::Falling), 0);
    }

    #[test]
    fn line_a_falling_beats_line_b_rising() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs.clone());

        let (a_hits, a) = counting_handler();
        let (b_hits, b) = counting_handler();
        pinint.attach(Line::A, 0, Edge::Falling, a);
        pinint.attach(Line::B, 31, Edge::Rising, b);

        regs.raise(Line::B, Edge::Rising, 31);
        regs.raise(Line::A, Edge::Falling, 0);

        let first = pinint.dispatch().unwrap();
        assert_eq!(first.line, Line::A);
        assert_eq!(first.edge, Edge::Falling);

        let second = pinint.dispatch().unwrap();
        assert_eq!(second.line, Line::B);
        assert_eq!(second.edge, Edge::Rising);

        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn spurious_dispatch_is_an_explicit_error() {
        let regs = FakeRegs::default();
        let pinint = PinInt::new(regs.clone());

        assert_eq!(pinint.dispatch(), Err(DispatchError::Spurious));
    }

    #[test]
    fn unattached_source_is_cleared_and_reported() {
        let regs = FakeRegs::default();
        let pinint = PinInt::new(regs.clone());

        regs.raise(Line::B, Edge::Falling, 12);

        assert_eq!(
            pinint.dispatch(),
            Err(DispatchError::NoHandler(PinIntSource {
                line: Line::B,
                pin: 12,
                edge: Edge::Falling
            }))
        );

        // Cleared anyway so the vector cannot wedge on the same source.
        assert_eq!(regs.pending_bits(Line::B, Edge::Falling), 0);
    }

    #[test]
    #[should_panic]
    fn attach_rejects_out_of_range_pin() {
        let regs = FakeRegs::default();
        let mut pinint = PinInt::new(regs);

        let (_, handler) = counting_handler();
        pinint.attach(Line::A, 32, Edge::Falling, handler);
    }
}
