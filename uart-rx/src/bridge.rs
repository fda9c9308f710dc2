//! The receive-interrupt handler and the mutually exclusive polled mode.

use crate::queue::RxProducer;

/// A decoded interrupt-identification cause (the 16550-style IIR set).
///
/// Only [`ReceiveDataAvailable`](Cause::ReceiveDataAvailable) is handled by
/// the bridge; everything else firing means the channel was configured to
/// interrupt on a cause nobody services.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    /// Modem status change.
    ModemStatus,
    /// Transmit holding register empty.
    TransmitRegisterEmpty,
    /// A received byte is waiting in the receive buffer register.
    ReceiveDataAvailable,
    /// Receive line status error (overrun, parity, framing, break).
    ReceiveLineStatus,
    /// Received data sat in the FIFO past the character timeout.
    CharacterTimeout,
}

/// Access to one UART channel's register block.
///
/// Decoding the interrupt-identification and line-status registers into these
/// methods is the implementation's job; the bit layouts are chip-specific and
/// stay behind this seam. Methods take `&self` since hardware registers are
/// interior-mutable by nature.
pub trait UartRegs {
    /// Decode the interrupt-identification register. `None` means no
    /// interrupt is pending on this channel.
    fn pending_cause(&self) -> Option<Cause>;

    /// Line status: a received byte is ready to read.
    fn rx_ready(&self) -> bool;

    /// Pop one byte from the receive buffer register.
    fn read_byte(&self) -> u8;

    /// Line status: the transmitter has drained.
    fn tx_idle(&self) -> bool;

    /// Push one byte into the transmit holding register.
    fn write_byte(&self, byte: u8);

    /// Set the receive-data-available bit in the interrupt-enable register.
    fn enable_rx_interrupt(&self);
}

/// One channel's receive-interrupt-to-queue bridge.
///
/// Owns the channel's registers and the producer half of its queue.
/// Constructing the bridge consumes the register handle and arms the receive
/// interrupt, so a channel in interrupt mode cannot also be polled.
pub struct RxBridge<'a, R, const N: usize> {
    regs: R,
    queue: RxProducer<'a, N>,
    dropped: u32,
}

impl<'a, R: UartRegs, const N: usize> RxBridge<'a, R, N> {
    /// Take ownership of the channel and arm its receive interrupt.
    ///
    /// The queue must already exist when the first byte can arrive, which is
    /// why the producer half is handed over here rather than later.
    pub fn new(regs: R, queue: RxProducer<'a, N>) -> Self {
        regs.enable_rx_interrupt();

        Self {
            regs,
            queue,
            dropped: 0,
        }
    }

    /// Service one receive interrupt. This is the vector entry point.
    ///
    /// Runs in interrupt context and never blocks: on a full queue the byte
    /// just read is dropped and counted, since there is nobody above an ISR
    /// to report a failure to.
    ///
    /// # Panics
    ///
    /// Panics on any cause other than receive-data-available, including no
    /// pending cause at all. An interrupt nobody asked for is a wiring bug;
    /// silently ignoring it would mask the bug until data corrupts.
    pub fn on_interrupt(&mut self) {
        match self.regs.pending_cause() {
            Some(Cause::ReceiveDataAvailable) => {
                if self.regs.rx_ready() {
                    let byte = self.regs.read_byte();
                    if self.queue.try_send(byte).is_err() {
                        self.dropped = self.dropped.wrapping_add(1);
                    }
                }
            }
            cause => panic!("uart interrupt for unconfigured cause: {:?}", cause),
        }
    }

    /// Number of received bytes dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// A channel operated by polling, with no interrupt involvement.
///
/// Competes for the same receive buffer register as the interrupt path, so
/// this also consumes the register handle: one mode per channel, enforced by
/// construction.
pub struct PolledUart<R> {
    regs: R,
}

impl<R: UartRegs> PolledUart<R> {
    /// Take ownership of the channel for polled operation.
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Read one byte if the receiver has one ready.
    pub fn get(&self) -> Option<u8> {
        if self.regs.rx_ready() {
            Some(self.regs.read_byte())
        } else {
            None
        }
    }

    /// Write one byte if the transmitter is idle, then wait for it to drain.
    ///
    /// Returns `false` without writing when the transmitter is busy.
    pub fn put(&self, byte: u8) -> bool {
        if !self.regs.tx_idle() {
            return false;
        }

        self.regs.write_byte(byte);

        while !self.regs.tx_idle() {}

        true
    }
}
