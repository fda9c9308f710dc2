//! A bounded ISR-to-task byte queue.
//!
//! The producer half is written from interrupt context and never blocks; the
//! consumer half is awaited from task context. All queue mutation happens
//! inside critical sections, which are short (a `Deque` push or pop of one
//! byte), so the send side is safe to call with interrupts disabled and the
//! receive side never holds the consumer's lock across a suspension point.

use core::cell::UnsafeCell;
use core::future::poll_fn;
use core::task::Poll;

use heapless::Deque;
use rtic_common::waker_registration::CriticalSectionWakerRegistration as WakerRegistration;
use rtic_time::Monotonic;

#[doc(hidden)]
pub use critical_section;

/// The queue was full; the offered byte was dropped.
///
/// Interrupt context cannot report failures upward, so the producer treats
/// this as a recoverable capacity condition, not an error to propagate.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full(pub u8);

/// The wait bound elapsed before a byte arrived.
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout;

/// A bounded FIFO of bytes shared between one interrupt-context producer and
/// one task-context consumer. `N` sets the capacity.
///
/// Created once when a channel's receive interrupt is enabled and never torn
/// down, matching the run-to-halt lifecycle of the system. Use
/// [`make_rx_queue!`](crate::make_rx_queue) to create a `'static` split pair.
pub struct RxQueue<const N: usize> {
    fifo: UnsafeCell<Deque<u8, N>>,
    // Waker for the task blocked in `recv`.
    consumer_waker: WakerRegistration,
}

unsafe impl<const N: usize> Send for RxQueue<N> {}

unsafe impl<const N: usize> Sync for RxQueue<N> {}

impl<const N: usize> RxQueue<N> {
    /// Create a new, empty queue.
    pub const fn new() -> Self {
        Self {
            fifo: UnsafeCell::new(Deque::new()),
            consumer_waker: WakerRegistration::new(),
        }
    }

    /// Split the queue into its producer/consumer halves.
    pub fn split(&mut self) -> (RxProducer<'_, N>, RxConsumer<'_, N>) {
        (RxProducer(self), RxConsumer(self))
    }

    fn fifo<F, R>(&self, _cs: critical_section::CriticalSection, f: F) -> R
    where
        F: FnOnce(&mut Deque<u8, N>) -> R,
    {
        // SAFETY: the deque is only ever touched with a critical section
        // held, which `_cs` witnesses.
        f(unsafe { &mut *self.fifo.get() })
    }
}

/// Creates a split [`RxQueue`] with `'static` lifetime.
#[macro_export]
macro_rules! make_rx_queue {
    ($size:expr) => {{
        static mut QUEUE: $crate::queue::RxQueue<$size> = $crate::queue::RxQueue::new();

        static SPLIT: $crate::portable_atomic::AtomicU8 = $crate::portable_atomic::AtomicU8::new(0);

        $crate::queue::critical_section::with(|_| {
            if SPLIT.load(::core::sync::atomic::Ordering::Relaxed) != 0 {
                panic!("call to the same `make_rx_queue` instance twice");
            }

            SPLIT.store(1, ::core::sync::atomic::Ordering::Relaxed);
        });

        // SAFETY: the static mut is hidden from all other code and the flag
        // above makes sure this is the only place that touches it.
        #[allow(static_mut_refs)]
        unsafe {
            QUEUE.split()
        }
    }};
}

// -------- Producer

/// The interrupt-context half of an [`RxQueue`]. Send-only, never blocks.
pub struct RxProducer<'a, const N: usize>(&'a RxQueue<N>);

unsafe impl<const N: usize> Send for RxProducer<'_, N> {}

impl<const N: usize> RxProducer<'_, N> {
    /// Enqueue one byte, non-blocking.
    ///
    /// When the queue is full the offered byte is returned in [`Full`] and
    /// nothing is evicted: the policy is drop-newest, so under overrun the
    /// oldest `N` bytes of a burst are the ones that survive.
    pub fn try_send(&mut self, byte: u8) -> Result<(), Full> {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.push_back(byte))).map_err(Full)?;

        // A byte is in the queue; wake the consumer if it is waiting.
        self.0.consumer_waker.wake();

        Ok(())
    }

    /// Is the queue full.
    pub fn is_full(&self) -> bool {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.is_full()))
    }

    /// Is the queue empty.
    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.is_empty()))
    }
}

impl<const N: usize> core::fmt::Debug for RxProducer<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RxProducer")
    }
}

// -------- Consumer

/// The task-context half of an [`RxQueue`].
pub struct RxConsumer<'a, const N: usize>(&'a RxQueue<N>);

unsafe impl<const N: usize> Send for RxConsumer<'_, N> {}

impl<const N: usize> RxConsumer<'_, N> {
    /// Dequeue one byte if there is one, non-blocking.
    pub fn try_recv(&mut self) -> Option<u8> {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.pop_front()))
    }

    /// Dequeue one byte, waiting until the producer puts one in.
    ///
    /// Bytes come out in the order the producer put them in. The returned
    /// future is cancel-safe: dropping it cannot lose a byte, since the byte
    /// only leaves the queue when the future resolves.
    pub async fn recv(&mut self) -> u8 {
        poll_fn(|cx| {
            // Register before checking, so a send racing with this poll wakes
            // us instead of being lost.
            self.0.consumer_waker.register(cx.waker());

            match self.try_recv() {
                Some(byte) => Poll::Ready(byte),
                None => Poll::Pending,
            }
        })
        .await
    }

    /// Dequeue one byte, waiting at most `timeout`.
    ///
    /// This is the sanctioned way for tasks to retrieve interrupt-received
    /// bytes. A zero `timeout` on an empty queue resolves immediately to
    /// [`Timeout`]; a byte already queued is returned regardless of the
    /// bound.
    pub async fn recv_timeout<M: Monotonic>(&mut self, timeout: M::Duration) -> Result<u8, Timeout> {
        M::timeout_after(timeout, self.recv()).await.map_err(|_| Timeout)
    }

    /// Is the queue full.
    pub fn is_full(&self) -> bool {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.is_full()))
    }

    /// Is the queue empty.
    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.0.fifo(cs, |q| q.is_empty()))
    }
}

impl<const N: usize> core::fmt::Debug for RxConsumer<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RxConsumer")
    }
}
