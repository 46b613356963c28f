//! Sample storage.
//!
//! - [`ring::CaptureRing`]: the history ring the consumer reads windows from.
//! - [`window::WindowReader`]: preallocated output buffer for window reads.
//! - The ready FIFO below: a `ringbuf::HeapRb<i16>` whose wait-free
//!   `try_push` is safe to call from the source completion context. The
//!   polling driver drains it.

pub mod ring;
pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Producer half of the ready FIFO, held by the source completion context.
pub type SampleProducer = ringbuf::HeapProd<i16>;

/// Consumer half of the ready FIFO, held by the polling driver thread.
pub type SampleConsumer = ringbuf::HeapCons<i16>;

/// Create a matched producer/consumer pair for the ready FIFO.
pub fn create_sample_fifo(capacity: usize) -> (SampleProducer, SampleConsumer) {
    HeapRb::<i16>::new(capacity.max(1)).split()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_rejects_pushes_when_full() {
        let (mut producer, mut consumer) = create_sample_fifo(2);
        assert!(producer.try_push(1).is_ok());
        assert!(producer.try_push(2).is_ok());
        assert_eq!(producer.try_push(3), Err(3));
        assert_eq!(consumer.try_pop(), Some(1));
        assert_eq!(consumer.try_pop(), Some(2));
        assert_eq!(consumer.try_pop(), None);
    }
}
