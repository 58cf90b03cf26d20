// crates/kinoplay-media/src/packet_queue.rs
//
// Bounded-by-observation FIFO of demuxed packets between the reader and a
// decoding consumer. Unbounded by count — the reader applies byte-size
// backpressure itself by watching `size()` — with a blocking read for
// consumers that want one.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Condvar, Mutex};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::Packet;

/// Bookkeeping overhead charged per queued entry on top of the payload,
/// mirroring what the queue actually stores per packet.
const ENTRY_OVERHEAD: usize = mem::size_of::<Packet>();

#[derive(Default)]
struct Inner {
    packets: VecDeque<Packet>,
    /// Payload bytes + per-entry overhead across all queued packets.
    size: usize,
    /// Sum of packet durations, in the stream's timebase.
    duration: i64,
}

/// Single-producer / single-consumer packet FIFO.
///
/// All counter updates happen under the mutex; a single signal per `put`
/// suffices because each queue has exactly one consumer.
pub struct PacketQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            cond: Condvar::new(),
        }
    }

    /// Append a packet, taking ownership. Never blocks the producer.
    pub fn put(&self, pkt: Packet) {
        let mut q = self.inner.lock().unwrap();
        q.size += pkt.size() + ENTRY_OVERHEAD;
        q.duration += pkt.duration();
        q.packets.push_back(pkt);
        self.cond.notify_one();
    }

    /// Dequeue the oldest packet.
    ///
    /// With `block = false` an empty queue returns `None` immediately; with
    /// `block = true` the call waits until a producer pushes.
    pub fn get(&self, block: bool) -> Option<Packet> {
        let mut q = self.inner.lock().unwrap();
        loop {
            if let Some(pkt) = q.packets.pop_front() {
                q.size -= pkt.size() + ENTRY_OVERHEAD;
                q.duration -= pkt.duration();
                return Some(pkt);
            }
            if !block {
                return None;
            }
            q = self.cond.wait(q).unwrap();
        }
    }

    /// Drop every queued packet and zero the counters.
    pub fn flush(&self) {
        let mut q = self.inner.lock().unwrap();
        q.packets.clear();
        q.size = 0;
        q.duration = 0;
    }

    /// Queued bytes (payloads plus per-entry overhead). The reader's
    /// backpressure check watches this.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of queued packet durations in stream timebase units.
    pub fn duration(&self) -> i64 {
        self.inner.lock().unwrap().duration
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn packet(payload: &[u8], duration: i64) -> Packet {
        let mut pkt = Packet::copy(payload);
        pkt.set_duration(duration);
        pkt
    }

    #[test]
    fn counters_track_put_and_get() {
        let q = PacketQueue::new();
        q.put(packet(&[1, 2, 3, 4], 10));
        q.put(packet(&[5, 6], 20));

        assert_eq!(q.len(), 2);
        assert_eq!(q.size(), 4 + 2 + 2 * ENTRY_OVERHEAD);
        assert_eq!(q.duration(), 30);

        let first = q.get(false).expect("first packet");
        assert_eq!(first.data(), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(q.size(), 2 + ENTRY_OVERHEAD);
        assert_eq!(q.duration(), 20);

        q.get(false).expect("second packet");
        assert_eq!(q.len(), 0);
        assert_eq!(q.size(), 0);
        assert_eq!(q.duration(), 0);
    }

    #[test]
    fn round_trip_preserves_payload_and_metadata() {
        let q = PacketQueue::new();
        let mut pkt = Packet::copy(&[9, 8, 7]);
        pkt.set_duration(40);
        pkt.set_pts(Some(1234));
        q.put(pkt);

        let out = q.get(false).expect("packet back");
        assert_eq!(out.data(), Some(&[9u8, 8, 7][..]));
        assert_eq!(out.duration(), 40);
        assert_eq!(out.pts(), Some(1234));
    }

    #[test]
    fn non_blocking_get_on_empty_returns_none() {
        let q = PacketQueue::new();
        assert!(q.get(false).is_none());
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = PacketQueue::new();
        q.put(packet(&[0], 0));
        q.put(packet(&[1], 0));
        assert_eq!(q.get(false).unwrap().data(), Some(&[0u8][..]));
        assert_eq!(q.get(false).unwrap().data(), Some(&[1u8][..]));
    }

    #[test]
    fn flush_zeroes_everything() {
        let q = PacketQueue::new();
        q.put(packet(&[1, 2, 3], 5));
        q.put(packet(&[4], 5));
        q.flush();
        assert_eq!(q.len(), 0);
        assert_eq!(q.size(), 0);
        assert_eq!(q.duration(), 0);
        assert!(q.get(false).is_none());
    }

    #[test]
    fn blocking_get_wakes_on_put() {
        let q = Arc::new(PacketQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.get(true))
        };
        // Give the consumer a moment to block.
        thread::sleep(Duration::from_millis(50));
        q.put(packet(&[42], 1));
        let got = consumer.join().unwrap().expect("woken with a packet");
        assert_eq!(got.data(), Some(&[42u8][..]));
    }

    #[test]
    fn concurrent_puts_drain_in_put_order() {
        let q = Arc::new(PacketQueue::new());
        let a = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.put(packet(&[1], 0)))
        };
        a.join().unwrap();
        let b = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.put(packet(&[2], 0)))
        };
        b.join().unwrap();
        assert_eq!(q.get(false).unwrap().data(), Some(&[1u8][..]));
        assert_eq!(q.get(false).unwrap().data(), Some(&[2u8][..]));
    }
}
