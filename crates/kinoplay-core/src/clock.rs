// crates/kinoplay-core/src/clock.rs
//
// The three playback clocks, all in f64 seconds.
//
//   audio    — published by the device callback, corrected here for bytes
//              handed to the device but not yet played
//   video    — pts of the frame on screen plus wall time since it went up
//   external — plain wall time (the pump passes its own monotonic seconds)
//
// The audio clock crosses threads: the callback writes it, the pump reads
// it. It travels through `AtomicF64` with Relaxed ordering — a stale read
// costs at most one audio frame of clock precision, which the sync math
// absorbs.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` cell readable and writable from any thread without a lock.
///
/// Stored as the IEEE-754 bit pattern in an `AtomicU64`. NaN round-trips,
/// which matters: an unset audio clock is NaN and the sync code relies on
/// NaN comparisons disabling the correction.
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    pub fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Correct the raw audio clock for data the device has been handed but has
/// not yet played through the speakers.
///
/// `clock` is the pts of the end of the last decoded audio frame;
/// `unplayed_bytes` is what remains of the callback scratch buffer;
/// `bytes_per_sec` is `sample_rate × channels × 2` for signed-16 output.
///
/// A `bytes_per_sec` of 0 (audio not open yet) passes the clock through.
pub fn adjusted_audio_clock(clock: f64, unplayed_bytes: usize, bytes_per_sec: usize) -> f64 {
    if bytes_per_sec == 0 {
        return clock;
    }
    clock - unplayed_bytes as f64 / bytes_per_sec as f64
}

/// The video clock: pts of the currently displayed frame anchored to the
/// wall time it went up. Owned by the pump thread — it is the only writer
/// and the only reader.
#[derive(Debug, Clone, Copy)]
pub struct WallAnchoredPts {
    pts: f64,
    at: f64,
}

impl WallAnchoredPts {
    pub fn new(now: f64) -> Self {
        Self { pts: 0.0, at: now }
    }

    /// Record that the frame with `pts` was put on screen at wall time `now`.
    pub fn set(&mut self, pts: f64, now: f64) {
        self.pts = pts;
        self.at = now;
    }

    /// Current clock value: last displayed pts plus elapsed wall time.
    pub fn value(&self, now: f64) -> f64 {
        self.pts + (now - self.at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_f64_round_trips_nan() {
        let c = AtomicF64::new(f64::NAN);
        assert!(c.load().is_nan());
        c.store(1.25);
        assert_eq!(c.load(), 1.25);
    }

    #[test]
    fn audio_clock_subtracts_unplayed_bytes() {
        // 48 kHz stereo s16 → 192000 bytes/sec. 1920 unplayed bytes = 10 ms.
        let v = adjusted_audio_clock(2.0, 1920, 48_000 * 2 * 2);
        assert!((v - 1.99).abs() < 1e-9);
    }

    #[test]
    fn audio_clock_without_device_is_passthrough() {
        assert_eq!(adjusted_audio_clock(3.5, 4096, 0), 3.5);
    }

    #[test]
    fn audio_clock_is_exact_once_buffer_drains() {
        // Right after a decode returned n bytes at pts p, the clock reads
        // p once those n bytes have been consumed (unplayed = 0).
        let p = 0.75;
        assert_eq!(adjusted_audio_clock(p, 0, 192_000), p);
    }

    #[test]
    fn video_clock_advances_with_wall_time() {
        let mut c = WallAnchoredPts::new(10.0);
        c.set(1.0, 10.0);
        assert!((c.value(10.5) - 1.5).abs() < 1e-9);
        assert!((c.value(12.0) - 3.0).abs() < 1e-9);
    }
}
