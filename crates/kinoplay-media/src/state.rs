// crates/kinoplay-media/src/state.rs
//
// The shared playback session. One `PlayerState` lives behind an `Arc`
// from open to close; every actor (reader, video decoder, audio callback,
// refresh pump) holds a clone.
//
// Who writes what:
//   reader          → audioq / videoq (push), has_video, audio_params
//   video decoder   → videoq (pop), pictq (push)
//   audio callback  → audioq (pop), audio_clock, audio_buf_* counters
//   refresh pump    → pictq (pop), quit
// Everything else about the pump's timing is thread-confined in player.rs
// and deliberately not here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crossbeam_channel::Sender;

use kinoplay_core::clock::{adjusted_audio_clock, AtomicF64};
use kinoplay_core::events::PlayerEvent;
use kinoplay_core::sync::SyncMaster;

use crate::frame_queue::{FrameQueue, VIDEO_PICTURE_QUEUE_SIZE};
use crate::packet_queue::PacketQueue;

/// Per-queue byte ceiling for reader backpressure.
pub const MAX_QUEUE_SIZE: usize = 5 * 1024 * 1024;

/// Audio device buffer size in sample frames per pull.
pub const AUDIO_BUFFER_SAMPLES: u16 = 1024;

/// Output parameters the audio device was opened with. Set once by the
/// stream opener, read by the clock math.
#[derive(Debug, Clone, Copy)]
pub struct AudioParams {
    pub rate: u32,
    pub channels: u16,
}

impl AudioParams {
    /// Bytes per second of signed-16 interleaved output.
    pub fn bytes_per_sec(&self) -> usize {
        self.rate as usize * self.channels as usize * 2
    }
}

pub struct PlayerState {
    pub filename: PathBuf,
    pub sync: SyncMaster,

    pub audioq: PacketQueue,
    pub videoq: PacketQueue,
    pub pictq: FrameQueue,

    /// pts of the end of the last decoded audio frame, NaN until known.
    pub audio_clock: AtomicF64,
    /// Bytes currently valid in the audio callback's scratch buffer.
    pub audio_buf_size: AtomicUsize,
    /// Bytes of the scratch buffer already handed to the device.
    pub audio_buf_index: AtomicUsize,
    pub audio_params: OnceLock<AudioParams>,

    pub has_video: AtomicBool,
    quit: AtomicBool,

    /// Channel into the refresh pump; the reader posts `Quit` here when it
    /// dies abnormally.
    pub events: Sender<PlayerEvent>,
}

impl PlayerState {
    pub fn new(filename: PathBuf, sync: SyncMaster, events: Sender<PlayerEvent>) -> Self {
        Self {
            filename,
            sync,
            audioq: PacketQueue::new(),
            videoq: PacketQueue::new(),
            pictq: FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE),
            audio_clock: AtomicF64::new(f64::NAN),
            audio_buf_size: AtomicUsize::new(0),
            audio_buf_index: AtomicUsize::new(0),
            audio_params: OnceLock::new(),
            has_video: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            events,
        }
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }

    /// The audio clock corrected for scratch bytes the device has been
    /// handed but not yet played. NaN until the first audio frame decodes.
    ///
    /// Reads race the callback's writes; each counter is a single atomic
    /// and a stale value is off by at most one device pull.
    pub fn audio_clock(&self) -> f64 {
        let clock = self.audio_clock.load();
        let size = self.audio_buf_size.load(Ordering::Relaxed);
        let index = self.audio_buf_index.load(Ordering::Relaxed);
        let unplayed = size.saturating_sub(index);
        let bytes_per_sec = self
            .audio_params
            .get()
            .map(|p| p.bytes_per_sec())
            .unwrap_or(0);
        adjusted_audio_clock(clock, unplayed, bytes_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn state() -> PlayerState {
        let (tx, _rx) = unbounded();
        PlayerState::new(PathBuf::from("test.mp4"), SyncMaster::Audio, tx)
    }

    #[test]
    fn audio_clock_is_nan_before_audio_opens() {
        let s = state();
        assert!(s.audio_clock().is_nan());
    }

    #[test]
    fn audio_clock_subtracts_unplayed_scratch() {
        let s = state();
        s.audio_params
            .set(AudioParams { rate: 48_000, channels: 2 })
            .unwrap();
        s.audio_clock.store(2.0);
        // 192000 bytes/sec; 96000 unplayed = 0.5 s behind.
        s.audio_buf_size.store(96_000, Ordering::Relaxed);
        s.audio_buf_index.store(0, Ordering::Relaxed);
        assert!((s.audio_clock() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn quit_flag_round_trips() {
        let s = state();
        assert!(!s.is_quit());
        s.request_quit();
        assert!(s.is_quit());
    }
}
