// crates/kinoplay-media/src/sink.rs
//
// The narrow interfaces the playback engine consumes from the host shell:
// an audio device that pulls signed-16 samples through a callback, and a
// video surface that takes planar frames and presents them. kinoplay-ui
// provides the cpal and egui implementations.

use anyhow::Result;

use crate::frame_queue::Picture;

/// Requested audio output format. Samples are always signed-16
/// system-endian interleaved.
#[derive(Debug, Clone, Copy)]
pub struct AudioSpec {
    pub rate: u32,
    pub channels: u16,
    /// Device buffer size in sample frames per pull.
    pub buffer_samples: u16,
}

/// The pull callback: fill the entire slice, writing silence on underrun.
pub type AudioFill = Box<dyn FnMut(&mut [i16]) + Send + 'static>;

/// Factory for the audio output. Moved into the reader thread, which opens
/// the device while opening the audio stream component.
pub trait AudioDevice: Send {
    /// Open the device with `spec`, wiring `fill` as its pull callback.
    /// The returned handle keeps the device alive; dropping it closes the
    /// device and releases the callback.
    fn open(&mut self, spec: &AudioSpec, fill: AudioFill) -> Result<Box<dyn AudioStream>>;
}

/// A running audio output. Lives on the reader thread for the whole
/// session (the handle is not required to be `Send`).
pub trait AudioStream {
    /// Unpause the device so it starts pulling.
    fn play(&mut self) -> Result<()>;
}

/// The video surface. Moved into the refresh pump thread, which hands it
/// each due frame.
pub trait VideoSink: Send {
    /// Upload the picture's planes (with their per-plane strides) and
    /// present the result.
    fn present(&mut self, picture: &Picture) -> Result<()>;
}
