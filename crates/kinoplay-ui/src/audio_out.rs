// crates/kinoplay-ui/src/audio_out.rs
//
// cpal implementation of the engine's audio device interface: a signed-16
// output stream whose data callback is the engine's pull callback.

use anyhow::{Context as _, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use kinoplay_media::sink::{AudioDevice, AudioFill, AudioSpec, AudioStream};

#[derive(Default)]
pub struct CpalAudio;

impl AudioDevice for CpalAudio {
    fn open(&mut self, spec: &AudioSpec, mut fill: AudioFill) -> Result<Box<dyn AudioStream>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no default audio output device")?;

        let config = cpal::StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.rate),
            buffer_size: cpal::BufferSize::Fixed(spec.buffer_samples as u32),
        };

        eprintln!(
            "[audio] open {} — {} Hz, {} ch, s16, {} samples/pull",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            spec.rate,
            spec.channels,
            spec.buffer_samples
        );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| fill(data),
                |e| eprintln!("[audio] stream error: {e}"),
                None,
            )
            .context("build audio output stream")?;

        Ok(Box::new(CpalStream { stream }))
    }
}

/// Keeps the device alive; dropping it closes the stream and releases the
/// callback. Stays on the thread that opened it.
struct CpalStream {
    stream: cpal::Stream,
}

impl AudioStream for CpalStream {
    fn play(&mut self) -> Result<()> {
        self.stream.play().context("unpause audio stream")?;
        Ok(())
    }
}
