// crates/kinoplay-media/src/audio.rs
//
// Audio decode + resample, driven entirely from the device's pull
// callback. No decoded-audio queue exists: each pull drains the scratch
// buffer and, when it runs dry, decodes the next packet inline. The last
// decoded frame's end time becomes the audio clock.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::software::resampling;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::Rational;

use crate::state::PlayerState;

/// Bytes of silence per underrun stretch, matching one device buffer.
const SILENCE_BYTES: usize = 1024;

/// Extra samples of scratch headroom over the decoded frame size. Input
/// and output share a sample rate, so resampler carry-over stays well
/// below this margin.
const SCRATCH_MARGIN_SAMPLES: usize = 256;

/// Wrap the swresample context so the pipeline can move into the device
/// callback thread (the context is a raw pointer used by one thread only).
struct Resampler(resampling::Context);

#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl Send for Resampler {}

/// State owned by the audio callback: decoder, lazy resampler, and the
/// resize-on-demand scratch buffer of signed-16 interleaved samples.
///
/// The only shared writes are the scratch byte counters and the audio
/// clock, mirrored into `PlayerState` for the sync math.
pub struct AudioPipeline {
    state: Arc<PlayerState>,
    decoder: ffmpeg::decoder::Audio,
    time_base: f64,
    resampler: Option<Resampler>,
    frame: AudioFrame,
    buf: Vec<u8>,
    buf_size: usize,
    buf_index: usize,
    /// False while the scratch region represents underrun silence.
    buf_valid: bool,
}

impl AudioPipeline {
    pub fn new(state: Arc<PlayerState>, decoder: ffmpeg::decoder::Audio, time_base: Rational) -> Self {
        Self {
            state,
            decoder,
            time_base: f64::from(time_base),
            resampler: None,
            frame: AudioFrame::empty(),
            buf: Vec::new(),
            buf_size: 0,
            buf_index: 0,
            buf_valid: false,
        }
    }

    /// The device pull: fill every sample of `out`, silence on underrun.
    pub fn fill(&mut self, out: &mut [i16]) {
        let mut pos = 0;
        while pos < out.len() {
            if self.buf_index >= self.buf_size {
                match self.decode_frame() {
                    Ok(n) => {
                        self.buf_size = n;
                        self.buf_valid = true;
                    }
                    Err(e) => {
                        // Starved (or decode failed): hand out one buffer
                        // of silence and try again on the next stretch.
                        if !self.state.is_quit() {
                            eprintln!("[audio] underrun: {e:#}");
                        }
                        self.buf_size = SILENCE_BYTES;
                        self.buf_valid = false;
                    }
                }
                self.buf_index = 0;
                self.state.audio_buf_size.store(self.buf_size, Ordering::Relaxed);
            }

            let want = (out.len() - pos) * 2;
            let chunk = (self.buf_size - self.buf_index).min(want);
            let samples = chunk / 2;
            if self.buf_valid {
                for s in 0..samples {
                    let b = self.buf_index + s * 2;
                    out[pos + s] = i16::from_ne_bytes([self.buf[b], self.buf[b + 1]]);
                }
            } else {
                out[pos..pos + samples].fill(0);
            }
            pos += samples;
            self.buf_index += chunk;
            self.state.audio_buf_index.store(self.buf_index, Ordering::Relaxed);
        }
    }

    /// Decode the next audio frame into the scratch buffer.
    ///
    /// Returns the number of valid bytes, or an error when the packet
    /// queue is dry (the caller fills silence). Pending decoder output is
    /// drained before the next packet is sent.
    fn decode_frame(&mut self) -> Result<usize> {
        loop {
            if self.decoder.receive_frame(&mut self.frame).is_ok() {
                return self.emit_frame();
            }

            let Some(pkt) = self.state.audioq.get(false) else {
                bail!("audio packet queue is empty");
            };
            self.decoder.send_packet(&pkt)?;
        }
    }

    /// Convert the decoded frame to signed-16 interleaved in the scratch
    /// buffer and advance the audio clock.
    fn emit_frame(&mut self) -> Result<usize> {
        let channels = self.frame.ch_layout().channels() as usize;
        let nb_samples = self.frame.samples();

        // One-time resampler, only when the decoded format is not already
        // packed signed-16. Layout and rate pass through unchanged.
        if self.resampler.is_none() && self.frame.format() != Sample::I16(SampleType::Packed) {
            let ctx = resampling::Context::get2(
                self.frame.format(),
                self.frame.ch_layout(),
                self.frame.rate(),
                Sample::I16(SampleType::Packed),
                self.frame.ch_layout(),
                self.frame.rate(),
            )?;
            self.resampler = Some(Resampler(ctx));
        }

        let need = (nb_samples + SCRATCH_MARGIN_SAMPLES) * channels * 2;
        if self.buf.len() < need {
            self.buf.resize(need, 0);
        }

        let data_size = if let Some(rs) = &mut self.resampler {
            let mut converted = AudioFrame::empty();
            rs.0.run(&self.frame, &mut converted)?;
            let bytes = converted.samples() * channels * 2;
            self.buf[..bytes].copy_from_slice(&converted.data(0)[..bytes]);
            bytes
        } else {
            let bytes = nb_samples * channels * 2;
            self.buf[..bytes].copy_from_slice(&self.frame.data(0)[..bytes]);
            bytes
        };

        let clock = match self.frame.pts() {
            Some(pts) => {
                pts as f64 * self.time_base + nb_samples as f64 / self.frame.rate() as f64
            }
            None => f64::NAN,
        };
        self.state.audio_clock.store(clock);

        Ok(data_size)
    }
}
