// crates/kinoplay-media/src/stream.rs
//
// Stream component opening: build and open the decoder for one stream,
// then wire it to its consumer — the device callback for audio, a decode
// thread for video.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type;

use crate::audio::AudioPipeline;
use crate::sink::{AudioDevice, AudioSpec, AudioStream};
use crate::state::{AudioParams, PlayerState, AUDIO_BUFFER_SAMPLES};
use crate::video::VideoWorker;

/// A successfully opened stream component. The reader keeps both handles
/// for the life of the session: dropping the audio stream closes the
/// device, joining the video handle waits for the decode thread.
pub enum StreamComponent {
    Audio { stream: Box<dyn AudioStream> },
    Video { decoder: JoinHandle<()> },
}

/// Open the decoder for `stream_index` and start its consumer.
pub fn open_component(
    state: &Arc<PlayerState>,
    ictx: &Input,
    stream_index: usize,
    audio_dev: &mut dyn AudioDevice,
) -> Result<StreamComponent> {
    let stream = ictx
        .stream(stream_index)
        .context("stream index out of range")?;

    let codec_ctx = codec::context::Context::from_parameters(stream.parameters())
        .context("copy codec parameters into decoder context")?;

    match codec_ctx.medium() {
        Type::Audio => {
            let decoder = codec_ctx
                .decoder()
                .audio()
                .context("open audio decoder")?;

            let params = AudioParams {
                rate: decoder.rate(),
                channels: decoder.ch_layout().channels() as u16,
            };
            let spec = AudioSpec {
                rate: params.rate,
                channels: params.channels,
                buffer_samples: AUDIO_BUFFER_SAMPLES,
            };
            let _ = state.audio_params.set(params);

            eprintln!(
                "[reader] audio stream {}: {} Hz, {} ch",
                stream_index, params.rate, params.channels
            );

            let mut pipeline =
                AudioPipeline::new(Arc::clone(state), decoder, stream.time_base());
            let mut handle = audio_dev
                .open(&spec, Box::new(move |out| pipeline.fill(out)))
                .context("open audio device")?;
            handle.play().context("start audio device")?;

            Ok(StreamComponent::Audio { stream: handle })
        }
        Type::Video => {
            let decoder = codec_ctx
                .decoder()
                .video()
                .context("open video decoder")?;

            let time_base = stream.time_base();
            let mut frame_rate = stream.avg_frame_rate();
            if frame_rate.numerator() == 0 || frame_rate.denominator() == 0 {
                frame_rate = stream.rate();
            }

            eprintln!(
                "[reader] video stream {}: {}x{}, {}/{} fps",
                stream_index,
                decoder.width(),
                decoder.height(),
                frame_rate.numerator(),
                frame_rate.denominator()
            );

            state
                .has_video
                .store(true, std::sync::atomic::Ordering::Relaxed);

            let worker = VideoWorker::new(Arc::clone(state), decoder, time_base, frame_rate);
            let decoder = thread::Builder::new()
                .name("video-decode".into())
                .spawn(move || worker.run())
                .context("spawn video decode thread")?;

            Ok(StreamComponent::Video { decoder })
        }
        other => bail!("unsupported stream type {other:?}"),
    }
}
