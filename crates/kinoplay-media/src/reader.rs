// crates/kinoplay-media/src/reader.rs
//
// The demux thread: owns the container, opens both stream components,
// and shovels packets into the per-stream queues under a byte-size
// backpressure ceiling. Also the anchor for subordinate lifetimes — the
// audio device handle and the video decode thread both live and die with
// this loop.

use std::mem;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::media::Type;

use crate::sink::AudioDevice;
use crate::state::{PlayerState, MAX_QUEUE_SIZE};
use crate::stream::{open_component, StreamComponent};

/// Backpressure pause when a queue is over its byte ceiling.
const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(10);

/// Pause after a transient read failure (end of data, waiting for more).
const EMPTY_READ_SLEEP: Duration = Duration::from_millis(100);

/// Run the read loop to completion. An `Err` is an abnormal exit; the
/// spawn wrapper in player.rs turns it into a `Quit` event.
pub fn read_loop(state: Arc<PlayerState>, mut audio_dev: Box<dyn AudioDevice>) -> Result<()> {
    let mut ictx = ffmpeg::format::input(&state.filename)
        .with_context(|| format!("open {}", state.filename.display()))?;

    // First audio and first video stream; both are required.
    let mut audio_index = None;
    let mut video_index = None;
    for (i, stream) in ictx.streams().enumerate() {
        match stream.parameters().medium() {
            Type::Audio if audio_index.is_none() => audio_index = Some(i),
            Type::Video if video_index.is_none() => video_index = Some(i),
            _ => {}
        }
        if audio_index.is_some() && video_index.is_some() {
            break;
        }
    }
    let (Some(audio_index), Some(video_index)) = (audio_index, video_index) else {
        bail!(
            "{} must contain both an audio and a video stream",
            state.filename.display()
        );
    };

    // Opening audio starts the device; opening video starts the decode
    // thread. Both handles stay on this thread until the loop ends.
    let audio = open_component(&state, &ictx, audio_index, &mut *audio_dev)?;
    let video = open_component(&state, &ictx, video_index, &mut *audio_dev)?;
    let StreamComponent::Audio { stream: _audio_stream } = audio else {
        bail!("stream {audio_index} did not open as audio");
    };
    let StreamComponent::Video { decoder: video_thread } = video else {
        bail!("stream {video_index} did not open as video");
    };

    let mut pkt = ffmpeg::Packet::empty();
    let result = loop {
        if state.is_quit() {
            break Ok(());
        }

        // Backpressure: both queues observed in bytes.
        if state.audioq.size() > MAX_QUEUE_SIZE || state.videoq.size() > MAX_QUEUE_SIZE {
            thread::sleep(BACKPRESSURE_SLEEP);
            continue;
        }

        match pkt.read(&mut ictx) {
            Ok(()) => {
                let index = pkt.stream();
                let pkt = mem::replace(&mut pkt, ffmpeg::Packet::empty());
                if index == video_index {
                    state.videoq.put(pkt);
                } else if index == audio_index {
                    state.audioq.put(pkt);
                }
                // Other streams: packet dropped here.
            }
            Err(ffmpeg::Error::Eof) => {
                // No error from the byte source — keep the session alive
                // until the user quits (or more data appears).
                thread::sleep(EMPTY_READ_SLEEP);
            }
            Err(e) => break Err(e).context("read packet"),
        }
    };

    // Tear down subordinates: stop the device callback first so nothing
    // pulls from audioq, then let the video thread observe quit and drain.
    drop(_audio_stream);
    state.pictq.abort();
    state.pictq.signal();
    if video_thread.join().is_err() {
        eprintln!("[reader] video decode thread panicked");
    }

    result
}
