// crates/kinoplay-media/src/video.rs
//
// Video decode thread: pops compressed packets, decodes, stamps each
// frame with a presentation time, and pushes it into the frame ring
// (blocking there when the renderer is behind).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Rational;

use kinoplay_core::sync::PtsPredictor;

use crate::frame_queue::Picture;
use crate::state::PlayerState;

/// How long to sleep when the packet queue is empty.
const EMPTY_QUEUE_SLEEP: Duration = Duration::from_millis(10);

pub struct VideoWorker {
    state: Arc<PlayerState>,
    decoder: ffmpeg::decoder::Video,
    time_base: Rational,
    frame_rate: Rational,
    predictor: PtsPredictor,
}

impl VideoWorker {
    pub fn new(
        state: Arc<PlayerState>,
        decoder: ffmpeg::decoder::Video,
        time_base: Rational,
        frame_rate: Rational,
    ) -> Self {
        Self {
            state,
            decoder,
            time_base,
            frame_rate,
            predictor: PtsPredictor::new(),
        }
    }

    /// Thread entry point. A fatal decoder error ends the thread; the
    /// renderer then freezes on the last frame rather than crashing.
    pub fn run(mut self) {
        if let Err(e) = self.decode_loop() {
            eprintln!("[video] decoder exited: {e:#}");
        }
    }

    fn decode_loop(&mut self) -> Result<()> {
        let tb = f64::from(self.time_base);
        // Nominal frame duration from the container's frame rate, 0 when
        // it does not advertise a usable one.
        let frame_duration = if self.frame_rate.numerator() != 0 && self.frame_rate.denominator() != 0
        {
            f64::from(Rational::new(
                self.frame_rate.denominator(),
                self.frame_rate.numerator(),
            ))
        } else {
            0.0
        };

        let mut scratch = VideoFrame::empty();

        loop {
            if self.state.is_quit() {
                return Ok(());
            }

            let Some(pkt) = self.state.videoq.get(false) else {
                thread::sleep(EMPTY_QUEUE_SLEEP);
                continue;
            };

            self.decoder
                .send_packet(&pkt)
                .context("send packet to video decoder")?;
            drop(pkt);

            while self.decoder.receive_frame(&mut scratch).is_ok() {
                let raw_pts = scratch
                    .pts()
                    .map(|p| p as f64 * tb)
                    .unwrap_or(f64::NAN);
                // Interlaced field-repeat count; stretches the predicted
                // pts of the following frame.
                let repeat = unsafe { (*scratch.as_ptr()).repeat_pict } as f64;
                let pts = self.predictor.resolve(raw_pts, tb, repeat);

                let picture = Picture::take_from(&mut scratch, pts, frame_duration);
                if self.state.pictq.push(picture).is_err() {
                    // Ring aborted — shutdown in progress.
                    return Ok(());
                }
            }
        }
    }
}
