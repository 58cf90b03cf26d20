// crates/kinoplay-media/src/player.rs
//
// The playback session: wires the reader, the event pump, and the sinks
// together, and tears everything down in order on close.
//
// The pump is the renderer's actor. It selects over the event channel
// and a single-shot `crossbeam_channel::after` timer; each firing is a
// refresh — decide whether the head frame is due, arm the next timer,
// display. `Quit` — from the window, or from the reader on a fatal
// error — ends the pump, which raises the shared quit flag the other
// actors poll.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use crossbeam_channel::{select, unbounded, Receiver, Sender};

use kinoplay_core::clock::WallAnchoredPts;
use kinoplay_core::events::PlayerEvent;
use kinoplay_core::sync::{RefreshTiming, SyncMaster};

use crate::reader;
use crate::sink::{AudioDevice, VideoSink};
use crate::state::PlayerState;

/// Delay before the very first refresh after open.
const FIRST_REFRESH: Duration = Duration::from_millis(40);

/// Re-arm interval while the video component is not open yet.
const NO_VIDEO_RETRY: Duration = Duration::from_millis(100);

/// Re-arm interval while the frame ring is empty (tight poll).
const STARVED_RETRY: Duration = Duration::from_millis(1);

/// Arm a single-shot refresh timer: a channel that delivers one tick
/// after `delay`. The pump selects on it next to the event channel and
/// replaces it on every firing.
pub fn schedule_refresh(delay: Duration) -> Receiver<Instant> {
    crossbeam_channel::after(delay)
}

/// A running playback session.
pub struct Player {
    state: Arc<PlayerState>,
    events: Sender<PlayerEvent>,
    pump: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Player {
    /// Open `filename` and start playing: spawns the reader (which opens
    /// the container, the audio device, and the video decode thread) and
    /// the event pump (which owns `video_sink`).
    pub fn open(
        filename: PathBuf,
        sync: SyncMaster,
        audio_dev: Box<dyn AudioDevice>,
        video_sink: Box<dyn VideoSink>,
    ) -> Result<Self> {
        let (events, events_rx) = unbounded();
        let state = Arc::new(PlayerState::new(filename, sync, events.clone()));

        let reader = {
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("reader".into())
                .spawn(move || {
                    if let Err(e) = reader::read_loop(Arc::clone(&state), audio_dev) {
                        eprintln!("[reader] {e:#}");
                        let _ = state.events.send(PlayerEvent::Quit);
                    }
                })
                .context("spawn reader thread")?
        };

        let pump = {
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("refresh-pump".into())
                .spawn(move || event_loop(state, events_rx, video_sink))
                .context("spawn refresh pump")?
        };

        Ok(Self {
            state,
            events,
            pump: Some(pump),
            reader: Some(reader),
        })
    }

    /// Post a quit event, as the window's close action does.
    pub fn request_quit(&self) {
        let _ = self.events.send(PlayerEvent::Quit);
    }

    /// True once the session has stopped (pump handled a quit, or the
    /// reader died and posted one).
    pub fn is_quit(&self) -> bool {
        self.state.is_quit()
    }

    /// Stop playback and join every subordinate thread. Idempotent.
    pub fn close(&mut self) {
        self.request_quit();
        self.state.request_quit();
        // Unblock a video decoder waiting on a full ring.
        self.state.pictq.abort();
        self.state.pictq.signal();

        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                eprintln!("[player] refresh pump panicked");
            }
        }
        // The reader joins the video decode thread and closes the audio
        // device on its way out.
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                eprintln!("[player] reader thread panicked");
            }
        }

        self.state.audioq.flush();
        self.state.videoq.flush();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

/// The pump: select over the event channel and the armed refresh timer
/// until quit, handling each refresh.
fn event_loop(
    state: Arc<PlayerState>,
    events_rx: Receiver<PlayerEvent>,
    mut sink: Box<dyn VideoSink>,
) {
    let origin = Instant::now();
    let mut timing = RefreshTiming::new(0.0);
    let mut video_clock = WallAnchoredPts::new(0.0);
    let mut refresh = schedule_refresh(FIRST_REFRESH);

    loop {
        select! {
            recv(events_rx) -> event => match event {
                // An externally posted refresh behaves like a timer that
                // fired right now.
                Ok(PlayerEvent::Refresh) => on_refresh(
                    &state,
                    &mut sink,
                    &mut timing,
                    &mut video_clock,
                    origin,
                    &mut refresh,
                ),
                Ok(PlayerEvent::Quit) | Err(_) => break,
            },
            recv(refresh) -> _ => on_refresh(
                &state,
                &mut sink,
                &mut timing,
                &mut video_clock,
                origin,
                &mut refresh,
            ),
        }
    }

    state.request_quit();
    state.pictq.abort();
    state.pictq.signal();
}

/// One refresh: decide the head frame's fate, arm the next timer, and
/// display.
fn on_refresh(
    state: &Arc<PlayerState>,
    sink: &mut Box<dyn VideoSink>,
    timing: &mut RefreshTiming,
    video_clock: &mut WallAnchoredPts,
    origin: Instant,
    refresh: &mut Receiver<Instant>,
) {
    if !state.has_video.load(std::sync::atomic::Ordering::Relaxed) {
        *refresh = schedule_refresh(NO_VIDEO_RETRY);
        return;
    }

    let Some(head) = state.pictq.peek() else {
        *refresh = schedule_refresh(STARVED_RETRY);
        return;
    };

    let now = origin.elapsed().as_secs_f64();
    video_clock.set(head.pts, now);

    let master = match state.sync {
        SyncMaster::Video => None,
        SyncMaster::Audio => Some(state.audio_clock()),
        SyncMaster::External => Some(now),
    };

    // Arm the next timer before the display so upload time does not push
    // the schedule.
    let actual = timing.next_refresh_delay(head.pts, master, now);
    *refresh = schedule_refresh(Duration::from_millis((actual * 1000.0).round() as u64));

    // Show the picture: the pop surrenders the slot's image to us and the
    // drop at the end of this scope releases it.
    if let Some(picture) = state.pictq.pop() {
        if let Err(e) = sink.present(&picture) {
            eprintln!("[refresh] display failed: {e:#}");
        }
    }
}
