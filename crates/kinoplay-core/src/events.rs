// crates/kinoplay-core/src/events.rs
//
// Events that flow across the channel into the playback event pump.
// No payloads — one pump drives exactly one playback session.

/// Event delivered to the playback pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A refresh timer fired: decide whether the head video frame is due.
    Refresh,
    /// Tear the session down: posted by the window on close and by the
    /// reader when it dies abnormally.
    Quit,
}
