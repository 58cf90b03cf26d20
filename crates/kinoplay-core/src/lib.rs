// crates/kinoplay-core/src/lib.rs
//
// Pure playback arithmetic shared by kinoplay-media and kinoplay-ui.
// No FFmpeg, no GUI, no threads — everything here is plain math over f64
// seconds plus the one atomic cell the audio callback publishes through.

pub mod clock;
pub mod events;
pub mod geometry;
pub mod sync;
