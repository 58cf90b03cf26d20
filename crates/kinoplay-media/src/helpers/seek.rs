// crates/kinoplay-media/src/helpers/seek.rs
//
// Seek helper wrapping avformat's seek with consistent soft-fail
// behaviour. All seeks in this crate route through here so failure
// handling stays a call-site policy instead of a scattered pattern.

use ffmpeg_the_third as ffmpeg;

/// Seek `ictx` to `target_secs` seconds from the start of the file.
///
/// Uses a backward seek (`..=ts`): it lands on the keyframe AT OR BEFORE
/// the target, so the caller's timestamp filtering sees every frame from
/// the target onward. A forward seek could land seconds later and silently
/// drop the head of the requested range.
///
/// Returns `false` on failure — the demuxer then decodes from wherever it
/// currently is and the caller's timestamp filter discards pre-roll. A
/// target at or before 0 is a no-op (the demuxer already starts there,
/// and some containers reject `max_ts = 0`).
pub fn seek_to_secs(
    ictx: &mut ffmpeg::format::context::Input,
    target_secs: f64,
    label: &str,
) -> bool {
    if target_secs <= 0.0 {
        return true;
    }

    let seek_ts = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
    match ictx.seek(seek_ts, ..=seek_ts) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[seek] soft-fail in {label} at {target_secs:.3}s: {e}");
            false
        }
    }
}
