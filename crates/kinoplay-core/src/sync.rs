// crates/kinoplay-core/src/sync.rs
//
// Master-clock policy and the refresh-delay correction that keeps video
// display locked to the master clock.
//
// The correction is the classic one: compare the head frame's pts with the
// master clock; a frame running late is shown immediately (delay 0), a
// frame running early has its delay doubled so the schedule drifts back
// into place over a few frames. Differences beyond NOSYNC_THRESHOLD are
// treated as discontinuities and left uncorrected.

/// Which clock the other streams chase. Audio is the tested default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMaster {
    #[default]
    Audio,
    Video,
    External,
}

/// Minimum sync threshold in seconds. The effective threshold is the frame
/// delay itself when that is larger.
pub const SYNC_THRESHOLD: f64 = 0.01;

/// Differences at or beyond this are discontinuities — no correction.
pub const NOSYNC_THRESHOLD: f64 = 10.0;

/// Fallback inter-frame delay before the first real delay is measured
/// (one PAL-ish frame).
pub const DEFAULT_FRAME_DELAY: f64 = 0.040;

/// Floor for the armed timer: never schedule a refresh sooner than this.
pub const MIN_REFRESH_DELAY: f64 = 0.010;

/// Per-session refresh schedule state. Owned by the pump thread; the pump
/// is its only writer and reader.
#[derive(Debug, Clone, Copy)]
pub struct RefreshTiming {
    /// Wall time the next frame is scheduled to go up.
    frame_timer: f64,
    /// pts of the last displayed frame (0 until one is shown).
    frame_last_pts: f64,
    /// Last accepted inter-frame delay, substituted when the measured one
    /// is out of range.
    frame_last_delay: f64,
}

impl RefreshTiming {
    pub fn new(now: f64) -> Self {
        Self {
            frame_timer: now,
            frame_last_pts: 0.0,
            frame_last_delay: DEFAULT_FRAME_DELAY,
        }
    }

    /// Decide how long to wait before the refresh after this one.
    ///
    /// `pts` is the head frame's presentation time, `master` the master
    /// clock value (`None` when video is itself the master — no
    /// correction), `now` the current wall time in the same timebase as
    /// the constructor's.
    ///
    /// Returns the actual delay in seconds, clamped to `MIN_REFRESH_DELAY`.
    /// The caller displays the frame and arms a timer with the result.
    pub fn next_refresh_delay(&mut self, pts: f64, master: Option<f64>, now: f64) -> f64 {
        let mut delay = if self.frame_last_pts == 0.0 {
            0.0
        } else {
            pts - self.frame_last_pts
        };

        if delay <= 0.0 || delay >= 1.0 {
            // Broken or first delay — reuse the previous good one.
            delay = self.frame_last_delay;
        }

        self.frame_last_delay = delay;
        self.frame_last_pts = pts;

        if let Some(ref_clock) = master {
            let diff = pts - ref_clock;
            let sync_threshold = if delay > SYNC_THRESHOLD { delay } else { SYNC_THRESHOLD };
            // NaN master (audio clock not established) fails this
            // comparison and leaves the delay untouched.
            if diff.abs() < NOSYNC_THRESHOLD {
                if diff <= -sync_threshold {
                    delay = 0.0;
                } else if diff >= sync_threshold {
                    delay = 2.0 * delay;
                }
            }
        }

        self.frame_timer += delay;
        let actual = self.frame_timer - now;
        if actual < MIN_REFRESH_DELAY {
            MIN_REFRESH_DELAY
        } else {
            actual
        }
    }
}

/// Predicted pts of the next decoded frame, used when a frame arrives
/// without a timestamp of its own. Owned by the video decode thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct PtsPredictor {
    clock: f64,
}

impl PtsPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the pts for a decoded frame and advance the prediction.
    ///
    /// A usable `pts` becomes the new reference; an unset one (NaN) or a
    /// zero pts falls back to the running prediction. The prediction then
    /// advances by one frame period, stretched by half a period per
    /// `repeat` count (field-repeat flag of interlaced material).
    pub fn resolve(&mut self, pts: f64, frame_period: f64, repeat: f64) -> f64 {
        let pts = if pts.is_nan() || pts == 0.0 {
            self.clock
        } else {
            self.clock = pts;
            pts
        };
        self.clock += frame_period * (1.0 + repeat * 0.5);
        pts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_records_its_delay() {
        let mut t = RefreshTiming::new(0.0);
        // frame_last_pts starts at 0 → nominal delay 0 → substituted with
        // the 40 ms default, which then becomes the recorded last delay.
        t.next_refresh_delay(0.040, None, 0.0);
        assert!((t.frame_last_delay - 0.040).abs() < 1e-9);
        assert_eq!(t.frame_last_pts, 0.040);
    }

    #[test]
    fn late_frame_collapses_delay_to_zero() {
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(0.040, None, 0.0);
        // Master clock half a second ahead of the frame → we are late →
        // delay 0; with the wall clock already at the old schedule, only
        // the clamp remains.
        let pts = 0.080;
        let master = pts + 0.5;
        let before = t.frame_timer;
        let actual = t.next_refresh_delay(pts, Some(master), before);
        assert_eq!(t.frame_timer, before); // delay was zeroed
        assert_eq!(actual, MIN_REFRESH_DELAY);
    }

    #[test]
    fn early_frame_doubles_delay() {
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(0.040, None, 0.0);
        // Master clock half a second behind → we are early → 2 × 0.040.
        let pts = 0.080;
        let master = pts - 0.5;
        let before = t.frame_timer;
        t.next_refresh_delay(pts, Some(master), 0.0);
        assert!((t.frame_timer - before - 0.080).abs() < 1e-9);
    }

    #[test]
    fn in_sync_frame_keeps_delay() {
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(0.040, None, 0.0);
        let pts = 0.080;
        let before = t.frame_timer;
        t.next_refresh_delay(pts, Some(pts), 0.0);
        assert!((t.frame_timer - before - 0.040).abs() < 1e-9);
    }

    #[test]
    fn nan_master_leaves_delay_unchanged() {
        // Audio starvation: the audio clock is NaN and |NaN − pts| < 10 is
        // false, so the correction must not fire.
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(0.040, None, 0.0);
        let before = t.frame_timer;
        t.next_refresh_delay(0.080, Some(f64::NAN), 0.0);
        assert!((t.frame_timer - before - 0.040).abs() < 1e-9);
    }

    #[test]
    fn discontinuity_beyond_nosync_is_left_alone() {
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(0.040, None, 0.0);
        let before = t.frame_timer;
        // 30 s ahead of the master — treated as an isolated event.
        t.next_refresh_delay(0.080, Some(0.080 - 30.0), 0.0);
        assert!((t.frame_timer - before - 0.040).abs() < 1e-9);
    }

    #[test]
    fn actual_delay_is_clamped_to_minimum() {
        let mut t = RefreshTiming::new(0.0);
        // `now` far past the schedule → actual would be negative.
        let actual = t.next_refresh_delay(0.040, None, 100.0);
        assert_eq!(actual, MIN_REFRESH_DELAY);
    }

    #[test]
    fn out_of_range_delay_reuses_last_good() {
        let mut t = RefreshTiming::new(0.0);
        t.next_refresh_delay(1.000, None, 0.0);
        t.next_refresh_delay(1.040, None, 0.0); // records 0.040
        let before = t.frame_timer;
        // pts jumps backwards → nominal delay negative → use 0.040 again.
        t.next_refresh_delay(0.500, None, 0.0);
        assert!((t.frame_timer - before - 0.040).abs() < 1e-9);
    }

    #[test]
    fn predictor_adopts_real_pts() {
        let mut p = PtsPredictor::new();
        let pts = p.resolve(0.5, 0.040, 0.0);
        assert_eq!(pts, 0.5);
    }

    #[test]
    fn predictor_fills_missing_pts() {
        let mut p = PtsPredictor::new();
        p.resolve(0.5, 0.040, 0.0);
        // Next frame has no pts → predicted 0.540.
        let pts = p.resolve(f64::NAN, 0.040, 0.0);
        assert!((pts - 0.540).abs() < 1e-9);
    }

    #[test]
    fn predictor_stretches_for_repeated_fields() {
        let mut p = PtsPredictor::new();
        p.resolve(1.0, 0.040, 1.0); // repeat_pict = 1 → 1.5 periods
        let pts = p.resolve(f64::NAN, 0.040, 0.0);
        assert!((pts - 1.060).abs() < 1e-9);
    }
}
