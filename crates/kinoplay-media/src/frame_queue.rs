// crates/kinoplay-media/src/frame_queue.rs
//
// Fixed-capacity ring of decoded video frames between the video decode
// thread and the refresh pump. The writer blocks when the ring is full;
// the reader never blocks — on an empty ring the pump just re-arms a
// short retry timer. That asymmetry bounds decoded-frame memory without
// ever making the scheduler wait.

use std::sync::{Condvar, Mutex};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::util::frame::video::Video;
use ffmpeg::Rational;

/// Ring capacity for decoded video.
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;

/// One decoded frame with everything the scheduler and surface need.
pub struct Picture {
    /// The decoded image, planar with per-plane strides.
    pub frame: Video,
    /// Presentation time in seconds.
    pub pts: f64,
    /// Nominal frame duration in seconds (0 when the frame rate is unknown).
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub format: Pixel,
    /// Sample aspect ratio.
    pub sar: Rational,
}

impl Picture {
    /// Build a queue entry by moving the image out of the decoder's scratch
    /// frame, leaving a fresh empty frame behind for the next receive.
    pub fn take_from(scratch: &mut Video, pts: f64, duration: f64) -> Self {
        let width = scratch.width();
        let height = scratch.height();
        let format = scratch.format();
        let sar = scratch.aspect_ratio();
        let frame = std::mem::replace(scratch, Video::empty());
        Self { frame, pts, duration, width, height, format, sar }
    }
}

/// Timing metadata of the head frame, for the scheduler's peek.
#[derive(Debug, Clone, Copy)]
pub struct PictureInfo {
    pub pts: f64,
    pub duration: f64,
}

/// Returned by `push` when the queue was aborted while the writer waited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

struct Ring {
    slots: Vec<Option<Picture>>,
    rindex: usize,
    windex: usize,
    size: usize,
    abort: bool,
}

/// Single-producer / single-consumer frame ring.
pub struct FrameQueue {
    inner: Mutex<Ring>,
    cond: Condvar,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            inner: Mutex::new(Ring { slots, rindex: 0, windex: 0, size: 0, abort: false }),
            cond: Condvar::new(),
        }
    }

    /// Write the next picture, waiting while the ring is full.
    ///
    /// Returns `Err(Aborted)` once `abort` has been raised; the caller's
    /// picture is dropped (image released) on that path.
    pub fn push(&self, picture: Picture) -> Result<(), Aborted> {
        let mut q = self.inner.lock().unwrap();
        while q.size >= q.slots.len() && !q.abort {
            q = self.cond.wait(q).unwrap();
        }
        if q.abort {
            return Err(Aborted);
        }
        let windex = q.windex;
        q.slots[windex] = Some(picture);
        q.windex = (q.windex + 1) % q.slots.len();
        q.size += 1;
        self.cond.notify_one();
        Ok(())
    }

    /// Timing metadata of the head frame without removing it.
    pub fn peek(&self) -> Option<PictureInfo> {
        let q = self.inner.lock().unwrap();
        if q.size == 0 {
            return None;
        }
        q.slots[q.rindex]
            .as_ref()
            .map(|p| PictureInfo { pts: p.pts, duration: p.duration })
    }

    /// Remove the head frame, surrendering its contents to the caller. The
    /// image is released when the returned `Picture` drops.
    pub fn pop(&self) -> Option<Picture> {
        let mut q = self.inner.lock().unwrap();
        if q.size == 0 {
            return None;
        }
        let rindex = q.rindex;
        let picture = q.slots[rindex].take();
        q.rindex = (q.rindex + 1) % q.slots.len();
        q.size -= 1;
        self.cond.notify_one();
        picture
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake any blocked writer without changing state. Used at shutdown in
    /// tandem with `abort`.
    pub fn signal(&self) {
        let _q = self.inner.lock().unwrap();
        self.cond.notify_all();
    }

    /// Raise the abort flag and wake every waiter. Subsequent pushes fail
    /// immediately with `Aborted`.
    pub fn abort(&self) {
        let mut q = self.inner.lock().unwrap();
        q.abort = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn picture(pts: f64) -> Picture {
        Picture {
            frame: Video::empty(),
            pts,
            duration: 0.040,
            width: 0,
            height: 0,
            format: Pixel::None,
            sar: Rational::new(0, 1),
        }
    }

    #[test]
    fn pop_returns_frames_in_write_order() {
        let q = FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE);
        q.push(picture(0.0)).unwrap();
        q.push(picture(0.040)).unwrap();
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().unwrap().pts, 0.0);
        assert_eq!(q.pop().unwrap().pts, 0.040);
        assert!(q.pop().is_none());
    }

    #[test]
    fn peek_does_not_consume() {
        let q = FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE);
        q.push(picture(1.5)).unwrap();
        assert_eq!(q.peek().unwrap().pts, 1.5);
        assert_eq!(q.peek().unwrap().pts, 1.5);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn writer_blocks_at_capacity_until_pop() {
        let q = Arc::new(FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE));
        for i in 0..VIDEO_PICTURE_QUEUE_SIZE {
            q.push(picture(i as f64)).unwrap();
        }

        let pushed = Arc::new(AtomicBool::new(false));
        let writer = {
            let q = Arc::clone(&q);
            let pushed = Arc::clone(&pushed);
            thread::spawn(move || {
                q.push(picture(99.0)).unwrap();
                pushed.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!pushed.load(Ordering::SeqCst), "writer must block on a full ring");

        q.pop().unwrap();
        writer.join().unwrap();
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(q.len(), VIDEO_PICTURE_QUEUE_SIZE);
    }

    #[test]
    fn ring_never_exceeds_capacity() {
        let q = Arc::new(FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE));
        let writer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..20 {
                    if q.push(picture(i as f64)).is_err() {
                        return;
                    }
                }
            })
        };
        for _ in 0..20 {
            thread::sleep(Duration::from_millis(5));
            assert!(q.len() <= VIDEO_PICTURE_QUEUE_SIZE);
            q.pop();
        }
        q.abort();
        writer.join().unwrap();
    }

    #[test]
    fn abort_unblocks_a_full_ring_writer() {
        let q = Arc::new(FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE));
        for i in 0..VIDEO_PICTURE_QUEUE_SIZE {
            q.push(picture(i as f64)).unwrap();
        }
        let writer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.push(picture(99.0)))
        };
        thread::sleep(Duration::from_millis(50));
        q.abort();
        assert_eq!(writer.join().unwrap(), Err(Aborted));
    }

    #[test]
    fn push_after_abort_fails_immediately() {
        let q = FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE);
        q.abort();
        assert_eq!(q.push(picture(0.0)), Err(Aborted));
    }

    #[test]
    fn indices_wrap_around_the_ring() {
        let q = FrameQueue::new(VIDEO_PICTURE_QUEUE_SIZE);
        for round in 0..3 {
            for i in 0..VIDEO_PICTURE_QUEUE_SIZE {
                q.push(picture((round * 10 + i) as f64)).unwrap();
            }
            for i in 0..VIDEO_PICTURE_QUEUE_SIZE {
                assert_eq!(q.pop().unwrap().pts, (round * 10 + i) as f64);
            }
        }
    }
}
