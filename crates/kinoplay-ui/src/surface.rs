// crates/kinoplay-ui/src/surface.rs
//
// egui implementation of the engine's video surface: convert each due
// frame's planes to RGBA, park it in a shared slot, and ask the window
// to repaint. The window thread turns the slot into a texture.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use parking_lot::Mutex;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use kinoplay_media::frame_queue::Picture;
use kinoplay_media::sink::VideoSink;

/// A frame ready for upload, with the sample aspect ratio the painter
/// needs to letterbox it.
pub struct PresentedFrame {
    pub image: egui::ColorImage,
    pub sar: (i32, i32),
}

/// Latest-wins slot between the refresh pump and the window thread.
pub type SharedFrame = Arc<Mutex<Option<PresentedFrame>>>;

struct Scaler {
    ctx: SwsContext,
    width: u32,
    height: u32,
    format: Pixel,
}

pub struct EguiSurface {
    egui_ctx: egui::Context,
    shared: SharedFrame,
    /// Created from the first frame's geometry, reused for every frame
    /// after, rebuilt only if the source geometry changes.
    scaler: Option<Scaler>,
}

// The surface moves into the refresh pump thread once and stays there;
// the swscale context's raw pointer never crosses threads after that.
#[allow(clippy::non_send_fields_in_send_ty)]
unsafe impl Send for EguiSurface {}

impl EguiSurface {
    pub fn new(egui_ctx: egui::Context, shared: SharedFrame) -> Self {
        Self { egui_ctx, shared, scaler: None }
    }

    fn scaler_for(&mut self, picture: &Picture) -> Result<&mut SwsContext> {
        let stale = match &self.scaler {
            Some(s) => {
                s.width != picture.width
                    || s.height != picture.height
                    || s.format != picture.format
            }
            None => true,
        };
        if stale {
            let ctx = SwsContext::get(
                picture.format,
                picture.width,
                picture.height,
                Pixel::RGBA,
                picture.width,
                picture.height,
                Flags::BILINEAR,
            )
            .context("create RGBA converter")?;
            self.scaler = Some(Scaler {
                ctx,
                width: picture.width,
                height: picture.height,
                format: picture.format,
            });
        }
        Ok(&mut self.scaler.as_mut().unwrap().ctx)
    }
}

impl VideoSink for EguiSurface {
    fn present(&mut self, picture: &Picture) -> Result<()> {
        let scaler = self.scaler_for(picture)?;

        let mut rgba = VideoFrame::empty();
        scaler
            .run(&picture.frame, &mut rgba)
            .context("convert frame to RGBA")?;

        // Destripe: copy visible pixels only, not stride padding.
        let w = picture.width as usize;
        let h = picture.height as usize;
        let stride = rgba.stride(0);
        let raw = rgba.data(0);
        let row_bytes = w * 4;
        let data: Vec<u8> = (0..h)
            .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
            .copied()
            .collect();

        let image = egui::ColorImage::from_rgba_unmultiplied([w, h], &data);
        *self.shared.lock() = Some(PresentedFrame {
            image,
            sar: (picture.sar.numerator(), picture.sar.denominator()),
        });
        self.egui_ctx.request_repaint();
        Ok(())
    }
}
