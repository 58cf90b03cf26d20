// crates/kinoplay-ui/src/app.rs
//
// The window shell: owns the playback session, turns presented frames
// into an egui texture, and paints it letterboxed. Closing the window
// (or the engine posting quit) ends the session; dropping the app joins
// every engine thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;

use egui::{Color32, Pos2, Rect, TextureOptions, Vec2};

use kinoplay_core::geometry::display_rect;
use kinoplay_core::sync::SyncMaster;
use kinoplay_media::player::Player;

use crate::audio_out::CpalAudio;
use crate::surface::{EguiSurface, SharedFrame};

pub struct PlayerApp {
    player: Player,
    shared: SharedFrame,
    texture: Option<egui::TextureHandle>,
    sar: (i32, i32),
}

impl PlayerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, path: PathBuf) -> Result<Self> {
        let shared: SharedFrame = Arc::new(Mutex::new(None));
        let surface = EguiSurface::new(cc.egui_ctx.clone(), Arc::clone(&shared));

        let player = Player::open(
            path,
            SyncMaster::default(),
            Box::new(CpalAudio),
            Box::new(surface),
        )?;

        Ok(Self {
            player,
            shared,
            texture: None,
            sar: (1, 1),
        })
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // The engine stops on its own when the reader dies — close the
        // window instead of showing a dead canvas forever.
        if self.player.is_quit() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Upload the latest presented frame, if a new one arrived.
        if let Some(presented) = self.shared.lock().take() {
            self.sar = presented.sar;
            match &mut self.texture {
                Some(tex) => tex.set(presented.image, TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("video-frame", presented.image, TextureOptions::LINEAR))
                }
            }
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(Color32::BLACK))
            .show(ctx, |ui| {
                let panel = ui.max_rect();
                let Some(tex) = &self.texture else { return };

                let [tw, th] = tex.size();
                let placed = display_rect(
                    panel.width().max(1.0) as u32,
                    panel.height().max(1.0) as u32,
                    tw as u32,
                    th as u32,
                    self.sar.0,
                    self.sar.1,
                );
                let rect = Rect::from_min_size(
                    Pos2::new(panel.min.x + placed.x as f32, panel.min.y + placed.y as f32),
                    Vec2::new(placed.w as f32, placed.h as f32),
                );
                ui.painter().image(
                    tex.id(),
                    rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            });

        // Frame presents already request repaints; this keeps the quit
        // poll alive when no frames are flowing.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
