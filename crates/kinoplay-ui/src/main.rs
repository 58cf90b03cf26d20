mod app;
mod audio_out;
mod surface;

use std::path::PathBuf;

fn main() -> eframe::Result {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: kinoplay <media-file>");
        std::process::exit(1);
    };

    ffmpeg_the_third::init().expect("FFmpeg init failed");

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("kinoplay — {path}"))
            .with_inner_size([640.0, 480.0])
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };

    eframe::run_native(
        "kinoplay",
        native_options,
        Box::new(move |cc| match app::PlayerApp::new(cc, PathBuf::from(path)) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                eprintln!("[kinoplay] failed to start playback: {e:#}");
                Err(e.into())
            }
        }),
    )
}
