// crates/kinoplay-media/src/bin/kinocut.rs
//
// Stream-copy CLI:
//   kinocut <src> <dst>                  remux
//   kinocut <src> <dst> <start> <end>    cut [start, end] seconds

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use kinoplay_media::remux::{cut, remux};

fn main() {
    if let Err(e) = run() {
        eprintln!("[kinocut] {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    ffmpeg_the_third::init().context("FFmpeg init failed")?;

    match args.as_slice() {
        [src, dst] => remux(&PathBuf::from(src), &PathBuf::from(dst)),
        [src, dst, start, end] => {
            let start: f64 = start.parse().context("start must be seconds")?;
            let end: f64 = end.parse().context("end must be seconds")?;
            if end < start {
                bail!("end ({end}) must not be before start ({start})");
            }
            cut(&PathBuf::from(src), &PathBuf::from(dst), start, end)
        }
        _ => {
            bail!("usage: kinocut <src> <dst> [<start-secs> <end-secs>]")
        }
    }
}
