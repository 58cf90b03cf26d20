// crates/kinoplay-media/src/remux.rs
//
// Stream-copy utilities: remux a container as-is, or cut a time range
// out of it. No decoding — packets are copied with their timestamps
// rescaled (and, for cut, rebased so the output starts at zero).

use std::path::Path;

use anyhow::{Context as _, Result};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec;
use ffmpeg::encoder;
use ffmpeg::media::Type;

use crate::helpers::seek::seek_to_secs;

/// Stream kinds worth carrying into the output container.
fn copyable(medium: Type) -> bool {
    matches!(medium, Type::Video | Type::Audio | Type::Subtitle)
}

/// Copy every audio/video/subtitle stream of `src` into `dst` unchanged.
pub fn remux(src: &Path, dst: &Path) -> Result<()> {
    let mut ictx = ffmpeg::format::input(src)
        .with_context(|| format!("open {}", src.display()))?;
    let mut octx = ffmpeg::format::output(dst)
        .with_context(|| format!("create {}", dst.display()))?;

    let stream_map = map_streams(&ictx, &mut octx)?;

    octx.set_metadata(ictx.metadata().to_owned());
    octx.write_header().context("write output header")?;

    for (stream, mut packet) in ictx.packets().flatten() {
        let Some(out_index) = stream_map[stream.index()] else {
            continue;
        };
        let out_tb = octx.stream(out_index).unwrap().time_base();
        packet.rescale_ts(stream.time_base(), out_tb);
        packet.set_stream(out_index);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut octx)
            .context("write packet")?;
    }

    octx.write_trailer().context("write output trailer")?;
    eprintln!("[remux] {} → {}", src.display(), dst.display());
    Ok(())
}

/// Copy the `[start, end]` seconds range of `src` into `dst`.
///
/// Seeks to the keyframe at or before `start`, then rebases each stream's
/// timestamps against the first ones seen so the output begins at zero.
/// Stops at the first packet whose source pts passes `end`.
pub fn cut(src: &Path, dst: &Path, start: f64, end: f64) -> Result<()> {
    let mut ictx = ffmpeg::format::input(src)
        .with_context(|| format!("open {}", src.display()))?;
    let mut octx = ffmpeg::format::output(dst)
        .with_context(|| format!("create {}", dst.display()))?;

    let stream_map = map_streams(&ictx, &mut octx)?;

    octx.write_header().context("write output header")?;

    seek_to_secs(&mut ictx, start, "cut");

    let nb_streams = stream_map.len();
    let mut first_pts: Vec<Option<i64>> = vec![None; nb_streams];
    let mut first_dts: Vec<Option<i64>> = vec![None; nb_streams];

    for (stream, mut packet) in ictx.packets().flatten() {
        let index = stream.index();
        let in_tb = stream.time_base();

        // Past the requested range — done. Checked against the source
        // timestamp, before any rebasing.
        if let Some(pts) = packet.pts() {
            if pts as f64 * f64::from(in_tb) > end {
                break;
            }
        }

        let Some(out_index) = stream_map[index] else {
            continue;
        };

        if first_pts[index].is_none() {
            first_pts[index] = packet.pts();
        }
        if first_dts[index].is_none() {
            first_dts[index] = packet.dts();
        }

        let (pts, dts) = rebased_timestamps(
            packet.pts(),
            packet.dts(),
            first_pts[index],
            first_dts[index],
        );
        packet.set_pts(pts);
        packet.set_dts(dts);

        let out_tb = octx.stream(out_index).unwrap().time_base();
        packet.rescale_ts(in_tb, out_tb);
        packet.set_stream(out_index);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut octx)
            .context("write packet")?;
    }

    octx.write_trailer().context("write output trailer")?;
    eprintln!(
        "[remux] cut [{start:.3}, {end:.3}]s {} → {}",
        src.display(),
        dst.display()
    );
    Ok(())
}

/// Create one output stream per copyable input stream, copying codec
/// parameters. Returns input index → output index.
fn map_streams(
    ictx: &ffmpeg::format::context::Input,
    octx: &mut ffmpeg::format::context::Output,
) -> Result<Vec<Option<usize>>> {
    let mut map = Vec::with_capacity(ictx.nb_streams() as usize);
    let mut out_index = 0;
    for ist in ictx.streams() {
        if !copyable(ist.parameters().medium()) {
            map.push(None);
            continue;
        }
        let mut ost = octx
            .add_stream(encoder::find(codec::Id::None))
            .context("add output stream")?;
        ost.set_parameters(ist.parameters());
        // The source codec tag may be invalid for the output container.
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        map.push(Some(out_index));
        out_index += 1;
    }
    Ok(map)
}

/// Shift timestamps so the cut output starts at (or above) zero, keeping
/// dts ≤ pts.
fn rebased_timestamps(
    pts: Option<i64>,
    dts: Option<i64>,
    first_pts: Option<i64>,
    first_dts: Option<i64>,
) -> (Option<i64>, Option<i64>) {
    let pts = pts.map(|p| p - first_pts.unwrap_or(0));
    let dts = dts.map(|d| d - first_dts.unwrap_or(0));
    match (pts, dts) {
        // A decode timestamp ahead of the presentation timestamp is not
        // representable; present at the decode time instead.
        (Some(p), Some(d)) if d > p => (Some(d), Some(d)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_packet_rebases_to_zero() {
        let (pts, dts) = rebased_timestamps(Some(9000), Some(9000), Some(9000), Some(9000));
        assert_eq!(pts, Some(0));
        assert_eq!(dts, Some(0));
    }

    #[test]
    fn later_packets_keep_relative_spacing() {
        let (pts, dts) = rebased_timestamps(Some(12600), Some(12000), Some(9000), Some(9000));
        assert_eq!(pts, Some(3600));
        assert_eq!(dts, Some(3000));
    }

    #[test]
    fn dts_ahead_of_pts_is_clamped() {
        // B-frame reordering near the cut point can leave dts > pts after
        // rebasing against different origins.
        let (pts, dts) = rebased_timestamps(Some(1000), Some(2000), Some(500), Some(0));
        assert_eq!(pts, Some(2000));
        assert_eq!(dts, Some(2000));
    }

    #[test]
    fn missing_timestamps_pass_through() {
        let (pts, dts) = rebased_timestamps(None, Some(100), Some(0), Some(100));
        assert_eq!(pts, None);
        assert_eq!(dts, Some(0));
    }
}
