//! Video decoding: opens a container with FFmpeg and serves arbitrary frames
//! as RGB images, independent of the UI event loop.

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use tracing::{info, warn};

// ── Video session ───────────────────────────────────────────────────────────

/// An open video file with on-demand frame decoding. Decoder resources are
/// released on drop; replacing a session drops the old handle before the new
/// one is stored.
pub struct VideoSession {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    start_time: i64,
    fps: f64,
    frame_count: usize,
    video_name: String,
}

impl VideoSession {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("failed to initialize ffmpeg")?;

        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video file: {}", path.display()))?;

        let (stream_index, time_base, start_time, parameters, fps, nb_frames, duration) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .context("no video stream found")?;
            let fps = rational_to_f64(stream.avg_frame_rate())
                .or_else(|| rational_to_f64(stream.rate()))
                .context("video stream reports no frame rate")?;
            let start = stream.start_time();
            (
                stream.index(),
                stream.time_base(),
                if start == i64::MIN { 0 } else { start },
                stream.parameters(),
                fps,
                stream.frames(),
                stream.duration(),
            )
        };

        let duration_secs = if duration > 0 {
            duration as f64 * rational_to_f64(time_base).unwrap_or(0.0)
        } else if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };
        let frame_count = estimate_frame_count(nb_frames, duration_secs, fps);
        ensure!(frame_count > 0, "video reports no decodable frames");

        let decoder_context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .context("failed to create decoder context")?;
        let decoder = decoder_context
            .decoder()
            .video()
            .context("failed to create video decoder")?;

        // Every decoded frame is converted to RGB24, whatever the container's
        // native pixel format.
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .context("failed to create scaler")?;

        let video_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!("opened {video_name}: {frame_count} frames at {fps:.2} fps");

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_time,
            fps,
            frame_count,
            video_name,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Basename of the opened file, as recorded in saved annotations.
    pub fn video_name(&self) -> &str {
        &self.video_name
    }

    /// Seeks to `frame_index` and decodes exactly that frame. Frames may be
    /// requested in any order; each request seeks independently, and decoding
    /// the same index twice yields the same pixels.
    pub fn decode(&mut self, frame_index: usize) -> Result<RgbImage> {
        ensure!(
            frame_index < self.frame_count,
            "frame index {frame_index} out of range (0..{})",
            self.frame_count
        );
        info!("retrieving frame {}/{}", frame_index, self.frame_count);

        let step = ticks_per_frame(self.time_base, self.fps);
        let target = self.start_time + (frame_index as f64 * step).round() as i64;
        let tolerance = (step / 2.0) as i64;

        let Self {
            input,
            decoder,
            scaler,
            stream_index,
            ..
        } = self;

        // Land on the keyframe at or before the target, then decode forward
        // until the target timestamp comes out of the decoder.
        input
            .seek(target, ..target)
            .with_context(|| format!("failed to seek to frame {frame_index}"))?;
        decoder.flush();

        let mut decoded = ffmpeg::frame::Video::empty();
        for (stream, packet) in input.packets() {
            if stream.index() != *stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .context("failed to send packet to decoder")?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                let timestamp = decoded.timestamp().unwrap_or(target);
                if timestamp + tolerance >= target {
                    return rgb_frame(scaler, &decoded);
                }
            }
        }

        // Drain frames still buffered in the decoder at end of stream.
        decoder
            .send_eof()
            .context("failed to flush decoder at end of stream")?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            let timestamp = decoded.timestamp().unwrap_or(target);
            if timestamp + tolerance >= target {
                return rgb_frame(scaler, &decoded);
            }
        }

        warn!("frame {frame_index} could not be retrieved");
        bail!("frame {frame_index} could not be retrieved")
    }
}

fn rgb_frame(
    scaler: &mut ffmpeg::software::scaling::Context,
    frame: &ffmpeg::frame::Video,
) -> Result<RgbImage> {
    let mut rgb = ffmpeg::frame::Video::empty();
    scaler
        .run(frame, &mut rgb)
        .context("pixel format conversion failed")?;

    let width = rgb.width() as usize;
    let height = rgb.height() as usize;
    let stride = rgb.stride(0);
    let data = rgb.data(0);

    // Frame rows are padded to the stride; copy only the visible pixels.
    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + width * 3]);
    }
    RgbImage::from_vec(rgb.width(), rgb.height(), pixels)
        .context("decoded frame has unexpected dimensions")
}

fn rational_to_f64(rational: ffmpeg::Rational) -> Option<f64> {
    if rational.numerator() > 0 && rational.denominator() > 0 {
        Some(f64::from(rational.numerator()) / f64::from(rational.denominator()))
    } else {
        None
    }
}

/// Stream ticks between consecutive frames.
fn ticks_per_frame(time_base: ffmpeg::Rational, fps: f64) -> f64 {
    f64::from(time_base.denominator()) / (fps * f64::from(time_base.numerator()))
}

/// Containers that carry no `nb_frames` fall back to duration × rate.
fn estimate_frame_count(nb_frames: i64, duration_secs: f64, fps: f64) -> usize {
    if nb_frames > 0 {
        nb_frames as usize
    } else if duration_secs > 0.0 && fps > 0.0 {
        (duration_secs * fps).round() as usize
    } else {
        0
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_per_frame_matches_timebase_and_rate() {
        // 30 fps in a 1/90000 timebase: 3000 ticks per frame.
        let time_base = ffmpeg::Rational::new(1, 90_000);
        assert_eq!(ticks_per_frame(time_base, 30.0), 3000.0);
    }

    #[test]
    fn frame_count_prefers_the_container_value() {
        assert_eq!(estimate_frame_count(250, 99.0, 30.0), 250);
    }

    #[test]
    fn frame_count_falls_back_to_duration_times_rate() {
        assert_eq!(estimate_frame_count(0, 10.0, 29.97), 300);
        assert_eq!(estimate_frame_count(-1, 2.0, 25.0), 50);
    }

    #[test]
    fn unknown_duration_yields_zero_frames() {
        assert_eq!(estimate_frame_count(0, 0.0, 30.0), 0);
    }

    #[test]
    fn invalid_rationals_are_rejected() {
        assert_eq!(rational_to_f64(ffmpeg::Rational::new(0, 1)), None);
        assert_eq!(rational_to_f64(ffmpeg::Rational::new(30, 0)), None);
        assert_eq!(
            rational_to_f64(ffmpeg::Rational::new(30_000, 1001)),
            Some(30_000.0 / 1001.0)
        );
    }
}
