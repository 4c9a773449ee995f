use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use headtrack_core::detection::domain::cpu_usage::CpuUsage;
use headtrack_core::pipeline::frame_stats_logger::LogFrameStatsLogger;
use headtrack_core::pipeline::session::Session;
use headtrack_core::settings::Settings;
use headtrack_core::shared::constants::{
    ACCELERATION_MAX, AXIS_SPEED_MAX, IMAGE_EXTENSIONS, MOTION_SMOOTHING_MAX, MOTION_THRESHOLD_MAX,
};
use headtrack_core::shared::frame::Frame;
use headtrack_core::shared::orientation::{Flip, Rotation};

/// Replays a directory of frames through the head tracker and prints the
/// per-frame motion, pointer location and dwell clicks as CSV.
#[derive(Parser)]
#[command(name = "headtrack")]
struct Cli {
    /// Directory holding the frames, processed in file name order.
    frames: PathBuf,

    /// Face detection model (ONNX). Falls back to the model directory.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Clockwise rotation applied to every frame: 0, 90, 180 or 270.
    #[arg(long)]
    rotation: Option<i32>,

    /// Mirroring applied before rotation: none, vertical or horizontal.
    #[arg(long)]
    flip: Option<Flip>,

    /// Face detection rate, 0 (lowest) to 4 (highest).
    #[arg(long)]
    cpu_usage: Option<u8>,

    /// Keep the tracking area fixed instead of following the face.
    #[arg(long)]
    no_track_face: bool,

    /// Settings file to start from instead of the user's.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Screen the pointer moves on, as WIDTHxHEIGHT.
    #[arg(long, default_value = "1920x1080", value_parser = parse_screen)]
    screen: (u32, u32),

    /// Pointer speed for both axes, 0 to 30.
    #[arg(long)]
    speed: Option<u8>,

    /// Pointer acceleration profile, 0 (none) to 5.
    #[arg(long)]
    acceleration: Option<u8>,

    /// Pointer smoothing, 0 (none) to 8.
    #[arg(long)]
    smoothing: Option<u8>,

    /// Per-axis dead zone in screen pixels, 0 to 10.
    #[arg(long)]
    threshold: Option<u8>,

    /// Dwell time before a click, in milliseconds.
    #[arg(long)]
    dwell_time: Option<u64>,

    /// Disable dwell clicks.
    #[arg(long)]
    no_dwell: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = build_settings(&cli)?;
    let frames = list_frames(&cli.frames)?;
    if frames.is_empty() {
        return Err(format!("No frames found in {}", cli.frames.display()).into());
    }
    log::info!("Replaying {} frames from {}", frames.len(), cli.frames.display());

    let mut session =
        Session::new(&settings).with_logger(Box::new(LogFrameStatsLogger::default()));
    if !session.face_detection_available() {
        log::warn!("Face detection unavailable, tracking a fixed area");
    }
    let (width, height) = cli.screen;
    session.set_screen_size(width, height);

    let mut clicks = 0usize;
    println!("frame,vx,vy,face,px,py,click");
    for (index, path) in frames.iter().enumerate() {
        let frame = load_frame(path)?;
        let sample = session.process_frame(&frame, settings.flip, settings.rotation);
        let pointer = session.last_pointer();
        clicks += usize::from(pointer.clicked);
        println!(
            "{index},{:.3},{:.3},{},{:.1},{:.1},{}",
            sample.velocity.x,
            sample.velocity.y,
            u8::from(sample.face_detected),
            pointer.location.x,
            pointer.location.y,
            u8::from(pointer.clicked)
        );
    }
    session.summary();
    log::info!("{clicks} dwell click(s)");
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(model) = &cli.model {
        if !model.exists() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
        settings.model_path = Some(model.clone());
    }
    if let Some(degrees) = cli.rotation {
        settings.rotation = Rotation::try_from(degrees)?;
    }
    if let Some(flip) = cli.flip {
        settings.flip = flip;
    }
    if let Some(ordinal) = cli.cpu_usage {
        settings.cpu_usage = CpuUsage::try_from(ordinal)?;
    }
    if cli.no_track_face {
        settings.track_face = false;
    }
    if let Some(speed) = cli.speed {
        if speed > AXIS_SPEED_MAX {
            return Err(format!("Speed must be between 0 and {AXIS_SPEED_MAX}, got {speed}").into());
        }
        settings.pointer.horizontal_speed = speed;
        settings.pointer.vertical_speed = speed;
    }
    if let Some(level) = cli.acceleration {
        if level > ACCELERATION_MAX {
            return Err(
                format!("Acceleration must be between 0 and {ACCELERATION_MAX}, got {level}").into(),
            );
        }
        settings.pointer.acceleration = level;
    }
    if let Some(level) = cli.smoothing {
        if level > MOTION_SMOOTHING_MAX {
            return Err(format!(
                "Smoothing must be between 0 and {MOTION_SMOOTHING_MAX}, got {level}"
            )
            .into());
        }
        settings.pointer.smoothing = level;
    }
    if let Some(pixels) = cli.threshold {
        if pixels > MOTION_THRESHOLD_MAX {
            return Err(format!(
                "Threshold must be between 0 and {MOTION_THRESHOLD_MAX}, got {pixels}"
            )
            .into());
        }
        settings.pointer.threshold = pixels;
    }
    if let Some(millis) = cli.dwell_time {
        settings.dwell.dwell_time_ms = millis;
    }
    if cli.no_dwell {
        settings.dwell.enabled = false;
    }
    Ok(settings)
}

fn parse_screen(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let height: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if width == 0 || height == 0 {
        return Err(format!("screen must not be empty, got {width}x{height}"));
    }
    Ok((width, height))
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Frame directory not found: {}", dir.display()).into());
    }
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    frames.sort();
    Ok(frames)
}

fn load_frame(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::ffi::OsString;

    fn args(settings: &Path, extra: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["headtrack".into(), "frames".into(), "--settings".into()];
        args.push(settings.as_os_str().to_owned());
        args.extend(extra.iter().map(OsString::from));
        args
    }

    #[rstest]
    #[case("1920x1080", (1920, 1080))]
    #[case("800X600", (800, 600))]
    fn test_parse_screen(#[case] value: &str, #[case] expected: (u32, u32)) {
        assert_eq!(parse_screen(value).unwrap(), expected);
    }

    #[rstest]
    #[case("1920")]
    #[case("0x600")]
    #[case("axb")]
    fn test_parse_screen_rejects(#[case] value: &str) {
        assert!(parse_screen(value).is_err());
    }

    #[test]
    fn test_pointer_flags_override_settings() {
        let cli = Cli::parse_from([
            "headtrack",
            "frames",
            "--settings",
            "/nonexistent/headtrack/settings.json",
        ]);
        // a missing explicit settings file is an error, not a silent default
        assert!(build_settings(&cli).is_err());

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        Settings::default().save_to(&path).unwrap();
        let cli = Cli::parse_from(args(
            &path,
            &["--speed", "12", "--acceleration", "3", "--no-dwell"],
        ));
        let settings = build_settings(&cli).unwrap();
        assert_eq!(settings.pointer.horizontal_speed, 12);
        assert_eq!(settings.pointer.vertical_speed, 12);
        assert_eq!(settings.pointer.acceleration, 3);
        assert!(!settings.dwell.enabled);
        assert_eq!(cli.screen, (1920, 1080));
    }

    #[test]
    fn test_out_of_range_acceleration_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        Settings::default().save_to(&path).unwrap();
        let cli = Cli::parse_from(args(&path, &["--acceleration", "6"]));
        assert!(build_settings(&cli).is_err());
    }
}
