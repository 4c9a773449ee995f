use std::time::Duration;

use crate::detection::domain::cpu_usage::CpuUsage;
use crate::detection::infrastructure::face_locator::FaceLocator;
use crate::detection::infrastructure::model_resolver::{self, DEFAULT_MODEL_NAME};
use crate::detection::infrastructure::onnx_face_classifier::OnnxFaceClassifier;
use crate::pipeline::error::PipelineError;
use crate::pipeline::frame_stats_logger::FrameStatsLogger;
use crate::pipeline::vision_pipeline::{MotionSample, PipelineConfig, VisionPipeline};
use crate::pointer::dwell_click::{DwellClick, DwellSettings};
use crate::pointer::pointer_control::{PointerControl, PointerSettings};
use crate::settings::Settings;
use crate::shared::constants::{DEFAULT_SCREEN_HEIGHT, DEFAULT_SCREEN_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::geometry::{FrameSize, Point2f};
use crate::shared::orientation::{Flip, Rotation};
use crate::tracking::infrastructure::good_features::GoodFeaturesExtractor;
use crate::tracking::infrastructure::lucas_kanade::LucasKanadeTracker;

/// Pointer state after one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerSample {
    pub location: Point2f,
    pub clicked: bool,
    /// Dwell progress, 0..=100.
    pub click_progress: u8,
}

/// Host-facing tracking context.
///
/// Owns one [`VisionPipeline`] wired with the bundled collaborators, feeds
/// its velocity to the pointer and dwell click, and remembers the last
/// samples for hosts that read them separately.
pub struct Session {
    pipeline: VisionPipeline,
    pointer: PointerControl,
    dwell: DwellClick,
    click_enabled: bool,
    host_frame: Frame,
    last: MotionSample,
    last_pointer: PointerSample,
}

impl Session {
    /// Builds a session from settings. A missing or broken face model only
    /// disables face detection.
    pub fn new(settings: &Settings) -> Self {
        let model = model_resolver::resolve(settings.model_path.as_deref(), DEFAULT_MODEL_NAME, None)
            .and_then(|path| OnnxFaceClassifier::load(&path));
        let pipeline = VisionPipeline::new(
            FaceLocator::from_model(model),
            Box::new(GoodFeaturesExtractor::default()),
            Box::new(LucasKanadeTracker::default()),
            settings.pipeline_config(),
        );
        Self::with_pipeline(pipeline).with_pointer_settings(settings.pointer, settings.dwell)
    }

    /// Session without face detection.
    pub fn without_face_detection(config: PipelineConfig) -> Self {
        Self::with_pipeline(VisionPipeline::new(
            FaceLocator::unavailable(),
            Box::new(GoodFeaturesExtractor::default()),
            Box::new(LucasKanadeTracker::default()),
            config,
        ))
    }

    /// Wraps `pipeline` with default pointer settings on a
    /// `1920x1080` screen.
    pub fn with_pipeline(pipeline: VisionPipeline) -> Self {
        let dwell = DwellSettings::default();
        let screen = FrameSize::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT);
        let pointer = PointerControl::new(PointerSettings::default(), screen);
        Self {
            pipeline,
            last_pointer: PointerSample {
                location: pointer.location(),
                ..PointerSample::default()
            },
            pointer,
            dwell: DwellClick::new(dwell),
            click_enabled: dwell.enabled,
            host_frame: Frame::default(),
            last: MotionSample::default(),
        }
    }

    pub fn with_pointer_settings(mut self, pointer: PointerSettings, dwell: DwellSettings) -> Self {
        self.set_pointer_settings(pointer, dwell);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn FrameStatsLogger>) -> Self {
        self.pipeline = self.pipeline.with_logger(logger);
        self
    }

    /// Processes a frame and returns the motion, or the failure.
    pub fn try_process_frame(
        &mut self,
        frame: &Frame,
        flip: Flip,
        rotation: Rotation,
    ) -> Result<MotionSample, PipelineError> {
        let sample = self.pipeline.process_frame(frame, flip, rotation)?;
        self.last = sample;
        self.last_pointer = self.move_pointer(sample.velocity);
        Ok(sample)
    }

    fn move_pointer(&mut self, velocity: Point2f) -> PointerSample {
        let location = self.pointer.update(velocity);
        if !self.click_enabled {
            self.dwell.reset();
            return PointerSample {
                location,
                ..PointerSample::default()
            };
        }
        let clicked = self.dwell.update(location);
        if clicked {
            log::debug!("Dwell click at {:.0},{:.0}", location.x, location.y);
        }
        PointerSample {
            location,
            clicked,
            click_progress: self.dwell.progress_percent(),
        }
    }

    /// Processes a frame; any failure terminates the process.
    ///
    /// A pointer must never be driven from a pipeline in an unknown state.
    pub fn process_frame(&mut self, frame: &Frame, flip: Flip, rotation: Rotation) -> MotionSample {
        match self.try_process_frame(frame, flip, rotation) {
            Ok(sample) => sample,
            Err(e) => fail_fast(&e),
        }
    }

    /// Copies raw host pixels into the session's frame buffer, then
    /// processes them like [`Session::process_frame`].
    pub fn process_raw(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        flip: Flip,
        rotation: Rotation,
    ) -> MotionSample {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            fail_fast(&PipelineError::InvalidFrame(format!(
                "{} bytes for {width}x{height}x{channels}",
                data.len()
            )));
        }
        let mut frame = std::mem::take(&mut self.host_frame);
        frame.assign(data, width, height, channels);
        let sample = self.process_frame(&frame, flip, rotation);
        self.host_frame = frame;
        sample
    }

    pub fn last_sample(&self) -> MotionSample {
        self.last
    }

    pub fn last_pointer(&self) -> PointerSample {
        self.last_pointer
    }

    /// Replaces the pointer mapping and dwell settings without moving the
    /// pointer.
    pub fn set_pointer_settings(&mut self, pointer: PointerSettings, dwell: DwellSettings) {
        self.pointer.apply(pointer);
        self.dwell.apply(dwell);
        if self.click_enabled != dwell.enabled {
            self.dwell.reset();
        }
        self.click_enabled = dwell.enabled;
    }

    pub fn screen_size(&self) -> FrameSize {
        self.pointer.screen()
    }

    /// Changes the screen the pointer moves on and recentres it.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.pointer.set_screen(FrameSize::new(width, height));
        self.dwell.reset();
        self.last_pointer = PointerSample {
            location: self.pointer.location(),
            ..PointerSample::default()
        };
    }

    /// Recentres the pointer and forgets any running dwell.
    pub fn reset_pointer(&mut self) {
        self.pointer.reset();
        self.dwell.reset();
        self.last_pointer = PointerSample {
            location: self.pointer.location(),
            ..PointerSample::default()
        };
    }

    pub fn track_face(&self) -> bool {
        self.pipeline.track_face()
    }

    pub fn set_track_face(&mut self, enabled: bool) {
        self.pipeline.set_track_face(enabled);
    }

    pub fn cpu_usage(&self) -> CpuUsage {
        self.pipeline.cpu_usage()
    }

    /// Sets the CPU tier by ordinal (0 = lowest .. 4 = highest).
    pub fn set_cpu_usage(&mut self, ordinal: u8) -> Result<(), String> {
        let tier = CpuUsage::try_from(ordinal)?;
        self.pipeline.set_cpu_usage(tier);
        Ok(())
    }

    pub fn time_without_detection(&self) -> Duration {
        self.pipeline.time_without_detection()
    }

    /// Changes how long a past detection keeps counting as a face.
    pub fn set_time_without_detection(&mut self, window: Duration) {
        self.pipeline.set_time_without_detection(window);
    }

    pub fn face_detection_available(&self) -> bool {
        self.pipeline.locator().is_available()
    }

    pub fn summary(&self) {
        self.pipeline.summary();
    }
}

pub(crate) fn fail_fast(error: &dyn std::fmt::Display) -> ! {
    log::error!("Tracking aborted: {error}");
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings_without_model() -> Settings {
        Settings {
            model_path: Some(PathBuf::from("/nonexistent/headtrack/model.onnx")),
            ..Settings::default()
        }
    }

    #[test]
    fn test_missing_model_degrades() {
        // only meaningful when no model is installed in the user data dir
        let session = Session::new(&settings_without_model());
        if model_resolver::model_dir()
            .map(|d| d.join(DEFAULT_MODEL_NAME).is_file())
            .unwrap_or(false)
        {
            return;
        }
        assert!(!session.face_detection_available());
    }

    #[test]
    fn test_cpu_usage_by_ordinal() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        session.set_cpu_usage(4).unwrap();
        assert_eq!(session.cpu_usage(), CpuUsage::Highest);
        assert!(session.set_cpu_usage(9).is_err());
        assert_eq!(session.cpu_usage(), CpuUsage::Highest);
    }

    #[test]
    fn test_track_face_toggle() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        assert!(session.track_face());
        session.set_track_face(false);
        assert!(!session.track_face());
    }

    #[test]
    fn test_process_raw_remembers_last_sample() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        let data = vec![100u8; 64 * 48 * 3];
        let first = session.process_raw(&data, 64, 48, 3, Flip::None, Rotation::Deg0);
        assert_eq!(first, MotionSample::default());
        let second = session.process_raw(&data, 64, 48, 3, Flip::None, Rotation::Deg0);
        assert_eq!(session.last_sample(), second);
        // a flat image has no features, so no motion
        assert_eq!(second.velocity.x, 0.0);
    }

    #[test]
    fn test_time_without_detection_adjustable() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        assert_eq!(session.time_without_detection(), Duration::from_millis(1000));
        session.set_time_without_detection(Duration::from_millis(250));
        assert_eq!(session.time_without_detection(), Duration::from_millis(250));
    }

    #[test]
    fn test_pointer_starts_centred_on_screen() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        assert_eq!(session.last_pointer().location, Point2f::new(960.0, 540.0));
        session.set_screen_size(640, 480);
        assert_eq!(session.screen_size(), FrameSize::new(640, 480));
        assert_eq!(session.last_pointer().location, Point2f::new(320.0, 240.0));
    }

    #[test]
    fn test_resting_pointer_dwell_clicks() {
        let dwell = DwellSettings {
            dwell_time_ms: 0,
            ..DwellSettings::default()
        };
        let mut session = Session::without_face_detection(PipelineConfig::default())
            .with_pointer_settings(PointerSettings::default(), dwell);
        let data = vec![100u8; 64 * 48];

        let mut clicked = false;
        for _ in 0..10 {
            session.process_raw(&data, 64, 48, 1, Flip::None, Rotation::Deg0);
            if session.last_pointer().clicked {
                clicked = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(clicked);
        assert_eq!(session.last_pointer().location, Point2f::new(960.0, 540.0));
    }

    #[test]
    fn test_disabled_dwell_never_clicks() {
        let dwell = DwellSettings {
            enabled: false,
            dwell_time_ms: 0,
            ..DwellSettings::default()
        };
        let mut session = Session::without_face_detection(PipelineConfig::default())
            .with_pointer_settings(PointerSettings::default(), dwell);
        let data = vec![100u8; 64 * 48];
        for _ in 0..5 {
            session.process_raw(&data, 64, 48, 1, Flip::None, Rotation::Deg0);
            assert!(!session.last_pointer().clicked);
            assert_eq!(session.last_pointer().click_progress, 0);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_try_process_reports_errors() {
        let mut session = Session::without_face_detection(PipelineConfig::default());
        let result = session.try_process_frame(&Frame::default(), Flip::None, Rotation::Deg0);
        assert!(matches!(result, Err(PipelineError::InvalidFrame(_))));
    }
}
