/// Capacity of the tracked feature set.
pub const MAX_FEATURES: usize = 15;

/// Default ROI size as a fraction of the frame (centred).
pub const DEFAULT_TRACK_AREA_WIDTH: f32 = 0.6;
pub const DEFAULT_TRACK_AREA_HEIGHT: f32 = 0.6;

/// Side ratio of the central sub-rectangle used to seed features.
pub const FEATURE_AREA_RATIO: f32 = 0.4;

/// Corner response threshold relative to the strongest corner.
pub const CORNER_QUALITY_LEVEL: f32 = 0.001;
pub const CORNER_MIN_DISTANCE: f32 = 2.0;

/// Sub-pixel refinement: 5x5 search window.
pub const SUBPIX_HALF_WINDOW: i32 = 2;
pub const SUBPIX_MAX_ITERATIONS: usize = 20;
pub const SUBPIX_EPSILON: f32 = 0.03;

/// Optical flow: 11x11 window.
pub const FLOW_HALF_WINDOW: i32 = 5;
pub const FLOW_MAX_ITERATIONS: usize = 14;
pub const FLOW_EPSILON: f32 = 0.03;
pub const FLOW_PYRAMID_LEVELS: usize = 2;

/// Smallest face the classifier scan reports, in pixels per side.
pub const MIN_FACE_SIZE: u32 = 65;

/// How long a face counts as "recently detected" by default.
pub const DEFAULT_TIME_WITHOUT_DETECTION_MS: u64 = 1000;

pub const SETTINGS_DIR_NAME: &str = "HeadTrack";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Pointer speed per axis, as an exponent step of `6^(speed / 6)`.
pub const AXIS_SPEED_MIN: u8 = 0;
pub const AXIS_SPEED_MAX: u8 = 30;
pub const AXIS_SPEED_DEFAULT: u8 = 8;

/// Pointer acceleration profile, 0 (none) to 5.
pub const ACCELERATION_MAX: u8 = 5;
pub const ACCELERATION_DEFAULT: u8 = 2;

/// Low-pass smoothing level; the filter weight is `log10(level + 1)`.
pub const MOTION_SMOOTHING_MAX: u8 = 8;
pub const MOTION_SMOOTHING_DEFAULT: u8 = 1;

/// Per-axis dead zone in screen pixels.
pub const MOTION_THRESHOLD_MAX: u8 = 10;
pub const MOTION_THRESHOLD_DEFAULT: u8 = 0;

pub const DWELL_TIME_DEFAULT_MS: u64 = 1000;
/// Radius, in screen pixels, the pointer may wander while dwelling.
pub const DWELL_AREA_DEFAULT: u16 = 5;

pub const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1080;
