pub mod error;
pub mod frame_stats_logger;
pub mod session;
pub mod vision_pipeline;
