pub mod constants;
pub mod countdown;
pub mod frame;
pub mod geometry;
pub mod orientation;

/// Error type returned by pluggable collaborators (classifier, feature
/// extractor, optical flow). Sendable so worker threads can hand it back.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
