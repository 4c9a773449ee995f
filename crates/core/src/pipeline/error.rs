use thiserror::Error;

/// Failure while processing one frame. Any of these leaves the tracking
/// state untrustworthy; hosts are expected to stop.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("face classifier failed: {0}")]
    FaceScan(String),
    #[error("feature extraction failed: {0}")]
    FeatureExtraction(String),
    #[error("optical flow failed: {0}")]
    OpticalFlow(String),
}
