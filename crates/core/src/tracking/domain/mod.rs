pub mod feature_extractor;
pub mod feature_points;
pub mod motion_estimator;
pub mod normalized_roi;
pub mod optical_flow;
