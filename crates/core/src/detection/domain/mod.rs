pub mod cpu_usage;
pub mod face_classifier;
pub mod face_region;
