pub mod good_features;
pub mod lucas_kanade;
mod plane;
