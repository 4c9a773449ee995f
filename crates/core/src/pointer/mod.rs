pub mod acceleration;
pub mod dwell_click;
pub mod pointer_control;
