//! Head-motion tracking: turns a live video of a user's head into a 2D
//! velocity, and that velocity into pointer motion and dwell clicks.
//!
//! [`pipeline::session::Session`] is the entry point for hosts; [`ffi`]
//! exposes it over a C ABI.

pub mod detection;
pub mod ffi;
pub mod pipeline;
pub mod pointer;
pub mod settings;
pub mod shared;
pub mod tracking;
