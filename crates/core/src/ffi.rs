//! C ABI for embedding a [`Session`] in a non-Rust host.
//!
//! The crate builds as a `cdylib` and `staticlib`; `include/headtrack.h`
//! declares every function below. Every function takes the opaque handle
//! returned by [`headtrack_session_create`]. Passing a null or dangling
//! handle is undefined behaviour, except where noted.

use std::ffi::{c_char, CStr};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::session::{fail_fast, Session};
use crate::settings::Settings;
use crate::shared::orientation::{Flip, Rotation};

/// Creates a session from the stored settings. `model_path` may be null;
/// otherwise it overrides the configured face model.
///
/// # Safety
/// `model_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn headtrack_session_create(model_path: *const c_char) -> *mut Session {
    let mut settings = Settings::load();
    if !model_path.is_null() {
        let path = CStr::from_ptr(model_path).to_string_lossy().into_owned();
        settings.model_path = Some(PathBuf::from(path));
    }
    Box::into_raw(Box::new(Session::new(&settings)))
}

/// Stops the face locator and frees the session. Null is ignored.
///
/// # Safety
/// `session` must be null or a handle from [`headtrack_session_create`] not
/// yet destroyed.
#[no_mangle]
pub unsafe extern "C" fn headtrack_session_destroy(session: *mut Session) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Processes one frame of `width * height * channels` bytes, rows top to
/// bottom without padding. `channels` is 1 (gray), 3 (RGB) or 4 (RGBA,
/// alpha ignored); BGR(A) pixels must be swapped to RGB(A) first. `flip`
/// is 0 (none), 1 (vertical) or 2 (horizontal); `rotation` is clockwise
/// degrees, one of 0, 90, 180 or 270.
///
/// Returns whether a face counts as detected. Invalid input terminates the
/// process.
///
/// # Safety
/// `session` must be a live handle and `data` must point to `len` bytes.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn headtrack_process_frame(
    session: *mut Session,
    data: *const u8,
    len: usize,
    width: u32,
    height: u32,
    channels: u8,
    flip: i32,
    rotation: i32,
) -> bool {
    let session = &mut *session;
    if data.is_null() {
        fail_fast(&"null frame data");
    }
    let flip = Flip::try_from(flip).unwrap_or_else(|e| fail_fast(&e));
    let rotation = Rotation::try_from(rotation).unwrap_or_else(|e| fail_fast(&e));
    let pixels = std::slice::from_raw_parts(data, len);
    session
        .process_raw(pixels, width, height, channels, flip, rotation)
        .face_detected
}

/// Writes the velocity of the last processed frame. Returns its
/// face-detected flag.
///
/// # Safety
/// `session` must be a live handle; `x` and `y` must be valid for writes.
#[no_mangle]
pub unsafe extern "C" fn headtrack_get_motion(session: *const Session, x: *mut f32, y: *mut f32) -> bool {
    let sample = (*session).last_sample();
    *x = sample.velocity.x;
    *y = sample.velocity.y;
    sample.face_detected
}

/// Writes the pointer location after the last processed frame and its
/// dwell progress (0 to 100). Returns whether that frame fired a dwell
/// click. Any output pointer may be null.
///
/// # Safety
/// `session` must be a live handle; non-null outputs must be valid for
/// writes.
#[no_mangle]
pub unsafe extern "C" fn headtrack_get_pointer(
    session: *const Session,
    x: *mut f32,
    y: *mut f32,
    click_progress: *mut u8,
) -> bool {
    let pointer = (*session).last_pointer();
    if !x.is_null() {
        *x = pointer.location.x;
    }
    if !y.is_null() {
        *y = pointer.location.y;
    }
    if !click_progress.is_null() {
        *click_progress = pointer.click_progress;
    }
    pointer.clicked
}

/// Sets the screen the pointer moves on and recentres the pointer.
/// Zero dimensions are ignored.
///
/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_set_screen_size(session: *mut Session, width: u32, height: u32) {
    if width == 0 || height == 0 {
        log::warn!("Ignoring empty screen size {width}x{height}");
        return;
    }
    (*session).set_screen_size(width, height);
}

/// Recentres the pointer and cancels any running dwell.
///
/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_reset_pointer(session: *mut Session) {
    (*session).reset_pointer();
}

/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_get_time_without_detection(session: *const Session) -> u64 {
    (*session).time_without_detection().as_millis() as u64
}

/// How long, in milliseconds, a past detection keeps counting as a face.
/// Zero counts only the current frame.
///
/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_set_time_without_detection(session: *mut Session, millis: u64) {
    (*session).set_time_without_detection(Duration::from_millis(millis));
}

/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_get_track_face(session: *const Session) -> bool {
    (*session).track_face()
}

/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_set_track_face(session: *mut Session, enabled: bool) {
    (*session).set_track_face(enabled);
}

/// CPU usage tier as an ordinal, 0 (lowest) to 4 (highest).
///
/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_get_cpu_usage(session: *const Session) -> u8 {
    (*session).cpu_usage().ordinal()
}

/// Returns `false` and leaves the tier unchanged for ordinals above 4.
///
/// # Safety
/// `session` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn headtrack_set_cpu_usage(session: *mut Session, ordinal: u8) -> bool {
    match (*session).set_cpu_usage(ordinal) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{e}");
            false
        }
    }
}
