//! BlazeFace face classifier using ONNX Runtime via `ort`.
//!
//! Works on the pipeline's grayscale frames: the single channel is fed to
//! all three model inputs.
use std::path::{Path, PathBuf};

use crate::detection::domain::face_classifier::FaceClassifier;
use crate::detection::infrastructure::model_resolver::ModelLoadError;
use crate::shared::frame::Frame;
use crate::shared::geometry::PixelRect;
use crate::shared::BoxError;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

pub struct OnnxFaceClassifier {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxFaceClassifier {
    /// Load a BlazeFace ONNX model.
    pub fn load(model_path: &Path) -> Result<Self, ModelLoadError> {
        Self::with_confidence(model_path, DEFAULT_CONFIDENCE)
    }

    pub fn with_confidence(model_path: &Path, confidence: f32) -> Result<Self, ModelLoadError> {
        if !model_path.is_file() {
            return Err(ModelLoadError::NotFound {
                name: model_path.display().to_string(),
                searched: vec![model_path.to_path_buf()],
            });
        }
        let session = ort::session::Session::builder()
            .map_err(session_error(model_path))?
            .with_execution_providers(execution_providers())
            .map_err(session_error(model_path))?
            .commit_from_file(model_path)
            .map_err(session_error(model_path))?;
        log::info!("Loaded face model {}", model_path.display());

        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceClassifier for OnnxFaceClassifier {
    fn scan(&mut self, frame: &Frame, min_size: u32) -> Result<Vec<PixelRect>, BoxError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;

        // 1. Preprocess: resize to 128x128, normalize to [0,1], NCHW
        let s = INPUT_SIZE as usize;
        let mut input = ndarray::Array4::<f32>::zeros((1, 3, s, s));
        preprocess(frame, &mut input);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors [1, 896, 16], classificators [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }
        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        // 3. Decode anchor boxes + filter by confidence and size
        let mut raw_dets = Vec::new();
        let num_anchors = self.anchors.len().min(NUM_ANCHORS);
        for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
            let score = sigmoid(raw_score);
            if score < self.confidence {
                continue;
            }
            let reg_offset = i * REGRESSOR_STRIDE;
            if reg_offset + 4 > reg_data.len() {
                break;
            }
            let det = decode_box(&self.anchors[i], &reg_data[reg_offset..reg_offset + 4], fw, fh, score);
            if det.width() < min_size as f32 || det.height() < min_size as f32 {
                continue;
            }
            raw_dets.push(det);
        }

        // 4. NMS, strongest first
        let kept = nms(&mut raw_dets, NMS_IOU_THRESH);
        log::trace!("BlazeFace: {} candidates, {} after NMS", raw_dets.len(), kept.len());

        Ok(kept.iter().map(RawDet::to_rect).collect())
    }
}

fn session_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> ModelLoadError + '_ {
    move |e| ModelLoadError::Session {
        path: PathBuf::from(path),
        message: e.to_string(),
    }
}

fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Nearest-neighbour resize into `tensor` (1x3xSxS), normalized to [0,1].
/// Gray frames are replicated across the three channels.
fn preprocess(frame: &Frame, tensor: &mut ndarray::Array4<f32>) {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;
    let s = tensor.shape()[2];

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c.min(channels - 1)]] as f32 / 255.0;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Two feature maps: 16x16 with 2 anchors per cell and 8x8 with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                anchors.extend(std::iter::repeat([cx, cy]).take(num));
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding and NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

impl RawDet {
    fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    fn to_rect(&self) -> PixelRect {
        PixelRect::new(
            self.x1 as i32,
            self.y1 as i32,
            self.width() as i32,
            self.height() as i32,
        )
    }
}

/// Box centre and size relative to the anchor, clamped to the frame.
fn decode_box(anchor: &[f32; 2], reg: &[f32], fw: f32, fh: f32, score: f32) -> RawDet {
    let cx = anchor[0] + reg[0] / INPUT_SIZE as f32;
    let cy = anchor[1] + reg[1] / INPUT_SIZE as f32;
    let w = reg[2] / INPUT_SIZE as f32;
    let h = reg[3] / INPUT_SIZE as f32;
    RawDet {
        x1: ((cx - w / 2.0) * fw).max(0.0),
        y1: ((cy - h / 2.0) * fh).max(0.0),
        x2: ((cx + w / 2.0) * fw).min(fw),
        y2: ((cy + h / 2.0) * fh).min(fh),
        score,
    }
}

fn nms(dets: &mut [RawDet], iou_thresh: f32) -> Vec<RawDet> {
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<RawDet> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(k, det) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = a.width() * a.height();
    let area_b = b.width() * b.height();
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
