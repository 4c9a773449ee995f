pub mod face_locator;
pub mod model_resolver;
pub mod onnx_face_classifier;
