pub mod arcface_encoder;
pub mod execution_provider;
pub mod math;
pub mod model_resolver;
pub mod onnx_embedding_service;
pub mod onnx_yolo_detector;
