pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Pause re-check interval; a paused loop wakes at least this often.
pub const PAUSE_POLL_MS: u64 = 100;

pub const MATCH_IMAGE_PREFIX: &str = "match_";
pub const MATCH_IMAGE_EXTENSION: &str = "jpg";
pub const CLIP_PREFIX: &str = "clip_";
pub const CLIP_EXTENSION: &str = "avi";
pub const REPORT_PREFIX: &str = "detection_report_";
pub const REPORT_EXTENSION: &str = "txt";

/// `YYYYMMDDHHMMSS`, used in crop and clip file names.
pub const COMPACT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// `YYYYMMDD_HHMMSS`, used in report file names.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
