use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Locates faces in a frame.
///
/// Implementations may keep per-session scratch state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}
