use std::path::Path;

use crate::shared::frame::Frame;

/// Writes a single frame (typically a face crop) to an image file.
pub trait ImageWriter: Send {
    /// Writes a frame to the given path; the format follows the extension.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;
}
