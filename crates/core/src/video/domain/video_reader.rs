use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Reads frames from a recorded video source.
///
/// Implementations handle codec and container details; the detection
/// engine only sees `Frame` and `VideoMetadata`.
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata (frame count, fps, size).
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Returns an iterator over frames in decode order. `None` marks end of
    /// stream.
    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
