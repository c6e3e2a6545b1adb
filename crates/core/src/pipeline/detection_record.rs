use std::path::PathBuf;
use std::time::Duration;

/// One confirmed watch-list match.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRecord {
    pub frame_index: usize,
    /// Position in the source video, `frame_index / fps`.
    pub elapsed: Duration,
    /// Where the matched face crop was written.
    pub image_path: PathBuf,
    /// `1 - distance` of the best qualifying reference, in `[0, 1]`.
    pub confidence: f64,
    pub has_mask: bool,
}

/// Video position of `frame_index` at `fps`; zero when fps is unusable.
pub fn elapsed_at(frame_index: usize, fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(frame_index as f64 / fps)
    } else {
        Duration::ZERO
    }
}
