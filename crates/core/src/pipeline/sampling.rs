/// Whether the frame at `frame_index` receives full face analysis.
///
/// A stride of 0 is treated as 1 so every frame is analyzed.
pub fn should_analyze(frame_index: usize, frame_skip: usize) -> bool {
    frame_index % frame_skip.max(1) == 0
}
