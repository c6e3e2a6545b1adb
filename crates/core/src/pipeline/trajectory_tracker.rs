use crate::shared::face_box::FaceBox;

/// Centers of every confirmed match in the current run, in match order.
///
/// The sequence only grows during a run; it is cleared when the next run
/// starts.
#[derive(Debug, Default)]
pub struct TrajectoryTracker {
    points: Vec<(i32, i32)>,
}

impl TrajectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, face: &FaceBox) {
        self.points.push(face.center());
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    /// A path needs at least two points to be drawn.
    pub fn is_drawable(&self) -> bool {
        self.points.len() > 1
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
