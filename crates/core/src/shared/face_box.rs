/// Pixel bounding box of a detected face, edges in `(top, right, bottom, left)`
/// order. `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl FaceBox {
    pub fn new(top: i32, right: i32, bottom: i32, left: i32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Builds a box from `[x1, y1, x2, y2]` corner coordinates, rounding
    /// outward so the whole face stays inside.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            top: y1.floor() as i32,
            right: x2.ceil() as i32,
            bottom: y2.ceil() as i32,
            left: x1.floor() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Pixel center `((left + right) / 2, (top + bottom) / 2)`.
    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    /// Intersects the box with a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceBox> {
        let clamped = FaceBox {
            top: self.top.clamp(0, height as i32),
            right: self.right.clamp(0, width as i32),
            bottom: self.bottom.clamp(0, height as i32),
            left: self.left.clamp(0, width as i32),
        };
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_dimensions() {
        let b = FaceBox::new(10, 60, 90, 20);
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 80);
        assert!(!b.is_empty());
    }

    #[test]
    fn test_inverted_box_is_empty() {
        let b = FaceBox::new(50, 10, 40, 20);
        assert_eq!(b.width(), 0);
        assert_eq!(b.height(), 0);
        assert!(b.is_empty());
    }

    #[rstest]
    #[case::even(FaceBox::new(0, 100, 50, 0), (50, 25))]
    #[case::odd_sum_truncates(FaceBox::new(1, 10, 4, 3), (6, 2))]
    #[case::offset(FaceBox::new(100, 300, 200, 200), (250, 150))]
    fn test_center(#[case] b: FaceBox, #[case] expected: (i32, i32)) {
        assert_eq!(b.center(), expected);
    }

    #[test]
    fn test_from_corners_rounds_outward() {
        let b = FaceBox::from_corners(10.6, 5.2, 40.1, 30.9);
        assert_eq!(b, FaceBox::new(5, 41, 31, 10));
    }

    #[test]
    fn test_clamp_inside_is_unchanged() {
        let b = FaceBox::new(10, 60, 90, 20);
        assert_eq!(b.clamp_to(100, 100), Some(b));
    }

    #[test]
    fn test_clamp_partially_outside() {
        let b = FaceBox::new(-10, 120, 50, 80);
        assert_eq!(b.clamp_to(100, 100), Some(FaceBox::new(0, 100, 50, 80)));
    }

    #[test]
    fn test_clamp_fully_outside_is_none() {
        let b = FaceBox::new(200, 300, 250, 220);
        assert!(b.clamp_to(100, 100).is_none());
    }
}
