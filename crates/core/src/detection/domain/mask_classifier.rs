use crate::shared::frame::Frame;

/// Flags a face as masked when its grayscale texture is unusually flat.
///
/// This is a uniformity heuristic, not a trained classifier: blur, low
/// light, or a featureless background can all read as "masked".
#[derive(Clone, Copy, Debug)]
pub struct MaskClassifier {
    std_threshold: f64,
}

impl MaskClassifier {
    pub fn new(std_threshold: f64) -> Self {
        Self { std_threshold }
    }

    /// `true` iff the face crop's grayscale standard deviation is strictly
    /// below the threshold. An empty crop is never masked.
    pub fn has_mask(&self, face: &Frame) -> bool {
        grayscale_std(face).is_some_and(|std| std < self.std_threshold)
    }
}

/// Population standard deviation of the crop's luma (BT.601 weights, rounded
/// to 8-bit like a standard RGB→gray conversion).
pub fn grayscale_std(frame: &Frame) -> Option<f64> {
    let channels = frame.channels() as usize;
    if channels == 0 || frame.data().is_empty() {
        return None;
    }

    let luma: Vec<f64> = frame
        .data()
        .chunks_exact(channels)
        .map(|px| {
            if channels >= 3 {
                (0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64).round()
            } else {
                px[0] as f64
            }
        })
        .collect();

    let n = luma.len() as f64;
    let mean = luma.iter().sum::<f64>() / n;
    let variance = luma.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Half the pixels gray level 0, half gray level 40: mean 20, std 20.
    fn two_tone_face() -> Frame {
        let mut data = Vec::new();
        for i in 0..16 {
            let v = if i % 2 == 0 { 0 } else { 40 };
            data.extend_from_slice(&[v, v, v]);
        }
        Frame::new(data, 4, 4, 3, 0)
    }

    #[test]
    fn test_grayscale_std_of_two_tone() {
        assert_relative_eq!(grayscale_std(&two_tone_face()).unwrap(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_grayscale_std_of_flat_face_is_zero() {
        let face = Frame::new(vec![90; 5 * 5 * 3], 5, 5, 3, 0);
        assert_relative_eq!(grayscale_std(&face).unwrap(), 0.0);
    }

    #[test]
    fn test_grayscale_uses_luma_weights() {
        // Pure red vs pure green: luma 76 vs 150
        let data = vec![255, 0, 0, 0, 255, 0];
        let face = Frame::new(data, 2, 1, 3, 0);
        assert_relative_eq!(grayscale_std(&face).unwrap(), 37.0, epsilon = 1e-9);
    }

    #[test]
    fn test_std_equal_to_threshold_is_not_masked() {
        assert!(!MaskClassifier::new(20.0).has_mask(&two_tone_face()));
    }

    #[test]
    fn test_std_just_below_threshold_is_masked() {
        assert!(MaskClassifier::new(20.001).has_mask(&two_tone_face()));
    }

    #[test]
    fn test_textured_face_is_not_masked() {
        assert!(!MaskClassifier::new(5.0).has_mask(&two_tone_face()));
    }

    #[test]
    fn test_empty_crop_is_not_masked() {
        let empty = Frame::new(Vec::new(), 0, 0, 3, 0);
        assert!(grayscale_std(&empty).is_none());
        assert!(!MaskClassifier::new(100.0).has_mask(&empty));
    }
}
