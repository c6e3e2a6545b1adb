use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedding_service::FaceEmbeddingService;
use crate::shared::embedding::Embedding;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::arcface_encoder::ArcFaceEncoder;

/// Default native match tolerance on the normalized `[0, 1]` distance.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Face embedding service assembled from a face detector and an ArcFace
/// encoder.
///
/// Distance is the Euclidean distance between unit-length embeddings
/// (range `[0, 2]`) halved into `[0, 1]`.
pub struct OnnxFaceEmbeddingService {
    detector: Box<dyn FaceDetector>,
    encoder: ArcFaceEncoder,
    tolerance: f64,
}

impl OnnxFaceEmbeddingService {
    pub fn new(detector: Box<dyn FaceDetector>, encoder: ArcFaceEncoder, tolerance: f64) -> Self {
        Self {
            detector,
            encoder,
            tolerance,
        }
    }
}

impl FaceEmbeddingService for OnnxFaceEmbeddingService {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        self.detector.detect(frame)
    }

    fn encode_faces(
        &mut self,
        frame: &Frame,
        faces: &[FaceBox],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
        faces
            .iter()
            .map(|face| {
                let crop = frame.crop(face).ok_or("face box lies outside the frame")?;
                self.encoder.encode(&crop)
            })
            .collect()
    }

    fn is_match(&self, known: &Embedding, candidate: &Embedding) -> bool {
        self.distance(known, candidate) <= self.tolerance
    }

    fn distance(&self, known: &Embedding, candidate: &Embedding) -> f64 {
        normalized_distance(known, candidate)
    }
}

/// Euclidean distance of unit vectors mapped onto `[0, 1]`.
pub fn normalized_distance(a: &Embedding, b: &Embedding) -> f64 {
    (a.euclidean_distance(b) / 2.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identical_embeddings_have_zero_distance() {
        let e = Embedding::new(vec![0.6, 0.8]);
        assert_relative_eq!(normalized_distance(&e, &e), 0.0);
    }

    #[test]
    fn test_opposite_embeddings_have_unit_distance() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert_relative_eq!(normalized_distance(&a, &b), 1.0);
    }

    #[test]
    fn test_orthogonal_embeddings() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert_relative_eq!(
            normalized_distance(&a, &b),
            2f64.sqrt() / 2.0,
            epsilon = 1e-9
        );
    }
}
