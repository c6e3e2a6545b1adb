use crate::detection::domain::face_embedding_service::FaceEmbeddingService;
use crate::shared::embedding::Embedding;

/// Decides whether a detected face belongs to one of the reference identities.
///
/// A reference qualifies only when the embedding service calls it a match
/// *and* its distance is within `threshold`. Both gates stay independent.
#[derive(Clone, Copy, Debug)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns the confidence `1 - distance` of the best qualifying
    /// reference, or `None` when no reference qualifies.
    pub fn best_match(
        &self,
        service: &dyn FaceEmbeddingService,
        face: &Embedding,
        references: &[Embedding],
    ) -> Option<f64> {
        references
            .iter()
            .filter_map(|reference| {
                let distance = service.distance(reference, face);
                let qualifies = service.is_match(reference, face) && distance <= self.threshold;
                qualifies.then(|| (1.0 - distance).clamp(0.0, 1.0))
            })
            .fold(None, |best: Option<f64>, confidence| {
                Some(best.map_or(confidence, |b| b.max(confidence)))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::face_box::FaceBox;
    use crate::shared::frame::Frame;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Each reference embedding encodes its own verdict: `[distance, is_match]`.
    struct VerdictService;

    impl FaceEmbeddingService for VerdictService {
        fn detect_faces(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }

        fn encode_faces(
            &mut self,
            _frame: &Frame,
            _faces: &[FaceBox],
        ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }

        fn is_match(&self, known: &Embedding, _candidate: &Embedding) -> bool {
            known.values()[1] > 0.0
        }

        fn distance(&self, known: &Embedding, _candidate: &Embedding) -> f64 {
            known.values()[0] as f64
        }
    }

    fn reference(distance: f32, is_match: bool) -> Embedding {
        Embedding::new(vec![distance, if is_match { 1.0 } else { 0.0 }])
    }

    fn face() -> Embedding {
        Embedding::new(vec![0.0, 0.0])
    }

    #[rstest]
    #[case::within_threshold(reference(0.4, true), Some(0.6))]
    #[case::exceeds_threshold_despite_native_match(reference(0.6, true), None)]
    #[case::native_reject_despite_small_distance(reference(0.1, false), None)]
    #[case::exactly_at_threshold(reference(0.5, true), Some(0.5))]
    fn test_single_reference(#[case] r: Embedding, #[case] expected: Option<f64>) {
        let matcher = Matcher::new(0.5);
        let result = matcher.best_match(&VerdictService, &face(), &[r]);
        match (result, expected) {
            (Some(got), Some(want)) => assert_relative_eq!(got, want, epsilon = 1e-6),
            (got, want) => assert_eq!(got, want),
        }
    }

    #[test]
    fn test_confidence_is_best_qualifying_reference() {
        let matcher = Matcher::new(0.5);
        let refs = vec![
            reference(0.45, true),
            reference(0.05, false), // closest, but natively rejected
            reference(0.2, true),
            reference(0.7, true),
        ];
        let confidence = matcher.best_match(&VerdictService, &face(), &refs).unwrap();
        assert_relative_eq!(confidence, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_no_references_never_matches() {
        let matcher = Matcher::new(1.0);
        assert!(matcher.best_match(&VerdictService, &face(), &[]).is_none());
    }
}
