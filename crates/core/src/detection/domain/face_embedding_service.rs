use crate::shared::embedding::Embedding;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Opaque face recognition capability: find faces, turn them into
/// embeddings, and compare embeddings.
///
/// `is_match` applies the service's own tolerance; `distance` is in `[0, 1]`
/// with smaller meaning more similar. The two are deliberately separate so
/// callers can layer their own threshold on top.
pub trait FaceEmbeddingService: Send {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;

    /// One embedding per box, in box order.
    fn encode_faces(
        &mut self,
        frame: &Frame,
        faces: &[FaceBox],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>>;

    fn is_match(&self, known: &Embedding, candidate: &Embedding) -> bool;

    fn distance(&self, known: &Embedding, candidate: &Embedding) -> f64;
}
