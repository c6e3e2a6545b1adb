use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::shared::frame::Frame;

use super::control_signal::ControlHandle;
use super::detection_engine::DetectionEngine;

/// Preview frames buffered before new ones are dropped.
const PREVIEW_CAPACITY: usize = 2;

/// Run events sent from the worker thread. Never dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Progress(f64),
    /// The run finished with this many confirmed matches.
    Complete(usize),
}

/// A detection run on its own thread.
///
/// `messages` carries progress and completion; `previews` carries annotated
/// frames and drops them when the consumer falls behind, so a slow display
/// never stalls detection.
pub struct WorkerHandle {
    pub messages: Receiver<WorkerMessage>,
    pub previews: Receiver<Frame>,
    pub control: ControlHandle,
    thread: JoinHandle<DetectionEngine>,
}

impl WorkerHandle {
    /// Waits for the run to end and hands the engine back for inspection
    /// or another run.
    pub fn join(self) -> Result<DetectionEngine, Box<dyn std::error::Error>> {
        self.thread
            .join()
            .map_err(|_| "detection worker panicked".into())
    }
}

/// Spawn a background detection run over `video_path`.
///
/// The engine's own callbacks are replaced by the worker's channels.
pub fn spawn(mut engine: DetectionEngine, video_path: PathBuf) -> WorkerHandle {
    let (tx, messages) = crossbeam_channel::unbounded::<WorkerMessage>();
    let (preview_tx, previews) = crossbeam_channel::bounded::<Frame>(PREVIEW_CAPACITY);
    let control = engine.control();

    let progress_tx = tx.clone();
    engine.set_callbacks(
        Some(Box::new(move |progress: f64| {
            let _ = progress_tx.send(WorkerMessage::Progress(progress));
        })),
        Some(Box::new(move |frame: &Frame| offer_preview(&preview_tx, frame))),
    );

    let thread = thread::spawn(move || {
        let matches = engine.process_video(&video_path);
        // Drop the channel senders held by the callbacks so receivers see
        // the end of the stream.
        engine.set_callbacks(None, None);
        let _ = tx.send(WorkerMessage::Complete(matches));
        engine
    });

    WorkerHandle {
        messages,
        previews,
        control,
        thread,
    }
}

fn offer_preview(tx: &Sender<Frame>, frame: &Frame) {
    // Full or disconnected: this preview is skipped.
    let _ = tx.try_send(frame.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;
    use std::time::Duration;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(flat_frame).collect()
    }

    #[test]
    fn test_worker_streams_progress_then_complete() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(
            config_in(dir.path()),
            StubReader::new(frames(4), 30.0),
            StubEmbeddingService::default().with_face_at(2, 0.1),
            RecordingImageWriter::default(),
        );
        let refs = reference_files(dir.path(), &["ref.jpg"]);
        assert!(h.engine.load_reference_images(&refs));

        let worker = spawn(h.engine, PathBuf::from("input.mp4"));
        let received: Vec<WorkerMessage> = worker.messages.iter().collect();

        assert_eq!(
            received,
            vec![
                WorkerMessage::Progress(0.0),
                WorkerMessage::Progress(0.25),
                WorkerMessage::Progress(0.5),
                WorkerMessage::Progress(0.75),
                WorkerMessage::Complete(1),
            ]
        );
        let engine = worker.join().unwrap();
        assert_eq!(engine.history().len(), 1);
    }

    #[test]
    fn test_unread_previews_are_dropped_not_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(
            config_in(dir.path()),
            StubReader::new(frames(30), 30.0),
            StubEmbeddingService::default(),
            RecordingImageWriter::default(),
        );

        let worker = spawn(h.engine, PathBuf::from("input.mp4"));
        let complete = worker
            .messages
            .iter()
            .find(|m| matches!(m, WorkerMessage::Complete(_)));
        assert_eq!(complete, Some(WorkerMessage::Complete(0)));

        let buffered: Vec<Frame> = worker.previews.try_iter().collect();
        assert_eq!(buffered.len(), PREVIEW_CAPACITY);
        assert_eq!(buffered[0].index(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_control_handle_stops_worker() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(
            config_in(dir.path()),
            StubReader::new(frames(1000), 30.0),
            StubEmbeddingService::default(),
            RecordingImageWriter::default(),
        );
        h.engine.pause();

        let worker = spawn(h.engine, PathBuf::from("input.mp4"));
        std::thread::sleep(Duration::from_millis(50));
        worker.control.stop();

        let complete = worker
            .messages
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(complete, WorkerMessage::Complete(0));
        assert_eq!(h.consumed.load(std::sync::atomic::Ordering::SeqCst), 0);
        worker.join().unwrap();
    }
}
