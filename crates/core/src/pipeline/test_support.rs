//! Stub collaborators shared by the engine and worker tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::run_config::{PathsConfig, RunConfiguration};
use crate::detection::domain::face_embedding_service::FaceEmbeddingService;
use crate::shared::embedding::Embedding;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::{VideoWriter, VideoWriterFactory};

use super::detection_engine::DetectionEngine;
use super::pipeline_logger::PipelineLogger;

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 8;

/// Frame index the stub image reader gives to decodable reference images.
pub const REFERENCE_INDEX: usize = usize::MAX;
/// Frame index for reference images in which no face is found.
const FACELESS_INDEX: usize = usize::MAX - 1;

/// Flat gray frame; any face crop from it reads as masked.
pub fn flat_frame(index: usize) -> Frame {
    Frame::new(vec![90u8; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 3, index)
}

/// Black/white checkerboard; any face crop from it reads as unmasked.
pub fn textured_frame(index: usize) -> Frame {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 3) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let v = if (x + y) % 2 == 0 { 0 } else { 255 };
            data.extend_from_slice(&[v, v, v]);
        }
    }
    Frame::new(data, WIDTH, HEIGHT, 3, index)
}

pub fn face() -> FaceBox {
    FaceBox::new(2, 6, 6, 2)
}

pub fn config_in(dir: &Path) -> RunConfiguration {
    RunConfiguration {
        frame_skip: 1,
        clip_duration_seconds: 1.0,
        paths: PathsConfig::for_task(dir),
        ..RunConfiguration::default()
    }
}

// --- Video reader ---

pub struct StubReader {
    pub metadata: VideoMetadata,
    pub frames: Vec<Frame>,
    pub fail_open: bool,
    /// Yield a decode error instead of the frame at this position.
    pub error_at: Option<usize>,
    pub consumed: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl StubReader {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let total_frames = frames.len();
        Self {
            metadata: VideoMetadata {
                width: WIDTH,
                height: HEIGHT,
                fps,
                total_frames,
                codec: "stub".to_string(),
                source_path: None,
            },
            frames,
            fail_open: false,
            error_at: None,
            consumed: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        if self.fail_open {
            return Err(format!("cannot open {}", path.display()).into());
        }
        Ok(self.metadata.clone())
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let consumed = self.consumed.clone();
        let error_at = self.error_at;
        Box::new(self.frames.drain(..).enumerate().map(move |(i, frame)| {
            consumed.fetch_add(1, Ordering::SeqCst);
            if error_at == Some(i) {
                Err("corrupt packet".into())
            } else {
                Ok(frame)
            }
        }))
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// --- Face embedding service ---

/// Faces are looked up by frame index. A face's embedding is its
/// one-dimensional distance from the reference at `[0.0]`, and the native
/// tolerance is 0.6.
#[derive(Default)]
pub struct StubEmbeddingService {
    pub faces: HashMap<usize, Vec<(FaceBox, f32)>>,
    pub fail_on: HashSet<usize>,
    pub analyzed: Arc<Mutex<Vec<usize>>>,
}

impl StubEmbeddingService {
    pub fn with_face_at(mut self, index: usize, distance: f32) -> Self {
        self.faces.entry(index).or_default().push((face(), distance));
        self
    }

    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_on.insert(index);
        self
    }
}

impl FaceEmbeddingService for StubEmbeddingService {
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        match frame.index() {
            REFERENCE_INDEX => return Ok(vec![face()]),
            FACELESS_INDEX => return Ok(Vec::new()),
            _ => {}
        }
        self.analyzed.lock().unwrap().push(frame.index());
        if self.fail_on.contains(&frame.index()) {
            return Err("inference failed".into());
        }
        Ok(self
            .faces
            .get(&frame.index())
            .map(|faces| faces.iter().map(|(b, _)| *b).collect())
            .unwrap_or_default())
    }

    fn encode_faces(
        &mut self,
        frame: &Frame,
        faces: &[FaceBox],
    ) -> Result<Vec<Embedding>, Box<dyn std::error::Error>> {
        if frame.index() == REFERENCE_INDEX {
            return Ok(faces.iter().map(|_| Embedding::new(vec![0.0])).collect());
        }
        let known = self.faces.get(&frame.index()).cloned().unwrap_or_default();
        Ok(known
            .iter()
            .map(|(_, d)| Embedding::new(vec![*d]))
            .collect())
    }

    fn is_match(&self, known: &Embedding, candidate: &Embedding) -> bool {
        self.distance(known, candidate) <= 0.6
    }

    fn distance(&self, known: &Embedding, candidate: &Embedding) -> f64 {
        (known.values()[0] - candidate.values()[0]).abs() as f64
    }
}

// --- Image codec ---

/// Paths containing "missing" are never reached (the engine checks
/// existence first); "corrupt" fails to decode; "noface" decodes to an
/// image without faces.
pub struct StubImageReader;

impl ImageReader for StubImageReader {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let name = path.to_string_lossy();
        if name.contains("corrupt") {
            return Err("unsupported image format".into());
        }
        let index = if name.contains("noface") {
            FACELESS_INDEX
        } else {
            REFERENCE_INDEX
        };
        Ok(Frame::new(
            vec![90u8; (WIDTH * HEIGHT * 3) as usize],
            WIDTH,
            HEIGHT,
            3,
            index,
        ))
    }
}

/// Creates `names` as empty files under `dir` and returns their paths.
pub fn reference_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if !name.contains("missing") {
                std::fs::write(&path, b"").unwrap();
            }
            path
        })
        .collect()
}

#[derive(Default)]
pub struct RecordingImageWriter {
    pub written: Arc<Mutex<Vec<(PathBuf, u32, u32)>>>,
    pub fail: bool,
}

impl ImageWriter for RecordingImageWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if self.fail {
            return Err("read-only file system".into());
        }
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), frame.width(), frame.height()));
        Ok(())
    }
}

// --- Clip writer ---

#[derive(Default)]
pub struct ClipLog {
    pub opened: Vec<PathBuf>,
    pub written: Vec<usize>,
    pub closed: usize,
}

struct RecordingVideoWriter {
    log: Arc<Mutex<ClipLog>>,
}

impl VideoWriter for RecordingVideoWriter {
    fn open(
        &mut self,
        path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::write(path, b"")?;
        self.log.lock().unwrap().opened.push(path.to_path_buf());
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.log.lock().unwrap().written.push(frame.index());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

pub fn recording_writer_factory() -> (VideoWriterFactory, Arc<Mutex<ClipLog>>) {
    let log = Arc::new(Mutex::new(ClipLog::default()));
    let shared = log.clone();
    let factory: VideoWriterFactory = Box::new(move || {
        Box::new(RecordingVideoWriter {
            log: shared.clone(),
        })
    });
    (factory, log)
}

// --- Logger ---

#[derive(Default, Clone)]
pub struct RecordingLogger {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogger {
    pub fn count(&self, level: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(level))
            .count()
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains(fragment))
    }
}

impl PipelineLogger for RecordingLogger {
    fn begin_run(&mut self) {
        self.events.lock().unwrap().push("run: begin".to_string());
    }

    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}

    fn info(&mut self, message: &str) {
        self.events.lock().unwrap().push(format!("info: {message}"));
    }

    fn warn(&mut self, message: &str) {
        self.events.lock().unwrap().push(format!("warn: {message}"));
    }

    fn error(&mut self, message: &str) {
        self.events.lock().unwrap().push(format!("error: {message}"));
    }
}

// --- Engine ---

pub struct Harness {
    pub engine: DetectionEngine,
    pub clips: Arc<Mutex<ClipLog>>,
    pub crops: Arc<Mutex<Vec<(PathBuf, u32, u32)>>>,
    pub analyzed: Arc<Mutex<Vec<usize>>>,
    pub consumed: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
    pub logger: RecordingLogger,
}

pub fn harness(
    config: RunConfiguration,
    reader: StubReader,
    service: StubEmbeddingService,
    image_writer: RecordingImageWriter,
) -> Harness {
    let (factory, clips) = recording_writer_factory();
    let crops = image_writer.written.clone();
    let analyzed = service.analyzed.clone();
    let consumed = reader.consumed.clone();
    let closed = reader.closed.clone();
    let logger = RecordingLogger::default();

    let engine = DetectionEngine::new(
        config,
        Box::new(reader),
        Box::new(service),
        Box::new(StubImageReader),
        Box::new(image_writer),
        factory,
        Box::new(logger.clone()),
        None,
        None,
    );

    Harness {
        engine,
        clips,
        crops,
        analyzed,
        consumed,
        closed,
        logger,
    }
}
