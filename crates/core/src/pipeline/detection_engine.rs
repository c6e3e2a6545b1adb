use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::config::run_config::RunConfiguration;
use crate::detection::domain::face_embedding_service::FaceEmbeddingService;
use crate::detection::domain::mask_classifier::MaskClassifier;
use crate::detection::domain::matcher::Matcher;
use crate::shared::artifact_path::unique_path;
use crate::shared::constants::{COMPACT_TIMESTAMP_FORMAT, MATCH_IMAGE_EXTENSION, MATCH_IMAGE_PREFIX};
use crate::shared::embedding::Embedding;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriterFactory;

use super::clip_recorder::ClipRecorder;
use super::control_signal::{ControlHandle, Gate};
use super::detection_record::{elapsed_at, DetectionRecord};
use super::overlay::{annotate, FaceAnnotation};
use super::pipeline_logger::PipelineLogger;
use super::report_generator::ReportGenerator;
use super::sampling::should_analyze;
use super::trajectory_tracker::TrajectoryTracker;

/// Receives `frame_index / total_frames` once per loop iteration.
pub type ProgressCallback = Box<dyn Fn(f64) + Send>;
/// Receives the annotated preview frame once per loop iteration.
pub type FrameCallback = Box<dyn Fn(&Frame) + Send>;

#[derive(Error, Debug)]
pub enum ReferenceLoadError {
    #[error("reference image not found: {path}")]
    NotFound { path: PathBuf },
    #[error("cannot decode reference image {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("no face found in reference image {path}")]
    NoFace { path: PathBuf },
    #[error("cannot encode face in reference image {path}: {reason}")]
    Embedding { path: PathBuf, reason: String },
}

struct FaceMatch {
    face: FaceBox,
    confidence: f64,
}

/// Scans a video for faces matching the loaded reference identities.
///
/// Per frame: clip recording, then (on sampled frames) detection, matching,
/// the mask check, crop persistence and trajectory update, then progress
/// and preview notification. A report is written when the loop ends.
///
/// The engine is reusable: each `process_video` call starts with an empty
/// history, trajectory and clip list, and opens a new logger run. Calls
/// must not overlap.
pub struct DetectionEngine {
    config: RunConfiguration,
    reader: Option<Box<dyn VideoReader>>,
    embedding_service: Box<dyn FaceEmbeddingService>,
    image_reader: Box<dyn ImageReader>,
    image_writer: Box<dyn ImageWriter>,
    clip_recorder: ClipRecorder,
    report_generator: ReportGenerator,
    matcher: Matcher,
    mask_classifier: MaskClassifier,
    logger: Box<dyn PipelineLogger>,
    control: ControlHandle,
    references: Vec<Embedding>,
    history: Vec<DetectionRecord>,
    trajectory: TrajectoryTracker,
    last_report: Option<PathBuf>,
    on_progress: Option<ProgressCallback>,
    on_frame: Option<FrameCallback>,
}

impl DetectionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RunConfiguration,
        reader: Box<dyn VideoReader>,
        embedding_service: Box<dyn FaceEmbeddingService>,
        image_reader: Box<dyn ImageReader>,
        image_writer: Box<dyn ImageWriter>,
        clip_writer_factory: VideoWriterFactory,
        logger: Box<dyn PipelineLogger>,
        on_progress: Option<ProgressCallback>,
        on_frame: Option<FrameCallback>,
    ) -> Self {
        let clip_recorder = ClipRecorder::new(
            clip_writer_factory,
            &config.paths.temp,
            config.clip_duration_seconds,
        );
        let report_generator = ReportGenerator::new(&config.paths.reports);
        let matcher = Matcher::new(config.detection_threshold);
        let mask_classifier = MaskClassifier::new(config.mask_std_threshold);

        Self {
            config,
            reader: Some(reader),
            embedding_service,
            image_reader,
            image_writer,
            clip_recorder,
            report_generator,
            matcher,
            mask_classifier,
            logger,
            control: ControlHandle::new(),
            references: Vec::new(),
            history: Vec::new(),
            trajectory: TrajectoryTracker::new(),
            last_report: None,
            on_progress,
            on_frame,
        }
    }

    /// Replaces both notification callbacks.
    pub fn set_callbacks(
        &mut self,
        on_progress: Option<ProgressCallback>,
        on_frame: Option<FrameCallback>,
    ) {
        self.on_progress = on_progress;
        self.on_frame = on_frame;
    }

    /// A handle that controls this engine from another thread.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn references(&self) -> &[Embedding] {
        &self.references
    }

    /// Detection records of the current (or last) run, in match order.
    pub fn history(&self) -> &[DetectionRecord] {
        &self.history
    }

    pub fn trajectory(&self) -> &[(i32, i32)] {
        self.trajectory.points()
    }

    /// Clips closed during the current (or last) run.
    pub fn clips(&self) -> &[PathBuf] {
        self.clip_recorder.completed_clips()
    }

    /// Path of the report written by the last run, if it was written.
    pub fn last_report(&self) -> Option<&Path> {
        self.last_report.as_deref()
    }

    /// Loads and encodes up to `max_reference_images` reference images,
    /// replacing any previously loaded set.
    ///
    /// Images that are missing, undecodable or faceless are logged and
    /// skipped. Returns `true` iff at least one encoding was loaded.
    pub fn load_reference_images(&mut self, paths: &[PathBuf]) -> bool {
        self.references.clear();

        let max = self.config.max_reference_images;
        if paths.len() > max {
            self.logger.warn(&format!(
                "{} reference images given; only the first {max} are used",
                paths.len()
            ));
        }

        for path in paths.iter().take(max) {
            match self.encode_reference(path) {
                Ok(embedding) => {
                    self.logger
                        .info(&format!("Loaded reference image {}", path.display()));
                    self.references.push(embedding);
                }
                Err(e) => self.logger.error(&e.to_string()),
            }
        }

        if self.references.is_empty() {
            self.logger.error("No valid reference encodings loaded");
            return false;
        }
        true
    }

    fn encode_reference(&mut self, path: &Path) -> Result<Embedding, ReferenceLoadError> {
        if !path.exists() {
            return Err(ReferenceLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let image = self
            .image_reader
            .read(path)
            .map_err(|e| ReferenceLoadError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let embedding_err = |e: Box<dyn std::error::Error>| ReferenceLoadError::Embedding {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let faces = self
            .embedding_service
            .detect_faces(&image)
            .map_err(embedding_err)?;
        let Some(first) = faces.first() else {
            return Err(ReferenceLoadError::NoFace {
                path: path.to_path_buf(),
            });
        };

        self.embedding_service
            .encode_faces(&image, std::slice::from_ref(first))
            .map_err(embedding_err)?
            .into_iter()
            .next()
            .ok_or_else(|| ReferenceLoadError::NoFace {
                path: path.to_path_buf(),
            })
    }

    /// Runs the frame loop over `path` until the stream ends or `stop` is
    /// called, writes the report and returns the number of confirmed matches.
    ///
    /// Returns 0 without writing a report when the video cannot be opened.
    /// No other failure ends the run early.
    pub fn process_video(&mut self, path: &Path) -> usize {
        self.logger.begin_run();
        self.history.clear();
        self.trajectory.clear();
        self.clip_recorder.clear_completed();
        self.last_report = None;

        let Some(mut reader) = self.reader.take() else {
            self.logger.error("Video reader is busy; runs must not overlap");
            return 0;
        };

        let metadata = match reader.open(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                self.logger
                    .error(&format!("Could not open video {}: {e}", path.display()));
                self.reader = Some(reader);
                return 0;
            }
        };

        self.logger
            .info(&format!("Processing video: {}", path.display()));
        self.logger.info(&format!(
            "Total frames: {}, FPS: {}",
            metadata.total_frames, metadata.fps
        ));
        if self.references.is_empty() {
            self.logger
                .warn("No reference encodings loaded; no face can match");
        }
        if let Err(e) = std::fs::create_dir_all(&self.config.paths.output_folder) {
            self.logger.error(&format!(
                "Cannot create output folder {}: {e}",
                self.config.paths.output_folder.display()
            ));
        }

        let mut frame_index = 0usize;
        {
            let mut frames = reader.frames();
            loop {
                if self.control.wait_while_paused() == Gate::Stop {
                    self.logger
                        .info(&format!("Stopped at frame {frame_index}"));
                    break;
                }
                if metadata.total_frames > 0 && frame_index >= metadata.total_frames {
                    break;
                }
                let frame = match frames.next() {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        self.logger.error(&format!(
                            "Decode failed at frame {frame_index}, ending run: {e}"
                        ));
                        break;
                    }
                    None => break,
                };

                self.process_frame(&frame, frame_index, &metadata);
                frame_index += 1;
            }
        }

        reader.close();
        self.reader = Some(reader);
        self.clip_recorder.finish(self.logger.as_mut());

        match self.report_generator.generate(&self.history) {
            Ok(report) => {
                self.logger
                    .info(&format!("Detection report generated: {}", report.display()));
                self.last_report = Some(report);
            }
            Err(e) => self.logger.error(&format!("Error generating report: {e}")),
        }

        self.logger
            .info(&format!("Total matches found: {}", self.history.len()));
        self.logger.summary();
        self.history.len()
    }

    fn process_frame(&mut self, frame: &Frame, frame_index: usize, metadata: &VideoMetadata) {
        self.clip_recorder.on_frame(frame, self.logger.as_mut());

        let mut annotations = Vec::new();
        if should_analyze(frame_index, self.config.frame_skip) {
            match self.find_matches(frame) {
                Ok(matches) => {
                    for face_match in matches {
                        if let Some(a) =
                            self.record_match(frame, frame_index, metadata.fps, face_match)
                        {
                            annotations.push(a);
                        }
                    }
                }
                Err(e) => self
                    .logger
                    .error(&format!("Face analysis failed on frame {frame_index}: {e}")),
            }
        }

        self.notify(frame, frame_index, metadata.total_frames, &annotations);
    }

    fn find_matches(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<FaceMatch>, Box<dyn std::error::Error>> {
        let started = Instant::now();
        let faces = self.embedding_service.detect_faces(frame)?;
        let encodings = if faces.is_empty() {
            Vec::new()
        } else {
            self.embedding_service.encode_faces(frame, &faces)?
        };
        self.logger
            .timing("detect", started.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("faces_per_frame", faces.len() as f64);
        if encodings.len() != faces.len() {
            self.logger.warn(&format!(
                "Frame {}: {} faces but {} encodings",
                frame.index(),
                faces.len(),
                encodings.len()
            ));
        }

        let started = Instant::now();
        let service = self.embedding_service.as_ref();
        let matches = faces
            .into_iter()
            .zip(&encodings)
            .filter_map(|(face, encoding)| {
                self.matcher
                    .best_match(service, encoding, &self.references)
                    .map(|confidence| FaceMatch { face, confidence })
            })
            .collect();
        self.logger
            .timing("match", started.elapsed().as_secs_f64() * 1000.0);
        Ok(matches)
    }

    fn record_match(
        &mut self,
        frame: &Frame,
        frame_index: usize,
        fps: f64,
        face_match: FaceMatch,
    ) -> Option<FaceAnnotation> {
        let started = Instant::now();
        let FaceMatch { face, confidence } = face_match;
        let Some(crop) = frame.crop(&face) else {
            self.logger.warn(&format!(
                "Frame {frame_index}: matched face {face:?} lies outside the frame"
            ));
            return None;
        };
        let has_mask = self.mask_classifier.has_mask(&crop);

        let stem = format!(
            "{MATCH_IMAGE_PREFIX}{}_{frame_index}",
            chrono::Local::now().format(COMPACT_TIMESTAMP_FORMAT)
        );
        let image_path = unique_path(
            &self.config.paths.output_folder,
            &stem,
            MATCH_IMAGE_EXTENSION,
        );
        if let Err(e) = self.image_writer.write(&image_path, &crop) {
            self.logger.error(&format!(
                "Failed to save face crop {}: {e}",
                image_path.display()
            ));
        }

        self.trajectory.record(&face);
        self.logger.info(&format!(
            "Match at frame {frame_index}: confidence {:.1}%, mask {}",
            confidence * 100.0,
            if has_mask { "yes" } else { "no" }
        ));
        self.history.push(DetectionRecord {
            frame_index,
            elapsed: elapsed_at(frame_index, fps),
            image_path,
            confidence,
            has_mask,
        });

        self.clip_recorder
            .start_if_idle(frame.width(), frame.height(), fps, self.logger.as_mut());
        self.logger
            .timing("record", started.elapsed().as_secs_f64() * 1000.0);

        Some(FaceAnnotation {
            face,
            has_mask,
            confidence,
        })
    }

    fn notify(
        &mut self,
        frame: &Frame,
        frame_index: usize,
        total_frames: usize,
        annotations: &[FaceAnnotation],
    ) {
        self.logger.progress(frame_index + 1, total_frames);

        if let Some(on_progress) = &self.on_progress {
            let progress = if total_frames > 0 {
                frame_index as f64 / total_frames as f64
            } else {
                0.0
            };
            on_progress(progress);
        }

        if let Some(on_frame) = &self.on_frame {
            let preview = annotate(frame, annotations, &self.trajectory);
            on_frame(&preview);
        }
    }
}
