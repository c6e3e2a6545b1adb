use std::path::{Path, PathBuf};

use crate::shared::artifact_path::unique_path;
use crate::shared::constants::{CLIP_EXTENSION, CLIP_PREFIX, COMPACT_TIMESTAMP_FORMAT};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::{VideoWriter, VideoWriterFactory};

use super::pipeline_logger::PipelineLogger;

struct ClipSession {
    writer: Box<dyn VideoWriter>,
    path: PathBuf,
    frames_remaining: usize,
}

enum RecorderState {
    Idle,
    Recording(ClipSession),
}

/// Records a fixed-length clip after each detection event.
///
/// At most one clip is open at a time. While recording, every frame the
/// loop reads is written, sampled or not, until the frame budget is spent.
/// Detection events during a recording are ignored.
pub struct ClipRecorder {
    writer_factory: VideoWriterFactory,
    output_dir: PathBuf,
    clip_duration_seconds: f64,
    state: RecorderState,
    completed: Vec<PathBuf>,
}

impl ClipRecorder {
    pub fn new(
        writer_factory: VideoWriterFactory,
        output_dir: &Path,
        clip_duration_seconds: f64,
    ) -> Self {
        Self {
            writer_factory,
            output_dir: output_dir.to_path_buf(),
            clip_duration_seconds,
            state: RecorderState::Idle,
            completed: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording(_))
    }

    /// Frames still owed to the open clip; 0 when idle.
    pub fn frames_remaining(&self) -> usize {
        match &self.state {
            RecorderState::Recording(session) => session.frames_remaining,
            RecorderState::Idle => 0,
        }
    }

    /// Clips closed since the last `clear_completed`, in order.
    pub fn completed_clips(&self) -> &[PathBuf] {
        &self.completed
    }

    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }

    /// Writes `frame` to the open clip and closes the clip once its budget
    /// reaches zero. Does nothing while idle.
    ///
    /// A failed write still consumes one frame of budget, so a broken
    /// writer cannot keep the session open forever.
    pub fn on_frame(&mut self, frame: &Frame, logger: &mut dyn PipelineLogger) {
        let RecorderState::Recording(session) = &mut self.state else {
            return;
        };
        if let Err(e) = session.writer.write(frame) {
            logger.error(&format!(
                "Failed to write frame {} to {}: {e}",
                frame.index(),
                session.path.display()
            ));
        }
        session.frames_remaining = session.frames_remaining.saturating_sub(1);
        if session.frames_remaining == 0 {
            self.close_session(logger);
        }
    }

    /// Opens a clip sized to the triggering frame if none is open.
    ///
    /// Returns `true` when a new session started.
    pub fn start_if_idle(
        &mut self,
        width: u32,
        height: u32,
        fps: f64,
        logger: &mut dyn PipelineLogger,
    ) -> bool {
        if self.is_recording() {
            return false;
        }

        let frames = clip_frame_budget(fps, self.clip_duration_seconds);
        if frames == 0 {
            logger.warn(&format!(
                "Clip not recorded: {fps} fps x {}s rounds to zero frames",
                self.clip_duration_seconds
            ));
            return false;
        }

        if let Err(e) = std::fs::create_dir_all(&self.output_dir) {
            logger.error(&format!(
                "Cannot create clip folder {}: {e}",
                self.output_dir.display()
            ));
            return false;
        }
        let stem = format!(
            "{CLIP_PREFIX}{}",
            chrono::Local::now().format(COMPACT_TIMESTAMP_FORMAT)
        );
        let path = unique_path(&self.output_dir, &stem, CLIP_EXTENSION);

        let mut writer = (self.writer_factory)();
        if let Err(e) = writer.open(&path, &VideoMetadata::for_clip(width, height, fps)) {
            logger.error(&format!("Cannot open clip {}: {e}", path.display()));
            return false;
        }

        logger.info(&format!(
            "Recording clip {} ({frames} frames)",
            path.display()
        ));
        self.state = RecorderState::Recording(ClipSession {
            writer,
            path,
            frames_remaining: frames,
        });
        true
    }

    /// Closes a clip left open when the frame loop ends early.
    pub fn finish(&mut self, logger: &mut dyn PipelineLogger) {
        if self.is_recording() {
            self.close_session(logger);
        }
    }

    fn close_session(&mut self, logger: &mut dyn PipelineLogger) {
        let RecorderState::Recording(mut session) =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            return;
        };
        match session.writer.close() {
            Ok(()) => logger.info(&format!("Clip saved: {}", session.path.display())),
            Err(e) => logger.error(&format!(
                "Failed to finalize clip {}: {e}",
                session.path.display()
            )),
        }
        self.completed.push(session.path);
    }
}

/// `round(fps * seconds)`, or 0 for unusable inputs.
pub fn clip_frame_budget(fps: f64, seconds: f64) -> usize {
    let frames = (fps * seconds).round();
    if frames.is_finite() && frames > 0.0 {
        frames as usize
    } else {
        0
    }
}
