use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::shared::artifact_path::unique_path;
use crate::shared::constants::{REPORT_EXTENSION, REPORT_PREFIX, REPORT_TIMESTAMP_FORMAT};

use super::detection_record::DetectionRecord;

const REPORT_TITLE: &str = "Enhanced Face Recognition Detection Report";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to create report folder {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the plain-text detection report at the end of a run.
pub struct ReportGenerator {
    reports_dir: PathBuf,
}

impl ReportGenerator {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }

    /// Writes `detection_report_<YYYYMMDD_HHMMSS>.txt` and returns its path.
    /// An existing report is never overwritten.
    pub fn generate(&self, records: &[DetectionRecord]) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.reports_dir).map_err(|source| ReportError::CreateDir {
            path: self.reports_dir.clone(),
            source,
        })?;

        let stem = format!(
            "{REPORT_PREFIX}{}",
            chrono::Local::now().format(REPORT_TIMESTAMP_FORMAT)
        );
        let path = unique_path(&self.reports_dir, &stem, REPORT_EXTENSION);
        let write_err = |source| ReportError::Write {
            path: path.clone(),
            source,
        };

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(write_err)?;
        file.write_all(render(records).as_bytes())
            .map_err(write_err)?;

        Ok(path)
    }
}

/// Renders the report body: a title block, then one numbered block per
/// record in history order.
pub fn render(records: &[DetectionRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{REPORT_TITLE}");
    let _ = writeln!(out, "{}", "=".repeat(50));
    for (i, record) in records.iter().enumerate() {
        let _ = writeln!(out, "Detection #{}", i + 1);
        let _ = writeln!(out, "Frame: {}", record.frame_index);
        let _ = writeln!(out, "Timestamp: {}", format_elapsed(record.elapsed));
        let _ = writeln!(out, "Confidence: {:.2}%", record.confidence * 100.0);
        let _ = writeln!(out, "Mask: {}", if record.has_mask { "Yes" } else { "No" });
        let _ = writeln!(out, "Image Path: {}", record.image_path.display());
        let _ = writeln!(out, "{}", "-".repeat(50));
    }
    out
}

/// `H:MM:SS`, plus `.ffffff` when there is a sub-second part.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let micros = elapsed.subsec_micros();
    let base = format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60);
    if micros == 0 {
        base
    } else {
        format!("{base}.{micros:06}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(frame_index: usize, confidence: f64, has_mask: bool) -> DetectionRecord {
        DetectionRecord {
            frame_index,
            elapsed: Duration::from_secs_f64(frame_index as f64 / 30.0),
            image_path: PathBuf::from(format!("detected_faces/match_20240101120000_{frame_index}.jpg")),
            confidence,
            has_mask,
        }
    }

    #[rstest]
    #[case(Duration::ZERO, "0:00:00")]
    #[case(Duration::from_secs(3), "0:00:03")]
    #[case(Duration::from_millis(1500), "0:00:01.500000")]
    #[case(Duration::from_secs(3725), "1:02:05")]
    #[case(Duration::from_micros(33_333), "0:00:00.033333")]
    fn test_format_elapsed(#[case] elapsed: Duration, #[case] expected: &str) {
        assert_eq!(format_elapsed(elapsed), expected);
    }

    #[test]
    fn test_render_empty_history_has_only_header() {
        let text = render(&[]);
        assert_eq!(
            text,
            format!("{REPORT_TITLE}\n{}\n", "=".repeat(50))
        );
    }

    #[test]
    fn test_render_numbers_records_in_order() {
        let text = render(&[record(0, 0.6, false), record(45, 0.87654, true)]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[2], "Detection #1");
        assert_eq!(lines[3], "Frame: 0");
        assert_eq!(lines[4], "Timestamp: 0:00:00");
        assert_eq!(lines[5], "Confidence: 60.00%");
        assert_eq!(lines[6], "Mask: No");
        assert_eq!(
            lines[7],
            "Image Path: detected_faces/match_20240101120000_0.jpg"
        );
        assert_eq!(lines[8], "-".repeat(50));

        assert_eq!(lines[9], "Detection #2");
        assert_eq!(lines[10], "Frame: 45");
        assert_eq!(lines[11], "Timestamp: 0:00:01.500000");
        assert_eq!(lines[12], "Confidence: 87.65%");
        assert_eq!(lines[13], "Mask: Yes");
        assert_eq!(lines.len(), 16);
    }

    #[test]
    fn test_generate_writes_timestamped_file() {
        let dir = tempfile::tempdir().unwrap();
        let reports = dir.path().join("reports");
        let path = ReportGenerator::new(&reports)
            .generate(&[record(5, 0.7, false)])
            .unwrap();

        assert_eq!(path.parent().unwrap(), reports);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("detection_report_"));
        assert_eq!(name.len(), "detection_report_YYYYMMDD_HHMMSS.txt".len());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Frame: 5"));
    }

    #[test]
    fn test_generate_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ReportGenerator::new(dir.path());
        let first = generator.generate(&[record(1, 0.7, false)]).unwrap();
        let second = generator.generate(&[]).unwrap();

        assert_ne!(first, second);
        assert!(fs::read_to_string(&first).unwrap().contains("Frame: 1"));
    }

    #[test]
    fn test_generate_reports_unwritable_folder() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        fs::write(&blocker, "not a folder").unwrap();

        let result = ReportGenerator::new(&blocker).generate(&[]);
        assert!(matches!(result, Err(ReportError::CreateDir { .. })));
    }
}
