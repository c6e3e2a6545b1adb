use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Writes face crops to disk using the `image` crate. The encoder is picked
/// from the file extension (`.jpg` for match crops).
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("expected RGB frame, got {} channels", frame.channels()).into());
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;
        img.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 3, 0)
    }

    #[test]
    fn test_write_jpeg_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("match_20240101120000_15.jpg");
        let writer = ImageFileWriter::new();
        writer.write(&path, &solid_frame(40, 30, [50, 100, 200])).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.width(), 40);
        assert_eq!(img.height(), 30);
        // JPEG is lossy; a flat color should survive closely
        let pixel = img.get_pixel(20, 15).0;
        assert!((pixel[2] as i32 - 200).abs() < 10, "blue channel {pixel:?}");
    }

    #[test]
    fn test_write_to_missing_directory_returns_error() {
        let writer = ImageFileWriter::new();
        let frame = solid_frame(10, 10, [0, 0, 0]);
        assert!(writer
            .write(Path::new("/nonexistent/dir/out.jpg"), &frame)
            .is_err());
    }

    #[test]
    fn test_rejects_non_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new(vec![0u8; 16], 4, 4, 1, 0);
        let writer = ImageFileWriter::new();
        assert!(writer.write(&dir.path().join("gray.jpg"), &frame).is_err());
    }
}
