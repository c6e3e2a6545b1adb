//! Preview annotation: boxes and labels around matched faces, plus the match
//! trajectory.

use std::sync::OnceLock;

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::trajectory_tracker::TrajectoryTracker;

pub const MASKED_COLOR: [u8; 3] = [0, 255, 0];
pub const UNMASKED_COLOR: [u8; 3] = [255, 0, 0];
pub const TRAJECTORY_COLOR: [u8; 3] = [0, 0, 255];

const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");
const LABEL_SCALE: f32 = 14.0;
/// Gap between the bottom of the label and the top of its box.
const LABEL_GAP: i32 = 10;

/// A matched face to outline on the preview frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceAnnotation {
    pub face: FaceBox,
    pub has_mask: bool,
    pub confidence: f64,
}

impl FaceAnnotation {
    fn color(&self) -> Rgb<u8> {
        Rgb(if self.has_mask {
            MASKED_COLOR
        } else {
            UNMASKED_COLOR
        })
    }

    /// `Mask (87.6%)` or `No Mask (87.6%)`.
    pub fn label(&self) -> String {
        let state = if self.has_mask { "Mask" } else { "No Mask" };
        format!("{state} ({:.1}%)", self.confidence * 100.0)
    }
}

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("Label font unusable, drawing boxes without labels: {e}");
            None
        }
    })
    .as_ref()
}

/// Returns a copy of `frame` with every annotation drawn, plus the
/// trajectory once it has two or more points. `frame` itself is untouched.
///
/// Frames that are not 3-channel RGB come back unannotated.
pub fn annotate(
    frame: &Frame,
    faces: &[FaceAnnotation],
    trajectory: &TrajectoryTracker,
) -> Frame {
    let Some(mut canvas) =
        RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
    else {
        return frame.clone();
    };

    for annotation in faces {
        draw_face_box(&mut canvas, &annotation.face, annotation.color());
        draw_label(&mut canvas, annotation);
    }
    if trajectory.is_drawable() {
        draw_path(&mut canvas, trajectory.points(), Rgb(TRAJECTORY_COLOR));
    }

    Frame::new(
        canvas.into_raw(),
        frame.width(),
        frame.height(),
        3,
        frame.index(),
    )
}

/// Two nested 1 px outlines, both inside the box.
fn draw_face_box(canvas: &mut RgbImage, face: &FaceBox, color: Rgb<u8>) {
    for inset in 0..2 {
        let width = face.width() - 2 * inset;
        let height = face.height() - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect =
            Rect::at(face.left + inset, face.top + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn draw_label(canvas: &mut RgbImage, annotation: &FaceAnnotation) {
    let Some(font) = label_font() else {
        return;
    };
    let y = annotation.face.top - LABEL_GAP - LABEL_SCALE as i32;
    draw_text_mut(
        canvas,
        annotation.color(),
        annotation.face.left,
        y,
        PxScale::from(LABEL_SCALE),
        font,
        &annotation.label(),
    );
}

/// Consecutive points joined by 2 px segments.
fn draw_path(canvas: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>) {
    for pair in points.windows(2) {
        let (x0, y0) = (pair[0].0 as f32, pair[0].1 as f32);
        let (x1, y1) = (pair[1].0 as f32, pair[1].1 as f32);
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(canvas, (x0 + dx, y0 + dy), (x1 + dx, y1 + dy), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Range;

    const BACKGROUND: u8 = 40;

    fn blank(width: u32, height: u32) -> Frame {
        Frame::new(
            vec![BACKGROUND; (width * height * 3) as usize],
            width,
            height,
            3,
            0,
        )
    }

    fn pixel(frame: &Frame, x: usize, y: usize) -> [u8; 3] {
        let a = frame.as_ndarray();
        [a[[y, x, 0]], a[[y, x, 1]], a[[y, x, 2]]]
    }

    fn annotation(face: FaceBox, has_mask: bool) -> FaceAnnotation {
        FaceAnnotation {
            face,
            has_mask,
            confidence: 0.876,
        }
    }

    fn path(points: &[FaceBox]) -> TrajectoryTracker {
        let mut tracker = TrajectoryTracker::new();
        for face in points {
            tracker.record(face);
        }
        tracker
    }

    fn changed_in(frame: &Frame, xs: Range<usize>, ys: Range<usize>) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| pixel(frame, x, y) != [BACKGROUND; 3])
            .count()
    }

    #[test]
    fn test_box_border_is_two_pixels_and_interior_untouched() {
        let frame = blank(10, 10);
        let out = annotate(
            &frame,
            &[annotation(FaceBox::new(1, 9, 9, 1), true)],
            &TrajectoryTracker::new(),
        );

        assert_eq!(pixel(&out, 1, 1), MASKED_COLOR);
        assert_eq!(pixel(&out, 2, 2), MASKED_COLOR);
        assert_eq!(pixel(&out, 8, 8), MASKED_COLOR);
        assert_eq!(pixel(&out, 4, 4), [BACKGROUND; 3]);
        assert_eq!(pixel(&out, 0, 0), [BACKGROUND; 3]);
    }

    #[test]
    fn test_box_partly_outside_frame_is_clipped() {
        let frame = blank(4, 4);
        let out = annotate(
            &frame,
            &[annotation(FaceBox::new(-5, 20, 2, -5), false)],
            &TrajectoryTracker::new(),
        );
        assert_eq!(pixel(&out, 0, 1), UNMASKED_COLOR);
    }

    #[test]
    fn test_label_text_matches_mask_state() {
        let face = FaceBox::new(0, 4, 4, 0);
        assert_eq!(annotation(face, true).label(), "Mask (87.6%)");
        assert_eq!(annotation(face, false).label(), "No Mask (87.6%)");
    }

    #[test]
    fn test_label_is_drawn_above_box_and_source_frame_untouched() {
        let frame = blank(120, 80);
        let face = FaceBox::new(50, 60, 78, 10);
        let out = annotate(&frame, &[annotation(face, false)], &TrajectoryTracker::new());

        // Label band sits between the top of the image and the box.
        let label_top = (50 - LABEL_GAP - LABEL_SCALE as i32) as usize;
        assert!(changed_in(&out, 10..120, label_top..50 - LABEL_GAP as usize + 4) > 10);
        assert_eq!(changed_in(&out, 0..120, 0..label_top - 2), 0);
        // Box interior stays clean.
        assert_eq!(changed_in(&out, 13..57, 53..75), 0);

        assert!(frame.data().iter().all(|&v| v == BACKGROUND));
    }

    #[test]
    fn test_path_connects_points() {
        let frame = blank(20, 20);
        // Centers (1, 1), (11, 1), (11, 11).
        let tracker = path(&[
            FaceBox::new(0, 2, 2, 0),
            FaceBox::new(0, 12, 2, 10),
            FaceBox::new(10, 12, 12, 10),
        ]);
        let out = annotate(&frame, &[], &tracker);

        assert_eq!(pixel(&out, 6, 1), TRAJECTORY_COLOR);
        assert_eq!(pixel(&out, 6, 2), TRAJECTORY_COLOR);
        assert_eq!(pixel(&out, 11, 6), TRAJECTORY_COLOR);
        assert_eq!(pixel(&out, 12, 6), TRAJECTORY_COLOR);
        assert_eq!(pixel(&out, 5, 8), [BACKGROUND; 3]);
    }

    #[test]
    fn test_single_point_path_is_not_drawn() {
        let frame = blank(10, 10);
        let out = annotate(&frame, &[], &path(&[FaceBox::new(2, 6, 6, 2)]));
        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_non_rgb_frame_is_returned_unannotated() {
        let frame = Frame::new(vec![0u8; 16], 4, 4, 1, 3);
        let out = annotate(
            &frame,
            &[annotation(FaceBox::new(0, 4, 4, 0), true)],
            &TrajectoryTracker::new(),
        );
        assert_eq!(out.data(), frame.data());
        assert_eq!(out.index(), 3);
    }
}
