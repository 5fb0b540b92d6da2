//! Drawing of frame results onto images.
//!
//! People are drawn as boxes, hands as their landmark skeleton with the
//! tracking region outlined.
//!
//! # Examples
//!
//! ```rust,no_run
//! use human_hand_detect::pipeline::FrameResult;
//! use human_hand_detect::utils::visualization::draw_frame_result;
//! use image::RgbImage;
//!
//! let mut image = RgbImage::new(640, 480);
//! draw_frame_result(&mut image, &FrameResult::default());
//! ```

use crate::core::errors::DetectResult;
use crate::models::{HandLandmarks, NUM_HAND_LANDMARKS};
use crate::pipeline::FrameResult;
use crate::processors::{BBox, Point, RotatedRect};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::debug;

const PERSON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const BONE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const ROI_COLOR: Rgb<u8> = Rgb([0, 160, 255]);

/// Landmark pairs joined when drawing a hand.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (0, 17),
];

/// Styling for [`draw_frame_result_with`].
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    /// Thickness of person boxes. Defaults to 2.
    pub bbox_thickness: i32,
    /// Radius of landmark dots. Defaults to 3.
    pub landmark_radius: i32,
    /// Outline the region each hand was tracked in.
    pub draw_roi: bool,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            bbox_thickness: 2,
            landmark_radius: 3,
            draw_roi: true,
        }
    }
}

/// Draws `result` onto `img` with default styling.
pub fn draw_frame_result(img: &mut RgbImage, result: &FrameResult) {
    draw_frame_result_with(img, result, &VisualizationConfig::default());
}

/// Draws `result` onto `img`.
pub fn draw_frame_result_with(
    img: &mut RgbImage,
    result: &FrameResult,
    config: &VisualizationConfig,
) {
    for person in &result.people {
        draw_bounding_box(img, &person.bbox, config.bbox_thickness);
    }
    for hand in &result.hands {
        if config.draw_roi {
            draw_rotated_rect(img, &hand.roi, ROI_COLOR);
        }
        draw_hand(img, &hand.landmarks, config.landmark_radius);
    }
}

/// Draws `result` over a copy of `image` and saves it to `path`.
pub fn save_visualization(path: &Path, image: &RgbImage, result: &FrameResult) -> DetectResult<()> {
    let mut canvas = image.clone();
    draw_frame_result(&mut canvas, result);
    canvas.save(path)?;
    debug!("Saved visualization to {}", path.display());
    Ok(())
}

fn draw_bounding_box(img: &mut RgbImage, bbox: &BBox, thickness: i32) {
    let clamped = bbox.clamp(img.width() as f32, img.height() as f32);
    if !clamped.is_valid() || clamped.width() < 1.0 || clamped.height() < 1.0 {
        return;
    }
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);

    for t in 0..thickness.max(1) {
        let left = clamped.x1 as i32 - t;
        let top = clamped.y1 as i32 - t;
        let width = clamped.width() as u32 + 2 * t as u32;
        let height = clamped.height() as u32 + 2 * t as u32;
        let rect = Rect::at(left, top).of_size(width.max(1), height.max(1));
        if rect.left() >= 0 && rect.top() >= 0 && rect.right() < img_w && rect.bottom() < img_h {
            draw_hollow_rect_mut(img, rect, PERSON_COLOR);
        }
    }
}

fn draw_rotated_rect(img: &mut RgbImage, rect: &RotatedRect, color: Rgb<u8>) {
    let corners = rect.corners();
    for i in 0..corners.len() {
        let a = corners[i];
        let b = corners[(i + 1) % corners.len()];
        draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), color);
    }
}

fn draw_hand(img: &mut RgbImage, hand: &HandLandmarks, radius: i32) {
    let points: Vec<Point> = hand.pixel_points(img.width(), img.height());
    debug_assert_eq!(points.len(), NUM_HAND_LANDMARKS);

    for &(a, b) in &HAND_CONNECTIONS {
        let (pa, pb) = (points[a], points[b]);
        draw_line_segment_mut(img, (pa.x, pa.y), (pb.x, pb.y), BONE_COLOR);
    }
    for p in &points {
        draw_filled_circle_mut(
            img,
            (p.x.round() as i32, p.y.round() as i32),
            radius,
            LANDMARK_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Detection, Gesture, Handedness};
    use crate::pipeline::HandResult;
    use crate::processors::Point3;

    fn hand_at(cx: f32, cy: f32) -> HandResult {
        let mut landmarks = [Point3::default(); NUM_HAND_LANDMARKS];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = Point3::new(cx + (i % 5) as f32 * 0.01, cy - (i / 5) as f32 * 0.02, 0.0);
        }
        HandResult {
            landmarks: HandLandmarks {
                landmarks,
                world: [Point3::default(); NUM_HAND_LANDMARKS],
                handedness: Handedness::Left,
                handedness_score: 0.2,
                presence: 0.9,
            },
            gesture: Gesture::OpenPalm,
            gesture_score: 0.8,
            roi: RotatedRect::new(cx * 100.0, cy * 100.0, 20.0, 20.0, 0.2),
        }
    }

    #[test]
    fn test_draws_people_and_hands() {
        let mut img = RgbImage::new(100, 100);
        let result = FrameResult {
            frame_index: 0,
            people: vec![Detection {
                bbox: BBox::new(10.0, 10.0, 40.0, 60.0),
                score: 0.9,
                class_id: 0,
                label: "person".to_string(),
            }],
            hands: vec![hand_at(0.6, 0.6)],
            inference_ms: 1.0,
        };
        draw_frame_result(&mut img, &result);

        assert_eq!(*img.get_pixel(10, 30), PERSON_COLOR);
        assert_eq!(*img.get_pixel(60, 60), LANDMARK_COLOR);
    }

    #[test]
    fn test_out_of_frame_results_do_not_panic() {
        let mut img = RgbImage::new(20, 20);
        let result = FrameResult {
            people: vec![Detection {
                bbox: BBox::new(-50.0, -50.0, -10.0, -10.0),
                score: 0.9,
                class_id: 0,
                label: "person".to_string(),
            }],
            hands: vec![hand_at(3.0, -2.0)],
            ..Default::default()
        };
        draw_frame_result(&mut img, &result);
    }

    #[test]
    fn test_save_visualization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        save_visualization(&path, &RgbImage::new(8, 8), &FrameResult::default()).unwrap();
        assert!(path.exists());
    }
}
