//! Aspect-preserving resize onto a padded canvas.

use crate::processors::geometry::{BBox, Point};
use image::{Rgb, RgbImage, imageops};

/// Resizes images to a fixed model input size without distorting them.
#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
    pub target_width: u32,
    pub target_height: u32,
    pub pad_value: u8,
}

/// How a source image was placed on the letterbox canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub src_width: u32,
    pub src_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl Letterbox {
    pub fn new(target_width: u32, target_height: u32, pad_value: u8) -> Self {
        Self {
            target_width,
            target_height,
            pad_value,
        }
    }

    /// Computes the placement of a `width x height` image without resizing anything.
    pub fn info_for(&self, width: u32, height: u32) -> LetterboxInfo {
        let scale = if width == 0 || height == 0 {
            1.0
        } else {
            (self.target_width as f32 / width as f32).min(self.target_height as f32 / height as f32)
        };
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, self.target_width.max(1));
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, self.target_height.max(1));

        LetterboxInfo {
            scale,
            pad_x: (self.target_width.saturating_sub(new_w) / 2) as f32,
            pad_y: (self.target_height.saturating_sub(new_h) / 2) as f32,
            src_width: width,
            src_height: height,
            target_width: self.target_width,
            target_height: self.target_height,
        }
    }

    /// Resizes `img` to fit and centers it on a canvas filled with `pad_value`.
    pub fn apply(&self, img: &RgbImage) -> (RgbImage, LetterboxInfo) {
        let (width, height) = img.dimensions();
        let info = self.info_for(width, height);
        let mut canvas = RgbImage::from_pixel(
            self.target_width,
            self.target_height,
            Rgb([self.pad_value; 3]),
        );
        if width == 0 || height == 0 {
            return (canvas, info);
        }

        let new_w = ((width as f32 * info.scale).round() as u32).clamp(1, self.target_width.max(1));
        let new_h = ((height as f32 * info.scale).round() as u32).clamp(1, self.target_height.max(1));
        let resized = if (new_w, new_h) == (width, height) {
            img.clone()
        } else {
            imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle)
        };
        imageops::replace(&mut canvas, &resized, info.pad_x as i64, info.pad_y as i64);

        (canvas, info)
    }
}

impl LetterboxInfo {
    /// Maps a point in model pixels back to source pixels.
    pub fn unmap_point(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.pad_x) / self.scale,
            (p.y - self.pad_y) / self.scale,
        )
    }

    /// Maps a box in model pixels back to source pixels.
    pub fn unmap_box(&self, b: &BBox) -> BBox {
        let tl = self.unmap_point(Point::new(b.x1, b.y1));
        let br = self.unmap_point(Point::new(b.x2, b.y2));
        BBox::new(tl.x, tl.y, br.x, br.y)
    }

    /// Maps a point normalized to the model canvas into coordinates
    /// normalized to the source image.
    pub fn unmap_normalized(&self, p: Point) -> Point {
        let px = self.unmap_point(Point::new(
            p.x * self.target_width as f32,
            p.y * self.target_height as f32,
        ));
        Point::new(
            px.x / self.src_width.max(1) as f32,
            px.y / self.src_height.max(1) as f32,
        )
    }
}
