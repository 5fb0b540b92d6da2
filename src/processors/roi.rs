//! Rotated region-of-interest extraction.

use crate::processors::geometry::{Point, RotatedRect};
use crate::processors::types::Interpolation;
use image::{Rgb, RgbImage};

/// Maps points between a warped crop and the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiTransform {
    pub rect: RotatedRect,
    pub out_width: u32,
    pub out_height: u32,
}

impl RoiTransform {
    pub fn new(rect: RotatedRect, out_width: u32, out_height: u32) -> Self {
        Self {
            rect,
            out_width,
            out_height,
        }
    }

    /// Crop pixel to image pixel.
    pub fn crop_to_image(&self, p: Point) -> Point {
        let local = Point::new(
            (p.x / self.out_width.max(1) as f32 - 0.5) * self.rect.width,
            (p.y / self.out_height.max(1) as f32 - 0.5) * self.rect.height,
        );
        self.rect.local_to_image(local)
    }

    /// Factor converting crop pixels to image pixels along the crop x axis.
    pub fn scale_x(&self) -> f32 {
        self.rect.width / self.out_width.max(1) as f32
    }

    /// Inverse of [`RoiTransform::crop_to_image`].
    pub fn image_to_crop(&self, p: Point) -> Point {
        let (sin, cos) = self.rect.rotation.sin_cos();
        let dx = p.x - self.rect.cx;
        let dy = p.y - self.rect.cy;
        let lx = dx * cos + dy * sin;
        let ly = -dx * sin + dy * cos;
        Point::new(
            (lx / self.rect.width + 0.5) * self.out_width as f32,
            (ly / self.rect.height + 0.5) * self.out_height as f32,
        )
    }
}

fn sample(img: &RgbImage, x: f32, y: f32, interpolation: Interpolation) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    let fetch = |xi: i64, yi: i64| -> [f32; 3] {
        if xi < 0 || yi < 0 || xi >= w as i64 || yi >= h as i64 {
            [0.0; 3]
        } else {
            let p = img.get_pixel(xi as u32, yi as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        }
    };

    match interpolation {
        Interpolation::Nearest => {
            let v = fetch(x.floor() as i64, y.floor() as i64);
            Rgb([v[0] as u8, v[1] as u8, v[2] as u8])
        }
        Interpolation::Bilinear => {
            // Pixel centers sit at half-integer coordinates.
            let fx = x - 0.5;
            let fy = y - 0.5;
            let x0 = fx.floor();
            let y0 = fy.floor();
            let ax = fx - x0;
            let ay = fy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let p00 = fetch(x0, y0);
            let p10 = fetch(x0 + 1, y0);
            let p01 = fetch(x0, y0 + 1);
            let p11 = fetch(x0 + 1, y0 + 1);

            let mut out = [0u8; 3];
            for c in 0..3 {
                let top = p00[c] * (1.0 - ax) + p10[c] * ax;
                let bottom = p01[c] * (1.0 - ax) + p11[c] * ax;
                out[c] = (top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8;
            }
            Rgb(out)
        }
    }
}

/// Extracts `rect` from `img` into an upright `out_width x out_height` crop.
///
/// Each output pixel is inverse-mapped into the source image. Samples
/// outside the image are black.
pub fn warp_rotated_roi(
    img: &RgbImage,
    rect: &RotatedRect,
    out_width: u32,
    out_height: u32,
) -> (RgbImage, RoiTransform) {
    warp_rotated_roi_with(img, rect, out_width, out_height, Interpolation::Bilinear)
}

/// [`warp_rotated_roi`] with an explicit interpolation mode.
pub fn warp_rotated_roi_with(
    img: &RgbImage,
    rect: &RotatedRect,
    out_width: u32,
    out_height: u32,
    interpolation: Interpolation,
) -> (RgbImage, RoiTransform) {
    let transform = RoiTransform::new(*rect, out_width, out_height);
    let out = RgbImage::from_fn(out_width, out_height, |u, v| {
        let src = transform.crop_to_image(Point::new(u as f32 + 0.5, v as f32 + 0.5));
        sample(img, src.x, src.y, interpolation)
    });
    (out, transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 0]))
    }

    #[test]
    fn test_axis_aligned_crop_is_identity() {
        let img = gradient(20, 20);
        let rect = RotatedRect::new(10.0, 10.0, 10.0, 10.0, 0.0);
        let (crop, _) = warp_rotated_roi(&img, &rect, 10, 10);
        assert_eq!(crop.get_pixel(0, 0), img.get_pixel(5, 5));
        assert_eq!(crop.get_pixel(9, 9), img.get_pixel(14, 14));
    }

    #[test]
    fn test_half_turn_flips_crop() {
        let img = gradient(20, 20);
        let rect = RotatedRect::new(10.0, 10.0, 10.0, 10.0, PI);
        let (crop, _) = warp_rotated_roi_with(&img, &rect, 10, 10, Interpolation::Nearest);
        assert_eq!(crop.get_pixel(0, 0), img.get_pixel(14, 14));
    }

    #[test]
    fn test_outside_is_black() {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        let rect = RotatedRect::new(-50.0, -50.0, 10.0, 10.0, 0.0);
        let (crop, _) = warp_rotated_roi(&img, &rect, 4, 4);
        assert!(crop.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_transform_roundtrip() {
        let rect = RotatedRect::new(100.0, 80.0, 60.0, 60.0, 0.7);
        let t = RoiTransform::new(rect, 224, 224);
        let p = Point::new(37.0, 190.0);
        let back = t.image_to_crop(t.crop_to_image(p));
        assert!((back.x - p.x).abs() < 1e-3);
        assert!((back.y - p.y).abs() < 1e-3);

        let center = t.crop_to_image(Point::new(112.0, 112.0));
        assert!((center.x - 100.0).abs() < 1e-4 && (center.y - 80.0).abs() < 1e-4);
    }
}
