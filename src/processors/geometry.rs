//! Geometric primitives for detections and regions of interest.

use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 3D point; `z` is relative depth for screen landmarks and metres for world landmarks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Axis-aligned bounding box in `x1, y1, x2, y2` form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from its center and size.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// True when all coordinates are finite and the box has positive area.
    pub fn is_valid(&self) -> bool {
        self.x1.is_finite()
            && self.y1.is_finite()
            && self.x2.is_finite()
            && self.y2.is_finite()
            && self.x2 > self.x1
            && self.y2 > self.y1
    }

    /// Clamps the box to `[0, width] x [0, height]`.
    pub fn clamp(&self, width: f32, height: f32) -> Self {
        Self {
            x1: self.x1.clamp(0.0, width),
            y1: self.y1.clamp(0.0, height),
            x2: self.x2.clamp(0.0, width),
            y2: self.y2.clamp(0.0, height),
        }
    }

    /// Scales coordinates independently along each axis.
    pub fn scale(&self, sx: f32, sy: f32) -> Self {
        Self {
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            x2: self.x2 * sx,
            y2: self.y2 * sy,
        }
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let x_min = self.x1.max(other.x1);
        let y_min = self.y1.max(other.y1);
        let x_max = self.x2.min(other.x2);
        let y_max = self.y2.min(other.y2);

        if x_max <= x_min || y_max <= y_min {
            return 0.0;
        }

        let intersection = (x_max - x_min) * (y_max - y_min);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Smallest box enclosing all points, or `None` for an empty slice.
    pub fn enclosing<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter().peekable();
        iter.peek()?;
        let mut b = BBox::new(f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in iter {
            b.x1 = b.x1.min(p.x);
            b.y1 = b.y1.min(p.y);
            b.x2 = b.x2.max(p.x);
            b.y2 = b.y2.max(p.y);
        }
        Some(b)
    }
}

/// A rectangle rotated about its center. `rotation` is in radians,
/// counter-clockwise in image space with y pointing down rendered as clockwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub cx: f32,
    pub cy: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

impl RotatedRect {
    pub fn new(cx: f32, cy: f32, width: f32, height: f32, rotation: f32) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            rotation,
        }
    }

    /// Maps a point given in the rectangle's local frame (origin at the
    /// center, units in pixels) to image coordinates.
    pub fn local_to_image(&self, local: Point) -> Point {
        let (sin, cos) = self.rotation.sin_cos();
        Point::new(
            self.cx + local.x * cos - local.y * sin,
            self.cy + local.x * sin + local.y * cos,
        )
    }

    /// Finite center and rotation with a positive size.
    pub fn is_valid(&self) -> bool {
        self.cx.is_finite()
            && self.cy.is_finite()
            && self.rotation.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Whether `p` (image coordinates) lies inside the rectangle.
    pub fn contains(&self, p: Point) -> bool {
        let (sin, cos) = self.rotation.sin_cos();
        let dx = p.x - self.cx;
        let dy = p.y - self.cy;
        let lx = dx * cos + dy * sin;
        let ly = -dx * sin + dy * cos;
        lx.abs() <= self.width / 2.0 && ly.abs() <= self.height / 2.0
    }

    /// Corners in order top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            self.local_to_image(Point::new(-hw, -hh)),
            self.local_to_image(Point::new(hw, -hh)),
            self.local_to_image(Point::new(hw, hh)),
            self.local_to_image(Point::new(-hw, hh)),
        ]
    }
}

/// Wraps an angle into `[-pi, pi)`.
pub fn normalize_radians(angle: f32) -> f32 {
    use std::f32::consts::PI;
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_rotated_contains() {
        let r = RotatedRect::new(50.0, 50.0, 40.0, 10.0, FRAC_PI_2);
        assert!(r.contains(Point::new(50.0, 68.0)));
        assert!(!r.contains(Point::new(68.0, 50.0)));
    }

    #[test]
    fn test_rotated_is_valid() {
        assert!(RotatedRect::new(50.0, 50.0, 40.0, 10.0, 0.3).is_valid());
        assert!(!RotatedRect::new(50.0, 50.0, 0.0, 0.0, 0.0).is_valid());
        assert!(!RotatedRect::new(f32::NAN, 50.0, 10.0, 10.0, 0.0).is_valid());
        assert!(!RotatedRect::new(50.0, 50.0, 10.0, f32::INFINITY, 0.0).is_valid());
    }

    #[test]
    fn test_iou() {
        let a = BBox::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(a.iou(&a), 1.0);

        let b = BBox::new(200.0, 200.0, 300.0, 300.0);
        assert_eq!(a.iou(&b), 0.0);

        let c = BBox::new(50.0, 0.0, 150.0, 100.0);
        assert!((a.iou(&c) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_and_validity() {
        let b = BBox::new(-10.0, 5.0, 700.0, 500.0).clamp(640.0, 480.0);
        assert_eq!(b, BBox::new(0.0, 5.0, 640.0, 480.0));
        assert!(b.is_valid());
        assert!(!BBox::new(10.0, 10.0, 10.0, 20.0).is_valid());
        assert!(!BBox::new(0.0, 0.0, f32::NAN, 1.0).is_valid());
    }

    #[test]
    fn test_enclosing() {
        let pts = [Point::new(1.0, 5.0), Point::new(-2.0, 3.0), Point::new(4.0, 0.0)];
        assert_eq!(
            BBox::enclosing(pts.iter()).unwrap(),
            BBox::new(-2.0, 0.0, 4.0, 5.0)
        );
        assert!(BBox::enclosing(std::iter::empty()).is_none());
    }

    #[test]
    fn test_rotated_corners() {
        let r = RotatedRect::new(10.0, 10.0, 4.0, 2.0, FRAC_PI_2);
        let c = r.corners();
        // A quarter turn swaps the extents.
        assert!((c[0].x - 11.0).abs() < 1e-5 && (c[0].y - 8.0).abs() < 1e-5);
        assert!((c[2].x - 9.0).abs() < 1e-5 && (c[2].y - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_radians() {
        assert!((normalize_radians(3.0 * PI) - (-PI)).abs() < 1e-5);
        assert!((normalize_radians(FRAC_PI_2) - FRAC_PI_2).abs() < 1e-6);
        assert!((normalize_radians(-3.0 * FRAC_PI_2) - FRAC_PI_2).abs() < 1e-5);
    }
}
