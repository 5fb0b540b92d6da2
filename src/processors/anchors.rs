//! SSD anchor generation for the palm detector.
//!
//! Reproduces MediaPipe's `SsdAnchorsCalculator` so decoded boxes line up
//! with the regressor output rows one to one.

use serde::{Deserialize, Serialize};

/// A single anchor in coordinates normalized to the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
}

/// Parameters of the anchor grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdAnchorOptions {
    pub num_layers: usize,
    pub min_scale: f32,
    pub max_scale: f32,
    pub input_size_width: u32,
    pub input_size_height: u32,
    pub anchor_offset_x: f32,
    pub anchor_offset_y: f32,
    pub strides: Vec<u32>,
    pub aspect_ratios: Vec<f32>,
    pub reduce_boxes_in_lowest_layer: bool,
    pub interpolated_scale_aspect_ratio: f32,
    pub fixed_anchor_size: bool,
}

impl Default for SsdAnchorOptions {
    /// The 192x192 palm detection model.
    fn default() -> Self {
        Self {
            num_layers: 4,
            min_scale: 0.148_437_5,
            max_scale: 0.75,
            input_size_width: 192,
            input_size_height: 192,
            anchor_offset_x: 0.5,
            anchor_offset_y: 0.5,
            strides: vec![8, 16, 16, 16],
            aspect_ratios: vec![1.0],
            reduce_boxes_in_lowest_layer: false,
            interpolated_scale_aspect_ratio: 1.0,
            fixed_anchor_size: true,
        }
    }
}

fn calculate_scale(min_scale: f32, max_scale: f32, index: usize, count: usize) -> f32 {
    if count == 1 {
        (min_scale + max_scale) * 0.5
    } else {
        min_scale + (max_scale - min_scale) * index as f32 / (count - 1) as f32
    }
}

/// Generates anchors layer by layer, row-major within each feature map.
///
/// Consecutive layers sharing a stride are merged into one feature map with
/// the union of their anchor shapes.
pub fn generate_anchors(options: &SsdAnchorOptions) -> Vec<Anchor> {
    let mut anchors = Vec::new();
    let num_layers = options.num_layers.min(options.strides.len());

    let mut layer_id = 0;
    while layer_id < num_layers {
        let mut aspect_ratios = Vec::new();
        let mut scales = Vec::new();

        let mut last_same_stride_layer = layer_id;
        while last_same_stride_layer < num_layers
            && options.strides[last_same_stride_layer] == options.strides[layer_id]
        {
            let scale = calculate_scale(
                options.min_scale,
                options.max_scale,
                last_same_stride_layer,
                num_layers,
            );

            if last_same_stride_layer == 0 && options.reduce_boxes_in_lowest_layer {
                aspect_ratios.extend([1.0, 2.0, 0.5]);
                scales.extend([0.1, scale, scale]);
            } else {
                for &ratio in &options.aspect_ratios {
                    aspect_ratios.push(ratio);
                    scales.push(scale);
                }
                if options.interpolated_scale_aspect_ratio > 0.0 {
                    let scale_next = if last_same_stride_layer == num_layers - 1 {
                        1.0
                    } else {
                        calculate_scale(
                            options.min_scale,
                            options.max_scale,
                            last_same_stride_layer + 1,
                            num_layers,
                        )
                    };
                    scales.push((scale * scale_next).sqrt());
                    aspect_ratios.push(options.interpolated_scale_aspect_ratio);
                }
            }
            last_same_stride_layer += 1;
        }

        let shapes: Vec<(f32, f32)> = aspect_ratios
            .iter()
            .zip(&scales)
            .map(|(&ratio, &scale)| {
                let ratio_sqrt = ratio.sqrt();
                (scale * ratio_sqrt, scale / ratio_sqrt)
            })
            .collect();

        let stride = options.strides[layer_id].max(1);
        let fm_height = options.input_size_height.div_ceil(stride);
        let fm_width = options.input_size_width.div_ceil(stride);

        for y in 0..fm_height {
            for x in 0..fm_width {
                for &(w, h) in &shapes {
                    let (width, height) = if options.fixed_anchor_size {
                        (1.0, 1.0)
                    } else {
                        (w, h)
                    };
                    anchors.push(Anchor {
                        x_center: (x as f32 + options.anchor_offset_x) / fm_width as f32,
                        y_center: (y as f32 + options.anchor_offset_y) / fm_height as f32,
                        width,
                        height,
                    });
                }
            }
        }

        layer_id = last_same_stride_layer;
    }

    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palm_anchor_count() {
        let anchors = generate_anchors(&SsdAnchorOptions::default());
        assert_eq!(anchors.len(), 24 * 24 * 2 + 12 * 12 * 6);
        assert_eq!(anchors.len(), 2016);
    }

    #[test]
    fn test_anchor_centers() {
        let anchors = generate_anchors(&SsdAnchorOptions::default());
        let first = anchors[0];
        assert!((first.x_center - 0.5 / 24.0).abs() < 1e-6);
        assert!((first.y_center - 0.5 / 24.0).abs() < 1e-6);
        assert_eq!((first.width, first.height), (1.0, 1.0));

        // Second anchor of the first cell shares the center.
        assert_eq!(anchors[1].x_center, first.x_center);

        let last = anchors[2015];
        assert!((last.x_center - 11.5 / 12.0).abs() < 1e-6);
        assert!((last.y_center - 11.5 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_variable_anchor_size() {
        let options = SsdAnchorOptions {
            fixed_anchor_size: false,
            ..Default::default()
        };
        let anchors = generate_anchors(&options);
        assert!((anchors[0].width - 0.148_437_5).abs() < 1e-6);
    }
}
