//! Pixel normalization into model input tensors.
//!
//! Every model in the pipeline takes RGB input scaled per channel as
//! `value * alpha + beta`. YOLO wants CHW in `[0, 1]`, the MediaPipe hand
//! models want HWC in `[0, 1]`.

use crate::core::{DetectError, Tensor4D};
use crate::processors::types::ChannelOrder;
use image::RgbImage;
use rayon::prelude::*;

/// Normalizes images into model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
    /// Channel ordering (CHW or HWC)
    pub order: ChannelOrder,
}

impl NormalizeImage {
    /// Creates a normalizer from a scale factor, per-channel mean and std.
    ///
    /// # Errors
    ///
    /// Returns an error if the scale or any standard deviation is not positive.
    pub fn new(
        scale: f32,
        mean: [f32; 3],
        std: [f32; 3],
        order: ChannelOrder,
    ) -> Result<Self, DetectError> {
        if scale <= 0.0 || !scale.is_finite() {
            return Err(DetectError::config_error(format!(
                "Scale must be greater than 0, got {scale}"
            )));
        }

        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(DetectError::config_error(format!(
                    "Standard deviation at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let alpha = [scale / std[0], scale / std[1], scale / std[2]];
        let beta = [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]];

        Ok(Self { alpha, beta, order })
    }

    /// Maps `[0, 255]` to `[0, 1]` with the given channel order.
    pub fn for_unit_range(order: ChannelOrder) -> Self {
        let s = 1.0 / 255.0;
        Self {
            alpha: [s; 3],
            beta: [0.0; 3],
            order,
        }
    }

    /// ImageNet mean and std on `[0, 1]` scaled input, CHW.
    pub fn for_imagenet() -> Self {
        let mean = [0.485, 0.456, 0.406];
        let std = [0.229, 0.224, 0.225];
        let s = 1.0 / 255.0;
        Self {
            alpha: [s / std[0], s / std[1], s / std[2]],
            beta: [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]],
            order: ChannelOrder::CHW,
        }
    }

    /// Applies the transform to a single channel value.
    #[inline]
    pub fn apply_channel(&self, value: u8, channel: usize) -> f32 {
        value as f32 * self.alpha[channel] + self.beta[channel]
    }

    /// Writes one image into a pre-sized buffer of `3 * h * w` values.
    fn write_into(&self, img: &RgbImage, out: &mut [f32]) {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let plane = w * h;

        match self.order {
            ChannelOrder::CHW => {
                for (i, pixel) in img.pixels().enumerate() {
                    for c in 0..3 {
                        out[c * plane + i] = self.apply_channel(pixel[c], c);
                    }
                }
            }
            ChannelOrder::HWC => {
                for (i, pixel) in img.pixels().enumerate() {
                    for c in 0..3 {
                        out[i * 3 + c] = self.apply_channel(pixel[c], c);
                    }
                }
            }
        }
    }

    fn tensor_dims(&self, batch: usize, height: usize, width: usize) -> (usize, usize, usize, usize) {
        match self.order {
            ChannelOrder::CHW => (batch, 3, height, width),
            ChannelOrder::HWC => (batch, height, width, 3),
        }
    }

    /// Normalizes a single image and returns it as a batch-of-one tensor.
    pub fn normalize_to(&self, img: &RgbImage) -> Result<Tensor4D, DetectError> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut result = vec![0.0f32; 3 * w * h];
        self.write_into(img, &mut result);

        let dims = self.tensor_dims(1, h, w);
        Tensor4D::from_shape_vec(dims, result).map_err(|e| {
            DetectError::normalization(
                &format!("Failed to create normalization tensor for {width}x{height} image"),
                e,
            )
        })
    }

    /// Normalizes a batch of same-sized images into one tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the images don't all have the same dimensions.
    pub fn normalize_batch_to(&self, imgs: &[RgbImage]) -> Result<Tensor4D, DetectError> {
        let Some(first) = imgs.first() else {
            return Ok(Tensor4D::zeros((0, 0, 0, 0)));
        };

        let (first_width, first_height) = first.dimensions();
        for (i, img) in imgs.iter().enumerate() {
            let (width, height) = img.dimensions();
            if width != first_width || height != first_height {
                return Err(DetectError::invalid_input(format!(
                    "All images in batch must have the same dimensions. Image 0: {first_width}x{first_height}, Image {i}: {width}x{height}"
                )));
            }
        }

        let (w, h) = (first_width as usize, first_height as usize);
        let img_size = 3 * w * h;
        let mut result = vec![0.0f32; imgs.len() * img_size];

        result
            .par_chunks_mut(img_size)
            .zip(imgs.par_iter())
            .for_each(|(chunk, img)| self.write_into(img, chunk));

        let dims = self.tensor_dims(imgs.len(), h, w);
        Tensor4D::from_shape_vec(dims, result).map_err(|e| {
            DetectError::tensor_operation("Failed to create batch normalization tensor", e)
        })
    }
}
