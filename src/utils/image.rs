//! Utility functions for loading images.

use crate::core::DetectError;
use image::{DynamicImage, ImageBuffer, ImageError, ImageReader, RgbImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Batches larger than this are decoded in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// Loads an image from a file path and converts it to RgbImage.
///
/// The `image` crate picks the decoder from the file extension, which fails
/// when JPEG bytes are stored under `.png` (or vice versa). On a decode
/// failure the file is read again with format sniffing so the content decides.
///
/// # Errors
///
/// Returns [`DetectError::ImageLoad`] if neither attempt can decode the file.
pub fn load_image(path: &Path) -> Result<RgbImage, DetectError> {
    load_dynamic_image(path)
        .map(|img| img.to_rgb8())
        .map_err(DetectError::ImageLoad)
}

fn load_dynamic_image(path: &Path) -> Result<DynamicImage, ImageError> {
    match image::open(path) {
        Ok(img) => Ok(img),
        Err(err) if should_retry(&err) => {
            tracing::warn!(
                "Standard decode failed for {} ({err}). Retrying with format sniffing.",
                path.display()
            );
            decode_with_guessed_format(path)
        }
        Err(err) => Err(err),
    }
}

fn should_retry(err: &ImageError) -> bool {
    matches!(err, ImageError::Decoding(_) | ImageError::Unsupported(_))
}

fn decode_with_guessed_format(path: &Path) -> Result<DynamicImage, ImageError> {
    let file = File::open(path)?;
    let reader = ImageReader::new(BufReader::new(file)).with_guessed_format()?;
    reader.decode()
}

/// Creates an RgbImage from raw RGB pixel data, or `None` if the length is wrong.
pub fn create_rgb_image(width: u32, height: u32, data: Vec<u8>) -> Option<RgbImage> {
    if data.len() != width as usize * height as usize * 3 {
        return None;
    }
    ImageBuffer::from_raw(width, height, data)
}

/// Loads several images, in parallel once the batch exceeds
/// [`DEFAULT_PARALLEL_THRESHOLD`].
pub fn load_images_batch<P: AsRef<Path> + Send + Sync>(
    paths: &[P],
) -> Result<Vec<RgbImage>, DetectError> {
    if paths.len() > DEFAULT_PARALLEL_THRESHOLD {
        use rayon::prelude::*;
        paths.par_iter().map(|p| load_image(p.as_ref())).collect()
    } else {
        paths.iter().map(|p| load_image(p.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    #[test]
    fn test_load_image_with_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("actually_png.jpg");
        let img = RgbImage::from_pixel(3, 2, Rgb([7, 8, 9]));
        img.save_with_format(&path, ImageFormat::Png).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(2, 1), &Rgb([7, 8, 9]));
    }

    #[test]
    fn test_load_missing_image() {
        let err = load_image(Path::new("/no/such/image.png")).unwrap_err();
        assert!(matches!(err, DetectError::ImageLoad(_)));
    }

    #[test]
    fn test_create_rgb_image() {
        assert!(create_rgb_image(2, 2, vec![0; 12]).is_some());
        assert!(create_rgb_image(2, 2, vec![0; 11]).is_none());
    }

    #[test]
    fn test_batch_loading() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..6)
            .map(|i| {
                let p = dir.path().join(format!("{i}.png"));
                RgbImage::new(2, 2).save(&p).unwrap();
                p
            })
            .collect();
        assert_eq!(load_images_batch(&paths).unwrap().len(), 6);
    }
}
