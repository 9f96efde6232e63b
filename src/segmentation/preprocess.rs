use super::types::Matte;
use anyhow::{ensure, Result};
use image::{imageops, GrayImage, RgbImage};
use ndarray::Array4;

/// Matte values above this cut-off become hair (255) in the binary mask
pub const MASK_THRESHOLD: f32 = 0.5;

/// Converts frames into model input tensors and model output back into
/// frame-sized masks
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    target_width: u32,
    target_height: u32,
}

impl Preprocessor {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Preprocess an RGB image into a normalized NCHW tensor
    ///
    /// Steps:
    /// 1. Resize to target dimensions
    /// 2. Convert to float and normalize to [0, 1]
    /// 3. Transpose from HWC to NCHW format
    ///
    /// Returns: Array4<f32> with shape [1, 3, height, width]
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let resized = if image.dimensions() != (self.target_width, self.target_height) {
            imageops::resize(
                image,
                self.target_width,
                self.target_height,
                imageops::FilterType::Lanczos3,
            )
        } else {
            image.clone()
        };

        let (width, height) = resized.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }

        tensor
    }

    /// Resize a matte to the frame dimensions
    ///
    /// Returns the matte unchanged when the dimensions already match.
    pub fn fit_matte(matte: Matte, target_width: u32, target_height: u32) -> Result<Matte> {
        let _span = tracing::debug_span!("fit_matte").entered();

        let expected = matte.width as usize * matte.height as usize;
        ensure!(
            matte.values.len() == expected,
            "matte has {} values, expected {}x{}",
            matte.values.len(),
            matte.width,
            matte.height
        );

        if (matte.width, matte.height) == (target_width, target_height) {
            return Ok(matte);
        }
        ensure!(expected > 0, "cannot resize an empty matte");

        let gray_image = GrayImage::from_fn(matte.width, matte.height, |x, y| {
            let idx = (y * matte.width + x) as usize;
            image::Luma([to_byte(matte.values[idx])])
        });

        let resized = imageops::resize(
            &gray_image,
            target_width,
            target_height,
            imageops::FilterType::Lanczos3,
        );

        Ok(Matte {
            width: target_width,
            height: target_height,
            values: resized.pixels().map(|p| p[0] as f32 / 255.0).collect(),
        })
    }

    /// Threshold a matte into a 0/255 single-channel mask
    pub fn binarize(matte: &Matte) -> GrayImage {
        GrayImage::from_fn(matte.width, matte.height, |x, y| {
            let idx = (y * matte.width + x) as usize;
            let value = if matte.values[idx] > MASK_THRESHOLD { 255 } else { 0 };
            image::Luma([value])
        })
    }
}

fn to_byte(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_produces_normalized_nchw() {
        let image = RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 51]));
        let tensor = Preprocessor::new(4, 2).preprocess(&image);

        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preprocess_resizes_to_target() {
        let image = RgbImage::new(10, 6);
        let tensor = Preprocessor::new(8, 8).preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
    }

    #[test]
    fn fit_matte_keeps_matching_dimensions() {
        let matte = Matte {
            width: 2,
            height: 1,
            values: vec![0.2, 0.9],
        };
        let fitted = Preprocessor::fit_matte(matte.clone(), 2, 1).unwrap();
        assert_eq!(fitted, matte);
    }

    #[test]
    fn fit_matte_resizes_to_frame() {
        let matte = Matte {
            width: 2,
            height: 2,
            values: vec![1.0; 4],
        };
        let fitted = Preprocessor::fit_matte(matte, 6, 4).unwrap();
        assert_eq!((fitted.width, fitted.height), (6, 4));
        assert_eq!(fitted.values.len(), 24);
        assert!(fitted.values.iter().all(|v| *v > 0.9));
    }

    #[test]
    fn fit_matte_rejects_inconsistent_buffer() {
        let matte = Matte {
            width: 3,
            height: 3,
            values: vec![0.0; 4],
        };
        assert!(Preprocessor::fit_matte(matte, 3, 3).is_err());
    }

    #[test]
    fn binarize_uses_half_threshold() {
        let matte = Matte {
            width: 3,
            height: 1,
            values: vec![0.5, 0.51, 0.1],
        };
        let mask = Preprocessor::binarize(&matte);
        assert_eq!(mask.as_raw(), &vec![0, 255, 0]);
    }
}
