//! End-to-end salient-object mask prediction.
//!
//! The pipeline resizes an image to the network's fixed input size,
//! normalizes it with ImageNet statistics, runs a forward pass, rescales
//! the fused probability map to span the full `[0, 1]` range, and renders
//! it as an 8-bit grayscale mask replicated across three channels.

use std::path::Path;

use burn::tensor::{backend::Backend, DType, ElementConversion, Tensor, TensorData};
use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};

use crate::{
    error::{U2NetError, U2NetResult},
    models::U2Net,
    registry::PretrainedModel,
    weights,
};

/// Per-channel ImageNet statistics, RGB order.
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A preprocessed input: a normalized `[3, H, W]` image tensor plus a
/// placeholder `[1, H, W]` label tensor carried alongside it.
#[derive(Debug, Clone)]
pub struct Sample<B: Backend> {
    pub image: Tensor<B, 3>,
    pub label: Tensor<B, 3>,
}

/// Resizes and normalizes `image` into a [`Sample`] with `size`×`size`
/// spatial dimensions.
///
/// Pixel values are first divided by the image's own maximum channel value
/// rather than a fixed 255, then standardized per channel. A grayscale
/// input is standardized with the red-channel statistics and replicated to
/// all three channels.
pub fn preprocess<B: Backend>(
    image: &DynamicImage,
    size: u32,
    device: &B::Device,
) -> Sample<B> {
    let grayscale = matches!(
        image.color(),
        image::ColorType::L8 | image::ColorType::L16 | image::ColorType::La8 | image::ColorType::La16
    );
    let resized = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let (width, height) = (size as usize, size as usize);
    let pixels = resized.as_raw();
    let max = pixels.iter().copied().max().unwrap_or(0).max(1) as f32;

    // CHW layout, standardized against the image's own dynamic range.
    let mut data = vec![0.0f32; 3 * height * width];
    for y in 0..height {
        for x in 0..width {
            let base = (y * width + x) * 3;
            if grayscale {
                let value = (pixels[base] as f32 / max - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
                for c in 0..3 {
                    data[c * height * width + y * width + x] = value;
                }
            } else {
                for c in 0..3 {
                    data[c * height * width + y * width + x] =
                        (pixels[base + c] as f32 / max - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
            }
        }
    }

    let image = Tensor::from_data(TensorData::new(data, [3, height, width]), device);
    let label = Tensor::zeros([1, height, width], device);
    Sample { image, label }
}

/// Rescales a probability map so its minimum maps to 0 and its maximum
/// to 1.
///
/// A constant map divides by zero and yields NaN throughout; real
/// predictions never are.
pub fn normalize_prediction<B: Backend>(prediction: Tensor<B, 2>) -> Tensor<B, 2> {
    let max = prediction.clone().max().into_scalar().elem::<f32>();
    let min = prediction.clone().min().into_scalar().elem::<f32>();
    (prediction - min) / (max - min)
}

/// Renders a `[H, W]` map in `[0, 1]` as an RGB image with the grayscale
/// value replicated across all three channels.
///
/// # Errors
///
/// Returns an error if the tensor data cannot be read back from the
/// backend.
pub fn mask_to_image<B: Backend>(mask: Tensor<B, 2>) -> U2NetResult<RgbImage> {
    let [height, width] = mask.dims();
    let values = mask
        .into_data()
        .convert_dtype(DType::F32)
        .to_vec::<f32>()
        .map_err(|e| U2NetError::TensorConversion {
            reason: format!("{e:?}"),
        })?;

    let mut image = RgbImage::new(width as u32, height as u32);
    for (i, value) in values.iter().enumerate() {
        let level = (value * 255.0).round().clamp(0.0, 255.0) as u8;
        image.put_pixel(
            (i % width) as u32,
            (i / width) as u32,
            Rgb([level, level, level]),
        );
    }
    Ok(image)
}

/// A loaded network bound to a device, ready to produce masks.
#[derive(Debug)]
pub struct Session<B: Backend> {
    model: U2Net<B>,
    device: B::Device,
    variant: PretrainedModel,
}

impl<B: Backend> Session<B> {
    /// Provisions the pretrained weights for `variant` and builds a
    /// session on `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if weight provisioning or loading fails.
    pub fn open(variant: PretrainedModel, device: B::Device) -> U2NetResult<Self> {
        let model = weights::load_model(variant, &device)?;
        Ok(Self::from_parts(model, device, variant))
    }

    /// Builds a session from an already-loaded network.
    pub fn from_parts(model: U2Net<B>, device: B::Device, variant: PretrainedModel) -> Self {
        Self {
            model,
            device,
            variant,
        }
    }

    pub fn variant(&self) -> PretrainedModel {
        self.variant
    }

    /// Predicts the salient-object mask for `image`.
    ///
    /// The returned image is always `input_size`×`input_size` pixels,
    /// regardless of the input's dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the prediction cannot be read back from the
    /// backend.
    pub fn predict(&self, image: &DynamicImage) -> U2NetResult<RgbImage> {
        let sample = preprocess::<B>(image, self.variant.input_size() as u32, &self.device);
        let batch = sample.image.unsqueeze::<4>();

        let output = self.model.forward(batch);
        // Fused map, first channel of the first batch element.
        let fused = output.fused.squeeze::<3>(0).squeeze::<2>(0);

        mask_to_image(normalize_prediction(fused))
    }

    /// [`Session::predict`] reading the input from `path`.
    pub fn predict_file(&self, path: &Path) -> U2NetResult<RgbImage> {
        let image = image::open(path)?;
        self.predict(&image)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use image::{GrayImage, Luma};

    use super::*;

    type TestBackend = NdArray;

    fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
        let mut image = RgbImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgb([(x % 256) as u8, (y % 256) as u8, 128]);
        }
        DynamicImage::ImageRgb8(image)
    }

    #[test]
    fn preprocess_resizes_to_fixed_square() {
        let device = Default::default();
        let sample = preprocess::<TestBackend>(&gradient_rgb(400, 300), 320, &device);

        assert_eq!(sample.image.dims(), [3, 320, 320]);
        assert_eq!(sample.label.dims(), [1, 320, 320]);
    }

    #[test]
    fn preprocess_replicates_grayscale_channels() {
        let device = Default::default();
        let mut gray = GrayImage::new(8, 8);
        for (x, y, pixel) in gray.enumerate_pixels_mut() {
            *pixel = Luma([(x * 32 + y) as u8]);
        }
        let sample = preprocess::<TestBackend>(&DynamicImage::ImageLuma8(gray), 8, &device);

        let data = sample.image.into_data().to_vec::<f32>().unwrap();
        let plane = 8 * 8;
        for i in 0..plane {
            assert_eq!(data[i], data[plane + i]);
            assert_eq!(data[i], data[2 * plane + i]);
        }
    }

    #[test]
    fn preprocess_standardizes_against_image_maximum() {
        let device = Default::default();
        // Uniform mid-gray: every pixel equals the maximum, so the scaled
        // value is exactly 1.0 before standardization.
        let uniform = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([90, 90, 90])));
        let sample = preprocess::<TestBackend>(&uniform, 4, &device);

        let data = sample.image.into_data().to_vec::<f32>().unwrap();
        let expected: Vec<f32> = (0..3)
            .map(|c| (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
            .collect();
        for c in 0..3 {
            for i in 0..16 {
                let got = data[c * 16 + i];
                assert!((got - expected[c]).abs() < 1e-6, "channel {c}: {got}");
            }
        }
    }

    #[test]
    fn normalize_prediction_spans_unit_interval() {
        let device = Default::default();
        let prediction = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.2f32, 0.4, 0.6, 0.8], [2, 2]),
            &device,
        );
        let normalized = normalize_prediction(prediction);

        let data = normalized.into_data().to_vec::<f32>().unwrap();
        assert!((data[0] - 0.0).abs() < 1e-6);
        assert!((data[3] - 1.0).abs() < 1e-6);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn mask_renders_as_replicated_grayscale() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.0f32, 0.5, 1.0, 0.25], [2, 2]),
            &device,
        );
        let image = mask_to_image(mask).unwrap();

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([128, 128, 128]));
        assert_eq!(image.get_pixel(0, 1), &Rgb([255, 255, 255]));
        for (_, _, pixel) in image.enumerate_pixels() {
            assert_eq!(pixel.0[0], pixel.0[1]);
            assert_eq!(pixel.0[1], pixel.0[2]);
        }
    }
}
