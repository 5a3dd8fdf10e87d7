//! Resizes decoded images to the model's input resolution and lays them out
//! as a normalized NCHW float tensor

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 224;

/// Number of colour channels fed to the model
pub const CHANNELS: usize = 3;

/// Mean of the ImageNet training set, per RGB channel
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Standard deviation of the ImageNet training set, per RGB channel
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How 8-bit pixel values are mapped to floats
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    /// `v / 255`, so every value lands in [0, 1]
    #[default]
    UnitRange,

    /// `(v / 255 - mean[c]) / std[c]`
    MeanStd {
        #[serde(deserialize_with = "channel_triple")]
        mean: [f32; 3],
        #[serde(deserialize_with = "channel_triple")]
        std: [f32; 3],
    },
}

/// One value per channel, as numbers or as numeric strings (environment
/// variables only ever carry strings)
fn channel_triple<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[f32; 3], D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Value {
        Number(f32),
        Text(String),
    }

    let values = <[Value; 3]>::deserialize(deserializer)?;
    let mut out = [0.; 3];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = match value {
            Value::Number(n) => n,
            Value::Text(s) => s.trim().parse::<f32>().map_err(D::Error::custom)?,
        };
    }
    Ok(out)
}

impl Normalization {
    pub fn imagenet() -> Self {
        Normalization::MeanStd {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    #[inline]
    fn apply(&self, channel: usize, value: u8) -> f32 {
        let unit = value as f32 / 255.;
        match self {
            Normalization::UnitRange => unit,
            Normalization::MeanStd { mean, std } => (unit - mean[channel]) / std[channel],
        }
    }
}

/// A `[1, 3, 224, 224]` channel-major float tensor, ready for the model
#[derive(Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    pub const SHAPE: [i64; 4] = [1, CHANNELS as i64, INPUT_SIZE as i64, INPUT_SIZE as i64];

    /// Number of values in one channel plane
    const PLANE: usize = (INPUT_SIZE * INPUT_SIZE) as usize;

    pub fn zeros() -> Self {
        InputTensor {
            data: vec![0.; CHANNELS * Self::PLANE],
        }
    }

    pub fn shape(&self) -> [i64; 4] {
        Self::SHAPE
    }

    /// The flat NCHW buffer
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at `[0, channel, y, x]`
    pub fn get(&self, channel: usize, y: u32, x: u32) -> f32 {
        self.data[channel * Self::PLANE + (y * INPUT_SIZE + x) as usize]
    }
}

impl std::fmt::Debug for InputTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InputTensor {{ shape: {:?}, data: <{} floats> }}", Self::SHAPE, self.data.len())
    }
}

/// Center-crop the image to the model's square aspect ratio, scale the crop
/// to the input box, then write it out as a normalized NCHW tensor.
///
/// Cropping happens before resizing so the intermediate buffer never exceeds
/// the source, however elongated the input is.
pub fn preprocess(image: RgbImage, normalization: &Normalization) -> InputTensor {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    let square = imageops::crop_imm(&image, (width - side) / 2, (height - side) / 2, side, side);
    let resized = imageops::resize(&*square, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
    debug_assert_eq!(resized.dimensions(), (INPUT_SIZE, INPUT_SIZE));

    let mut tensor = InputTensor::zeros();
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = (y * INPUT_SIZE + x) as usize;
        for channel in 0..CHANNELS {
            tensor.data[channel * InputTensor::PLANE + offset] =
                normalization.apply(channel, pixel[channel]);
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_util::gradient;
    use image::Rgb;

    fn assert_unit_range(tensor: &InputTensor) {
        assert!(tensor
            .as_slice()
            .iter()
            .all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn shape_is_fixed_for_any_input_size() {
        for (w, h) in [(1, 1), (4000, 3000), (17, 301), (224, 224), (640, 100)] {
            let tensor = preprocess(gradient(w, h), &Normalization::UnitRange);
            assert_eq!(tensor.shape(), [1, 3, 224, 224]);
            assert_eq!(tensor.as_slice().len(), 3 * 224 * 224, "{w}x{h}");
            assert_unit_range(&tensor);
        }
    }

    #[test]
    fn channels_are_red_green_blue() {
        let image = RgbImage::from_pixel(50, 80, Rgb([255, 0, 51]));
        let tensor = preprocess(image, &Normalization::UnitRange);

        for (y, x) in [(0, 0), (112, 112), (223, 223)] {
            assert_eq!(tensor.get(0, y, x), 1.0);
            assert_eq!(tensor.get(1, y, x), 0.0);
            assert!((tensor.get(2, y, x) - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn crops_instead_of_stretching() {
        // Left third black, middle third white, right third black: a
        // cover-then-crop of a 3:1 image keeps only the white middle.
        let image = RgbImage::from_fn(672, 224, |x, _| {
            if (224..448).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tensor = preprocess(image, &Normalization::UnitRange);

        for x in [2, 50, 112, 170, 221] {
            assert!(tensor.get(0, 112, x) > 0.95, "column {x} was not white");
        }
    }

    #[test]
    fn elongated_input_is_cropped_before_resizing() {
        let start = std::time::Instant::now();
        for (w, h) in [(1, 5000), (5000, 1), (3, 20000)] {
            let tensor = preprocess(gradient(w, h), &Normalization::UnitRange);
            assert_eq!(tensor.shape(), [1, 3, 224, 224]);
            assert_unit_range(&tensor);
        }
        assert!(start.elapsed() < std::time::Duration::from_secs(5), "took {:?}", start.elapsed());
    }

    #[test]
    fn mean_std_normalization_is_per_channel() {
        let image = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        let tensor = preprocess(image, &Normalization::imagenet());

        for channel in 0..CHANNELS {
            let expected = (1.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
            assert!((tensor.get(channel, 5, 5) - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn debug_does_not_dump_the_buffer() {
        let s = format!("{:?}", InputTensor::zeros());
        assert!(s.contains("150528 floats"), "{s}");
    }
}
