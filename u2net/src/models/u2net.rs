//! The U²-Net architecture.
//!
//! Six RSU encoder stages with 2x2 max-pooling between them, five RSU
//! decoder stages with skip concatenation, six side-output convolutions and
//! a 1x1 fusion convolution. The forward pass yields seven sigmoid
//! probability maps, the fused map first, each upsampled to the input's
//! spatial size.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::sigmoid,
};

use super::rsu::{upsample_like, Rsu, Rsu4F, Rsu4FConfig, RsuConfig};

/// Channel widths of the two published U²-Net variants.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum U2NetSize {
    /// The full-size network (`U2NET`, ~44M parameters).
    Full,
    /// The small network (`U2NETP`, ~1.1M parameters).
    Lite,
}

/// Per-stage `(height, in, mid, out)` rows of the encoder/decoder tables.
type StageChannels = (usize, usize, usize, usize);

impl U2NetSize {
    /// Encoder stages 1-4; stages 5 and 6 are dilated blocks.
    fn encoder_stages(&self, in_channels: usize) -> [StageChannels; 4] {
        match self {
            Self::Full => [
                (7, in_channels, 32, 64),
                (6, 64, 32, 128),
                (5, 128, 64, 256),
                (4, 256, 128, 512),
            ],
            Self::Lite => [
                (7, in_channels, 16, 64),
                (6, 64, 16, 64),
                (5, 64, 16, 64),
                (4, 64, 16, 64),
            ],
        }
    }

    /// `(in, mid, out)` of the dilated stages 5, 6 and decoder stage 5d.
    fn dilated_stages(&self) -> [(usize, usize, usize); 3] {
        match self {
            Self::Full => [(512, 256, 512), (512, 256, 512), (1024, 256, 512)],
            Self::Lite => [(64, 16, 64), (64, 16, 64), (128, 16, 64)],
        }
    }

    /// Decoder stages 4d-1d.
    fn decoder_stages(&self) -> [StageChannels; 4] {
        match self {
            Self::Full => [
                (4, 1024, 128, 256),
                (5, 512, 64, 128),
                (6, 256, 32, 64),
                (7, 128, 16, 64),
            ],
            Self::Lite => [
                (4, 128, 16, 64),
                (5, 128, 16, 64),
                (6, 128, 16, 64),
                (7, 128, 16, 64),
            ],
        }
    }

    /// Input channel counts of the six side-output convolutions.
    fn side_channels(&self) -> [usize; 6] {
        match self {
            Self::Full => [64, 64, 128, 256, 512, 512],
            Self::Lite => [64; 6],
        }
    }
}

/// Configuration for the [`U2Net`] model.
#[derive(Config, Debug)]
pub struct U2NetConfig {
    /// Which published channel table to build.
    size: U2NetSize,
    /// Number of input channels.
    #[config(default = "3")]
    in_channels: usize,
    /// Number of output channels per probability map.
    #[config(default = "1")]
    out_channels: usize,
}

impl U2NetConfig {
    /// Initializes a `U2Net` model on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> U2Net<B> {
        let [enc1, enc2, enc3, enc4] = self.size.encoder_stages(self.in_channels);
        let [st5, st6, st5d] = self.size.dilated_stages();
        let [dec4, dec3, dec2, dec1] = self.size.decoder_stages();
        let sides = self.size.side_channels();

        let rsu = |&(height, input, mid, output): &StageChannels| {
            RsuConfig::new(height, input, mid, output).init(device)
        };
        let rsu4f =
            |&(input, mid, output): &(usize, usize, usize)| Rsu4FConfig::new(input, mid, output).init(device);
        let side = |input: usize| {
            Conv2dConfig::new([input, self.out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        let pool = || MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        U2Net {
            stage1: rsu(&enc1),
            pool12: pool(),
            stage2: rsu(&enc2),
            pool23: pool(),
            stage3: rsu(&enc3),
            pool34: pool(),
            stage4: rsu(&enc4),
            pool45: pool(),
            stage5: rsu4f(&st5),
            pool56: pool(),
            stage6: rsu4f(&st6),
            stage5d: rsu4f(&st5d),
            stage4d: rsu(&dec4),
            stage3d: rsu(&dec3),
            stage2d: rsu(&dec2),
            stage1d: rsu(&dec1),
            side1: side(sides[0]),
            side2: side(sides[1]),
            side3: side(sides[2]),
            side4: side(sides[3]),
            side5: side(sides[4]),
            side6: side(sides[5]),
            outconv: Conv2dConfig::new([6 * self.out_channels, self.out_channels], [1, 1])
                .init(device),
        }
    }
}

/// The seven probability maps produced by one forward pass.
///
/// All maps share the input's spatial size and hold sigmoid activations.
/// The fused map is the network's primary prediction; the side maps come
/// from progressively deeper stages.
#[derive(Debug)]
pub struct U2NetOutput<B: Backend> {
    /// Fusion of all six side outputs through the 1x1 output convolution.
    pub fused: Tensor<B, 4>,
    /// Side outputs, finest stage first.
    pub sides: [Tensor<B, 4>; 6],
}

/// U²-Net salient object detection network.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output maps: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct U2Net<B: Backend> {
    stage1: Rsu<B>,
    pool12: MaxPool2d,
    stage2: Rsu<B>,
    pool23: MaxPool2d,
    stage3: Rsu<B>,
    pool34: MaxPool2d,
    stage4: Rsu<B>,
    pool45: MaxPool2d,
    stage5: Rsu4F<B>,
    pool56: MaxPool2d,
    stage6: Rsu4F<B>,
    stage5d: Rsu4F<B>,
    stage4d: Rsu<B>,
    stage3d: Rsu<B>,
    stage2d: Rsu<B>,
    stage1d: Rsu<B>,
    side1: Conv2d<B>,
    side2: Conv2d<B>,
    side3: Conv2d<B>,
    side4: Conv2d<B>,
    side5: Conv2d<B>,
    side6: Conv2d<B>,
    outconv: Conv2d<B>,
}

impl<B: Backend> U2Net<B> {
    /// Forward pass producing the fused map and all six side maps.
    pub fn forward(&self, x: Tensor<B, 4>) -> U2NetOutput<B> {
        // Encoder
        let hx1 = self.stage1.forward(x);
        let hx = self.pool12.forward(hx1.clone());
        let hx2 = self.stage2.forward(hx);
        let hx = self.pool23.forward(hx2.clone());
        let hx3 = self.stage3.forward(hx);
        let hx = self.pool34.forward(hx3.clone());
        let hx4 = self.stage4.forward(hx);
        let hx = self.pool45.forward(hx4.clone());
        let hx5 = self.stage5.forward(hx);
        let hx = self.pool56.forward(hx5.clone());
        let hx6 = self.stage6.forward(hx);
        let hx6up = upsample_like(hx6.clone(), &hx5);

        // Decoder
        let hx5d = self.stage5d.forward(Tensor::cat(vec![hx6up, hx5], 1));
        let hx5dup = upsample_like(hx5d.clone(), &hx4);
        let hx4d = self.stage4d.forward(Tensor::cat(vec![hx5dup, hx4], 1));
        let hx4dup = upsample_like(hx4d.clone(), &hx3);
        let hx3d = self.stage3d.forward(Tensor::cat(vec![hx4dup, hx3], 1));
        let hx3dup = upsample_like(hx3d.clone(), &hx2);
        let hx2d = self.stage2d.forward(Tensor::cat(vec![hx3dup, hx2], 1));
        let hx2dup = upsample_like(hx2d.clone(), &hx1);
        let hx1d = self.stage1d.forward(Tensor::cat(vec![hx2dup, hx1], 1));

        // Side outputs, upsampled to the finest map's resolution
        let d1 = self.side1.forward(hx1d);
        let d2 = upsample_like(self.side2.forward(hx2d), &d1);
        let d3 = upsample_like(self.side3.forward(hx3d), &d1);
        let d4 = upsample_like(self.side4.forward(hx4d), &d1);
        let d5 = upsample_like(self.side5.forward(hx5d), &d1);
        let d6 = upsample_like(self.side6.forward(hx6), &d1);

        let fused = self.outconv.forward(Tensor::cat(
            vec![
                d1.clone(),
                d2.clone(),
                d3.clone(),
                d4.clone(),
                d5.clone(),
                d6.clone(),
            ],
            1,
        ));

        U2NetOutput {
            fused: sigmoid(fused),
            sides: [
                sigmoid(d1),
                sigmoid(d2),
                sigmoid(d3),
                sigmoid(d4),
                sigmoid(d5),
                sigmoid(d6),
            ],
        }
    }
}
