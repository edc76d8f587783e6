//! Residual U-blocks, the building units of U²-Net.
//!
//! Each RSU is a small U-Net: an input convolution, a pooled encoder chain,
//! a dilated bottom convolution, and a decoder chain that concatenates skip
//! connections and upsamples back, with a residual add around the whole
//! block. `Rsu4F` replaces pooling with growing dilations so the deepest
//! stages keep their spatial size.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Bilinearly resizes `x` to the spatial size of `reference`.
pub(crate) fn upsample_like<B: Backend>(
    x: Tensor<B, 4>,
    reference: &Tensor<B, 4>,
) -> Tensor<B, 4> {
    let [_, _, height, width] = reference.dims();
    interpolate(
        x,
        [height, width],
        InterpolateOptions::new(InterpolateMode::Bilinear),
    )
}

/// Configuration for the [`RebnConv`] module.
#[derive(Config, Debug)]
pub struct RebnConvConfig {
    /// Number of input channels.
    #[config(default = "3")]
    in_channels: usize,
    /// Number of output channels.
    #[config(default = "3")]
    out_channels: usize,
    /// Dilation rate of the 3x3 convolution (padding grows to match).
    #[config(default = "1")]
    dilation: usize,
}

impl RebnConvConfig {
    /// Creates a `RebnConv` module on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> RebnConv<B> {
        let conv = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride([1, 1])
            .with_padding(PaddingConfig2d::Explicit(self.dilation, self.dilation))
            .with_dilation([self.dilation, self.dilation])
            .init(device);
        RebnConv {
            conv,
            bn: BatchNormConfig::new(self.out_channels).init(device),
            relu: Relu::new(),
        }
    }
}

/// Convolution + BatchNorm + ReLU, the atomic U²-Net block.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct RebnConv<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> RebnConv<B> {
    /// Forward pass through conv, batch norm, and ReLU.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.bn.forward(x);
        self.relu.forward(x)
    }
}

/// Configuration for the [`Rsu`] module.
#[derive(Config, Debug)]
pub struct RsuConfig {
    /// Number of encoder levels, 4 to 7 in the published architectures.
    height: usize,
    /// Number of input channels.
    in_channels: usize,
    /// Number of channels inside the block.
    mid_channels: usize,
    /// Number of output channels.
    out_channels: usize,
}

impl RsuConfig {
    /// Creates an `Rsu` module on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Rsu<B> {
        let conv_in = RebnConvConfig::new()
            .with_in_channels(self.in_channels)
            .with_out_channels(self.out_channels)
            .init(device);

        // Encoders 0..height-2 run at progressively pooled resolutions; the
        // last entry is the dilated bottom convolution.
        let mut encoders = Vec::with_capacity(self.height);
        encoders.push(
            RebnConvConfig::new()
                .with_in_channels(self.out_channels)
                .with_out_channels(self.mid_channels)
                .init(device),
        );
        for _ in 1..self.height - 1 {
            encoders.push(
                RebnConvConfig::new()
                    .with_in_channels(self.mid_channels)
                    .with_out_channels(self.mid_channels)
                    .init(device),
            );
        }
        encoders.push(
            RebnConvConfig::new()
                .with_in_channels(self.mid_channels)
                .with_out_channels(self.mid_channels)
                .with_dilation(2)
                .init(device),
        );

        // Decoders stored shallowest-first; forward walks them in reverse.
        let mut decoders = Vec::with_capacity(self.height - 1);
        decoders.push(
            RebnConvConfig::new()
                .with_in_channels(self.mid_channels * 2)
                .with_out_channels(self.out_channels)
                .init(device),
        );
        for _ in 1..self.height - 1 {
            decoders.push(
                RebnConvConfig::new()
                    .with_in_channels(self.mid_channels * 2)
                    .with_out_channels(self.mid_channels)
                    .init(device),
            );
        }

        Rsu {
            conv_in,
            encoders,
            decoders,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

/// Residual U-block of configurable height (RSU-7 down to RSU-4).
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct Rsu<B: Backend> {
    conv_in: RebnConv<B>,
    encoders: Vec<RebnConv<B>>,
    decoders: Vec<RebnConv<B>>,
    pool: MaxPool2d,
}

impl<B: Backend> Rsu<B> {
    /// Forward pass through the residual U-block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let hx_in = self.conv_in.forward(x);

        let bottom = self.encoders.len() - 1;
        let mut skips: Vec<Tensor<B, 4>> = Vec::with_capacity(bottom);
        let mut hx = hx_in.clone();
        for (i, encoder) in self.encoders.iter().enumerate() {
            hx = encoder.forward(hx);
            if i < bottom {
                skips.push(hx.clone());
                // The level above the bottom shares its resolution.
                if i + 1 < bottom {
                    hx = self.pool.forward(hx);
                }
            }
        }

        let mut hd = hx;
        for level in (0..self.decoders.len()).rev() {
            let skip = skips[level].clone();
            hd = self.decoders[level].forward(Tensor::cat(vec![hd, skip], 1));
            if level > 0 {
                hd = upsample_like(hd, &skips[level - 1]);
            }
        }

        hd + hx_in
    }
}

/// Configuration for the [`Rsu4F`] module.
#[derive(Config, Debug)]
pub struct Rsu4FConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of channels inside the block.
    mid_channels: usize,
    /// Number of output channels.
    out_channels: usize,
}

impl Rsu4FConfig {
    /// Creates an `Rsu4F` module on the given device.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Rsu4F<B> {
        let conv_in = RebnConvConfig::new()
            .with_in_channels(self.in_channels)
            .with_out_channels(self.out_channels)
            .init(device);

        let encoder_channels = [
            (self.out_channels, self.mid_channels),
            (self.mid_channels, self.mid_channels),
            (self.mid_channels, self.mid_channels),
            (self.mid_channels, self.mid_channels),
        ];
        let encoders = encoder_channels
            .iter()
            .zip([1_usize, 2, 4, 8])
            .map(|(&(input, output), dilation)| {
                RebnConvConfig::new()
                    .with_in_channels(input)
                    .with_out_channels(output)
                    .with_dilation(dilation)
                    .init(device)
            })
            .collect();

        let decoder_channels = [
            (self.mid_channels * 2, self.out_channels),
            (self.mid_channels * 2, self.mid_channels),
            (self.mid_channels * 2, self.mid_channels),
        ];
        let decoders = decoder_channels
            .iter()
            .zip([1_usize, 2, 4])
            .map(|(&(input, output), dilation)| {
                RebnConvConfig::new()
                    .with_in_channels(input)
                    .with_out_channels(output)
                    .with_dilation(dilation)
                    .init(device)
            })
            .collect();

        Rsu4F {
            conv_in,
            encoders,
            decoders,
        }
    }
}

/// Dilation-only residual U-block used at the deepest stages.
///
/// Instead of pooling, the four encoder convolutions use dilations 1, 2, 4
/// and 8, so every feature map keeps the input's spatial size.
///
/// # Shapes
///   - input: `[batch_size, in_channels, height, width]`
///   - output: `[batch_size, out_channels, height, width]`
#[derive(Module, Debug)]
pub struct Rsu4F<B: Backend> {
    conv_in: RebnConv<B>,
    encoders: Vec<RebnConv<B>>,
    decoders: Vec<RebnConv<B>>,
}

impl<B: Backend> Rsu4F<B> {
    /// Forward pass through the dilated residual U-block.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let hx_in = self.conv_in.forward(x);

        let bottom = self.encoders.len() - 1;
        let mut skips: Vec<Tensor<B, 4>> = Vec::with_capacity(bottom);
        let mut hx = hx_in.clone();
        for (i, encoder) in self.encoders.iter().enumerate() {
            hx = encoder.forward(hx);
            if i < bottom {
                skips.push(hx.clone());
            }
        }

        let mut hd = hx;
        for level in (0..self.decoders.len()).rev() {
            let skip = skips[level].clone();
            hd = self.decoders[level].forward(Tensor::cat(vec![hd, skip], 1));
        }

        hd + hx_in
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn rebn_conv_preserves_spatial_size() {
        let device = Default::default();
        let block = RebnConvConfig::new()
            .with_in_channels(3)
            .with_out_channels(8)
            .with_dilation(2)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 16, 16], &device);
        assert_eq!(block.forward(x).dims(), [1, 8, 16, 16]);
    }

    #[test]
    fn rsu_output_matches_input_resolution() {
        let device = Default::default();
        let block = RsuConfig::new(7, 3, 4, 8).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 64, 64], &device);
        assert_eq!(block.forward(x).dims(), [1, 8, 64, 64]);
    }

    #[test]
    fn rsu_smallest_height_works() {
        let device = Default::default();
        let block = RsuConfig::new(4, 8, 4, 8).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 32, 32], &device);
        assert_eq!(block.forward(x).dims(), [1, 8, 32, 32]);
    }

    #[test]
    fn rsu4f_keeps_spatial_size_without_pooling() {
        let device = Default::default();
        let block = Rsu4FConfig::new(8, 4, 8).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 8, 8, 8], &device);
        assert_eq!(block.forward(x).dims(), [1, 8, 8, 8]);
    }
}
