//! Convolutional feature extractors described by a compact architecture string.
//!
//! An architecture is a comma separated list of layers:
//!
//! * `I<c>`: number of input channels, only valid as the first layer (default 3)
//! * `C<k>-<c>` / `C<k>-<c>-<s>`: `k`x`k` convolution to `c` channels with stride `s`
//! * `P<f>`: pooling with window and stride `f`
//! * `U<f>`: nearest neighbour upsampling by `f`
//!
//! Every convolution except the first is preceded by normalization and activation,
//! so the last convolution's output is returned without activation.
use std::str::FromStr;

use burn::{
    module::Ignored,
    nn::{
        BatchNorm, BatchNormConfig, InstanceNorm, InstanceNormConfig, PaddingConfig2d,
        conv::{Conv2d, Conv2dConfig},
    },
    prelude::*,
    tensor::{
        activation::{leaky_relu, relu, tanh},
        module::{avg_pool2d, interpolate, max_pool2d},
        ops::{InterpolateMode, InterpolateOptions},
    },
};
use serde::{Deserialize, Serialize};

use crate::error::GanError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    Batch,
    Instance,
    Disabled,
}

impl FromStr for Normalization {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(Self::Batch),
            "instance" => Ok(Self::Instance),
            "none" => Ok(Self::Disabled),
            other => Err(GanError::UnknownOption {
                kind: "normalization",
                value: other.into(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    Relu,
    /// negative slope
    LeakyRelu(f64),
    Tanh,
    Identity,
}

impl Activation {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => relu(x),
            Activation::LeakyRelu(slope) => leaky_relu(x, *slope),
            Activation::Tanh => tanh(x),
            Activation::Identity => x,
        }
    }
}

impl FromStr for Activation {
    type Err = GanError;

    /// Accepts `relu`, `tanh`, `none`, `leakyrelu` and `leakyrelu-<slope>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || GanError::UnknownOption {
            kind: "activation",
            value: s.into(),
        };
        match s {
            "relu" => Ok(Self::Relu),
            "tanh" => Ok(Self::Tanh),
            "none" => Ok(Self::Identity),
            "leakyrelu" => Ok(Self::LeakyRelu(0.01)),
            other => other
                .strip_prefix("leakyrelu-")
                .and_then(|slope| slope.parse::<f64>().ok())
                .map(Self::LeakyRelu)
                .ok_or_else(unknown),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Padding {
    /// keeps the spatial size for stride 1
    Same,
    Valid,
}

impl Padding {
    fn for_kernel(&self, kernel: usize) -> usize {
        match self {
            Padding::Same => (kernel - 1) / 2,
            Padding::Valid => 0,
        }
    }
}

impl FromStr for Padding {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same" => Ok(Self::Same),
            "valid" => Ok(Self::Valid),
            other => Err(GanError::UnknownOption {
                kind: "padding",
                value: other.into(),
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Pooling {
    Avg,
    Max,
}

impl FromStr for Pooling {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Self::Avg),
            "max" => Ok(Self::Max),
            other => Err(GanError::UnknownOption {
                kind: "pooling",
                value: other.into(),
            }),
        }
    }
}

/// A parsed architecture token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerSpec {
    Conv {
        kernel: usize,
        channels: usize,
        stride: usize,
    },
    Pool(usize),
    Upsample(usize),
}

/// Splits an architecture string into its input channel count and layers.
pub fn parse_arch(arch: &str) -> Result<(usize, Vec<LayerSpec>), GanError> {
    let invalid = |layer: &str, reason: &str| GanError::InvalidArchitecture {
        layer: layer.into(),
        reason: reason.into(),
    };
    let parse_factor = |layer: &str| -> Result<usize, GanError> {
        match layer[1..].parse::<usize>() {
            Ok(0) => Err(invalid(layer, "factor must be positive")),
            Ok(f) => Ok(f),
            Err(e) => Err(invalid(layer, &e.to_string())),
        }
    };

    let mut in_channels = 3;
    let mut layers = vec![];
    for (i, layer) in arch.split(',').map(str::trim).enumerate() {
        match layer.chars().next() {
            Some('I') if i == 0 => {
                in_channels = layer[1..]
                    .parse::<usize>()
                    .map_err(|e| invalid(layer, &e.to_string()))?;
            }
            Some('I') => return Err(invalid(layer, "input channels must come first")),
            Some('C') => {
                let vals = layer[1..]
                    .split('-')
                    .map(|v| v.parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| invalid(layer, &e.to_string()))?;
                let (kernel, channels, stride) = match vals[..] {
                    [k, c] => (k, c, 1),
                    [k, c, s] => (k, c, s),
                    _ => return Err(invalid(layer, "expected C<kernel>-<channels>[-<stride>]")),
                };
                if kernel == 0 || channels == 0 || stride == 0 {
                    return Err(invalid(layer, "kernel, channels and stride must be positive"));
                }
                layers.push(LayerSpec::Conv {
                    kernel,
                    channels,
                    stride,
                });
            }
            Some('P') => layers.push(LayerSpec::Pool(parse_factor(layer)?)),
            Some('U') => layers.push(LayerSpec::Upsample(parse_factor(layer)?)),
            _ => return Err(invalid(layer, "unknown layer type")),
        }
    }
    if in_channels == 0 {
        return Err(invalid(arch, "input channels must be positive"));
    }
    Ok((in_channels, layers))
}

#[derive(Config, Debug)]
pub struct BackboneConfig {
    pub arch: String,
    #[config(default = "Normalization::Batch")]
    pub normalization: Normalization,
    #[config(default = "Activation::LeakyRelu(0.2)")]
    pub activation: Activation,
    #[config(default = "Padding::Same")]
    pub padding: Padding,
    #[config(default = "Pooling::Avg")]
    pub pooling: Pooling,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LayerOp {
    Conv {
        index: usize,
        kernel: usize,
        stride: usize,
        pad: usize,
    },
    BatchNorm(usize),
    InstanceNorm(usize),
    Activation,
    Pool(usize),
    Upsample(usize),
}

#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    convs: Vec<Conv2d<B>>,
    batch_norms: Vec<BatchNorm<B, 2>>,
    instance_norms: Vec<InstanceNorm<B>>,
    ops: Ignored<Vec<LayerOp>>,
    activation: Ignored<Activation>,
    pooling: Ignored<Pooling>,
    in_channels: usize,
    out_channels: usize,
}

impl BackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<Backbone<B>, GanError> {
        let (in_channels, layers) = parse_arch(&self.arch)?;

        let mut convs = vec![];
        let mut batch_norms = vec![];
        let mut instance_norms = vec![];
        let mut ops = vec![];
        let mut cur_channels = in_channels;
        let mut first_conv = true;

        for layer in layers {
            match layer {
                LayerSpec::Conv {
                    kernel,
                    channels,
                    stride,
                } => {
                    if !first_conv {
                        match self.normalization {
                            Normalization::Batch => {
                                ops.push(LayerOp::BatchNorm(batch_norms.len()));
                                batch_norms.push(BatchNormConfig::new(cur_channels).init(device));
                            }
                            Normalization::Instance => {
                                ops.push(LayerOp::InstanceNorm(instance_norms.len()));
                                instance_norms
                                    .push(InstanceNormConfig::new(cur_channels).init(device));
                            }
                            Normalization::Disabled => {}
                        }
                        ops.push(LayerOp::Activation);
                    }
                    first_conv = false;
                    let pad = self.padding.for_kernel(kernel);
                    ops.push(LayerOp::Conv {
                        index: convs.len(),
                        kernel,
                        stride,
                        pad,
                    });
                    convs.push(
                        Conv2dConfig::new([cur_channels, channels], [kernel, kernel])
                            .with_stride([stride, stride])
                            .with_padding(PaddingConfig2d::Explicit(pad, pad))
                            .init(device),
                    );
                    cur_channels = channels;
                }
                LayerSpec::Pool(factor) => ops.push(LayerOp::Pool(factor)),
                LayerSpec::Upsample(factor) => ops.push(LayerOp::Upsample(factor)),
            }
        }

        Ok(Backbone {
            convs,
            batch_norms,
            instance_norms,
            ops: Ignored(ops),
            activation: Ignored(self.activation),
            pooling: Ignored(self.pooling),
            in_channels,
            out_channels: cur_channels,
        })
    }
}

impl<B: Backend> Backbone<B> {
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Spatial output size for an input of `input_size`.
    pub fn output_size(&self, input_size: [usize; 2]) -> [usize; 2] {
        let mut size = input_size;
        for op in self.ops.0.iter() {
            match *op {
                LayerOp::Conv {
                    kernel,
                    stride,
                    pad,
                    ..
                } => {
                    size = [
                        (size[0] + 2 * pad).saturating_sub(kernel) / stride + 1,
                        (size[1] + 2 * pad).saturating_sub(kernel) / stride + 1,
                    ];
                }
                LayerOp::Pool(f) => size = [size[0] / f, size[1] / f],
                LayerOp::Upsample(f) => size = [size[0] * f, size[1] * f],
                _ => {}
            }
        }
        size
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for op in self.ops.0.iter() {
            x = match *op {
                LayerOp::Conv { index, .. } => self.convs[index].forward(x),
                LayerOp::BatchNorm(i) => self.batch_norms[i].forward(x),
                LayerOp::InstanceNorm(i) => self.instance_norms[i].forward(x),
                LayerOp::Activation => self.activation.0.forward(x),
                LayerOp::Pool(f) => match self.pooling.0 {
                    Pooling::Avg => avg_pool2d(x, [f, f], [f, f], [0, 0], true),
                    Pooling::Max => max_pool2d(x, [f, f], [f, f], [0, 0], [1, 1]),
                },
                LayerOp::Upsample(f) => {
                    let [_, _, h, w] = x.dims();
                    interpolate(
                        x,
                        [h * f, w * f],
                        InterpolateOptions::new(InterpolateMode::Nearest),
                    )
                }
            };
        }
        x
    }
}
