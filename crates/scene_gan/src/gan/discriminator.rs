use burn::{
    module::Ignored,
    nn::{
        Linear, LinearConfig,
        conv::{Conv2d, Conv2dConfig},
        loss::{CrossEntropyLoss, CrossEntropyLossConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
    },
    prelude::*,
};
use log::info;

use crate::{
    error::GanError,
    layers::{
        backbone::{Activation, Backbone, BackboneConfig, Normalization, Padding, Pooling},
        crop::{check_routing, crop_bbox_batch},
    },
    scene_database::vocab::Vocab,
    util::read_ints,
};

/// Width of the feature vector both AC heads read from.
pub const AC_FEATURE_DIM: usize = 1024;

#[derive(Config, Debug)]
pub struct PatchDiscriminatorConfig {
    /// architecture without the `I` layer; the input width is derived from `layout_dim`
    pub arch: String,
    #[config(default = "Normalization::Batch")]
    pub normalization: Normalization,
    #[config(default = "Activation::LeakyRelu(0.2)")]
    pub activation: Activation,
    #[config(default = "Padding::Same")]
    pub padding: Padding,
    #[config(default = "Pooling::Avg")]
    pub pooling: Pooling,
    #[config(default = "[128, 128]")]
    pub input_size: [usize; 2],
    /// channels of the layout concatenated to the image, 0 disables conditioning
    #[config(default = 0)]
    pub layout_dim: usize,
}

/// Scores realism per spatial patch, optionally conditioned on a layout map.
#[derive(Module, Debug)]
pub struct PatchDiscriminator<B: Backend> {
    cnn: Backbone<B>,
    classifier: Conv2d<B>,
    layout_dim: usize,
    input_size: Ignored<[usize; 2]>,
}

impl PatchDiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<PatchDiscriminator<B>, GanError> {
        let input_dim = 3 + self.layout_dim;
        let cnn = BackboneConfig::new(format!("I{},{}", input_dim, self.arch))
            .with_normalization(self.normalization)
            .with_activation(self.activation)
            .with_padding(self.padding)
            .with_pooling(self.pooling)
            .init(device)?;
        // 1x1 conv: one raw logit per patch
        let classifier = Conv2dConfig::new([cnn.out_channels(), 1], [1, 1]).init(device);
        let discriminator = PatchDiscriminator {
            cnn,
            classifier,
            layout_dim: self.layout_dim,
            input_size: Ignored(self.input_size),
        };
        info!(
            "patch discriminator: {} input channels, {:?} patches for {:?} inputs",
            input_dim,
            discriminator.score_map_size(),
            self.input_size
        );
        Ok(discriminator)
    }
}

impl<B: Backend> PatchDiscriminator<B> {
    pub fn layout_dim(&self) -> usize {
        self.layout_dim
    }

    /// Patch grid produced for images of the configured input size.
    pub fn score_map_size(&self) -> [usize; 2] {
        self.cnn.output_size(self.input_size.0)
    }

    /// Returns raw per-patch logits `[N, 1, h, w]`.
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        layout: Option<Tensor<B, 4>>,
    ) -> Result<Tensor<B, 4>, GanError> {
        let [n, c, h, w] = images.dims();
        if c != 3 {
            return Err(GanError::ShapeMismatch {
                what: "patch discriminator images",
                expected: format!("[{}, 3, {}, {}]", n, h, w),
                found: format!("{:?}", images.dims()),
            });
        }
        let x = match (layout, self.layout_dim) {
            (None, 0) => images,
            (Some(_), 0) => return Err(GanError::UnexpectedLayout),
            (None, layout_dim) => return Err(GanError::MissingLayout(layout_dim)),
            (Some(layout), layout_dim) => {
                let expected = [n, layout_dim, h, w];
                if layout.dims() != expected {
                    return Err(GanError::ShapeMismatch {
                        what: "layout",
                        expected: format!("{:?}", expected),
                        found: format!("{:?}", layout.dims()),
                    });
                }
                Tensor::cat(vec![images, layout], 1)
            }
        };
        Ok(self.classifier.forward(self.cnn.forward(x)))
    }
}

#[derive(Config, Debug)]
pub struct AcDiscriminatorConfig {
    pub num_objects: usize,
    pub arch: String,
    #[config(default = "Normalization::Disabled")]
    pub normalization: Normalization,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    #[config(default = "Padding::Same")]
    pub padding: Padding,
    #[config(default = "Pooling::Avg")]
    pub pooling: Pooling,
}

impl AcDiscriminatorConfig {
    /// Sizes the classification head from the vocabulary.
    pub fn from_vocab(vocab: &Vocab, arch: &str) -> Self {
        Self::new(vocab.num_objects(), arch.into())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<AcDiscriminator<B>, GanError> {
        let cnn = BackboneConfig::new(self.arch.clone())
            .with_normalization(self.normalization)
            .with_activation(self.activation)
            .with_padding(self.padding)
            .with_pooling(self.pooling)
            .init(device)?;
        let features = LinearConfig::new(cnn.out_channels(), AC_FEATURE_DIM).init(device);
        Ok(AcDiscriminator {
            cnn,
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            features,
            real_classifier: LinearConfig::new(AC_FEATURE_DIM, 1).init(device),
            obj_classifier: LinearConfig::new(AC_FEATURE_DIM, self.num_objects).init(device),
            ac_loss: CrossEntropyLossConfig::new().init(device),
            num_objects: self.num_objects,
        })
    }
}

/// Realism scorer with an auxiliary object classifier.
#[derive(Module, Debug)]
pub struct AcDiscriminator<B: Backend> {
    cnn: Backbone<B>,
    pool: AdaptiveAvgPool2d,
    features: Linear<B>,
    real_classifier: Linear<B>,
    obj_classifier: Linear<B>,
    ac_loss: CrossEntropyLoss<B>,
    num_objects: usize,
}

impl<B: Backend> AcDiscriminator<B> {
    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    pub fn in_channels(&self) -> usize {
        self.cnn.in_channels()
    }

    /// Returns realism scores `[N, 1]` and the cross entropy of the class
    /// head against `labels`, whatever the origin of `x`.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        labels: Tensor<B, 1, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 1>), GanError> {
        let [n, c, _, _] = x.dims();
        if c != self.in_channels() {
            return Err(GanError::ShapeMismatch {
                what: "ac discriminator input channels",
                expected: self.in_channels().to_string(),
                found: c.to_string(),
            });
        }
        let [num_labels] = labels.dims();
        if num_labels != n {
            return Err(GanError::LengthMismatch {
                field: "labels",
                expected: n,
                found: num_labels,
            });
        }
        check_routing(&read_ints(&labels)?, "labels", self.num_objects)?;
        let x = self.pool.forward(self.cnn.forward(x));
        let [_, d, _, _] = x.dims();
        let vecs = self.features.forward(x.reshape([n, d]));
        let real_scores = self.real_classifier.forward(vecs.clone());
        let obj_scores = self.obj_classifier.forward(vecs);
        let ac_loss = self.ac_loss.forward(obj_scores, labels);
        Ok((real_scores, ac_loss))
    }

    /// Scores `[N, H, W]` inputs such as masks by inserting the channel axis.
    pub fn forward_single_channel(
        &self,
        x: Tensor<B, 3>,
        labels: Tensor<B, 1, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 1>), GanError> {
        self.forward(x.unsqueeze_dim(1), labels)
    }
}

#[derive(Config, Debug)]
pub struct AcCropDiscriminatorConfig {
    pub discriminator: AcDiscriminatorConfig,
    /// side length of the square object crops
    #[config(default = 64)]
    pub object_size: usize,
}

impl AcCropDiscriminatorConfig {
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<AcCropDiscriminator<B>, GanError> {
        Ok(AcCropDiscriminator {
            discriminator: self.discriminator.init(device)?,
            object_size: self.object_size,
        })
    }
}

/// Runs an [`AcDiscriminator`] on one fixed-size crop per object.
#[derive(Module, Debug)]
pub struct AcCropDiscriminator<B: Backend> {
    discriminator: AcDiscriminator<B>,
    object_size: usize,
}

impl<B: Backend> AcCropDiscriminator<B> {
    pub fn object_size(&self) -> usize {
        self.object_size
    }

    pub fn num_objects(&self) -> usize {
        self.discriminator.num_objects()
    }

    /// Returns one score per object, `[O, 1]`, and the classification loss.
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        objects: Tensor<B, 1, Int>,
        boxes: Tensor<B, 2>,
        obj_to_img: Tensor<B, 1, Int>,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 1>), GanError> {
        let crops = crop_bbox_batch(images, boxes, obj_to_img, self.object_size)?;
        self.discriminator.forward(crops, objects)
    }
}
