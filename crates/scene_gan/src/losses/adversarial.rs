use std::{fmt::Display, str::FromStr};

use burn::{
    nn::loss::{BinaryCrossEntropyLossConfig, MseLoss, Reduction},
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::error::GanError;

/// Scores a discriminator from its outputs on real and fake samples.
///
/// Scores arrive flattened to one value per patch or per object.
pub trait DiscriminatorLoss<B: Backend> {
    fn discriminator_loss(&self, real: Tensor<B, 1>, fake: Tensor<B, 1>) -> Tensor<B, 1>;
}

/// Scores a generator from the discriminator's output on its samples.
pub trait GeneratorLoss<B: Backend> {
    fn generator_loss(&self, fake: Tensor<B, 1>) -> Tensor<B, 1>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GanLoss {
    /// mean squared distance to 1 (real) and 0 (fake)
    LeastSquares,
    /// binary cross entropy on logits
    Vanilla,
    Hinge,
    Wasserstein,
}

const REGISTRY: [(&str, GanLoss); 4] = [
    ("least_squares", GanLoss::LeastSquares),
    ("vanilla", GanLoss::Vanilla),
    ("hinge", GanLoss::Hinge),
    ("wasserstein", GanLoss::Wasserstein),
];

impl GanLoss {
    pub fn names() -> impl Iterator<Item = &'static str> {
        REGISTRY.iter().map(|(name, _)| *name)
    }

    pub fn name(&self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, loss)| loss == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

impl FromStr for GanLoss {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, loss)| *loss)
            .ok_or_else(|| GanError::UnknownOption {
                kind: "gan loss",
                value: s.into(),
            })
    }
}

impl Display for GanLoss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn bce_with_logits<B: Backend>(logits: Tensor<B, 1>, target_real: bool) -> Tensor<B, 1> {
    let device = logits.device();
    let targets = if target_real {
        Tensor::<B, 1, Int>::ones(logits.dims(), &device)
    } else {
        Tensor::<B, 1, Int>::zeros(logits.dims(), &device)
    };
    BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&device)
        .forward(logits, targets)
}

impl<B: Backend> DiscriminatorLoss<B> for GanLoss {
    fn discriminator_loss(&self, real: Tensor<B, 1>, fake: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            GanLoss::LeastSquares => {
                let mse = MseLoss::new();
                let loss_real =
                    mse.forward(real.clone(), Tensor::ones_like(&real), Reduction::Mean);
                let loss_fake =
                    mse.forward(fake.clone(), Tensor::zeros_like(&fake), Reduction::Mean);
                loss_real + loss_fake
            }
            GanLoss::Vanilla => bce_with_logits(real, true) + bce_with_logits(fake, false),
            GanLoss::Hinge => {
                relu(real.neg().add_scalar(1.0)).mean() + relu(fake.add_scalar(1.0)).mean()
            }
            GanLoss::Wasserstein => fake.mean() - real.mean(),
        }
    }
}

impl<B: Backend> GeneratorLoss<B> for GanLoss {
    fn generator_loss(&self, fake: Tensor<B, 1>) -> Tensor<B, 1> {
        match self {
            GanLoss::LeastSquares => {
                MseLoss::new().forward(fake.clone(), Tensor::ones_like(&fake), Reduction::Mean)
            }
            GanLoss::Vanilla => bce_with_logits(fake, true),
            GanLoss::Hinge | GanLoss::Wasserstein => fake.mean().neg(),
        }
    }
}
