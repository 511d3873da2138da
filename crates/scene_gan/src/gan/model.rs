use burn::prelude::*;

use crate::{error::GanError, scene_database::vocab::Vocab};

use super::{
    discriminator::{
        AcCropDiscriminator, AcCropDiscriminatorConfig, AcDiscriminatorConfig,
        PatchDiscriminator, PatchDiscriminatorConfig,
    },
    generator::{LayoutGenerator, LayoutGeneratorConfig},
    trainer::GanObjectiveConfig,
};

#[derive(Config, Debug)]
pub struct SceneGanConfig {
    pub generator: LayoutGeneratorConfig,
    pub img_discriminator: PatchDiscriminatorConfig,
    pub obj_discriminator: AcCropDiscriminatorConfig,
    #[config(default = "GanObjectiveConfig::new()")]
    pub objectives: GanObjectiveConfig,
}

impl SceneGanConfig {
    /// Builds a configuration whose generator and object classifier cover
    /// every category of `vocab`.
    pub fn from_vocab(vocab: &Vocab, img_arch: &str, obj_arch: &str) -> Self {
        let generator = LayoutGeneratorConfig::from_vocab(vocab);
        let img_discriminator =
            PatchDiscriminatorConfig::new(img_arch.into()).with_input_size(generator.image_size);
        Self::new(
            generator,
            img_discriminator,
            AcCropDiscriminatorConfig::new(AcDiscriminatorConfig::from_vocab(vocab, obj_arch)),
        )
    }

    /// Channels of the one-hot layouts fed to the image discriminator, one per
    /// category. `None` when the image discriminator is unconditioned.
    pub fn layout_channels(&self) -> Result<Option<usize>, GanError> {
        match self.img_discriminator.layout_dim {
            0 => Ok(None),
            dim if dim == self.generator.num_objects => Ok(Some(dim)),
            dim => Err(GanError::LengthMismatch {
                field: "image discriminator layout channels",
                expected: self.generator.num_objects,
                found: dim,
            }),
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SceneGanModel<B>, GanError> {
        self.layout_channels()?;
        let generator = self.generator.init(device)?;
        let obj_discriminator = self.obj_discriminator.init(device)?;
        if obj_discriminator.num_objects() != self.generator.num_objects {
            return Err(GanError::LengthMismatch {
                field: "object classifier categories",
                expected: self.generator.num_objects,
                found: obj_discriminator.num_objects(),
            });
        }
        Ok(SceneGanModel {
            generator,
            img_discriminator: self.img_discriminator.init(device)?,
            obj_discriminator,
        })
    }
}

/// The three networks of a scene GAN, saved and restored together.
#[derive(Module, Debug)]
pub struct SceneGanModel<B: Backend> {
    pub generator: LayoutGenerator<B>,
    pub img_discriminator: PatchDiscriminator<B>,
    pub obj_discriminator: AcCropDiscriminator<B>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn config(layout_dim: usize) -> SceneGanConfig {
        let vocab = Vocab::new(vec!["sky".into(), "tree".into(), "dog".into()], vec![]);
        let mut config = SceneGanConfig::from_vocab(&vocab, "C4-8-2", "C4-8-2");
        config.img_discriminator.layout_dim = layout_dim;
        config
    }

    #[test]
    fn unconditioned_discriminator_needs_no_layouts() {
        assert_eq!(config(0).layout_channels(), Ok(None));
    }

    #[test]
    fn layouts_have_one_channel_per_category() {
        assert_eq!(config(3).layout_channels(), Ok(Some(3)));
    }

    #[test]
    fn layout_width_must_match_vocab() {
        let config = config(2);
        assert!(matches!(
            config.layout_channels(),
            Err(GanError::LengthMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert!(config.init::<NdArray<f32>>(&Default::default()).is_err());
    }
}
