use std::time::Instant;

use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use log::{debug, warn};

use crate::{
    error::GanError,
    losses::{DiscriminatorLoss, GanLoss, GeneratorLoss, LossLedger, LossLog},
    scene_database::scene_batcher::SceneBatch,
};

use super::{
    discriminator::{AcCropDiscriminator, PatchDiscriminator},
    generator::{GeneratorOutput, SceneGenerator},
    isolation::Frozen,
    optim::PhaseOptimizer,
};

/// Multipliers applied to each loss term before it enters its phase total.
#[derive(Config, Debug)]
pub struct LossWeights {
    #[config(default = 1.0)]
    pub loss_img: f64,
    #[config(default = 1.0)]
    pub loss_obj: f64,
    #[config(default = 1.0)]
    pub loss_ac_real: f64,
    #[config(default = 1.0)]
    pub loss_ac_fake: f64,
    #[config(default = 1.0)]
    pub loss_gen_obj: f64,
    #[config(default = 1.0)]
    pub loss_gen_img: f64,
    #[config(default = 1.0)]
    pub loss_gen_ac: f64,
}

#[derive(Config, Debug)]
pub struct GanObjectiveConfig {
    #[config(default = "GanLoss::LeastSquares")]
    pub loss_gen: GanLoss,
    #[config(default = "GanLoss::LeastSquares")]
    pub loss_img: GanLoss,
    #[config(default = "GanLoss::LeastSquares")]
    pub loss_obj: GanLoss,
    #[config(default = "LossWeights::new()")]
    pub weights: LossWeights,
}

/// Alternates one image discriminator, one object discriminator and one
/// generator update per batch.
///
/// Every phase commits its own optimizer step. When a later phase fails the
/// earlier updates of the same step stay applied.
pub struct GanTrainer<B, G, OG, OI, OO>
where
    B: AutodiffBackend,
{
    generator: G,
    img_discriminator: PatchDiscriminator<B>,
    obj_discriminator: AcCropDiscriminator<B>,
    objectives: GanObjectiveConfig,
    optim_gen: PhaseOptimizer<OG>,
    optim_img: PhaseOptimizer<OI>,
    optim_obj: PhaseOptimizer<OO>,
}

fn flat_scores<B: Backend, const D: usize>(scores: Tensor<B, D>) -> Tensor<B, 1> {
    scores.flatten::<1>(0, D - 1)
}

/// Reloads `record` into `module` after flushing pending running statistics.
///
/// Batch norm statistics are buffers, not parameters: they move on every
/// training forward pass, including passes through a [`Frozen`] copy that
/// shares them.
fn restore_buffers<B: Backend, M: Module<B>>(module: M, record: M::Record) -> M {
    let _ = module.clone().into_record();
    module.load_record(record)
}

/// Splits a phase ledger and reports its terms.
fn close_ledger<B: Backend>(
    ledger: LossLedger<B>,
    phase: &str,
    start: Instant,
) -> Result<(Tensor<B, 1>, LossLog), GanError> {
    let (total, log) = ledger.into_parts()?;
    for (name, value) in log.iter() {
        if !value.is_finite() {
            warn!("{} produced a non finite {}: {}", phase, name, value);
        }
    }
    debug!("{} took {:?}: {:?}", phase, start.elapsed(), log);
    Ok((total, log))
}

impl<B, G, OG, OI, OO> GanTrainer<B, G, OG, OI, OO>
where
    B: AutodiffBackend,
    G: AutodiffModule<B> + SceneGenerator<B>,
    OG: Optimizer<G, B>,
    OI: Optimizer<PatchDiscriminator<B>, B>,
    OO: Optimizer<AcCropDiscriminator<B>, B>,
{
    pub fn new(
        generator: G,
        img_discriminator: PatchDiscriminator<B>,
        obj_discriminator: AcCropDiscriminator<B>,
        objectives: GanObjectiveConfig,
        optim_gen: PhaseOptimizer<OG>,
        optim_img: PhaseOptimizer<OI>,
        optim_obj: PhaseOptimizer<OO>,
    ) -> Self {
        Self {
            generator,
            img_discriminator,
            obj_discriminator,
            objectives,
            optim_gen,
            optim_img,
            optim_obj,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn img_discriminator(&self) -> &PatchDiscriminator<B> {
        &self.img_discriminator
    }

    pub fn obj_discriminator(&self) -> &AcCropDiscriminator<B> {
        &self.obj_discriminator
    }

    pub fn into_modules(self) -> (G, PatchDiscriminator<B>, AcCropDiscriminator<B>) {
        (self.generator, self.img_discriminator, self.obj_discriminator)
    }

    /// Runs the generator without recording anything for autodiff.
    pub fn sample(&self, batch: &SceneBatch<B>) -> Result<GeneratorOutput<B>, GanError> {
        let output = Frozen::of::<B>(&self.generator).generate(batch.graph())?;
        Ok(GeneratorOutput {
            image: output.image.detach(),
            boxes: output.boxes.detach(),
            masks: output.masks.map(|m| m.detach()),
            scores: output.scores.map(|s| s.detach()),
            layout: output.layout.detach(),
        })
    }

    fn img_layout(&self, batch: &SceneBatch<B>) -> Option<Tensor<B, 4>> {
        match self.img_discriminator.layout_dim() {
            0 => None,
            _ => batch.layouts.clone(),
        }
    }

    /// One update of the image discriminator against detached fakes.
    pub fn train_img(&mut self, batch: &SceneBatch<B>) -> Result<LossLog, GanError> {
        let start = Instant::now();
        let fake = self.sample(batch)?.image;
        let layout = self.img_layout(batch);

        let scores_fake = self.img_discriminator.forward(fake, layout.clone())?;
        let scores_real = self
            .img_discriminator
            .forward(batch.images.clone(), layout)?;

        let mut ledger = LossLedger::new();
        ledger.add_loss(
            self.objectives
                .loss_img
                .discriminator_loss(flat_scores(scores_real), flat_scores(scores_fake)),
            "loss_img",
            self.objectives.weights.loss_img,
        )?;

        let (loss, log) = close_ledger(ledger, "train_img", start)?;
        self.img_discriminator = self
            .optim_img
            .update_params(loss, self.img_discriminator.clone());
        Ok(log)
    }

    /// One update of the object discriminator on crops taken at the
    /// generator's boxes, for both real and fake images.
    pub fn train_obj(&mut self, batch: &SceneBatch<B>) -> Result<LossLog, GanError> {
        let start = Instant::now();
        let output = self.sample(batch)?;

        let (scores_fake, ac_loss_fake) = self.obj_discriminator.forward(
            output.image,
            batch.objects.clone(),
            output.boxes.clone(),
            batch.obj_to_img.clone(),
        )?;
        let (scores_real, ac_loss_real) = self.obj_discriminator.forward(
            batch.images.clone(),
            batch.objects.clone(),
            output.boxes,
            batch.obj_to_img.clone(),
        )?;

        let weights = &self.objectives.weights;
        let mut ledger = LossLedger::new();
        ledger.add_loss(
            self.objectives
                .loss_obj
                .discriminator_loss(flat_scores(scores_real), flat_scores(scores_fake)),
            "loss_obj",
            weights.loss_obj,
        )?;
        ledger.add_loss(ac_loss_real, "loss_ac_real", weights.loss_ac_real)?;
        ledger.add_loss(ac_loss_fake, "loss_ac_fake", weights.loss_ac_fake)?;

        let (loss, log) = close_ledger(ledger, "train_obj", start)?;
        self.obj_discriminator = self
            .optim_obj
            .update_params(loss, self.obj_discriminator.clone());
        Ok(log)
    }

    /// One update of the generator through frozen copies of both
    /// discriminators. The discriminators, running statistics included, are
    /// left as they were.
    pub fn train_gen(&mut self, batch: &SceneBatch<B>) -> Result<LossLog, GanError> {
        let start = Instant::now();
        let img_record = self.img_discriminator.clone().into_record();
        let obj_record = self.obj_discriminator.clone().into_record();
        let result = self.generator_update(batch, start);
        self.img_discriminator =
            restore_buffers::<B, _>(self.img_discriminator.clone(), img_record);
        self.obj_discriminator =
            restore_buffers::<B, _>(self.obj_discriminator.clone(), obj_record);
        result
    }

    fn generator_update(
        &mut self,
        batch: &SceneBatch<B>,
        start: Instant,
    ) -> Result<LossLog, GanError> {
        let output = self.generator.generate(batch.graph())?;
        let img_discriminator = Frozen::of::<B>(&self.img_discriminator);
        let obj_discriminator = Frozen::of::<B>(&self.obj_discriminator);

        let (scores_fake_obj, ac_loss_fake) = obj_discriminator.forward(
            output.image.clone(),
            batch.objects.clone(),
            output.boxes,
            batch.obj_to_img.clone(),
        )?;
        let scores_fake_img = img_discriminator.forward(output.image, self.img_layout(batch))?;

        let loss_gen = self.objectives.loss_gen;
        let weights = &self.objectives.weights;
        let mut ledger = LossLedger::new();
        ledger.add_loss(
            loss_gen.generator_loss(flat_scores(scores_fake_obj)),
            "loss_gen_obj",
            weights.loss_gen_obj,
        )?;
        ledger.add_loss(
            loss_gen.generator_loss(flat_scores(scores_fake_img)),
            "loss_gen_img",
            weights.loss_gen_img,
        )?;
        ledger.add_loss(ac_loss_fake, "loss_gen_ac", weights.loss_gen_ac)?;

        let (loss, log) = close_ledger(ledger, "train_gen", start)?;
        self.generator = self.optim_gen.update_params(loss, self.generator.clone());
        Ok(log)
    }

    /// Validates `batch` and runs the three phases in order.
    pub fn train_step(&mut self, batch: &SceneBatch<B>) -> Result<LossLog, GanError> {
        batch.validate(self.obj_discriminator.num_objects())?;
        let mut log = self.train_img(batch)?;
        log.extend(self.train_obj(batch)?);
        log.extend(self.train_gen(batch)?);
        Ok(log)
    }
}
