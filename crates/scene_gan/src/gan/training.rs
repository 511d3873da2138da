use std::path::PathBuf;

use burn::{
    config::{Config, ConfigError},
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::Module,
    optim::AdamConfig,
    record::{FileRecorder, RecorderError},
    tensor::backend::AutodiffBackend,
};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::GanError,
    logging::GanLogger,
    losses::LossLog,
    scene_database::{
        scene_batcher::SceneBatcher,
        scene_dataset::{SceneDataset, SceneDatasetError},
    },
};

use super::{
    model::{SceneGanConfig, SceneGanModel},
    optim::PhaseOptimizer,
    trainer::GanTrainer,
};

#[derive(Serialize, Deserialize, Clone)]
pub enum SceneGanModelProvider {
    Config(SceneGanConfig),
    Checkpoint {
        config_path: PathBuf,
        checkpoint_path: PathBuf,
    },
}

#[derive(Serialize, Deserialize, Clone)]
pub enum TrainDataConfig {
    /// A single manifest that is split randomly
    Manifest { path: PathBuf, train_ratio: f64 },
    /// Path to the training data and validation data
    ConfigPath {
        train_data: PathBuf,
        valid_data: PathBuf,
    },
}

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer_generator: AdamConfig,
    pub optimizer_img_discriminator: AdamConfig,
    pub optimizer_obj_discriminator: AdamConfig,
    pub train_data: TrainDataConfig,
    #[config(default = 100)]
    pub num_epochs: usize,
    #[config(default = 8)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1e-4)]
    pub generator_learning_rate: f64,
    #[config(default = 1e-4)]
    pub img_discriminator_learning_rate: f64,
    #[config(default = 1e-4)]
    pub obj_discriminator_learning_rate: f64,
    #[config(default = 10)]
    pub checkpoint_rotate: usize,
}

fn create_artifact_dir(artifact_dir: &str) {
    // Remove existing artifacts before to get an accurate learner summary
    std::fs::remove_dir_all(artifact_dir).ok();
    std::fs::create_dir_all(artifact_dir).ok();
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Dataset error: {0}")]
    DatasetError(#[from] SceneDatasetError),
    #[error("Failed to load SceneGanConfig due to: {0}")]
    ModelConfigDeserializationError(#[from] ConfigError),
    #[error("Failed to load SceneGanModel weights due to: {0}")]
    ModelWeightsDeserializationError(#[from] RecorderError),
    #[error("Invalid model: {0}")]
    ModelError(#[from] GanError),
}

/// Running mean of every loss term over an epoch.
#[derive(Default)]
struct EpochLosses {
    sums: LossLog,
    steps: usize,
}

impl EpochLosses {
    fn push(&mut self, log: &LossLog) {
        for (name, value) in log.iter() {
            *self.sums.entry(name.clone()).or_default() += value;
        }
        self.steps += 1;
    }

    fn means(&self) -> LossLog {
        self.sums
            .iter()
            .map(|(name, sum)| (name.clone(), sum / self.steps.max(1) as f64))
            .collect()
    }
}

pub fn train_gan<B: AutodiffBackend, R: FileRecorder<B>>(
    artifact_dir: &str,
    config: TrainingConfig,
    model_provider: SceneGanModelProvider,
    device: B::Device,
    log: GanLogger,
    recorder: R,
) -> Result<SceneGanModel<B>, TrainingError> {
    create_artifact_dir(artifact_dir);
    config.save(format!("{artifact_dir}/training_config.json"))?;

    B::seed(config.seed);

    let (model_config, model) = match model_provider {
        SceneGanModelProvider::Config(model_config) => {
            model_config.save(format!("{artifact_dir}/model_config.json"))?;
            let model = model_config.init::<B>(&device)?;
            (model_config, model)
        }
        SceneGanModelProvider::Checkpoint {
            config_path,
            checkpoint_path,
        } => {
            let model_config = SceneGanConfig::load(&config_path)?;
            let model = model_config
                .init::<B>(&device)?
                .load_file(&checkpoint_path, &recorder, &device)?;
            (model_config, model)
        }
    };
    let mut batcher_train =
        SceneBatcher::<B>::new(device.clone(), model_config.generator.image_size);
    if let Some(channels) = model_config.layout_channels()? {
        info!("conditioning the image discriminator on {} layout channels", channels);
        batcher_train = batcher_train.with_layouts(channels);
    }
    let batcher_valid = batcher_train.clone();

    let (train, valid) = match config.train_data {
        TrainDataConfig::Manifest { path, train_ratio } => {
            SceneDataset::load_from_ron(&path)?.split(train_ratio)?
        }
        TrainDataConfig::ConfigPath {
            train_data,
            valid_data,
        } => (
            SceneDataset::load_from_ron(&train_data)?,
            SceneDataset::load_from_ron(&valid_data)?,
        ),
    };
    let train_size = train.len();
    let valid_size = valid.len();
    info!("training on {} scenes, validating on {}", train_size, valid_size);

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(train);

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(valid);

    let mut trainer = GanTrainer::new(
        model.generator,
        model.img_discriminator,
        model.obj_discriminator,
        model_config.objectives.clone(),
        PhaseOptimizer::new(
            config.optimizer_generator.init(),
            config.generator_learning_rate,
        ),
        PhaseOptimizer::new(
            config.optimizer_img_discriminator.init(),
            config.img_discriminator_learning_rate,
        ),
        PhaseOptimizer::new(
            config.optimizer_obj_discriminator.init(),
            config.obj_discriminator_learning_rate,
        ),
    );

    let m = MultiProgress::new();
    let sty = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");
    let epoch_bar = m.add(ProgressBar::new(config.num_epochs as u64));
    epoch_bar.set_style(sty.clone());
    epoch_bar.set_message("Epochs");

    let mut iteration = 0;
    for epoch in 1..config.num_epochs + 1 {
        epoch_bar.inc(1);

        let training_bar = m.add(ProgressBar::new(train_size as u64));
        training_bar.set_style(sty.clone());
        training_bar.set_message("Training Progress");
        let mut epoch_losses = EpochLosses::default();
        for batch in dataloader_train.iter() {
            iteration += 1;
            match trainer.train_step(&batch) {
                Ok(losses) => {
                    log.log_losses(&losses, "training", iteration);
                    epoch_losses.push(&losses);
                }
                Err(e) => {
                    error!("skipping step {} of epoch {}: {}", iteration, epoch, e);
                    log.log_failure("training", format!("step {}: {}", iteration, e));
                }
            }
            training_bar.inc(batch.num_images() as u64);
        }
        m.remove(&training_bar);
        log.log_losses(&epoch_losses.means(), "epoch", epoch);

        let snapshot = SceneGanModel {
            generator: trainer.generator().clone(),
            img_discriminator: trainer.img_discriminator().clone(),
            obj_discriminator: trainer.obj_discriminator().clone(),
        };
        if let Err(e) = snapshot.save_file(
            format!(
                "{}/checkpoints/model_{:03}",
                &artifact_dir,
                epoch % config.checkpoint_rotate.max(1)
            ),
            &recorder,
        ) {
            error!("failed to save checkpoint of epoch {}: {}", epoch, e);
        }

        let valid_bar = m.add(ProgressBar::new(valid_size as u64));
        valid_bar.set_style(sty.clone());
        valid_bar.set_message("Valid Progress");
        for (i, batch) in dataloader_valid.iter().enumerate() {
            match trainer.sample(&batch) {
                Ok(output) => log.log_samples(batch.images.clone(), output.image, "validation", i),
                Err(e) => error!("failed to sample validation batch {}: {}", i, e),
            }
            valid_bar.inc(batch.num_images() as u64);
        }
        m.remove(&valid_bar);
    }
    let (generator, img_discriminator, obj_discriminator) = trainer.into_modules();
    Ok(SceneGanModel {
        generator,
        img_discriminator,
        obj_discriminator,
    })
}
