use std::{env, path::PathBuf, str::FromStr};

use burn::{
    backend::{Autodiff, Wgpu},
    optim::AdamConfig,
    record::CompactRecorder,
};
use scene_gan::{
    gan::{
        model::SceneGanConfig,
        training::{SceneGanModelProvider, TrainDataConfig, TrainingConfig, train_gan},
    },
    logging::GanLogger,
    scene_database::vocab::Vocab,
    util::{bool_flag, int_tuple},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    type MyBackend = Wgpu<f32, i32>;
    type MyAutodiffBackend = Autodiff<MyBackend>;

    let device = burn::backend::wgpu::WgpuDevice::default();
    let artifact_dir = "./tmp";
    let stream = rerun::RecordingStreamBuilder::new("train scene gan").spawn()?;
    let rec = GanLogger::new(stream.clone());

    rerun::Logger::new(stream) // recording streams are ref-counted
        .with_path_prefix("logs")
        .with_filter(rerun::default_log_filter())
        .init()?;

    let base_path = PathBuf::from_str("./data/scenes")?;
    let vocab = Vocab::load_from_ron(&base_path.join("vocab.ron"))?;

    let mut model_config = SceneGanConfig::from_vocab(
        &vocab,
        "C4-64-2,C4-128-2,C4-256-2",
        "C4-64-2,C4-128-2,C4-256-2",
    );
    if let Ok(size) = env::var("SCENE_GAN_IMAGE_SIZE") {
        let size = match int_tuple(&size)?[..] {
            [h, w] if h > 0 && w > 0 => [h as usize, w as usize],
            _ => return Err(format!("SCENE_GAN_IMAGE_SIZE must be h,w but was {}", size).into()),
        };
        model_config.generator.image_size = size;
        model_config.img_discriminator.input_size = size;
    }
    let layouts = match env::var("SCENE_GAN_LAYOUTS") {
        Ok(flag) => bool_flag(&flag)?,
        Err(_) => false,
    };
    if layouts {
        model_config.img_discriminator.layout_dim = vocab.num_objects();
    }

    train_gan::<MyAutodiffBackend, _>(
        artifact_dir,
        TrainingConfig::new(
            AdamConfig::new().with_beta_1(0.5),
            AdamConfig::new().with_beta_1(0.5),
            AdamConfig::new().with_beta_1(0.5),
            TrainDataConfig::Manifest {
                path: base_path.join("scenes.ron"),
                train_ratio: 0.9,
            },
        ),
        SceneGanModelProvider::Config(model_config),
        device,
        rec,
        CompactRecorder::new(),
    )?;
    Ok(())
}
