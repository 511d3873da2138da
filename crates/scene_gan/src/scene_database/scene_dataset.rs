use burn::{data::dataset::Dataset, tensor::TensorData};
use image::imageops::FilterType;
use log::info;
use rand::Rng;
use ron::de::{SpannedError, from_reader};
use ron::ser::to_writer;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// An annotated object, `bbox` is normalized `(x0, y0, x1, y1)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub category: usize,
    pub bbox: [f32; 4],
}

/// `(subject, predicate, object)`, subject and object index the scene's objects.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTriple {
    pub subject: usize,
    pub predicate: usize,
    pub object: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneItem {
    pub image: PathBuf,
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub triples: Vec<SceneTriple>,
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("failed to load image due to {:?}", .0)]
    LoadingError(#[from] io::Error),
    #[error("Failed to decode image due to {:?}", .0)]
    DecodingError(#[from] image::error::ImageError),
}

impl SceneItem {
    /// Decodes the image resized to `[height, width]` as `[1, height, width, 3]` bytes.
    pub fn load_image(&self, size: [usize; 2]) -> Result<TensorData, ImageError> {
        let [height, width] = size;
        let image = image::ImageReader::open(&self.image)?
            .decode()?
            .resize_exact(width as u32, height as u32, FilterType::Triangle)
            .to_rgb8();
        Ok(TensorData::new(image.into_raw(), vec![1, height, width, 3]))
    }
}

#[derive(Error, Debug)]
pub enum SceneDatasetError {
    #[error("The path {} is not valid because {}", .path, .reason)]
    InvalidPath { path: String, reason: String },
    #[error("The split ratio {} is not in (0, 1)", .0)]
    InvalidSplitRatio(f64),
    #[error("Unable to deserialize ron file due to {:?}", .0)]
    RonDeserializationError(#[from] SpannedError),
    #[error("Unable load ron file due to {:?}", .0)]
    RonFileLoadingError(#[from] io::Error),
    #[error("Unable to serialize ron file due to {:?}", .0)]
    RonSerializationError(#[from] ron::error::Error),
}

pub(crate) fn save_ron<T: Serialize>(value: &T, path: &Path) -> Result<(), SceneDatasetError> {
    if path.exists() {
        if path.is_dir() {
            return Err(SceneDatasetError::InvalidPath {
                path: format!("{:?}", path),
                reason: "Invalid Path. Please enter a .ron path".into(),
            });
        }
        info!("Removing {:?}", path);
        fs::remove_file(path)?;
    }
    let file = File::create_new(path)?;
    to_writer(file, value)?;
    Ok(())
}

pub(crate) fn load_ron<T: DeserializeOwned>(path: &Path) -> Result<T, SceneDatasetError> {
    if !path.exists() {
        return Err(SceneDatasetError::InvalidPath {
            path: format!("{:?}", path),
            reason: "The path does not exist".into(),
        });
    }
    if path.is_dir() {
        return Err(SceneDatasetError::InvalidPath {
            path: format!("{:?}", path),
            reason: "The path does not lead to a valid .ron file".into(),
        });
    }
    Ok(from_reader(File::open(path)?)?)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneDataset {
    name: String,
    items: Vec<SceneItem>,
}

impl SceneDataset {
    pub fn new(name: &str, items: Vec<SceneItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn save_to_ron(&self, path: &Path) -> Result<(), SceneDatasetError> {
        save_ron(self, path)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, SceneDatasetError> {
        load_ron(path)
    }

    /// Randomly moves `train_split_ratio` of the items into a train split,
    /// the rest become the validation split.
    pub fn split(mut self, train_split_ratio: f64) -> Result<(Self, Self), SceneDatasetError> {
        if !(0. < train_split_ratio && train_split_ratio < 1.) {
            return Err(SceneDatasetError::InvalidSplitRatio(train_split_ratio));
        }
        let train_amount = (train_split_ratio * self.len() as f64) as usize;
        let mut rng = rand::rng();
        let mut train_items = vec![];
        while train_items.len() < train_amount && !self.items.is_empty() {
            let idx = rng.random_range(0..self.items.len());
            train_items.push(self.items.swap_remove(idx));
        }
        Ok((
            Self::new("train", train_items),
            Self::new("valid", self.items),
        ))
    }

    pub fn filter<P>(self, mut predicate: P) -> Self
    where
        P: FnMut(&SceneItem) -> bool,
    {
        Self {
            name: self.name,
            items: self.items.into_iter().filter(|item| predicate(item)).collect(),
        }
    }
}

impl Dataset<SceneItem> for SceneDataset {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<SceneItem> {
        self.items.get(index).cloned()
    }
}
