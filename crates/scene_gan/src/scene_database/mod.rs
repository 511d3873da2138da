pub mod scene_batcher;
pub mod scene_dataset;
pub mod vocab;
