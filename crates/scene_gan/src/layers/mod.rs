pub mod backbone;
pub mod crop;
pub mod layout;

pub use backbone::{Activation, Backbone, BackboneConfig, Normalization, Padding, Pooling};
pub use crop::crop_bbox_batch;
