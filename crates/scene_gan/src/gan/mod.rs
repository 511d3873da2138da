pub mod discriminator;
pub mod generator;
pub mod isolation;
pub mod model;
pub mod optim;
pub mod trainer;
pub mod training;
