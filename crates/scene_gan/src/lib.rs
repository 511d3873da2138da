pub mod error;
pub mod gan;
pub mod layers;
pub mod logging;
pub mod losses;
pub mod scene_database;
pub mod util;
