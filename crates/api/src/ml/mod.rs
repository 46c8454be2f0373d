pub mod adam;
pub mod model;
pub mod predict;
pub mod store;
pub mod train;

pub use model::{Model, ModelRecord};
pub use predict::{Classification, Prediction, predict};
pub use store::ModelStore;
pub use train::{TrainConfig, train, train_and_store};
