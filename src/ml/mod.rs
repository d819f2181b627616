pub mod ml_model;
pub mod inference;

pub use ml_model::{ConvBlock, ModelConfig, SkinLesionClassifier};
pub use inference::{BurnModel, load_model, record_model_binary, save_model};
