//! 皮膚病変画像の分類パイプライン
//!
//! デコード済み画像 → 前処理（224x224・[0,1]正規化） → 推論 → (ラベル, 信頼度)
//!
//! ```ignore
//! use skin_classifier_lib::{AppConfig, Pipeline};
//!
//! let config = AppConfig::load_or_default(AppConfig::default_path());
//! let pipeline = Pipeline::from_config(&config)?;
//! let result = pipeline.run(&image)?;
//! println!("{}", result);
//! ```

#![recursion_limit = "256"]

mod error;
mod types;

pub mod classifier;
pub mod pipeline;
pub mod preprocess;

// モデルバンドル・設定
pub mod model;
#[cfg(feature = "ml")]
pub mod ml;

pub use classifier::{argmax, Classifier, InferenceModel, ModelSource};
pub use error::{ClassifierError, Result};
pub use model::{AppConfig, DeviceType, InferenceConfig, ModelMetadata, ResizeFilter};
pub use pipeline::Pipeline;
pub use preprocess::{decode_image, open_image, Preprocessor};
pub use types::{
    ClassificationResult, InputTensor, CLASS_LABELS, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_LEN,
    INPUT_WIDTH, NUM_CLASSES,
};
