pub mod model_metadata;
pub mod model_storage;
pub mod inference_config;
pub mod config;

pub use model_metadata::{ArchitectureSpec, ModelMetadata, LABEL_TABLE_VERSION};
pub use model_storage::{save_model_with_metadata, load_metadata, load_model_with_metadata, read_model_with_metadata};
pub use inference_config::InferenceConfig;
pub use config::{AppConfig, DeviceType, ModelSettings, PreprocessSettings, ResizeFilter, DEFAULT_MODEL_NAME};
