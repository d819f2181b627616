//! 前処理と分類をまとめたパイプライン
//!
//! 表示層から渡されたデコード済み画像を受け取り、分類結果を返します。

use std::path::Path;

use image::DynamicImage;

use crate::classifier::Classifier;
use crate::error::Result;
use crate::preprocess::{decode_image, open_image, Preprocessor};
use crate::types::ClassificationResult;

#[cfg(feature = "ml")]
use crate::model::AppConfig;
#[cfg(feature = "ml")]
use std::path::PathBuf;

/// 推論パイプライン
#[derive(Debug)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(preprocessor: Preprocessor, classifier: Classifier) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    /// 設定に従ってモデルを読み込み、パイプラインを構築
    #[cfg(feature = "ml")]
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let classifier = Classifier::load(
            PathBuf::from(&config.model.model_path),
            config.device_type,
        )?;
        Ok(Self::new(Preprocessor::new(config.preprocess.filter), classifier))
    }

    /// デコード済み画像を分類
    pub fn run(&self, image: &DynamicImage) -> Result<ClassificationResult> {
        let tensor = self.preprocessor.prepare(image)?;
        self.classifier.classify(&tensor)
    }

    /// エンコード済み画像バイト列を分類
    pub fn run_bytes(&self, bytes: &[u8]) -> Result<ClassificationResult> {
        let image = decode_image(bytes)?;
        self.run(&image)
    }

    /// 画像ファイルを分類
    pub fn run_path(&self, path: &Path) -> Result<ClassificationResult> {
        let image = open_image(path)?;
        self.run(&image)
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// モデルを解放
    pub fn release(&self) {
        self.classifier.release();
    }
}
