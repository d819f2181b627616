//! モデルメタデータから推論に必要な情報を取り出し、固定の入出力契約と照合します。
//!
//! 出力インデックスとクラス名の対応はモデルと一緒に配布されるラベル表を正とし、
//! 契約（3クラス・224x224x3入力）に合わないバンドルは読み込み時点で拒否します。

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::model::model_metadata::{ModelMetadata, LABEL_TABLE_VERSION};
use crate::types::{CLASS_LABELS, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_LEN, INPUT_WIDTH, NUM_CLASSES};

/// 推論用の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    /// 出力インデックス順のクラス名
    pub class_labels: Vec<String>,
    /// ラベル表のバージョン
    pub label_table_version: u32,
    /// 入力画像解像度
    pub input_width: u32,
    pub input_height: u32,
    pub input_channels: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            class_labels: CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            label_table_version: LABEL_TABLE_VERSION,
            input_width: INPUT_WIDTH as u32,
            input_height: INPUT_HEIGHT as u32,
            input_channels: INPUT_CHANNELS as u32,
        }
    }
}

impl InferenceConfig {
    /// 指定したラベル表で設定を作成（入力形状は固定値）
    pub fn with_labels(class_labels: Vec<String>) -> Result<Self> {
        let config = Self {
            class_labels,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// メタデータからInferenceConfigを作成
    pub fn from_metadata(metadata: &ModelMetadata) -> Result<Self> {
        let config = Self {
            class_labels: metadata.class_labels.clone(),
            label_table_version: metadata.label_table_version,
            input_width: metadata.input_width,
            input_height: metadata.input_height,
            input_channels: metadata.input_channels,
        };
        config.validate()?;
        Ok(config)
    }

    /// 固定の入出力契約との照合
    pub fn validate(&self) -> Result<()> {
        if self.label_table_version != LABEL_TABLE_VERSION {
            bail!(
                "unsupported label table version {} (expected {})",
                self.label_table_version,
                LABEL_TABLE_VERSION
            );
        }

        if self.input_len() != INPUT_LEN
            || self.input_width as usize != INPUT_WIDTH
            || self.input_height as usize != INPUT_HEIGHT
        {
            bail!(
                "incompatible input shape {}x{}x{} (expected {}x{}x{})",
                self.input_width,
                self.input_height,
                self.input_channels,
                INPUT_WIDTH,
                INPUT_HEIGHT,
                INPUT_CHANNELS
            );
        }

        if self.class_labels.len() != NUM_CLASSES {
            bail!(
                "label table has {} entries (expected {})",
                self.class_labels.len(),
                NUM_CLASSES
            );
        }

        let mut seen = HashSet::new();
        for label in &self.class_labels {
            if label.trim().is_empty() {
                bail!("label table contains an empty class name");
            }
            if !seen.insert(label.as_str()) {
                bail!("label table contains duplicate class name {:?}", label);
            }
        }

        Ok(())
    }

    /// 入力テンソルの要素数
    pub fn input_len(&self) -> usize {
        self.input_width as usize * self.input_height as usize * self.input_channels as usize
    }

    /// クラス数
    pub fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    /// クラスインデックスからクラス名を取得
    pub fn class_index_to_label(&self, index: usize) -> Option<&str> {
        self.class_labels.get(index).map(String::as_str)
    }

    /// 既定のラベル順序と異なるかどうか
    pub fn differs_from_default_order(&self) -> bool {
        self.class_labels.iter().map(String::as_str).ne(CLASS_LABELS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::model_metadata::ArchitectureSpec;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_mapping() {
        let config = InferenceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.class_index_to_label(0), Some("Benign"));
        assert_eq!(config.class_index_to_label(1), Some("Healthy Skin"));
        assert_eq!(config.class_index_to_label(2), Some("Malignant"));
        assert_eq!(config.class_index_to_label(3), None);
        assert_eq!(config.input_len(), INPUT_LEN);
        assert!(!config.differs_from_default_order());
    }

    #[test]
    fn test_from_metadata() {
        let metadata = ModelMetadata::with_default_labels(ArchitectureSpec::vgg16());
        let config = InferenceConfig::from_metadata(&metadata).unwrap();
        assert_eq!(config.num_classes(), 3);
    }

    #[test]
    fn test_reordered_labels_are_kept() {
        let config =
            InferenceConfig::with_labels(labels(&["No Cancer", "Benign", "Malignant"])).unwrap();
        assert_eq!(config.class_index_to_label(0), Some("No Cancer"));
        assert!(config.differs_from_default_order());
    }

    #[test]
    fn test_rejects_bad_label_tables() {
        assert!(InferenceConfig::with_labels(labels(&["Benign", "Malignant"])).is_err());
        assert!(InferenceConfig::with_labels(labels(&["Benign", "Benign", "Malignant"])).is_err());
        assert!(InferenceConfig::with_labels(labels(&["Benign", " ", "Malignant"])).is_err());
    }

    #[test]
    fn test_rejects_bad_metadata() {
        let mut metadata = ModelMetadata::with_default_labels(ArchitectureSpec::vgg16());
        metadata.input_width = 256;
        assert!(InferenceConfig::from_metadata(&metadata).is_err());

        let mut metadata = ModelMetadata::with_default_labels(ArchitectureSpec::vgg16());
        metadata.label_table_version = 0;
        assert!(InferenceConfig::from_metadata(&metadata).is_err());

        let mut metadata = ModelMetadata::with_default_labels(ArchitectureSpec::vgg16());
        metadata.class_labels.clear();
        assert!(InferenceConfig::from_metadata(&metadata).is_err());
    }
}
