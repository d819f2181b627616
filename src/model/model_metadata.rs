//! モデルメタデータの定義
//!
//! tar.gz形式のモデルバンドルに `metadata.json` として同梱される情報です。
//! 出力インデックスとクラス名の対応表はここに保存され、モデルの重みと一緒に配布されます。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{CLASS_LABELS, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};

/// 現在サポートしているラベル表のバージョン
pub const LABEL_TABLE_VERSION: u32 = 1;

/// ネットワーク構造の記述
///
/// 畳み込みブロックごとのチャネル数と層数、全結合層のユニット数を保持します。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    /// 各ブロックの出力チャネル数
    pub block_channels: Vec<usize>,
    /// 各ブロックの畳み込み層数
    pub block_depths: Vec<usize>,
    /// 全結合層（中間）のユニット数
    pub hidden_units: usize,
}

impl ArchitectureSpec {
    /// VGG16相当の構成
    pub fn vgg16() -> Self {
        Self {
            block_channels: vec![64, 128, 256, 512, 512],
            block_depths: vec![2, 2, 3, 3, 3],
            hidden_units: 512,
        }
    }
}

impl Default for ArchitectureSpec {
    fn default() -> Self {
        Self::vgg16()
    }
}

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// 出力インデックス順のクラス名
    /// 例: ["Benign", "Healthy Skin", "Malignant"]
    #[serde(default)]
    pub class_labels: Vec<String>,

    /// ラベル表のバージョン
    #[serde(default)]
    pub label_table_version: u32,

    /// 入力画像幅（ピクセル）
    pub input_width: u32,

    /// 入力画像高さ（ピクセル）
    pub input_height: u32,

    /// 入力チャネル数
    pub input_channels: u32,

    /// ネットワーク構造
    pub architecture: ArchitectureSpec,

    /// モデルの作成時刻（ISO8601形式）
    pub trained_at: String,
}

impl ModelMetadata {
    /// 新しいメタデータを作成
    pub fn new(class_labels: Vec<String>, architecture: ArchitectureSpec) -> Self {
        let trained_at = chrono::Local::now().to_rfc3339();

        Self {
            class_labels,
            label_table_version: LABEL_TABLE_VERSION,
            input_width: INPUT_WIDTH as u32,
            input_height: INPUT_HEIGHT as u32,
            input_channels: INPUT_CHANNELS as u32,
            architecture,
            trained_at,
        }
    }

    /// 既定のラベル表でメタデータを作成
    pub fn with_default_labels(architecture: ArchitectureSpec) -> Self {
        Self::new(
            CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            architecture,
        )
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_keeps_label_order() {
        let metadata = ModelMetadata::with_default_labels(ArchitectureSpec::vgg16());
        let json = metadata.to_json_string().unwrap();
        let restored = ModelMetadata::from_json_string(&json).unwrap();

        assert_eq!(restored.class_labels, vec!["Benign", "Healthy Skin", "Malignant"]);
        assert_eq!(restored.label_table_version, LABEL_TABLE_VERSION);
        assert_eq!(restored.architecture, ArchitectureSpec::vgg16());
    }

    #[test]
    fn test_missing_label_table_defaults_to_empty() {
        let json = r#"{
            "input_width": 224,
            "input_height": 224,
            "input_channels": 3,
            "architecture": {"block_channels": [4], "block_depths": [1], "hidden_units": 8},
            "trained_at": "2024-01-01T00:00:00+00:00"
        }"#;
        let metadata = ModelMetadata::from_json_string(json).unwrap();
        assert!(metadata.class_labels.is_empty());
        assert_eq!(metadata.label_table_version, 0);
    }
}
