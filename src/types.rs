use serde::{Deserialize, Serialize};

/// モデルの固定入力幅
pub const INPUT_WIDTH: usize = 224;

/// モデルの固定入力高さ
pub const INPUT_HEIGHT: usize = 224;

/// 入力チャネル数（RGB）
pub const INPUT_CHANNELS: usize = 3;

/// モデルの固定入力長 (3 x 224 x 224)
pub const INPUT_LEN: usize = INPUT_CHANNELS * INPUT_WIDTH * INPUT_HEIGHT;

/// 出力クラス数
pub const NUM_CLASSES: usize = 3;

/// 学習時のクラス順序（出力インデックス順）
pub const CLASS_LABELS: [&str; NUM_CLASSES] = ["Benign", "Healthy Skin", "Malignant"];

/// 正規化済み入力テンソル
///
/// 画素を行優先で走査し、各画素について r, g, b を [0, 1] に正規化した値を
/// 連続して並べたもの（チャネル最後のインターリーブ配置）。
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    /// 既存の値列からテンソルを作成（長さの検証は classify 側で行う）
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// プラットフォームのネイティブ浮動小数点表現でバイト列化
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }
}

/// 分類結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// クラス名
    pub label: String,
    /// 出力ベクトル上のインデックス
    pub class_index: usize,
    /// 選ばれたクラスの生スコア [0, 1]
    pub confidence: f32,
    /// モデル出力（全クラス分）
    pub scores: Vec<f32>,
}

impl ClassificationResult {
    /// 表示用のパーセント値
    pub fn confidence_percent(&self) -> f32 {
        self.confidence * 100.0
    }
}

impl std::fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} detected with {:.2}% confidence",
            self.label,
            self.confidence_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_len() {
        assert_eq!(INPUT_LEN, 150_528);
    }

    #[test]
    fn test_ne_bytes_layout() {
        let tensor = InputTensor::from_vec(vec![0.0, 1.0]);
        let bytes = tensor.to_ne_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[4..8], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_result_display() {
        let result = ClassificationResult {
            label: "Malignant".to_string(),
            class_index: 2,
            confidence: 0.8,
            scores: vec![0.1, 0.1, 0.8],
        };
        assert_eq!(result.to_string(), "Malignant detected with 80.00% confidence");
    }
}
