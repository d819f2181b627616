//! 分類パイプラインのエラー型
//!
//! 呼び出し側（表示層）へ返すエラーはすべて [`ClassifierError`] に集約します。
//! モデルファイルの読み書きなど内部処理は `anyhow` で文脈を積み上げ、
//! 境界で `ClassifierError::ModelLoad` に変換します。

use thiserror::Error;

/// 分類パイプラインで発生するエラー
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// 画像が存在しない・サイズ0・デコード不能
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// モデルの読み込み失敗（ファイル欠落・破損・入出力形状の不一致・ラベル表の不正）
    #[error("failed to load model from {source_name}: {reason}")]
    ModelLoad {
        /// モデルの所在（パスまたは論理名）
        source_name: String,
        /// 失敗理由
        reason: String,
    },

    /// ロード前、または release 後に classify が呼ばれた
    #[error("model is not loaded")]
    ModelNotLoaded,

    /// 入力テンソル長がモデルの固定入力長と一致しない
    #[error("shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// 期待する要素数
        expected: usize,
        /// 実際の要素数
        actual: usize,
    },

    /// 順伝播中のバックエンド障害
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    /// 不正画像エラーを生成
    #[must_use]
    pub fn invalid_image(reason: impl Into<String>) -> Self {
        Self::InvalidImage(reason.into())
    }

    /// モデル読み込みエラーを生成
    #[must_use]
    pub fn model_load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// 形状不一致エラーを生成
    #[must_use]
    pub fn shape_mismatch(expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    /// 推論エラーを生成
    #[must_use]
    pub fn inference(reason: impl Into<String>) -> Self {
        Self::Inference(reason.into())
    }
}

/// このクレートの Result 型
pub type Result<T> = std::result::Result<T, ClassifierError>;
