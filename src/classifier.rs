//! 分類器
//!
//! 読み込み済みモデルを1つだけ保持し、同期的な推論と結果の解釈を行います。
//!
//! - `load` でモデルを取得し、入出力形状を固定契約と照合する
//! - `classify` は入力長の検証 → 順伝播1回 → argmax → ラベル表で変換
//! - `release` は冪等。Drop 時にも必ず呼ばれる
//!
//! モデルは `Mutex` の内側にあり、複数スレッドからの `classify` は順伝播の間だけ直列化されます。

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{ClassifierError, Result};
use crate::model::InferenceConfig;
use crate::types::{ClassificationResult, InputTensor, INPUT_LEN};

#[cfg(feature = "ml")]
use crate::model::{load_model_with_metadata, read_model_with_metadata, DeviceType};

/// 推論バックエンドの境界
///
/// 実装は1回の順伝播で入力テンソル（長さ `input_len`）からクラススコア（長さ `output_len`）を返します。
/// 呼び出しは `Classifier` のロック内で行われるため、実装側で排他制御は不要です。
pub trait InferenceModel: Send {
    /// 期待する入力要素数
    fn input_len(&self) -> usize;

    /// 出力スコア数
    fn output_len(&self) -> usize;

    /// 順伝播
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>>;
}

/// モデルの所在
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// tar.gz バンドルのファイルパス
    Path(PathBuf),
    /// アプリに同梱されたリソース（論理名とバイト列）
    Embedded { name: String, bytes: Vec<u8> },
}

impl ModelSource {
    pub fn embedded(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Embedded {
            name: name.into(),
            bytes,
        }
    }
}

impl From<PathBuf> for ModelSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for ModelSource {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Path(path) => write!(f, "{}", path.display()),
            ModelSource::Embedded { name, .. } => write!(f, "embedded:{}", name),
        }
    }
}

struct LoadedModel {
    model: Box<dyn InferenceModel>,
    config: InferenceConfig,
}

/// 分類器
pub struct Classifier {
    source_name: String,
    loaded: Mutex<Option<LoadedModel>>,
}

impl Classifier {
    /// モデルバンドルを読み込んで分類器を初期化
    #[cfg(feature = "ml")]
    pub fn load(source: impl Into<ModelSource>, device_type: DeviceType) -> Result<Self> {
        let source = source.into();
        let source_name = source.to_string();
        tracing::info!("モデルを読み込みます: {} ({})", source_name, device_type);

        let bundle = match &source {
            ModelSource::Path(path) => load_model_with_metadata(path),
            ModelSource::Embedded { bytes, .. } => read_model_with_metadata(bytes.as_slice()),
        };
        let (metadata, model_binary) =
            bundle.map_err(|e| ClassifierError::model_load(&source_name, format!("{:#}", e)))?;

        let config = InferenceConfig::from_metadata(&metadata)
            .map_err(|e| ClassifierError::model_load(&source_name, format!("{:#}", e)))?;

        let model = crate::ml::load_model(&metadata, model_binary, device_type)
            .map_err(|e| ClassifierError::model_load(&source_name, format!("{:#}", e)))?;

        Self::from_model(source_name, model, config)
    }

    /// 任意の推論バックエンドから分類器を作成
    ///
    /// モデルの入出力形状とラベル表を固定契約と照合します。
    pub fn from_model(
        source_name: impl Into<String>,
        model: Box<dyn InferenceModel>,
        config: InferenceConfig,
    ) -> Result<Self> {
        let source_name = source_name.into();

        config
            .validate()
            .map_err(|e| ClassifierError::model_load(&source_name, format!("{:#}", e)))?;

        if model.input_len() != INPUT_LEN || model.input_len() != config.input_len() {
            return Err(ClassifierError::model_load(
                &source_name,
                format!(
                    "model input length {} does not match expected {}",
                    model.input_len(),
                    INPUT_LEN
                ),
            ));
        }

        if model.output_len() != config.num_classes() {
            return Err(ClassifierError::model_load(
                &source_name,
                format!(
                    "model output length {} does not match label table size {}",
                    model.output_len(),
                    config.num_classes()
                ),
            ));
        }

        if config.differs_from_default_order() {
            tracing::warn!(
                "ラベル表が既定の順序と異なります: {:?}",
                config.class_labels
            );
        }

        tracing::info!(
            "モデルを読み込みました: {} (ラベル表 v{}: {})",
            source_name,
            config.label_table_version,
            config.class_labels.join(", ")
        );

        Ok(Self {
            source_name,
            loaded: Mutex::new(Some(LoadedModel { model, config })),
        })
    }

    /// 入力テンソルを分類
    pub fn classify(&self, tensor: &InputTensor) -> Result<ClassificationResult> {
        if tensor.len() != INPUT_LEN {
            return Err(ClassifierError::shape_mismatch(INPUT_LEN, tensor.len()));
        }

        let mut guard = self.lock();
        let loaded = guard.as_mut().ok_or(ClassifierError::ModelNotLoaded)?;

        let scores = loaded.model.forward(tensor.as_slice())?;
        interpret_scores(&loaded.config, scores)
    }

    /// モデルを解放（2回目以降は何もしない）
    pub fn release(&self) {
        if self.lock().take().is_some() {
            tracing::info!("モデルを解放しました: {}", self.source_name);
        }
    }

    /// モデルが読み込まれているかどうか
    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// 読み込み済みモデルのラベル表
    pub fn class_labels(&self) -> Option<Vec<String>> {
        self.lock()
            .as_ref()
            .map(|loaded| loaded.config.class_labels.clone())
    }

    /// モデルの所在
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// 他スレッドの順伝播中のパニックによる汚染は解除して続行する
    fn lock(&self) -> MutexGuard<'_, Option<LoadedModel>> {
        self.loaded.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("モデル {} のロックが汚染されています。復旧して続行します", self.source_name);
            self.loaded.clear_poison();
            poisoned.into_inner()
        })
    }
}

impl Drop for Classifier {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("source_name", &self.source_name)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// 最大スコアのインデックスを返す
///
/// 左から走査し、厳密に大きい値のときだけ更新するため、同値の場合は先頭が残ります。
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut iter = scores.iter().copied().enumerate();
    let (mut best_index, mut best_score) = iter.next()?;
    for (index, score) in iter {
        if score > best_score {
            best_index = index;
            best_score = score;
        }
    }
    Some((best_index, best_score))
}

fn interpret_scores(config: &InferenceConfig, scores: Vec<f32>) -> Result<ClassificationResult> {
    if scores.len() != config.num_classes() {
        return Err(ClassifierError::inference(format!(
            "model returned {} scores (expected {})",
            scores.len(),
            config.num_classes()
        )));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(ClassifierError::inference(format!(
            "model returned non-finite score {}",
            bad
        )));
    }

    let (class_index, confidence) = argmax(&scores)
        .ok_or_else(|| ClassifierError::inference("model returned no scores"))?;
    let label = config
        .class_index_to_label(class_index)
        .ok_or_else(|| {
            ClassifierError::inference(format!("クラスインデックス {} は範囲外です", class_index))
        })?
        .to_string();

    tracing::debug!("スコア: {:?} -> {} ({})", scores, label, confidence);

    Ok(ClassificationResult {
        label,
        class_index,
        confidence,
        scores,
    })
}
