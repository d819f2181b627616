//! Burnモデルによる推論
//!
//! バンドルから復元した [`SkinLesionClassifier`] を [`InferenceModel`] として公開します。
//! 入力はチャネル最後 (HWC) の平坦なテンソルで、内部で NCHW に並べ替えてから順伝播します。

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};
use burn_ndarray::{NdArray, NdArrayDevice};
use burn_wgpu::{Wgpu, WgpuDevice};

use crate::classifier::InferenceModel;
use crate::error::ClassifierError;
use crate::ml::{ModelConfig, SkinLesionClassifier};
use crate::model::{save_model_with_metadata, DeviceType, ModelMetadata};

/// Burnバックエンド上の推論モデル
pub struct BurnModel<B: Backend> {
    model: SkinLesionClassifier<B>,
    device: B::Device,
    input_width: usize,
    input_height: usize,
    input_channels: usize,
    num_classes: usize,
}

impl<B: Backend> BurnModel<B> {
    /// バンドルのメタデータと重みからモデルを復元
    ///
    /// 復元後にゼロ入力で1回順伝播し、出力数がラベル表と一致することを確認します。
    pub fn from_bundle(metadata: &ModelMetadata, model_binary: Vec<u8>, device: &B::Device) -> Result<Self> {
        let num_classes = metadata.class_labels.len();
        let model_config = ModelConfig::from_spec(&metadata.architecture, num_classes)?;

        // 壊れた重みは Recorder::load 内部でパニックすることがある
        let model = catch_unwind(AssertUnwindSafe(|| -> Result<SkinLesionClassifier<B>> {
            let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
            let record = <BinBytesRecorder<FullPrecisionSettings> as Recorder<B>>::load(
                &recorder,
                model_binary,
                device,
            )
            .map_err(|e| anyhow::anyhow!("モデル重みの読み込みエラー: {:?}", e))?;
            Ok(model_config.init::<B>(device).load_record(record))
        }))
        .map_err(|e| anyhow::anyhow!("モデル重みを復元できません: {}", panic_message(&*e)))??;

        let burn_model = Self {
            model,
            device: device.clone(),
            input_width: metadata.input_width as usize,
            input_height: metadata.input_height as usize,
            input_channels: metadata.input_channels as usize,
            num_classes,
        };

        // 出力形状の検証
        let zeros = vec![0.0; burn_model.expected_input_len()];
        let output = burn_model
            .run(&zeros)
            .context("zero-input forward pass failed")?;
        if output.len() != num_classes {
            anyhow::bail!(
                "model produced {} outputs (expected {})",
                output.len(),
                num_classes
            );
        }

        Ok(burn_model)
    }

    fn expected_input_len(&self) -> usize {
        self.input_width * self.input_height * self.input_channels
    }

    /// 1回の順伝播でクラス確率を返す
    pub fn run(&self, input: &[f32]) -> crate::error::Result<Vec<f32>> {
        if input.len() != self.expected_input_len() {
            return Err(ClassifierError::shape_mismatch(self.expected_input_len(), input.len()));
        }

        let output = catch_unwind(AssertUnwindSafe(|| {
            // [H*W*C] -> [1, H, W, C] -> [1, C, H, W]
            let tensor = Tensor::<B, 1>::from_floats(input, &self.device)
                .reshape([1, self.input_height, self.input_width, self.input_channels])
                .permute([0, 3, 1, 2]);
            self.model.forward_probabilities(tensor).into_data()
        }))
        .map_err(|e| ClassifierError::inference(panic_message(&*e)))?;

        output
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::inference(format!("推論結果の取得エラー: {:?}", e)))
    }
}

impl<B: Backend> InferenceModel for BurnModel<B> {
    fn input_len(&self) -> usize {
        self.expected_input_len()
    }

    fn output_len(&self) -> usize {
        self.num_classes
    }

    fn forward(&mut self, input: &[f32]) -> crate::error::Result<Vec<f32>> {
        self.run(input)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "backend panicked".to_string()
    }
}

/// デバイス種別に応じたバックエンドでモデルを復元
pub fn load_model(
    metadata: &ModelMetadata,
    model_binary: Vec<u8>,
    device_type: DeviceType,
) -> Result<Box<dyn InferenceModel>> {
    let model: Box<dyn InferenceModel> = match device_type {
        DeviceType::Cpu => {
            let device = NdArrayDevice::Cpu;
            Box::new(BurnModel::<NdArray>::from_bundle(metadata, model_binary, &device)?)
        }
        DeviceType::Wgpu => {
            // アダプタが無い環境では WGPU ランタイムの初期化がパニックする
            let model = catch_unwind(AssertUnwindSafe(|| {
                let device = WgpuDevice::default();
                BurnModel::<Wgpu>::from_bundle(metadata, model_binary, &device)
            }))
            .map_err(|e| anyhow::anyhow!("GPUデバイスを初期化できません: {}", panic_message(&*e)))??;
            Box::new(model)
        }
    };
    tracing::debug!("使用デバイス: {}", device_type);
    Ok(model)
}

/// モデルの重みをバイナリに変換
pub fn record_model_binary<B: Backend>(model: &SkinLesionClassifier<B>) -> Result<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    <BinBytesRecorder<FullPrecisionSettings> as Recorder<B>>::record(&recorder, model.clone().into_record(), ())
        .map_err(|e| anyhow::anyhow!("モデル重みの書き出しエラー: {:?}", e))
}

/// モデルとメタデータをバンドルとして保存
pub fn save_model<B: Backend>(
    model: &SkinLesionClassifier<B>,
    metadata: &ModelMetadata,
    output_path: &Path,
) -> Result<PathBuf> {
    let model_binary = record_model_binary(model)?;
    let path = save_model_with_metadata(output_path, metadata, &model_binary)?;
    tracing::info!("モデルを保存しました: {}", path.display());
    Ok(path)
}
