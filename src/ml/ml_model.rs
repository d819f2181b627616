//! 機械学習モデルの共通定義
//!
//! 皮膚病変分類用のVGG系CNNモデルと関連する設定を提供します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

use crate::model::ArchitectureSpec;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数
    pub num_classes: usize,
    /// 各畳み込みブロックの出力チャネル数
    pub block_channels: Vec<usize>,
    /// 各畳み込みブロックの層数
    pub block_depths: Vec<usize>,
    /// 全結合層（中間）のユニット数
    #[config(default = 512)]
    pub hidden_units: usize,
    /// ドロップアウト率
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl ModelConfig {
    /// メタデータのネットワーク構造から設定を作成
    pub fn from_spec(spec: &ArchitectureSpec, num_classes: usize) -> anyhow::Result<Self> {
        if spec.block_channels.is_empty() {
            anyhow::bail!("architecture has no convolution blocks");
        }
        if spec.block_channels.len() != spec.block_depths.len() {
            anyhow::bail!(
                "architecture has {} channel entries but {} depth entries",
                spec.block_channels.len(),
                spec.block_depths.len()
            );
        }
        if spec.block_channels.contains(&0) || spec.block_depths.contains(&0) || spec.hidden_units == 0 {
            anyhow::bail!("architecture contains a zero-sized layer: {:?}", spec);
        }

        Ok(Self::new(
            num_classes,
            spec.block_channels.clone(),
            spec.block_depths.clone(),
        )
        .with_hidden_units(spec.hidden_units))
    }

    /// モデルを初期化
    pub fn init<B: Backend>(&self, device: &B::Device) -> SkinLesionClassifier<B> {
        let mut blocks = Vec::with_capacity(self.block_channels.len());
        let mut in_channels = 3;
        for (&channels, &depth) in self.block_channels.iter().zip(&self.block_depths) {
            blocks.push(ConvBlock::<B>::new(in_channels, channels, depth, device));
            in_channels = channels;
        }

        tracing::debug!(
            "[Model] ブロック: {:?} x {:?}, FC: {} -> {} -> {}",
            self.block_channels,
            self.block_depths,
            in_channels,
            self.hidden_units,
            self.num_classes
        );

        SkinLesionClassifier {
            blocks,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(in_channels, self.hidden_units).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.hidden_units, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// 畳み込みブロック
///
/// {Conv 3x3 (same padding) + ReLU} x depth → MaxPool 2x2 (stride 2)
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    activation: Relu,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, depth: usize, device: &B::Device) -> Self {
        let convs = (0..depth)
            .map(|i| {
                let input = if i == 0 { in_channels } else { out_channels };
                Conv2dConfig::new([input, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device)
            })
            .collect();

        Self {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            activation: Relu::new(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for conv in &self.convs {
            x = self.activation.forward(conv.forward(x));
        }
        self.pool.forward(x)
    }
}

/// 皮膚病変分類用CNNモデル
///
/// # アーキテクチャ
/// - 畳み込みブロック x N（VGG16では 64/128/256/512/512）
/// - Global Average Pooling
/// - FC: C -> hidden + ReLU
/// - Dropout
/// - FC: hidden -> num_classes
/// - Softmax (分類時)
#[derive(Module, Debug)]
pub struct SkinLesionClassifier<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    global_pool: AdaptiveAvgPool2d,
    fc1: Linear<B>,
    dropout: Dropout,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> SkinLesionClassifier<B> {
    /// 順伝播
    ///
    /// # 引数
    /// - `images`: バッチ画像 [batch_size, 3, height, width]
    ///
    /// # 戻り値
    /// - クラスごとのロジット [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }

        // Global Average Pooling + Flatten
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// クラス確率を計算
    ///
    /// # 戻り値
    /// - softmax後の確率 [batch_size, num_classes]
    pub fn forward_probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    fn tiny_spec() -> ArchitectureSpec {
        ArchitectureSpec {
            block_channels: vec![4, 8],
            block_depths: vec![1, 2],
            hidden_units: 8,
        }
    }

    #[test]
    fn test_output_shape_and_probabilities() {
        let device = NdArrayDevice::Cpu;
        let config = ModelConfig::from_spec(&tiny_spec(), 3).unwrap();
        let model = config.init::<NdArray>(&device);

        let images = Tensor::<NdArray, 4>::zeros([2, 3, 32, 32], &device);
        let probs = model.forward_probabilities(images);
        assert_eq!(probs.dims(), [2, 3]);

        let values = probs.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_from_spec_rejects_inconsistent_architecture() {
        let mut spec = tiny_spec();
        spec.block_depths.pop();
        assert!(ModelConfig::from_spec(&spec, 3).is_err());

        let mut spec = tiny_spec();
        spec.block_channels = vec![];
        spec.block_depths = vec![];
        assert!(ModelConfig::from_spec(&spec, 3).is_err());

        let mut spec = tiny_spec();
        spec.hidden_units = 0;
        assert!(ModelConfig::from_spec(&spec, 3).is_err());
    }

    #[test]
    fn test_vgg16_config() {
        let config = ModelConfig::from_spec(&ArchitectureSpec::vgg16(), 3).unwrap();
        assert_eq!(config.block_channels, vec![64, 128, 256, 512, 512]);
        assert_eq!(config.hidden_units, 512);
        assert_eq!(config.dropout, 0.5);
    }
}
