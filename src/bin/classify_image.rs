//! 画像分類の動作確認用バイナリ
//!
//! 使い方: classify_image [--config config.json] [--model model.tar.gz] <image>...

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use skin_classifier_lib::model::AppConfig;
use skin_classifier_lib::{Pipeline, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};

struct Args {
    config_path: PathBuf,
    model_path: Option<String>,
    images: Vec<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut config_path = AppConfig::default_path();
    let mut model_path = None;
    let mut images = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = PathBuf::from(args.next().context("--config requires a path")?);
            }
            "--model" => {
                model_path = Some(args.next().context("--model requires a path")?);
            }
            _ => images.push(PathBuf::from(arg)),
        }
    }

    if images.is_empty() {
        bail!("usage: classify_image [--config config.json] [--model model.tar.gz] <image>...");
    }

    Ok(Args {
        config_path,
        model_path,
        images,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;

    let mut config = AppConfig::load_or_default(&args.config_path);
    if let Some(model_path) = args.model_path {
        config.set_model_path(model_path);
    }

    // 読み込みに失敗したら分類は一切行わない
    let pipeline = Pipeline::from_config(&config).context("分類器を初期化できません")?;

    println!("=== モデル ===");
    println!("モデル: {}", pipeline.classifier().source_name());
    if let Some(labels) = pipeline.classifier().class_labels() {
        println!("クラス: {}", labels.join(", "));
    }
    println!("入力サイズ: {}x{}x{}", INPUT_WIDTH, INPUT_HEIGHT, INPUT_CHANNELS);
    println!("計算デバイス: {}", config.device_type);
    println!();

    let mut failures = 0;
    for image_path in &args.images {
        match pipeline.run_path(image_path) {
            Ok(result) => println!("{}: {}", image_path.display(), result),
            Err(e) => {
                failures += 1;
                eprintln!("✗ {}: {}", image_path.display(), e);
            }
        }
    }

    pipeline.release();

    if failures > 0 {
        bail!("{}/{} 枚の画像で分類に失敗しました", failures, args.images.len());
    }
    Ok(())
}
