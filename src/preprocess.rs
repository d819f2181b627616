//! 画像前処理
//!
//! デコード済みの任意解像度RGB画像を、モデル入力用の正規化テンソルに変換します。
//!
//! 1. 224x224 へリサイズ（アスペクト比は無視して引き伸ばす）
//! 2. 行優先で各画素の r/255, g/255, b/255 を順に並べる

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, RgbImage};

use crate::error::{ClassifierError, Result};
use crate::model::config::ResizeFilter;
use crate::types::{InputTensor, INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH};

/// 前処理器
///
/// 共有状態を持たないため、複数スレッドから同時に使用できます。
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(ResizeFilter::default())
    }
}

impl Preprocessor {
    /// 固定入力サイズ (224x224) の前処理器を作成
    pub fn new(filter: ResizeFilter) -> Self {
        Self {
            width: INPUT_WIDTH as u32,
            height: INPUT_HEIGHT as u32,
            filter: filter.into(),
        }
    }

    /// 出力テンソルの要素数
    pub fn output_len(&self) -> usize {
        INPUT_CHANNELS * self.width as usize * self.height as usize
    }

    /// 画像を正規化テンソルに変換
    pub fn prepare(&self, image: &DynamicImage) -> Result<InputTensor> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::invalid_image(format!(
                "画像サイズが不正です: {}x{}",
                image.width(),
                image.height()
            )));
        }

        let rgb = image.to_rgb8();
        self.prepare_rgb(&rgb)
    }

    /// RGB8画像を正規化テンソルに変換
    pub fn prepare_rgb(&self, image: &RgbImage) -> Result<InputTensor> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ClassifierError::invalid_image(format!(
                "画像サイズが不正です: {}x{}",
                width, height
            )));
        }

        // 元画像が既に目的サイズならリサイズを省略
        let resized;
        let source = if (width, height) == (self.width, self.height) {
            image
        } else {
            resized = image::imageops::resize(image, self.width, self.height, self.filter);
            &resized
        };

        let mut data = Vec::with_capacity(self.output_len());
        for pixel in source.pixels() {
            for channel in 0..INPUT_CHANNELS {
                data.push(pixel[channel] as f32 / 255.0);
            }
        }

        tracing::debug!(
            "前処理完了: {}x{} -> {}x{} ({}要素)",
            width,
            height,
            self.width,
            self.height,
            data.len()
        );

        Ok(InputTensor::from_vec(data))
    }

    /// エンコード済み画像バイト列をデコードして変換
    pub fn prepare_bytes(&self, bytes: &[u8]) -> Result<InputTensor> {
        let image = decode_image(bytes)?;
        self.prepare(&image)
    }
}

/// 画像バイト列をデコード
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(ClassifierError::invalid_image("画像データが空です"));
    }
    image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::invalid_image(format!("デコードに失敗しました: {}", e)))
}

/// 画像ファイルを開いてデコード
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        ClassifierError::invalid_image(format!("{} を開けません: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::INPUT_LEN;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_output_shape_for_various_sizes() {
        let preprocessor = Preprocessor::default();
        for (w, h) in [(1, 1), (640, 426), (224, 224), (3, 500)] {
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 10, 99])));
            let tensor = preprocessor.prepare(&image).unwrap();
            assert_eq!(tensor.len(), INPUT_LEN, "{}x{}", w, h);
            assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_channel_interleaved_row_major() {
        let mut image = RgbImage::new(224, 224);
        image.put_pixel(0, 0, Rgb([255, 0, 51]));
        image.put_pixel(1, 0, Rgb([0, 255, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));

        let tensor = Preprocessor::default().prepare_rgb(&image).unwrap();
        let data = tensor.as_slice();

        // 画素(0,0)
        assert_eq!(&data[0..3], &[1.0, 0.0, 51.0 / 255.0]);
        // 画素(1,0)
        assert_eq!(&data[3..6], &[0.0, 1.0, 0.0]);
        // 画素(0,1) は 2行目の先頭
        let row1 = 224 * 3;
        assert_eq!(&data[row1..row1 + 3], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_stretch_ignores_aspect_ratio() {
        // 横長の単色画像は引き伸ばしても単色のまま
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 100, Rgb([255, 255, 255])));
        let tensor = Preprocessor::default().prepare(&image).unwrap();
        assert!(tensor.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_deterministic() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(37, 91, |x, y| {
            Rgb([(x * 7) as u8, (y * 3) as u8, ((x + y) % 256) as u8])
        }));
        let preprocessor = Preprocessor::new(ResizeFilter::Lanczos3);
        let a = preprocessor.prepare(&image).unwrap();
        let b = preprocessor.prepare(&image).unwrap();
        assert_eq!(a.to_ne_bytes(), b.to_ne_bytes());
    }

    #[test]
    fn test_grayscale_input_converted_to_rgb() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(10, 10, image::Luma([0])));
        let tensor = Preprocessor::default().prepare(&image).unwrap();
        assert_eq!(tensor.len(), INPUT_LEN);
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let err = Preprocessor::default().prepare(&image).unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidImage(_)));
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let preprocessor = Preprocessor::default();
        assert!(matches!(
            preprocessor.prepare_bytes(&[]).unwrap_err(),
            ClassifierError::InvalidImage(_)
        ));
        assert!(matches!(
            preprocessor.prepare_bytes(b"not an image").unwrap_err(),
            ClassifierError::InvalidImage(_)
        ));
    }

    #[test]
    fn test_prepare_encoded_png() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 30, Rgb([0, 0, 0])));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let tensor = Preprocessor::default().prepare_bytes(&bytes).unwrap();
        assert_eq!(tensor.len(), INPUT_LEN);
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
    }
}
