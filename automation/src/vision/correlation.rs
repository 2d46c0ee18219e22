use super::{Hit, Template, TemplateMatcher};
use anyhow::{Result, bail};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template_parallel};

/// 粗搜索时的缩小倍数。
const PYRAMID_FACTOR: u32 = 4;
/// 缩小后模板的最短边不足该值时直接全图搜索。
const MIN_COARSE_SIDE: u32 = 4;
/// 精搜索窗口在粗定位结果四周多留出的像素。
const REFINE_MARGIN: u32 = PYRAMID_FACTOR * 2;

/// 纯 Rust 的灰度归一化互相关匹配器（基于 `imageproc`）。
///
/// 先在缩小 4 倍的图像上粗定位，再回到原分辨率、只在粗定位点附近精搜索。
/// 模板太小时直接全图搜索。
///
/// 不支持透明掩码：带 alpha 的模板按灰度整体参与匹配。需要掩码匹配时启用 `opencv` 特性。
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationMatcher;

impl TemplateMatcher for CorrelationMatcher {
    fn best_match(&self, frame: &RgbaImage, template: &Template) -> Result<Option<Hit>> {
        let (fw, fh) = frame.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 {
            bail!("模板 {} 尺寸为 0", template.name);
        }
        if tw > fw || th > fh {
            return Ok(None);
        }

        let gray = imageops::grayscale(frame);
        let (x, y, confidence) = if tw.min(th) / PYRAMID_FACTOR < MIN_COARSE_SIDE {
            best_location(&gray, template.gray())
        } else {
            coarse_to_fine(&gray, template.gray())
        };
        // 全黑区域会得到 NaN
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Ok(Some(Hit {
            center: (x + tw / 2, y + th / 2),
            confidence,
        }))
    }

    fn similarity(&self, a: &RgbaImage, b: &RgbaImage) -> Result<f64> {
        if a.dimensions() != b.dimensions() {
            return Ok(0.0);
        }
        Ok(zero_mean_correlation(
            &image::imageops::grayscale(a),
            &image::imageops::grayscale(b),
        ))
    }
}

/// 全图滑窗，返回最佳位置（模板左上角）与得分。
fn best_location(image: &GrayImage, template: &GrayImage) -> (u32, u32, f64) {
    let scores = match_template_parallel(
        image,
        template,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    (x, y, extremes.max_value as f64)
}

fn shrink(image: &GrayImage) -> GrayImage {
    let (w, h) = image.dimensions();
    imageops::resize(
        image,
        (w / PYRAMID_FACTOR).max(1),
        (h / PYRAMID_FACTOR).max(1),
        FilterType::Triangle,
    )
}

/// 调用方保证模板缩小后的两边都不小于 `MIN_COARSE_SIDE`。
fn coarse_to_fine(image: &GrayImage, template: &GrayImage) -> (u32, u32, f64) {
    let (cx, cy, _) = best_location(&shrink(image), &shrink(template));

    let (fw, fh) = image.dimensions();
    let (tw, th) = template.dimensions();
    let x0 = (cx * PYRAMID_FACTOR).saturating_sub(REFINE_MARGIN);
    let y0 = (cy * PYRAMID_FACTOR).saturating_sub(REFINE_MARGIN);
    let x1 = (cx * PYRAMID_FACTOR + tw + REFINE_MARGIN).min(fw);
    let y1 = (cy * PYRAMID_FACTOR + th + REFINE_MARGIN).min(fh);
    // 粗定位取整后窗口仍可能窄于模板
    let x0 = x0.min(x1.saturating_sub(tw));
    let y0 = y0.min(y1.saturating_sub(th));

    let window = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();
    let (x, y, confidence) = best_location(&window, template);
    (x0 + x, y0 + y, confidence)
}

/// 零均值归一化互相关，截断到 [0, 1]。
///
/// 两幅图都是纯色时无法定义相关性：完全相同视为 1，否则为 0。
fn zero_mean_correlation(a: &GrayImage, b: &GrayImage) -> f64 {
    let n = a.as_raw().len() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean = |img: &GrayImage| img.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n;
    let (ma, mb) = (mean(a), mean(b));

    let (mut num, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&pa, &pb) in a.as_raw().iter().zip(b.as_raw()) {
        let da = pa as f64 - ma;
        let db = pb as f64 - mb;
        num += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom == 0.0 {
        return if a.as_raw() == b.as_raw() { 1.0 } else { 0.0 };
    }
    (num / denom).clamp(0.0, 1.0)
}
