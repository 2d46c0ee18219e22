use super::{Hit, Template, TemplateMatcher};
use anyhow::Result;
use image::RgbaImage;
use opencv::{
    core::{self, Mat, Point},
    imgproc,
    prelude::*,
};

/// OpenCV 模板匹配器。
///
/// 模板带透明像素时以 alpha 生成掩码并使用 `TM_CCORR_NORMED`，否则使用 `TM_CCOEFF_NORMED`。
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenCvMatcher;

impl TemplateMatcher for OpenCvMatcher {
    fn best_match(&self, frame: &RgbaImage, template: &Template) -> Result<Option<Hit>> {
        let (fw, fh) = frame.dimensions();
        let (tw, th) = template.dimensions();
        if tw > fw || th > fh {
            return Ok(None);
        }

        let frame_bgr = to_bgr(frame)?;
        let tpl_bgr = to_bgr(&template.image)?;
        let mask = if template.has_transparency() {
            alpha_mask(&template.image)?
        } else {
            Mat::default()
        };

        let mut result = Mat::default();
        if mask.empty() {
            imgproc::match_template(
                &frame_bgr,
                &tpl_bgr,
                &mut result,
                imgproc::TM_CCOEFF_NORMED,
                &core::no_array(),
            )?;
        } else {
            imgproc::match_template(
                &frame_bgr,
                &tpl_bgr,
                &mut result,
                imgproc::TM_CCORR_NORMED,
                &mask,
            )?;
        }

        let (max_val, max_loc) = max_of(&result)?;
        let confidence = if max_val.is_finite() {
            max_val.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(Some(Hit {
            center: (max_loc.x as u32 + tw / 2, max_loc.y as u32 + th / 2),
            confidence,
        }))
    }

    fn similarity(&self, a: &RgbaImage, b: &RgbaImage) -> Result<f64> {
        if a.dimensions() != b.dimensions() {
            return Ok(0.0);
        }
        let mut result = Mat::default();
        imgproc::match_template(
            &to_bgr(a)?,
            &to_bgr(b)?,
            &mut result,
            imgproc::TM_CCOEFF_NORMED,
            &core::no_array(),
        )?;
        let (max_val, _) = max_of(&result)?;
        Ok(if max_val.is_finite() {
            max_val.clamp(0.0, 1.0)
        } else if a.as_raw() == b.as_raw() {
            1.0
        } else {
            0.0
        })
    }
}

/// 将 RGBA 图像复制到 OpenCV `Mat` 并转换为 BGR。
fn to_bgr(image: &RgbaImage) -> Result<Mat> {
    let (w, h) = image.dimensions();
    let mut rgba = Mat::zeros(h as i32, w as i32, core::CV_8UC4)?.to_mat()?;
    rgba.data_bytes_mut()?.copy_from_slice(image.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgba,
        &mut bgr,
        imgproc::COLOR_RGBA2BGR,
        0,
        core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;
    Ok(bgr)
}

/// alpha > 0 的像素参与匹配。
fn alpha_mask(image: &RgbaImage) -> Result<Mat> {
    let (w, h) = image.dimensions();
    let mut rgba = Mat::zeros(h as i32, w as i32, core::CV_8UC4)?.to_mat()?;
    rgba.data_bytes_mut()?.copy_from_slice(image.as_raw());
    let mut alpha = Mat::default();
    core::extract_channel(&rgba, &mut alpha, 3)?;
    let mut mask = Mat::default();
    imgproc::threshold(&alpha, &mut mask, 0.0, 255.0, imgproc::THRESH_BINARY)?;
    Ok(mask)
}

fn max_of(result: &Mat) -> Result<(f64, Point)> {
    let mut max_val = 0.0;
    let mut max_loc = Point::new(0, 0);
    core::min_max_loc(
        result,
        None,
        Some(&mut max_val),
        None,
        Some(&mut max_loc),
        &core::no_array(),
    )?;
    Ok((max_val, max_loc))
}
