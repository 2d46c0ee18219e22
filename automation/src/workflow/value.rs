use serde::{Deserialize, Serialize};
use std::fmt;

/// 屏幕区域，四个分量均为显示器宽/高的比例（0.0–1.0）。
///
/// YAML 中写作 `[left, top, right, bottom]`，例如 `[0.0, 0.5, 1.0, 1.0]` 表示下半屏。
/// 在截图前裁剪，既缩小匹配开销，也避免区域外的误匹配。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Region {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Region {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Result<Self, String> {
        Self::try_from([left, top, right, bottom])
    }

    /// 整个画面。
    pub fn full() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        }
    }

    /// 按画面像素尺寸展开为 `(x, y, w, h)`，宽高至少为 1 且不会越界。
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = ((self.left * width as f64).floor() as u32).min(width.saturating_sub(1));
        let y = ((self.top * height as f64).floor() as u32).min(height.saturating_sub(1));
        let right = ((self.right * width as f64).round() as u32).clamp(x + 1, width.max(x + 1));
        let bottom = ((self.bottom * height as f64).round() as u32).clamp(y + 1, height.max(y + 1));
        (x, y, right - x, bottom - y)
    }
}

impl TryFrom<[f64; 4]> for Region {
    type Error = String;

    fn try_from([left, top, right, bottom]: [f64; 4]) -> Result<Self, Self::Error> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if ![left, top, right, bottom].into_iter().all(in_unit) {
            return Err(format!(
                "region 分量必须位于 [0, 1]：[{left}, {top}, {right}, {bottom}]"
            ));
        }
        if left >= right || top >= bottom {
            return Err(format!(
                "region 需满足 left < right 且 top < bottom：[{left}, {top}, {right}, {bottom}]"
            ));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }
}

impl From<Region> for [f64; 4] {
    fn from(r: Region) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}, {:.3}, {:.3}, {:.3}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// 屏幕坐标（像素）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 坐标越界时钳制到 `i32` 的范围。
    pub fn offset(self, (dx, dy): (i32, i32)) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 鼠标按键。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        })
    }
}
