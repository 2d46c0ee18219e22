use crate::workflow::{Point, Region};
use anyhow::{Context, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

/// 一帧截图，以及它左上角在屏幕上的绝对坐标。
///
/// 按区域截图时 `origin` 为区域左上角，匹配得到的帧内坐标加上它即为屏幕坐标。
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub origin: Point,
}

impl Frame {
    pub fn new(image: RgbaImage, origin: Point) -> Self {
        Self { image, origin }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// 帧内像素坐标 -> 屏幕坐标。
    pub fn to_screen(&self, x: u32, y: u32) -> Point {
        Point::new(
            self.origin.x.saturating_add_unsigned(x),
            self.origin.y.saturating_add_unsigned(y),
        )
    }

    /// 按比例区域裁剪出子帧，并同步平移 `origin`。
    pub fn crop(&self, region: &Region) -> Frame {
        let (w, h) = self.image.dimensions();
        let (x, y, rw, rh) = region.to_pixels(w, h);
        let image = image::imageops::crop_imm(&self.image, x, y, rw, rh).to_image();
        Frame {
            image,
            origin: self.to_screen(x, y),
        }
    }
}

/// 按需提供当前画面（或其中一块区域）。只负责取图，不做任何判断。
pub trait FrameSource {
    fn capture(&mut self, region: Option<&Region>) -> Result<Frame>;
}

/// 截图落盘。`name` 不含扩展名，返回实际写入的路径。
pub trait ScreenshotStore {
    fn save(&mut self, name: &str, frame: &Frame) -> Result<PathBuf>;
}

/// 以 PNG 写入指定目录的截图存储。
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScreenshotStore for DirectoryStore {
    fn save(&mut self, name: &str, frame: &Frame) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("无法创建截图目录 {}", self.dir.display()))?;
        let file_name = if name.ends_with(".png") {
            name.to_string()
        } else {
            format!("{name}.png")
        };
        let path = self.dir.join(file_name);
        frame
            .image
            .save(&path)
            .with_context(|| format!("写入截图失败 {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(feature = "desktop")]
pub use desktop::MonitorSource;

#[cfg(feature = "desktop")]
mod desktop {
    use super::{Frame, FrameSource};
    use crate::workflow::{Point, Region};
    use anyhow::{Result, anyhow};
    use image::RgbaImage;
    use xcap::Monitor;

    /// 基于 `xcap` 的整屏截图源，按配置选择显示器。
    pub struct MonitorSource {
        monitor: Monitor,
    }

    impl MonitorSource {
        /// `index` 为空时选择主显示器，找不到主显示器时退回第一个。
        pub fn new(index: Option<usize>) -> Result<Self> {
            let monitors = Monitor::all()?;
            let monitor = match index {
                Some(i) => monitors
                    .get(i)
                    .cloned()
                    .ok_or_else(|| anyhow!("显示器序号 {i} 不存在（共 {} 个）", monitors.len()))?,
                None => monitors
                    .iter()
                    .find(|m| m.is_primary().unwrap_or(false))
                    .or_else(|| monitors.first())
                    .cloned()
                    .ok_or_else(|| anyhow!("未发现任何显示器"))?,
            };
            tracing::info!(
                name = %monitor.name().unwrap_or_default(),
                "使用显示器进行截图"
            );
            Ok(Self { monitor })
        }
    }

    impl FrameSource for MonitorSource {
        fn capture(&mut self, region: Option<&Region>) -> Result<Frame> {
            let shot = self.monitor.capture_image()?;
            let (w, h) = shot.dimensions();
            // xcap 自带的 image 版本可能与本 crate 不同，按原始缓冲区重建
            let image = RgbaImage::from_raw(w, h, shot.into_raw())
                .ok_or_else(|| anyhow!("截图尺寸与缓冲区长度不匹配"))?;
            let origin = Point::new(self.monitor.x()?, self.monitor.y()?);
            let frame = Frame::new(image, origin);
            Ok(match region {
                Some(r) => frame.crop(r),
                None => frame,
            })
        }
    }
}
