use crate::workflow::Point;
use anyhow::{Context, Result, bail};
use image::{GrayImage, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

mod correlation;
#[cfg(feature = "opencv")]
mod opencv;
mod poll;

pub use correlation::CorrelationMatcher;
#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvMatcher;
pub use poll::{PollState, Poller, Waited};

/// 已加载的模板图片。
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    /// 来自磁盘时的路径；测试中直接注入的模板为 `None`。
    pub path: Option<PathBuf>,
    pub image: RgbaImage,
    gray: GrayImage,
}

impl Template {
    pub fn new(name: impl Into<String>, image: RgbaImage) -> Self {
        let gray = image::imageops::grayscale(&image);
        Self {
            name: name.into(),
            path: None,
            image,
            gray,
        }
    }

    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("模板读取失败: {}", path.display()))?
            .to_rgba8();
        let mut t = Self::new(name, image);
        t.path = Some(path.to_path_buf());
        Ok(t)
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// 是否带有透明像素（决定是否使用掩码匹配）。
    pub fn has_transparency(&self) -> bool {
        self.image.pixels().any(|p| p.0[3] < 255)
    }
}

/// 一次模板匹配的最佳命中：模板中心在帧内的像素坐标与置信度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub center: (u32, u32),
    pub confidence: f64,
}

/// 模板在屏幕上的命中。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub location: Point,
    pub confidence: f64,
}

/// 模板匹配算法。只计算分数，阈值判断交给调用方。
pub trait TemplateMatcher {
    /// 在帧中寻找模板的最佳位置。模板比帧大时返回 `Ok(None)`。
    fn best_match(&self, frame: &RgbaImage, template: &Template) -> Result<Option<Hit>>;

    /// 两幅同尺寸画面的相似度（0.0–1.0），尺寸不同视为 0。
    fn similarity(&self, a: &RgbaImage, b: &RgbaImage) -> Result<f64>;
}

/// 模板命名空间：按名字解析模板文件并缓存。
///
/// 解析顺序：绝对路径或已带模板根目录前缀的名字原样使用；否则先找
/// `<根目录>/<游戏目录>/<名字>`，再找 `<根目录>/<名字>`。
pub struct TemplateNamespace {
    root: PathBuf,
    game_dir: String,
    cache: HashMap<String, Rc<Template>>,
}

impl TemplateNamespace {
    pub fn new(root: impl Into<PathBuf>, game_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            game_dir: game_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// 直接注入内存中的模板，之后按同名解析时不再访问磁盘。
    pub fn insert(&mut self, template: Rc<Template>) {
        self.cache.insert(template.name.clone(), template);
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        let raw = Path::new(name);
        if raw.is_absolute() || raw.starts_with(&self.root) {
            return raw.to_path_buf();
        }
        let game_specific = self.root.join(&self.game_dir).join(name);
        if game_specific.exists() {
            game_specific
        } else {
            self.root.join(name)
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cache.contains_key(name) || self.resolve(name).is_file()
    }

    pub fn load(&mut self, name: &str) -> Result<Rc<Template>> {
        if let Some(t) = self.cache.get(name) {
            return Ok(Rc::clone(t));
        }
        let path = self.resolve(name);
        if !path.is_file() {
            bail!("模板不存在: {name} (查找路径 {})", path.display());
        }
        let template = Rc::new(Template::open(name, &path)?);
        tracing::debug!(template = name, path = %path.display(), "模板已加载");
        self.cache.insert(name.to_string(), Rc::clone(&template));
        Ok(template)
    }
}
