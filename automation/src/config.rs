use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 内置兜底值：步骤与全局配置都未给出时使用。
pub const FALLBACK_THRESHOLD: f64 = 0.8;
pub const FALLBACK_WAIT_TIMEOUT_SECS: f64 = 300.0;
pub const FALLBACK_CLICK_TIMEOUT_SECS: f64 = 10.0;

/// 读取全局配置时的错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件格式错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("配置项 `{key}` 非法: {message}")]
    Invalid { key: &'static str, message: String },
}

/// `config/settings.yaml` 的全局配置，提供各步骤参数的第二层默认值。
///
/// 所有字段都可省略；缺省时使用与内置兜底一致的默认值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub steam_path: Option<PathBuf>,
    pub steam_launch_options: Option<String>,
    pub mouse_move_duration: f64,
    pub pre_click_delay: f64,
    pub post_click_delay: f64,
    /// `press_key` / `type_text` 未指定 `delay` 时的尾随等待。
    pub input_delay: f64,
    pub template_matching_threshold: f64,
    /// 通用等待类步骤的默认超时（秒）。
    pub timeout: f64,
    /// `click_template` 的默认超时（秒）。
    pub click_timeout: f64,
    /// 模板/画面轮询的固定间隔（秒），与超时长短无关。
    pub poll_interval: f64,
    /// `wait_for_game` 检查进程的间隔（秒）。
    pub game_poll_interval: f64,
    pub screenshot_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub templates_dir: PathBuf,
    /// 截图所用显示器序号；为空时使用主显示器。
    pub monitor_index: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            steam_path: None,
            steam_launch_options: None,
            mouse_move_duration: 0.5,
            pre_click_delay: 0.3,
            post_click_delay: 0.5,
            input_delay: 0.5,
            template_matching_threshold: FALLBACK_THRESHOLD,
            timeout: FALLBACK_WAIT_TIMEOUT_SECS,
            click_timeout: FALLBACK_CLICK_TIMEOUT_SECS,
            poll_interval: 0.5,
            game_poll_interval: 2.0,
            screenshot_dir: PathBuf::from("output/screenshots"),
            log_dir: PathBuf::from("output/logs"),
            log_level: "info".to_string(),
            templates_dir: PathBuf::from("templates/screens"),
            monitor_index: None,
        }
    }
}

impl Settings {
    /// 从 YAML 文件读取配置并校验。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// 解析 YAML 文本；空文档等价于全部默认值。
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = if text.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(text)?
        };
        settings.validate()?;
        Ok(settings)
    }

    /// 校验数值范围：阈值位于 [0,1]，时长非负，轮询间隔为正。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.template_matching_threshold) {
            return Err(ConfigError::Invalid {
                key: "template_matching_threshold",
                message: format!("{} 不在 [0, 1] 区间", self.template_matching_threshold),
            });
        }

        let durations: [(&'static str, f64); 6] = [
            ("mouse_move_duration", self.mouse_move_duration),
            ("pre_click_delay", self.pre_click_delay),
            ("post_click_delay", self.post_click_delay),
            ("input_delay", self.input_delay),
            ("timeout", self.timeout),
            ("click_timeout", self.click_timeout),
        ];
        for (key, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("时长必须为非负数，实际为 {value}"),
                });
            }
        }

        for (key, value) in [
            ("poll_interval", self.poll_interval),
            ("game_poll_interval", self.game_poll_interval),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: format!("轮询间隔必须大于 0，实际为 {value}"),
                });
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval).unwrap_or(Duration::from_millis(500))
    }

    pub fn game_poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.game_poll_interval).unwrap_or(Duration::from_secs(2))
    }
}
