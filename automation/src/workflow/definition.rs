use super::step::{Action, Step, parse_step};
use crate::error::LoadError;
use crate::vision::TemplateNamespace;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 游戏的启动平台。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Steam,
    Epic,
    #[default]
    Other,
}

/// Steam app id 在 YAML 里既可能写成数字也可能写成字符串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppId {
    Number(u64),
    Text(String),
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppId::Number(n) => write!(f, "{n}"),
            AppId::Text(s) => f.write_str(s),
        }
    }
}

/// 启动参数：一整行（按空白切分）或参数列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LaunchOptions {
    Line(String),
    List(Vec<String>),
}

impl LaunchOptions {
    pub fn args(&self) -> Vec<String> {
        match self {
            LaunchOptions::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            LaunchOptions::List(list) => list.clone(),
        }
    }
}

/// 工作流文件的顶层字段（不含 `workflow` 步骤列表）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub platform: Platform,
    #[serde(default)]
    pub app_id: Option<AppId>,
    #[serde(default)]
    pub exe_name: Option<String>,
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub launch_options: Option<LaunchOptions>,
    /// 启动后预计的加载时间（秒），仅作参考。
    #[serde(default)]
    pub startup_time: Option<f64>,
}

impl GameDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: Platform::Other,
            app_id: None,
            exe_name: None,
            install_dir: None,
            process_name: None,
            launch_options: None,
            startup_time: None,
        }
    }

    /// 模板子目录名：小写，空格替换为下划线。
    pub fn slug(&self) -> String {
        self.name.trim().to_lowercase().replace(' ', "_")
    }

    /// 进程名：优先 `process_name`，否则取 `exe_name`。
    pub fn default_process_name(&self) -> Option<&str> {
        self.process_name
            .as_deref()
            .or(self.exe_name.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    fn check_launch_target(&self) -> Result<(), LoadError> {
        match self.platform {
            Platform::Steam if self.app_id.is_none() => Err(LoadError::MissingLaunchTarget(
                "type 为 steam 却没有 app_id".into(),
            )),
            Platform::Epic | Platform::Other if self.exe_name.is_none() => Err(
                LoadError::MissingLaunchTarget(format!("type 为 {:?} 却没有 exe_name", self.platform)),
            ),
            _ => Ok(()),
        }
    }
}

/// 已加载并校验的工作流：游戏信息 + 有序步骤。
#[derive(Debug, Clone)]
pub struct Workflow {
    pub game: GameDefinition,
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(game: GameDefinition, steps: Vec<Step>) -> Self {
        Self { game, steps }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, LoadError> {
        let doc: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(mut doc) = doc else {
            return Err(LoadError::Document("顶层必须是键值映射".into()));
        };

        let raw_steps = match doc.remove("workflow") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(seq)) => seq,
            Some(_) => return Err(LoadError::Document("`workflow` 必须是步骤列表".into())),
        };
        // 仅作文档用途
        doc.remove("screens");
        let game = parse_game(doc)?;

        let steps = raw_steps
            .into_iter()
            .enumerate()
            .map(|(index, value)| parse_step(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        let launches = steps.iter().any(|s| match &s.action {
            Action::LaunchGame(_) => true,
            Action::RetryAction(r) => matches!(r.step.action, Action::LaunchGame(_)),
            _ => false,
        });
        if launches {
            game.check_launch_target()?;
        }

        Ok(Self { game, steps })
    }

    /// 不阻止运行、但大概率是书写错误的地方。
    pub fn lint(&self, templates: &TemplateNamespace) -> Vec<String> {
        let mut warnings = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            for name in step.action.templates() {
                if !templates.contains(name) {
                    warnings.push(format!(
                        "step {index:02} ({}): 模板 {name} 不存在 ({})",
                        step.kind(),
                        templates.resolve(name).display()
                    ));
                }
            }
            match &step.action {
                Action::Wait(w) if w.seconds.is_none() => warnings.push(format!(
                    "step {index:02} (wait): 未指定 seconds，使用默认值"
                )),
                Action::LogMessage(m) if m.message.is_none() => warnings.push(format!(
                    "step {index:02} (log_message): 未指定 message，使用默认标记"
                )),
                _ => {}
            }
        }
        warnings
    }
}

fn parse_game(doc: Mapping) -> Result<GameDefinition, LoadError> {
    if !doc.contains_key("name") {
        return Err(LoadError::Document("缺少 `name`".into()));
    }
    serde_yaml::from_value(Value::Mapping(doc)).map_err(|e| LoadError::Document(e.to_string()))
}
