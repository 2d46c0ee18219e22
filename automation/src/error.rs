use crate::workflow::ActionKind;
use std::path::PathBuf;
use thiserror::Error;

/// 工作流定义非法：在任何步骤执行之前即报告。
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("无法读取工作流文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("工作流 YAML 解析失败: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("工作流文档格式错误: {0}")]
    Document(String),

    #[error("step {index:02}: 不是键值映射")]
    NotAMapping { index: usize },

    #[error("step {index:02}: 缺少 `action`")]
    MissingAction { index: usize },

    #[error("step {index:02}: 未知动作 `{action}`")]
    UnknownAction { index: usize, action: String },

    #[error("step {index:02} ({action}): 缺少必填参数 `{param}`")]
    MissingParameter {
        index: usize,
        action: ActionKind,
        param: &'static str,
    },

    #[error("step {index:02} ({action}): {message}")]
    InvalidParameter {
        index: usize,
        action: ActionKind,
        message: String,
    },

    #[error("step {index:02}: retry_action 不能嵌套 retry_action")]
    NestedRetry { index: usize },

    #[error("工作流包含 launch_game，但 {0}")]
    MissingLaunchTarget(String),
}

impl LoadError {
    /// 出错步骤的序号（0 起）；文档级错误返回 `None`。
    pub fn step_index(&self) -> Option<usize> {
        match self {
            LoadError::NotAMapping { index }
            | LoadError::MissingAction { index }
            | LoadError::UnknownAction { index, .. }
            | LoadError::MissingParameter { index, .. }
            | LoadError::InvalidParameter { index, .. }
            | LoadError::NestedRetry { index } => Some(*index),
            LoadError::Io { .. }
            | LoadError::Yaml(_)
            | LoadError::Document(_)
            | LoadError::MissingLaunchTarget(_) => None,
        }
    }
}

/// 引擎自身的故障，任何策略都不能覆盖。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("已有工作流正在运行，拒绝重入 run()")]
    AlreadyRunning,
}
