//! 基于模板匹配的游戏自动化工作流引擎。
//!
//! 工作流文件（YAML）描述一串步骤：等待界面元素出现、点击、按键、截图、写入计时标记。
//! 引擎按顺序执行，依据每步的 `optional` 决定失败后继续还是终止，并输出带时间戳的执行日志。

pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod input;
pub mod logging;
pub mod vision;
pub mod workflow;

pub use config::Settings;
pub use error::{EngineError, LoadError};
pub use workflow::{
    Devices, ExecutionLog, RunReport, RunStatus, StepOutcome, Workflow, WorkflowEngine,
};
