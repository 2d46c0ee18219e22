mod context;
mod definition;
mod engine;
mod log;
mod matching;
mod outcome;
mod step;
pub mod steps;
mod value;

pub use context::{Devices, Session};
pub use definition::{AppId, GameDefinition, LaunchOptions, Platform, Workflow};
pub use engine::{RunReport, RunStatus, WorkflowEngine};
pub use log::{EntryKind, ExecutionLog, LogEntry};
pub use outcome::{Payload, StepOutcome};
pub use step::{Action, ActionKind, Step, parse_step};
pub use value::{MouseButton, Point, Region};
