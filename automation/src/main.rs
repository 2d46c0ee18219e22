use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gamebench::capture::{DirectoryStore, MonitorSource};
use gamebench::game::ProcessSession;
use gamebench::input::EnigoDriver;
use gamebench::vision::{TemplateMatcher, TemplateNamespace};
use gamebench::workflow::{GameDefinition, RunStatus, Workflow, WorkflowEngine};
use gamebench::{Devices, Settings, logging};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

const BENCHMARK_START: &str = "BENCHMARK_START_TIME";
const BENCHMARK_END: &str = "BENCHMARK_END_TIME";

#[derive(Parser, Debug)]
#[command(
    name = "gamebench",
    version,
    about = "按 YAML 工作流驱动游戏界面，运行基准测试并记录计时标记"
)]
struct Cli {
    /// 全局配置文件
    #[arg(long, global = true, default_value = "config/settings.yaml")]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 执行工作流
    Run {
        workflow: PathBuf,
        /// 覆盖配置中的截图根目录
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 只加载并检查工作流，不执行
    Check { workflow: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("错误: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn load_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        Ok(Settings::load(path)?)
    } else {
        eprintln!("配置文件 {} 不存在，使用默认配置", path.display());
        Ok(Settings::default())
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut settings = load_settings(&cli.settings)?;
    match cli.command {
        Command::Check { workflow } => check(&settings, &workflow),
        Command::Run { workflow, output } => {
            if let Some(dir) = output {
                settings.screenshot_dir = dir;
            }
            execute(&settings, &workflow)
        }
    }
}

fn check(settings: &Settings, path: &Path) -> Result<bool> {
    let workflow = Workflow::load(path).with_context(|| format!("加载 {}", path.display()))?;
    let templates = TemplateNamespace::new(&settings.templates_dir, workflow.game.slug());
    let warnings = workflow.lint(&templates);
    println!(
        "{}: {} 个步骤，{} 条警告",
        workflow.game.name,
        workflow.steps.len(),
        warnings.len()
    );
    for w in &warnings {
        println!("  警告: {w}");
    }
    Ok(true)
}

fn run_dir(settings: &Settings, game: &GameDefinition) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    settings
        .screenshot_dir
        .join(format!("{}_{stamp}", game.slug()))
}

fn matcher() -> Box<dyn TemplateMatcher> {
    #[cfg(feature = "opencv")]
    {
        Box::new(gamebench::vision::OpenCvMatcher)
    }
    #[cfg(not(feature = "opencv"))]
    {
        Box::new(gamebench::vision::CorrelationMatcher)
    }
}

fn execute(settings: &Settings, path: &Path) -> Result<bool> {
    let log_file = logging::init(settings)?;
    let workflow = Workflow::load(path).with_context(|| format!("加载 {}", path.display()))?;
    let out_dir = run_dir(settings, &workflow.game);
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("无法创建输出目录 {}", out_dir.display()))?;
    info!(log = %log_file.path.display(), output = %out_dir.display(), "输出位置");

    let devices = Devices {
        frames: Box::new(MonitorSource::new(settings.monitor_index)?),
        matcher: matcher(),
        input: Box::new(EnigoDriver::new()?),
        game: Box::new(ProcessSession::new(settings)),
        screenshots: Box::new(DirectoryStore::new(&out_dir)),
    };
    let engine = WorkflowEngine::new(settings, devices);
    let report = engine.run(&workflow)?;

    let log_path = out_dir.join("execution_log.json");
    fs::write(&log_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("写入 {}", log_path.display()))?;

    match report
        .log
        .elapsed_between(BENCHMARK_START, BENCHMARK_END)
    {
        Some(d) => info!("BENCHMARK_DURATION: {:.3} seconds", d.as_secs_f64()),
        None if report.log.marker(BENCHMARK_START).is_some() => {
            warn!("找到 {BENCHMARK_START} 但缺少 {BENCHMARK_END}")
        }
        None => {}
    }

    match &report.status {
        RunStatus::Completed => {
            info!(game = %report.game, "工作流执行完成");
            Ok(true)
        }
        RunStatus::Halted {
            index,
            kind,
            outcome,
        } => {
            error!("工作流在 step {index:02} ({kind}) 终止: {outcome}");
            Ok(false)
        }
    }
}
