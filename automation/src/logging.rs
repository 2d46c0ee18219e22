use crate::config::Settings;
use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志文件句柄。持有期间后台写线程保持运行，drop 时刷新剩余日志。
pub struct LogFile {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

/// 初始化日志：控制台 + `<log_dir>/gamebench_<时间戳>.log`。
///
/// `RUST_LOG` 优先，否则使用配置中的 `log_level`。
pub fn init(settings: &Settings) -> Result<LogFile> {
    std::fs::create_dir_all(&settings.log_dir)
        .with_context(|| format!("无法创建日志目录 {}", settings.log_dir.display()))?;
    let file_name = format!(
        "gamebench_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let appender = tracing_appender::rolling::never(&settings.log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| anyhow!("日志初始化失败: {e}"))?;

    Ok(LogFile {
        path: settings.log_dir.join(file_name),
        _guard: guard,
    })
}
