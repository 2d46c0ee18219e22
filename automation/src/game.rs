use crate::config::Settings;
use crate::workflow::{GameDefinition, LaunchOptions, Platform};
use anyhow::{Context, Result, anyhow, bail};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System, UpdateKind};
use tracing::{debug, info, warn};

/// 游戏进程的生命周期操作。失败以 `Err` 返回，由调用方转换为步骤失败。
pub trait GameSession {
    fn launch(&mut self, game: &GameDefinition) -> Result<()>;
    fn is_running(&mut self, process_name: &str) -> Result<bool>;
    /// 结束所有匹配的进程；没有匹配进程时返回 `Ok(false)`。
    fn terminate(&mut self, process_name: &str, force: bool) -> Result<bool>;
}

/// 待执行的启动命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    /// 可执行文件名；无权限读取时为空。
    pub exe: Option<String>,
}

impl ProcessEntry {
    pub fn matches(&self, process_name: &str) -> bool {
        matches_process(&self.name, process_name)
            || self
                .exe
                .as_deref()
                .is_some_and(|exe| matches_process(exe, process_name))
    }
}

/// 启动游戏并通过 `sysinfo` 查询、结束游戏进程。
pub struct ProcessSession {
    steam_path: Option<PathBuf>,
    steam_launch_options: Option<String>,
    system: System,
}

impl ProcessSession {
    pub fn new(settings: &Settings) -> Self {
        Self {
            steam_path: settings.steam_path.clone(),
            steam_launch_options: settings.steam_launch_options.clone(),
            system: System::new(),
        }
    }

    pub fn launch_command(&self, game: &GameDefinition) -> Result<LaunchCommand> {
        let extra = game
            .launch_options
            .as_ref()
            .map(LaunchOptions::args)
            .unwrap_or_default();

        if game.platform == Platform::Steam {
            let app_id = game
                .app_id
                .as_ref()
                .ok_or_else(|| anyhow!("{} 是 Steam 游戏但没有 app_id", game.name))?;
            let steam_dir = self
                .steam_path
                .as_ref()
                .ok_or_else(|| anyhow!("配置中未设置 steam_path"))?;
            let exe = if cfg!(windows) { "steam.exe" } else { "steam" };

            let mut args: Vec<String> = self
                .steam_launch_options
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            args.push("-applaunch".into());
            args.push(app_id.to_string());
            args.extend(extra);
            return Ok(LaunchCommand {
                program: steam_dir.join(exe),
                args,
            });
        }

        let exe = game
            .exe_name
            .as_ref()
            .ok_or_else(|| anyhow!("{} 没有 exe_name", game.name))?;
        let program = match &game.install_dir {
            Some(dir) => dir.join(exe),
            None => PathBuf::from(exe),
        };
        Ok(LaunchCommand {
            program,
            args: extra,
        })
    }

    fn processes(&mut self) -> Vec<ProcessEntry> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );
        self.system
            .processes()
            .values()
            .map(|p| ProcessEntry {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                exe: p
                    .exe()
                    .and_then(|path| path.file_name())
                    .map(|name| name.to_string_lossy().into_owned()),
            })
            .collect()
    }

    fn kill(&self, pid: u32, force: bool) -> Result<()> {
        let Some(process) = self.system.process(Pid::from_u32(pid)) else {
            // 枚举之后已经退出
            return Ok(());
        };
        let sent = if force {
            process.kill()
        } else {
            // 不支持 SIGTERM 的平台（Windows）退回到直接结束
            process
                .kill_with(Signal::Term)
                .unwrap_or_else(|| process.kill())
        };
        if !sent {
            bail!("结束进程 {pid} 失败");
        }
        Ok(())
    }
}

impl GameSession for ProcessSession {
    fn launch(&mut self, game: &GameDefinition) -> Result<()> {
        let cmd = self.launch_command(game)?;
        info!(program = %cmd.program.display(), args = ?cmd.args, "启动游戏");
        Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("无法启动 {}", cmd.program.display()))?;
        Ok(())
    }

    fn is_running(&mut self, process_name: &str) -> Result<bool> {
        let running = self.processes().iter().any(|p| p.matches(process_name));
        debug!(process_name, running, "进程检查");
        Ok(running)
    }

    fn terminate(&mut self, process_name: &str, force: bool) -> Result<bool> {
        let targets: Vec<ProcessEntry> = self
            .processes()
            .into_iter()
            .filter(|p| p.matches(process_name))
            .collect();
        if targets.is_empty() {
            warn!(process_name, "没有找到要结束的进程");
            return Ok(false);
        }
        for p in &targets {
            info!(pid = p.pid, name = %p.name, force, "结束进程");
            self.kill(p.pid, force)?;
        }
        Ok(true)
    }
}

/// 进程名的候选写法：原样、补 `.exe`、去掉 `.exe`，全部小写。
pub fn name_variants(process_name: &str) -> Vec<String> {
    let lower = process_name.trim().to_lowercase();
    let stem = lower.strip_suffix(".exe").unwrap_or(&lower).to_string();
    let mut variants = vec![lower.clone(), format!("{stem}.exe"), stem];
    variants.dedup();
    variants.sort();
    variants.dedup();
    variants
}

/// 系统报告的进程名是否对应 `process_name`（不区分大小写，子串匹配）。
///
/// Linux 的 `comm` 最多 15 个字符，被截断的名字按前缀比较。
pub fn matches_process(reported: &str, process_name: &str) -> bool {
    let reported = reported.trim().to_lowercase();
    if reported.is_empty() {
        return false;
    }
    name_variants(process_name).iter().any(|v| {
        reported.contains(v.as_str()) || (reported.chars().count() == 15 && v.starts_with(&reported))
    })
}
