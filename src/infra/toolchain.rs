//! Shell toolchain
//!
//! Drives autotools, CMake and Meson builds through `std::process::Command`.
//! Command output is appended to the component's log file rather than shown
//! on the terminal; a failure names the log file.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::component::BuildSystem;
use crate::core::host::{BuildContext, Toolchain, ToolchainError};

/// One command to run for a sub-step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
}

impl CommandSpec {
    fn new(program: &str, cwd: &Path) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
        }
    }

    fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Commands for the configure sub-step
pub fn configure_commands(ctx: &BuildContext, flags: &[String]) -> Vec<CommandSpec> {
    let prefix = ctx.env.prefix.display().to_string();
    let bin_dir = ctx.env.bin_dir.display().to_string();

    match ctx.system {
        BuildSystem::Autotools { ref bootstrap } => {
            let mut commands = Vec::new();
            if let Some(script) = bootstrap {
                commands.push(
                    CommandSpec::new("sh", &ctx.source_dir)
                        .arg("-c")
                        .arg(script.as_str()),
                );
            }
            let mut configure =
                CommandSpec::new("./configure", &ctx.source_dir).arg(format!("--prefix={prefix}"));
            if ctx.installs_binaries {
                configure = configure.arg(format!("--bindir={bin_dir}"));
            }
            commands.push(configure.args(flags.iter().cloned()));
            commands
        }
        BuildSystem::CMake => {
            let mut cmake = CommandSpec::new("cmake", &ctx.source_dir)
                .arg("-S")
                .arg(ctx.source_dir.display().to_string())
                .arg("-B")
                .arg(ctx.build_dir.display().to_string())
                .arg(format!("-DCMAKE_INSTALL_PREFIX={prefix}"))
                .arg("-DCMAKE_BUILD_TYPE=Release");
            if ctx.installs_binaries {
                cmake = cmake.arg(format!("-DCMAKE_INSTALL_BINDIR={bin_dir}"));
            }
            vec![cmake.args(flags.iter().cloned())]
        }
        BuildSystem::Meson => {
            let mut setup = CommandSpec::new("meson", &ctx.source_dir)
                .arg("setup")
                .arg(ctx.build_dir.display().to_string())
                .arg(ctx.source_dir.display().to_string())
                .arg(format!("--prefix={prefix}"))
                .arg("--libdir=lib")
                .arg("--buildtype=release");
            // meson refuses to set up an existing build dir without this
            if ctx.build_dir.join("meson-private").exists() {
                setup = setup.arg("--reconfigure");
            }
            vec![setup.args(flags.iter().cloned())]
        }
    }
}

/// Commands for the build sub-step
pub fn build_commands(ctx: &BuildContext, jobs: usize) -> Vec<CommandSpec> {
    let jobs = jobs.max(1).to_string();
    match ctx.system {
        BuildSystem::Autotools { .. } => {
            vec![CommandSpec::new("make", &ctx.source_dir).arg("-j").arg(jobs)]
        }
        BuildSystem::CMake => vec![CommandSpec::new("cmake", &ctx.source_dir)
            .arg("--build")
            .arg(ctx.build_dir.display().to_string())
            .arg("-j")
            .arg(jobs)],
        BuildSystem::Meson => vec![CommandSpec::new("meson", &ctx.source_dir)
            .arg("compile")
            .arg("-C")
            .arg(ctx.build_dir.display().to_string())
            .arg("-j")
            .arg(jobs)],
    }
}

/// Commands for the install sub-step
pub fn install_commands(ctx: &BuildContext) -> Vec<CommandSpec> {
    match ctx.system {
        BuildSystem::Autotools { .. } => {
            vec![CommandSpec::new("make", &ctx.source_dir).arg("install")]
        }
        BuildSystem::CMake => vec![CommandSpec::new("cmake", &ctx.source_dir)
            .arg("--install")
            .arg(ctx.build_dir.display().to_string())],
        BuildSystem::Meson => vec![CommandSpec::new("meson", &ctx.source_dir)
            .arg("install")
            .arg("-C")
            .arg(ctx.build_dir.display().to_string())],
    }
}

/// Toolchain running real build tools
#[derive(Debug, Clone, Default)]
pub struct ShellToolchain;

impl ShellToolchain {
    /// Create a new shell toolchain
    pub fn new() -> Self {
        Self
    }

    fn run_all(&self, ctx: &BuildContext, commands: &[CommandSpec]) -> Result<(), ToolchainError> {
        if !matches!(ctx.system, BuildSystem::Autotools { .. }) {
            fs::create_dir_all(&ctx.build_dir).map_err(|e| ToolchainError::Io {
                path: ctx.build_dir.clone(),
                error: e.to_string(),
            })?;
        }
        for command in commands {
            run_logged(command, ctx)?;
        }
        Ok(())
    }
}

impl Toolchain for ShellToolchain {
    fn configure(&self, ctx: &BuildContext, flags: &[String]) -> Result<(), ToolchainError> {
        self.run_all(ctx, &configure_commands(ctx, flags))
    }

    fn build(&self, ctx: &BuildContext, jobs: usize) -> Result<(), ToolchainError> {
        self.run_all(ctx, &build_commands(ctx, jobs))
    }

    fn install(&self, ctx: &BuildContext) -> Result<(), ToolchainError> {
        self.run_all(ctx, &install_commands(ctx))
    }
}

/// Run `command` with the build environment, appending output to the log
pub fn run_logged(command: &CommandSpec, ctx: &BuildContext) -> Result<(), ToolchainError> {
    let mut log = open_log(&ctx.log_file)?;
    let io_error = |e: std::io::Error| ToolchainError::Io {
        path: ctx.log_file.clone(),
        error: e.to_string(),
    };

    writeln!(log, "$ {command}").map_err(io_error)?;
    let stdout = log.try_clone().map_err(io_error)?;
    let stderr = log.try_clone().map_err(io_error)?;

    debug!("{}: running {command} in {}", ctx.component, command.cwd.display());
    let status = Command::new(&command.program)
        .args(&command.args)
        .current_dir(&command.cwd)
        .envs(ctx.env.to_env_map())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .status()
        .map_err(|e| ToolchainError::Spawn {
            command: command.to_string(),
            error: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(ToolchainError::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
            log: ctx.log_file.display().to_string(),
        })
    }
}

fn open_log(path: &Path) -> Result<File, ToolchainError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ToolchainError::Io {
            path: parent.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ToolchainError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
}
