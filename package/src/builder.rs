//! Build pipeline driving CMake and the generated build
//!
//! Phases run strictly in order: configure, build, check, install and the
//! post-install hook. Every external command goes through a [`BuildTool`] so
//! the pipeline can be exercised without a compiler.

use crate::cmake::{configure_args, Generator};
use crate::config::Config;
use crate::package::Package;
use crate::resolver::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

/// A single command to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of an invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs invocations
#[async_trait]
pub trait BuildTool: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs invocations as child processes
#[derive(Debug, Clone, Default)]
pub struct CommandTool;

#[async_trait]
impl BuildTool for CommandTool {
    async fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("Running: {} (in {})", invocation, invocation.cwd.display());

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Paths of the external programs used by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cmake: PathBuf,
    pub build_program: PathBuf,
    pub generator: Generator,
}

impl Toolchain {
    /// Locate tools from config, falling back to `PATH`
    pub fn locate(config: &Config, generator: Generator) -> Result<Self> {
        let cmake = find_tool(config.cmake_path.as_deref(), "cmake")?;
        let configured = match generator {
            Generator::Ninja => config.ninja_path.as_deref(),
            Generator::UnixMakefiles => None,
        };
        let build_program = find_tool(configured, generator.build_program())?;

        Ok(Self {
            cmake,
            build_program,
            generator,
        })
    }
}

fn find_tool(configured: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }
    which::which(name).map_err(|_| match configured {
        Some(path) => Error::ToolNotFound(format!("{} not found at {:?} or in PATH", name, path)),
        None => Error::ToolNotFound(format!("{} not found in PATH", name)),
    })
}

/// Options for a single build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub prefix: PathBuf,
    pub jobs: usize,
    pub build_type: String,
}

/// Build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configure,
    Build,
    Check,
    Install,
    AfterInstall,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Configure => "configure",
            Phase::Build => "build",
            Phase::Check => "check",
            Phase::Install => "install",
            Phase::AfterInstall => "after_install",
        };
        write!(f, "{}", name)
    }
}

/// State handed to package phase hooks
pub struct PhaseContext<'a> {
    package: &'a str,
    build_dir: &'a Path,
    prefix: &'a Path,
    toolchain: &'a Toolchain,
    tool: &'a dyn BuildTool,
    run_tests: bool,
}

impl<'a> PhaseContext<'a> {
    pub fn run_tests(&self) -> bool {
        self.run_tests
    }

    pub fn build_dir(&self) -> &Path {
        self.build_dir
    }

    pub fn prefix(&self) -> &Path {
        self.prefix
    }

    /// Run the generated build's `target` from the build directory
    pub async fn run_build_target(&self, target: &str) -> Result<ToolOutput> {
        self.run(&self.toolchain.build_program, vec![target.to_string()]).await
    }

    /// Run a program in the build directory, failing the build on a non-zero exit
    pub async fn run(&self, program: &Path, args: Vec<String>) -> Result<ToolOutput> {
        let invocation = Invocation {
            program: program.to_path_buf(),
            args,
            cwd: self.build_dir.to_path_buf(),
        };

        let output = self.tool.run(&invocation).await?;
        if !output.success {
            error!("Command failed: {}", invocation);
            return Err(Error::BuildFailed {
                package: self.package.to_string(),
                message: format!(
                    "'{}' exited with {}: {}",
                    invocation,
                    output
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string()),
                    last_lines(&output.stderr, 20)
                ),
            });
        }
        Ok(output)
    }
}

fn last_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Summary of a completed build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub package: String,
    pub prefix: PathBuf,
    pub phases: Vec<Phase>,
    pub duration: Duration,
}

/// Runs the build pipeline for a resolved package
pub struct Builder<'a> {
    toolchain: &'a Toolchain,
    tool: &'a dyn BuildTool,
}

impl<'a> Builder<'a> {
    pub fn new(toolchain: &'a Toolchain, tool: &'a dyn BuildTool) -> Self {
        Self { toolchain, tool }
    }

    pub async fn build<P: Package + ?Sized>(
        &self,
        package: &P,
        resolution: &Resolution,
        opts: &BuildOptions,
    ) -> Result<BuildReport> {
        let start = Instant::now();
        let name = resolution.spec.name.clone();

        if resolution.generator != self.toolchain.generator {
            return Err(Error::ConfigError(format!(
                "{} uses the {} generator but the toolchain drives {}",
                name,
                resolution.generator.cmake_name(),
                self.toolchain.generator.cmake_name()
            )));
        }

        info!("Building {} in {}", resolution.spec, opts.build_dir.display());
        tokio::fs::create_dir_all(&opts.build_dir).await?;

        let ctx = PhaseContext {
            package: &name,
            build_dir: &opts.build_dir,
            prefix: &opts.prefix,
            toolchain: self.toolchain,
            tool: self.tool,
            run_tests: resolution.spec.run_tests,
        };
        let mut phases = Vec::new();

        info!("Phase {}", Phase::Configure);
        let args = configure_args(
            &opts.source_dir,
            &opts.prefix,
            &opts.build_type,
            resolution.generator,
            &resolution.defines,
        );
        ctx.run(&self.toolchain.cmake, args).await?;
        phases.push(Phase::Configure);

        info!("Phase {}", Phase::Build);
        ctx.run(
            &self.toolchain.build_program,
            vec!["-j".to_string(), opts.jobs.max(1).to_string()],
        )
        .await?;
        phases.push(Phase::Build);

        info!("Phase {}", Phase::Check);
        package.check(&ctx).await?;
        phases.push(Phase::Check);

        info!("Phase {}", Phase::Install);
        ctx.run_build_target("install").await?;
        phases.push(Phase::Install);

        info!("Phase {}", Phase::AfterInstall);
        package.after_install(&ctx).await?;
        phases.push(Phase::AfterInstall);

        let duration = start.elapsed();
        info!("Installed {} to {} in {:?}", name, opts.prefix.display(), duration);

        Ok(BuildReport {
            package: name,
            prefix: opts.prefix.clone(),
            phases,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(last_lines("a", 5), "a");
        assert_eq!(last_lines("", 5), "");
    }

    #[test]
    fn test_find_tool_reports_missing() {
        let err = find_tool(
            Some(Path::new("/nonexistent/bin/tool")),
            "definitely-not-a-real-tool-name",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_command_tool_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = CommandTool
            .run(&Invocation {
                program: PathBuf::from("sh"),
                args: vec!["-c".to_string(), "echo hello; exit 3".to_string()],
                cwd: dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
    }
}
