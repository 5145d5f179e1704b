//! External compiler toolchains.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::ToolchainConfig;

/// Result of one toolchain run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation {
	/// Exit status; `None` when the toolchain was killed by a signal.
	pub status: Option<i32>,
	/// Diagnostic stream, byte for byte.
	pub diagnostics: Vec<u8>,
	/// Regular output, byte for byte.
	pub output: Vec<u8>,
}

impl Compilation {
	pub fn succeeded(&self) -> bool {
		self.status == Some(0)
	}

	/// Diagnostics for display. Invalid UTF-8 is replaced.
	pub fn diagnostics_text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.diagnostics)
	}
}

/// Failure to run the toolchain, as opposed to the toolchain rejecting a source.
#[derive(Debug, Error)]
pub enum ToolchainError {
	#[error("compiler {program:?} not found on PATH")]
	NotFound {
		program: OsString,
		#[source]
		source: which::Error,
	},

	#[error("failed to start {program}")]
	Spawn {
		program: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed waiting for {program}")]
	Wait {
		program: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("compilation cancelled")]
	Cancelled,
}

/// Turns one source file into an artifact written next to it.
///
/// Implementations block until the compiler finishes or `cancel` fires.
pub trait Toolchain: Send + Sync {
	/// Extension of the artifact written beside the source, without the dot.
	fn artifact_extension(&self) -> &str;

	fn compile(&self, source: &Path, cancel: &CancellationToken) -> Result<Compilation, ToolchainError>;
}

/// Runs an external compiler program.
///
/// Arguments are templates: `{source}` expands to the absolute source path,
/// `{artifact}` to the artifact path beside it, `{dir}` to the directory
/// holding both. Standard error is captured as diagnostics.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
	program: PathBuf,
	args: Vec<String>,
	artifact_extension: String,
	poll_interval: Duration,
}

impl CommandToolchain {
	/// Resolves `program` on `PATH` now, so a missing compiler is reported
	/// before the first reload rather than during it.
	pub fn new(program: impl AsRef<OsStr>, args: Vec<String>, artifact_extension: impl Into<String>) -> Result<Self, ToolchainError> {
		let program = program.as_ref();
		let resolved = which::which(program).map_err(|source| ToolchainError::NotFound {
			program: program.to_owned(),
			source,
		})?;
		Ok(Self {
			program: resolved,
			args,
			artifact_extension: artifact_extension.into(),
			poll_interval: Duration::from_millis(10),
		})
	}

	pub fn from_config(config: &ToolchainConfig) -> Result<Self, ToolchainError> {
		Self::new(&config.program, config.args.clone(), config.artifact_extension.clone())
	}

	pub fn program(&self) -> &Path {
		&self.program
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}

	/// How often a running compiler is checked for exit and cancellation.
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	fn expand(&self, source: &Path, artifact: &Path, dir: &Path) -> Vec<OsString> {
		self.args
			.iter()
			.map(|arg| match arg.as_str() {
				"{source}" => source.as_os_str().to_owned(),
				"{artifact}" => artifact.as_os_str().to_owned(),
				"{dir}" => dir.as_os_str().to_owned(),
				_ => arg
					.replace("{source}", &source.to_string_lossy())
					.replace("{artifact}", &artifact.to_string_lossy())
					.replace("{dir}", &dir.to_string_lossy())
					.into(),
			})
			.collect()
	}

	fn wait(&self, child: &mut Child, cancel: &CancellationToken) -> Result<ExitStatus, ToolchainError> {
		loop {
			match child.try_wait() {
				Ok(Some(status)) => return Ok(status),
				Ok(None) => {}
				Err(source) => {
					return Err(ToolchainError::Wait {
						program: self.program.clone(),
						source,
					});
				}
			}
			if cancel.is_cancelled() {
				kill_tree(child);
				let _ = child.wait();
				tracing::debug!(program = %self.program.display(), "toolchain.killed");
				return Err(ToolchainError::Cancelled);
			}
			std::thread::sleep(self.poll_interval);
		}
	}
}

impl Toolchain for CommandToolchain {
	fn artifact_extension(&self) -> &str {
		&self.artifact_extension
	}

	fn compile(&self, source: &Path, cancel: &CancellationToken) -> Result<Compilation, ToolchainError> {
		if cancel.is_cancelled() {
			return Err(ToolchainError::Cancelled);
		}

		let artifact = source.with_extension(&self.artifact_extension);
		let dir = source.parent().unwrap_or(Path::new("."));
		let args = self.expand(source, &artifact, dir);
		tracing::debug!(program = %self.program.display(), ?args, "toolchain.spawn");

		let mut command = Command::new(&self.program);
		command
			.args(&args)
			.current_dir(dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());
		#[cfg(unix)]
		std::os::unix::process::CommandExt::process_group(&mut command, 0);
		let mut child = command.spawn().map_err(|source| ToolchainError::Spawn {
			program: self.program.clone(),
			source,
		})?;

		// Drain both pipes while waiting so a chatty compiler cannot block on a full pipe.
		let stdout = child.stdout.take().map(drain);
		let stderr = child.stderr.take().map(drain);
		// On failure the drains are left detached: a helper the compiler
		// forked may still hold the pipes open.
		let status = self.wait(&mut child, cancel)?;
		let output = collect(stdout);
		let diagnostics = collect(stderr);

		tracing::debug!(program = %self.program.display(), status = ?status.code(), "toolchain.exit");
		Ok(Compilation {
			status: status.code(),
			diagnostics,
			output,
		})
	}
}

/// Kills the compiler and, on unix, every process in its group.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
	use nix::sys::signal::{Signal, killpg};
	use nix::unistd::Pid;

	if let Ok(pid) = i32::try_from(child.id()) {
		let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
	}
	let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
	let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<Vec<u8>> {
	std::thread::spawn(move || {
		let mut buf = Vec::new();
		let _ = pipe.read_to_end(&mut buf);
		buf
	})
}

fn collect(reader: Option<std::thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
	reader.and_then(|handle| handle.join().ok()).unwrap_or_default()
}
