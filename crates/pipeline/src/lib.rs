//! Reload pipeline: recompile one unit from source and swap it into the running process.
//!
//! A reload attempt walks `Locating → Compiling → ReadingArtifact → Resolving
//! → Redefining` and ends either in a [`Reloaded`] receipt or a
//! [`ReloadError`] naming the stage that failed. Nothing is retried; the
//! caller decides whether a fix warrants another attempt.
//!
//! Attempts for the same unit are serialized because the pipeline and the
//! toolchain hand artifacts over through fixed file paths. Attempts for
//! different units run concurrently.

pub mod config;
mod error;
mod locks;
mod pipeline;
pub mod toolchain;
mod worker;

pub use config::{ConfigError, ReloadConfig, ToolchainConfig};
pub use error::{ErrorKind, ReloadError, Stage};
pub use pipeline::{ReloadPipeline, Reloaded};
pub use toolchain::{CommandToolchain, Compilation, Toolchain, ToolchainError};
pub use worker::{ReloadTask, spawn_reload};
