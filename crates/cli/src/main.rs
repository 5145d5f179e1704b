//! `relive`: compile units from source and live-reload them into a host process.

mod cli;

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{Cli, Command};
use relive_capability::{Capability, DylibLoader, Runtime};
use relive_pipeline::{ReloadConfig, ReloadError, ReloadPipeline, Reloaded, Toolchain};
use relive_primitives::{Artifact, UnitId};

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	setup_tracing(cli.verbose);

	let config = match &cli.config {
		Some(path) => ReloadConfig::load(path)?,
		None => ReloadConfig::discover()?,
	};

	match cli.command {
		Command::Check => check(&config),
		Command::Compile { unit } => compile(&config, &unit),
		Command::Host { units } => host(&config, units),
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("RELIVE_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("relive=trace,debug")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(verbose)
		.init();
}

fn check(config: &ReloadConfig) -> anyhow::Result<()> {
	let pipeline = ReloadPipeline::from_config(config, None)?;
	let layout = pipeline.layout();
	println!("source root:  {}", layout.root().display());
	println!("source ext:   {}", layout.source_extension());
	println!("artifact ext: {}", pipeline.toolchain().artifact_extension());
	println!("toolchain:    {} {}", config.toolchain.program, config.toolchain.args.join(" "));
	for unit in &config.units {
		let source = pipeline.source_path(unit);
		let state = if source.is_file() { "ok" } else { "missing" };
		println!("unit {unit}: {} ({state})", source.display());
	}
	Ok(())
}

fn compile(config: &ReloadConfig, unit: &UnitId) -> anyhow::Result<()> {
	let pipeline = ReloadPipeline::from_config(config, None)?;
	let compilation = pipeline.compile(unit)?;
	std::io::stderr().write_all(&compilation.diagnostics)?;
	if !compilation.succeeded() {
		bail!("compiling {unit} failed with status {:?}", compilation.status);
	}
	println!("{}", pipeline.artifact_path(unit).display());
	Ok(())
}

fn host(config: &ReloadConfig, units: Vec<UnitId>) -> anyhow::Result<()> {
	let units = if units.is_empty() { config.units.clone() } else { units };
	if units.is_empty() {
		bail!("no units to host; name them on the command line or in `units`");
	}

	let runtime = Arc::new(Runtime::new(DylibLoader::new().context("creating library staging directory")?));
	relive_capability::install(Capability::new(Arc::clone(&runtime))).context("installing redefinition capability")?;
	let pipeline = ReloadPipeline::from_config(config, relive_capability::installed())?;

	for unit in &units {
		let compilation = pipeline.compile(unit)?;
		if !compilation.succeeded() {
			bail!("compiling {unit} failed:\n{}", compilation.diagnostics_text());
		}
		let path = pipeline.artifact_path(unit);
		let artifact = Artifact::read(&path).with_context(|| format!("reading {}", path.display()))?;
		let loaded = runtime.load(unit.clone(), &artifact)?;
		tracing::debug!(%unit, path = %path.display(), bytes = artifact.len(), "host.loaded");
		println!("loaded {unit} (generation {})", loaded.generation());
	}

	eprintln!("hosting {} unit(s); enter a unit name to reload it", units.len());
	for line in std::io::stdin().lock().lines() {
		let line = line.context("reading stdin")?;
		let name = line.trim();
		if name.is_empty() {
			continue;
		}
		let unit = match name.parse::<UnitId>() {
			Ok(unit) => unit,
			Err(err) => {
				eprintln!("{err}");
				continue;
			}
		};
		println!("{}", describe(&unit, &pipeline.reload(&unit)));
	}
	Ok(())
}

fn describe(unit: &UnitId, outcome: &Result<Reloaded, ReloadError>) -> String {
	match outcome {
		Ok(reloaded) => format!(
			"reloaded {unit} (generation {}, {} bytes, {} ms)",
			reloaded.generation,
			reloaded.artifact_len,
			reloaded.elapsed.as_millis()
		),
		Err(err) => format!("failed {unit} [{}]: {err}", err.kind()),
	}
}
