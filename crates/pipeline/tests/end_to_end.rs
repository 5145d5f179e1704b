//! Reloads through a real child-process toolchain. The "compiler" is a shell
//! script that copies the source to the artifact path, or fails with the
//! source's `#error` lines on stderr.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use relive_capability::testing::{TextDefinition, TextLoader, text_artifact};
use relive_capability::{Capability, Incompatibility, Runtime, UnitRef};
use relive_pipeline::{CommandToolchain, ErrorKind, ReloadConfig, ReloadError, ReloadPipeline, Stage, spawn_reload};
use relive_primitives::UnitId;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const COMPILER: &str = r#"
if grep -q '^#error' "$1"; then
	grep '^#error' "$1" | sed 's/^#error //' >&2
	exit 1
fi
grep -v '^#' "$1" > "$2"
"#;

struct Host {
	dir: TempDir,
	runtime: Arc<Runtime<TextLoader>>,
	pipeline: Arc<ReloadPipeline>,
}

impl Host {
	fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let toolchain = CommandToolchain::new(
			"sh",
			vec!["-c".into(), COMPILER.into(), "compile".into(), "{source}".into(), "{artifact}".into()],
			"art",
		)
		.unwrap();
		let runtime = Arc::new(Runtime::new(TextLoader::new()));
		let layout = relive_primitives::SourceLayout::new(dir.path().join("src"), "txt");
		let pipeline = ReloadPipeline::new(layout, Arc::new(toolchain), Some(Capability::new(Arc::clone(&runtime))));
		Self {
			dir,
			runtime,
			pipeline: Arc::new(pipeline),
		}
	}

	fn load(&self, name: &str, layout: u64, body: &str) -> UnitRef<TextDefinition> {
		self.runtime.load(unit(name), &text_artifact(layout, body)).unwrap()
	}

	fn edit(&self, name: &str, text: &str) {
		let path = self.pipeline.source_path(&unit(name));
		std::fs::create_dir_all(path.parent().unwrap()).unwrap();
		std::fs::write(path, text).unwrap();
	}

	fn src(&self) -> &Path {
		self.dir.path()
	}
}

fn unit(name: &str) -> UnitId {
	UnitId::new(name).unwrap()
}

#[test]
fn edited_body_becomes_visible_to_existing_holders() {
	let host = Host::new();
	let greeter = host.load("a.b.Foo", 7, "return 1");
	host.edit("a.b.Foo", "# edited\nlayout=7\nbody=return 2\n");

	let reloaded = host.pipeline.reload(&unit("a.b.Foo")).unwrap();

	assert_eq!(greeter.current().body, "return 2");
	assert_eq!(reloaded.generation, greeter.generation());
	assert!(host.src().join("src/a/b/Foo.art").is_file());
}

#[test]
fn missing_source_fails_without_compiling() {
	let host = Host::new();
	host.load("a.b.Foo", 7, "return 1");

	let err = host.pipeline.reload(&unit("a.b.Foo")).unwrap_err();

	assert!(matches!(&err, ReloadError::SourceNotFound { path, .. } if path.ends_with("a/b/Foo.txt")));
	assert!(!host.src().join("src/a/b/Foo.art").exists());
	assert_eq!(host.runtime.loader().calls().len(), 1);
}

#[test]
fn compiler_stderr_is_reported_verbatim() {
	let host = Host::new();
	let greeter = host.load("a.b.Foo", 7, "return 1");
	host.edit("a.b.Foo", "#error Foo.txt:3: ';' expected\nlayout=7\nbody=return 2\n");

	let err = host.pipeline.reload(&unit("a.b.Foo")).unwrap_err();

	match &err {
		ReloadError::CompileFailed { status, diagnostics, .. } => {
			assert_eq!(*status, Some(1));
			assert_eq!(diagnostics, b"Foo.txt:3: ';' expected\n");
		}
		other => panic!("expected CompileFailed, got {other:?}"),
	}
	assert_eq!(greeter.current().body, "return 1");

	// Fixing the source is all a retry needs.
	host.edit("a.b.Foo", "layout=7\nbody=return 2\n");
	host.pipeline.reload(&unit("a.b.Foo")).unwrap();
	assert_eq!(greeter.current().body, "return 2");
}

#[test]
fn layout_change_is_refused_and_old_body_kept() {
	let host = Host::new();
	let greeter = host.load("a.b.Foo", 7, "return 1");
	host.edit("a.b.Foo", "layout=8\nbody=return 2\n");

	let err = host.pipeline.reload(&unit("a.b.Foo")).unwrap_err();

	assert_eq!(err.kind(), ErrorKind::IncompatibleRedefinition);
	assert!(matches!(
		err,
		ReloadError::IncompatibleRedefinition {
			reason: Incompatibility::LayoutChanged { loaded: 7, offered: 8 },
			..
		}
	));
	assert_eq!(greeter.current().body, "return 1");
}

#[test]
fn compile_only_leaves_runtime_untouched() {
	let host = Host::new();
	let greeter = host.load("a.Foo", 1, "v1");
	host.edit("a.Foo", "layout=1\nbody=v2\n");

	let compilation = host.pipeline.compile(&unit("a.Foo")).unwrap();

	assert!(compilation.succeeded());
	assert_eq!(greeter.current().body, "v1");
	assert_eq!(std::fs::read_to_string(host.src().join("src/a/Foo.art")).unwrap(), "layout=1\nbody=v2\n");
}

#[test]
fn config_builds_working_pipeline() {
	let dir = tempfile::tempdir().unwrap();
	let config_path = dir.path().join("relive.toml");
	std::fs::write(
		&config_path,
		r#"
		source_root = "units"
		source_extension = "txt"

		[toolchain]
		program = "sh"
		args = ["-c", "cp \"$1\" \"$2\"", "compile", "{source}", "{artifact}"]
		artifact_extension = "art"
		"#,
	)
	.unwrap();
	let config = ReloadConfig::load(&config_path).unwrap();
	let runtime = Arc::new(Runtime::new(TextLoader::new()));
	let pipeline = ReloadPipeline::from_config(&config, Some(Capability::new(Arc::clone(&runtime)))).unwrap();
	let held = runtime.load(unit("x.Y"), &text_artifact(1, "old")).unwrap();

	std::fs::create_dir_all(dir.path().join("units/x")).unwrap();
	std::fs::write(dir.path().join("units/x/Y.txt"), "body=new\n").unwrap();
	pipeline.reload(&unit("x.Y")).unwrap();

	assert_eq!(held.current().body, "new");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_task_kills_compiler_and_keeps_definition() {
	let dir = tempfile::tempdir().unwrap();
	let toolchain = CommandToolchain::new("sh", vec!["-c".into(), "exec sleep 30".into()], "art").unwrap();
	let runtime = Arc::new(Runtime::new(TextLoader::new()));
	let pipeline = Arc::new(ReloadPipeline::new(
		relive_primitives::SourceLayout::new(dir.path(), "txt"),
		Arc::new(toolchain),
		Some(Capability::new(Arc::clone(&runtime))),
	));
	let held = runtime.load(unit("a.Foo"), &text_artifact(1, "old")).unwrap();
	std::fs::create_dir_all(dir.path().join("a")).unwrap();
	std::fs::write(dir.path().join("a/Foo.txt"), "body=new\n").unwrap();

	let task = spawn_reload(pipeline, unit("a.Foo"), CancellationToken::new());
	tokio::time::sleep(std::time::Duration::from_millis(100)).await;
	let started = std::time::Instant::now();
	task.cancel();
	let err = task.join().await.unwrap_err();

	assert!(matches!(err, ReloadError::Cancelled { stage: Stage::Compiling, .. }));
	assert!(started.elapsed() < std::time::Duration::from_secs(10));
	assert_eq!(held.current().body, "old");
}
