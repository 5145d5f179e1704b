//! Builds the demo unit with `rustc` and drives a real library through the runtime.
//! Skipped when no `rustc` is on `PATH`.

use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use relive_capability::{BootstrapError, CapabilityError, DylibDefinition, DylibLoader, Incompatibility, Redefine, Runtime, UnitRef};
use relive_primitives::{Artifact, UnitId};

#[repr(C)]
struct GreeterV1 {
	greet: extern "C" fn() -> *const core::ffi::c_char,
}

fn demo_source() -> String {
	let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/units/demo/greeter.rs");
	std::fs::read_to_string(path).unwrap()
}

fn build(dir: &Path, name: &str, source: &str) -> Option<Artifact> {
	let rustc = which::which("rustc").ok()?;
	let src = dir.join(format!("{name}.rs"));
	let out: PathBuf = dir.join(format!("{name}.{}", std::env::consts::DLL_EXTENSION));
	std::fs::write(&src, source).unwrap();
	let status = Command::new(rustc)
		.args(["--edition", "2024", "--crate-type", "cdylib", "-o"])
		.arg(&out)
		.arg(&src)
		.status()
		.unwrap();
	assert!(status.success(), "rustc failed for {name}");
	Some(Artifact::read(&out).unwrap())
}

fn staged_files(loader: &DylibLoader) -> usize {
	std::fs::read_dir(loader.staging_dir()).unwrap().count()
}

fn greeting(unit: &UnitRef<DylibDefinition>) -> String {
	let current = unit.current();
	let table = unsafe { current.vtable::<GreeterV1>() };
	unsafe { CStr::from_ptr((table.greet)()) }.to_str().unwrap().to_owned()
}

#[test]
fn redefines_a_real_library_in_place() {
	let dir = tempfile::tempdir().unwrap();
	let source = demo_source();
	let Some(first) = build(dir.path(), "v1", &source) else {
		eprintln!("rustc not found, skipping");
		return;
	};

	let runtime = Runtime::new(DylibLoader::new().unwrap());
	let unit = UnitId::new("demo.greeter").unwrap();
	let held = runtime.load(unit.clone(), &first).unwrap();
	assert_eq!(greeting(&held), "hello from demo.greeter");

	let edited = source.replace("hello from demo.greeter", "edited greeting");
	let second = build(dir.path(), "v2", &edited).unwrap();
	runtime.redefine(&unit, &second).unwrap();
	assert_eq!(greeting(&held), "edited greeting");
	assert_eq!(runtime.loader().pinned(), 2);

	let reshaped = source.replace("0x6772_6565_7465_7201", "0x6772_6565_7465_7202");
	let third = build(dir.path(), "v3", &reshaped).unwrap();
	let err = runtime.redefine(&unit, &third).unwrap_err();
	assert!(matches!(
		err,
		CapabilityError::Unmodifiable {
			reason: Incompatibility::LayoutChanged { .. },
			..
		}
	));
	assert_eq!(greeting(&held), "edited greeting");
	assert_eq!(runtime.loader().pinned(), 2);
	assert_eq!(staged_files(runtime.loader()), 2);
}

#[test]
fn bytes_that_are_not_a_library_are_invalid() {
	let runtime = Runtime::new(DylibLoader::new().unwrap());
	let unit = UnitId::new("demo.greeter").unwrap();
	let garbage = Artifact::new(b"not a library".to_vec(), "<memory>");

	let err = runtime.load(unit, &garbage).unwrap_err();
	assert!(matches!(err, BootstrapError::InvalidArtifact { .. }));
	assert_eq!(runtime.loader().pinned(), 0);
	assert_eq!(staged_files(runtime.loader()), 0);
}
