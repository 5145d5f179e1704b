use std::sync::{Arc, OnceLock};

use relive_primitives::UnitId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ReloadError, ReloadPipeline, Reloaded, Stage};

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("relive-reload")
			.build()
			.expect("failed to build relive reload runtime")
	});
	runtime.handle().clone()
}

/// A reload running on the blocking pool.
#[derive(Debug)]
pub struct ReloadTask {
	unit: UnitId,
	cancel: CancellationToken,
	handle: JoinHandle<Result<Reloaded, ReloadError>>,
}

impl ReloadTask {
	pub fn unit(&self) -> &UnitId {
		&self.unit
	}

	/// Abandons the attempt unless its redefinition has already been issued.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}

	/// Waits for the outcome. A panic inside the pipeline is resumed here; a
	/// task the runtime dropped before it started reports
	/// [`ReloadError::Cancelled`] at [`Stage::Idle`].
	pub async fn join(self) -> Result<Reloaded, ReloadError> {
		match self.handle.await {
			Ok(outcome) => outcome,
			Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
			Err(_) => Err(ReloadError::Cancelled {
				unit: self.unit,
				stage: Stage::Idle,
			}),
		}
	}
}

/// Runs [`ReloadPipeline::reload_with`] off the caller's thread.
///
/// Works from inside or outside a tokio runtime. The returned task is
/// cancelled through `cancel` or [`ReloadTask::cancel`].
pub fn spawn_reload(pipeline: Arc<ReloadPipeline>, unit: UnitId, cancel: CancellationToken) -> ReloadTask {
	tracing::trace!(%unit, "reload.spawn_blocking");
	let task_unit = unit.clone();
	let task_cancel = cancel.clone();
	let handle = runtime_handle().spawn_blocking(move || pipeline.reload_with(&task_unit, &task_cancel));
	ReloadTask { unit, cancel, handle }
}
