//! Designated dispatch thread.
//!
//! All listener callbacks run on one thread. Work scheduled from that thread
//! runs inline; work scheduled from any other thread is queued and runs later
//! on the dispatch thread in submission order.
//!
//! # Example
//!
//! ```ignore
//! let dispatcher = Dispatcher::spawn("tether-dispatch")?;
//! dispatcher.schedule(|| println!("runs on the dispatch thread"));
//! dispatcher.flush();
//! ```
//!
//! Hosts that already own a main loop use [`Dispatcher::new`] and drive the
//! returned [`DispatchLoop`] themselves.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle used to marshal work onto the dispatch thread. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
	tx: mpsc::UnboundedSender<Job>,
	owner: Arc<OnceLock<ThreadId>>,
}

/// Receiving end of the dispatch queue. The thread that first drives it
/// becomes the designated dispatch thread.
pub struct DispatchLoop {
	rx: mpsc::UnboundedReceiver<Job>,
	owner: Arc<OnceLock<ThreadId>>,
}

impl Dispatcher {
	/// Creates a dispatcher whose loop the caller drives.
	pub fn new() -> (Self, DispatchLoop) {
		let (tx, rx) = mpsc::unbounded_channel();
		let owner = Arc::new(OnceLock::new());
		(
			Self {
				tx,
				owner: Arc::clone(&owner),
			},
			DispatchLoop { rx, owner },
		)
	}

	/// Creates a dispatcher backed by a dedicated, named thread.
	///
	/// The thread exits once every [`Dispatcher`] clone has been dropped.
	pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
		let (dispatcher, dispatch_loop) = Self::new();
		let name = name.into();
		thread::Builder::new().name(name.clone()).spawn(move || dispatch_loop.run())?;
		debug!(target: "tether.dispatch", thread = %name, "dispatch thread started");
		Ok(dispatcher)
	}

	/// Returns `true` when called on the designated dispatch thread.
	pub fn is_dispatch_thread(&self) -> bool {
		self.owner.get().is_some_and(|owner| *owner == thread::current().id())
	}

	/// Runs `job` now if on the dispatch thread, otherwise queues it.
	pub fn schedule(&self, job: impl FnOnce() + Send + 'static) {
		if self.is_dispatch_thread() {
			run_job(Box::new(job));
		} else {
			self.post(job);
		}
	}

	/// Queues `job` even when called on the dispatch thread.
	pub fn post(&self, job: impl FnOnce() + Send + 'static) {
		if self.tx.send(Box::new(job)).is_err() {
			warn!(target: "tether.dispatch", "dispatch loop stopped; dropping job");
		}
	}

	/// Blocks until every job queued before this call has run.
	///
	/// Returns immediately on the dispatch thread itself, or when the loop
	/// has stopped. Must not be called from inside an async runtime, and
	/// blocks forever if nobody drives the loop.
	pub fn flush(&self) {
		if self.is_dispatch_thread() {
			return;
		}
		let (tx, rx) = oneshot::channel::<()>();
		self.post(move || {
			let _ = tx.send(());
		});
		let _ = rx.blocking_recv();
	}
}

impl DispatchLoop {
	/// Binds the current thread and runs jobs until every [`Dispatcher`] is dropped.
	pub fn run(mut self) {
		self.bind();
		while let Some(job) = self.rx.blocking_recv() {
			run_job(job);
		}
		debug!(target: "tether.dispatch", "dispatch loop ended (all senders dropped)");
	}

	/// Runs whatever is queued without blocking and returns the number of jobs run.
	///
	/// For hosts that pump the queue from their own main loop.
	pub fn run_pending(&mut self) -> usize {
		self.bind();
		let mut ran = 0;
		while let Ok(job) = self.rx.try_recv() {
			run_job(job);
			ran += 1;
		}
		ran
	}

	fn bind(&self) {
		let current = thread::current().id();
		let owner = *self.owner.get_or_init(|| current);
		if owner != current {
			warn!(target: "tether.dispatch", "dispatch loop driven from a thread other than the designated one");
		}
	}
}

fn run_job(job: Job) {
	if catch_unwind(AssertUnwindSafe(job)).is_err() {
		error!(target: "tether.dispatch", "dispatched job panicked");
	}
}
