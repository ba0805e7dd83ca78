//! The main-thread runner that storage commits are dispatched through.
//!
//! Some platform backends may only be mutated from one designated thread.
//! The store hands every commit to a [`MainThreadRunner`] and then blocks
//! the *calling* thread until the commit callback fires, which is why store
//! methods must never run on the runner's own thread.

use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{unbounded, Sender};
use tracing::{debug, warn};

/// A unit of work queued on the main thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks on a designated main thread.
pub trait MainThreadRunner: Send + Sync {
    /// Queue `task` for execution. `name` is used for logging only.
    fn execute(&self, name: &str, task: Task);

    /// Returns `true` if the current thread is the main thread.
    fn is_main_thread(&self) -> bool;
}

/// Runs every task immediately on the calling thread.
///
/// No thread is ever considered "main", which makes this suitable for tests
/// and for backends without thread affinity.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineMainThread;

impl MainThreadRunner for InlineMainThread {
    fn execute(&self, _name: &str, task: Task) {
        task();
    }

    fn is_main_thread(&self) -> bool {
        false
    }
}

/// Owns a dedicated worker thread that drains a FIFO task queue.
///
/// The worker is the main thread. Dropping the runner closes the queue and
/// joins the worker after it finishes the tasks already queued.
pub struct DedicatedMainThread {
    sender: Option<Sender<(String, Task)>>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl DedicatedMainThread {
    /// Spawn the worker thread under the given name.
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<(String, Task)>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for (task_name, task) in receiver {
                    debug!(task = %task_name, "running main-thread task");
                    task();
                }
            })?;
        let thread_id = handle.thread().id();
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            thread_id,
        })
    }
}

impl MainThreadRunner for DedicatedMainThread {
    fn execute(&self, name: &str, task: Task) {
        let Some(sender) = &self.sender else {
            warn!(task = %name, "main thread stopped; dropping task");
            return;
        };
        if sender.send((name.to_string(), task)).is_err() {
            warn!(task = %name, "main thread queue closed; dropping task");
        }
    }

    fn is_main_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for DedicatedMainThread {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            // A task holding the last reference would otherwise join itself.
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                warn!("main thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for DedicatedMainThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedicatedMainThread")
            .field("thread_id", &self.thread_id)
            .field("running", &self.sender.is_some())
            .finish()
    }
}
