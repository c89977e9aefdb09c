//! Named thread pools, looked up by label (spec §2 "Executors").
//!
//! Open Question decision (`DESIGN.md` #4): backed by OS threads and
//! `crossbeam-channel` job queues rather than an async executor — still
//! one of the teacher's own dependencies (`bevy_app`'s `crossbeam-channel`)
//! and matches `legion_core`'s own scheduler plumbing. Gated behind the
//! `multi_threaded` feature; without it, every job just runs inline on the
//! dispatching thread (see the crate's feature doc comment).

use crate::error::RunError;
use crate::label::{ExecutorLabel, InternedExecutorLabel};

/// The default pool used when a system doesn't `set_executor(..)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ComputePool;

/// A secondary pool suited to blocking I/O-bound work, named after
/// `bevy_app::task_pool_plugin`'s `IoTaskPool`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct IoPool;

#[cfg(feature = "multi_threaded")]
mod threaded {
    use super::*;
    use std::collections::HashMap;

    type Job = Box<dyn FnOnce() + Send>;

    struct Pool {
        sender: crossbeam_channel::Sender<Job>,
        workers: Vec<std::thread::JoinHandle<()>>,
    }

    impl Pool {
        fn new(name: &str, num_threads: usize) -> Self {
            let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
            let workers = (0..num_threads.max(1))
                .map(|i| {
                    let receiver = receiver.clone();
                    std::thread::Builder::new()
                        .name(format!("{name}-{i}"))
                        .spawn(move || {
                            while let Ok(job) = receiver.recv() {
                                job();
                            }
                        })
                        .expect("failed to spawn executor worker thread")
                })
                .collect();
            Pool { sender, workers }
        }

        fn spawn(&self, job: Job) {
            // A closed receiver means every worker panicked; dropping the
            // job here is the same policy the scheduler applies to any task
            // that can no longer be dispatched (spec §7 "missing executor").
            let _ = self.sender.send(job);
        }
    }

    impl Drop for Pool {
        fn drop(&mut self) {
            for worker in self.workers.drain(..) {
                let _ = worker.join();
            }
        }
    }

    /// Registry of named executors. Always carries a [`ComputePool`] default.
    pub struct Executors {
        pools: HashMap<InternedExecutorLabel, Pool>,
        default: InternedExecutorLabel,
    }

    impl Executors {
        pub fn new_default() -> Self {
            let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
            let mut executors =
                Executors { pools: HashMap::new(), default: ComputePool.intern() };
            executors.register(ComputePool, threads);
            executors
        }

        pub fn register(&mut self, label: impl ExecutorLabel + Clone + 'static, num_threads: usize) {
            let interned = label.intern();
            let name = format!("{interned:?}");
            self.pools.insert(interned, Pool::new(&name, num_threads));
        }

        pub fn spawn(
            &self,
            label: Option<&InternedExecutorLabel>,
            job: impl FnOnce() + Send + 'static,
        ) -> Result<(), RunError> {
            let label = label.unwrap_or(&self.default);
            let pool =
                self.pools.get(label).ok_or_else(|| RunError::MissingExecutor(label.clone()))?;
            pool.spawn(Box::new(job));
            Ok(())
        }
    }

    impl Default for Executors {
        fn default() -> Self {
            Self::new_default()
        }
    }
}

#[cfg(not(feature = "multi_threaded"))]
mod inline {
    use super::*;

    /// Single-threaded fallback: every job runs synchronously on the
    /// calling thread, in the order it was dispatched. Labels are accepted
    /// but not otherwise meaningful without real pools behind them.
    #[derive(Default)]
    pub struct Executors;

    impl Executors {
        pub fn new_default() -> Self {
            Executors
        }

        pub fn register(&mut self, _label: impl ExecutorLabel + Clone + 'static, _num_threads: usize) {}

        pub fn spawn(
            &self,
            _label: Option<&InternedExecutorLabel>,
            job: impl FnOnce() + Send + 'static,
        ) -> Result<(), RunError> {
            job();
            Ok(())
        }
    }
}

#[cfg(feature = "multi_threaded")]
pub use threaded::Executors;

#[cfg(not(feature = "multi_threaded"))]
pub use inline::Executors;
