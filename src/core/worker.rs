//! Bounded worker pool shared by the build and push pipelines.
//!
//! A single producer hands item indices to `concurrency` workers over a
//! zero-capacity channel, so an item is only considered dispatched once a
//! worker has actually taken it. The first failure reported by any worker is
//! kept; once it is set the producer stops handing out work while items
//! already taken run to completion. A panicking job counts as a failed item.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::error::{Error, Result};

/// First-error-wins slot. Later errors are dropped.
#[derive(Debug, Default)]
pub struct StickyError {
    slot: OnceLock<Error>,
}

impl StickyError {
    /// Record `err` if no error has been recorded yet. Returns true when this
    /// call won.
    pub fn record(&self, err: Error) -> bool {
        self.slot.set(err).is_ok()
    }

    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn into_inner(self) -> Option<Error> {
        self.slot.into_inner()
    }
}

/// One finished job.
#[derive(Debug)]
pub struct Completed<O> {
    pub index: usize,
    pub worker: usize,
    pub result: Result<O>,
}

/// Everything the pool observed during a run.
#[derive(Debug)]
pub struct PoolRun<O> {
    /// Items handed to a worker. Items past this point were never started.
    pub dispatched: usize,
    /// Finished jobs in completion order.
    pub completed: Vec<Completed<O>>,
    /// First error any worker reported.
    pub error: Option<Error>,
}

impl<O> PoolRun<O> {
    /// Completed jobs re-indexed by item position.
    pub fn by_index(self, len: usize) -> (Vec<Option<Completed<O>>>, Option<Error>) {
        let mut slots: Vec<Option<Completed<O>>> = (0..len).map(|_| None).collect();
        for done in self.completed {
            let index = done.index;
            if index < len {
                slots[index] = Some(done);
            }
        }
        (slots, self.error)
    }
}

/// Run `job` over `items` on `concurrency` workers (at least one).
///
/// `job` receives the worker index and the item. `label` names the worker
/// kind in the "done" line each worker prints when it exits.
pub fn run<T, O, F>(items: &[T], concurrency: usize, label: &str, job: F) -> PoolRun<O>
where
    T: Sync,
    O: Send,
    F: Fn(usize, &T) -> Result<O> + Sync,
{
    let workers = concurrency.max(1);
    let sticky = StickyError::default();
    let (work_tx, work_rx) = mpsc::sync_channel::<usize>(0);
    let work_rx = Arc::new(Mutex::new(work_rx));
    let (done_tx, done_rx) = mpsc::channel::<Completed<O>>();

    let dispatched = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let work_rx = Arc::clone(&work_rx);
                let done_tx = done_tx.clone();
                let job = &job;
                let sticky = &sticky;
                scope.spawn(move || {
                    loop {
                        let next = {
                            let rx = work_rx.lock().unwrap_or_else(|p| p.into_inner());
                            rx.recv()
                        };
                        let Ok(index) = next else { break };

                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            job(worker, &items[index])
                        }))
                        .unwrap_or_else(|_| {
                            Err(Error::internal_unexpected(format!(
                                "{} job for item {} panicked",
                                label, index
                            )))
                        });
                        if let Err(err) = &result {
                            sticky.record(err.clone());
                        }
                        if done_tx
                            .send(Completed {
                                index,
                                worker,
                                result,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    log_status!("worker", "[{}] < {} done.", worker, label);
                })
            })
            .collect();

        // Workers own the only receiver handles from here on, so a send fails
        // instead of blocking if every worker has gone away.
        drop(work_rx);
        drop(done_tx);

        let mut dispatched = 0;
        for index in 0..items.len() {
            if sticky.is_set() {
                break;
            }
            if work_tx.send(index).is_err() {
                break;
            }
            dispatched += 1;
        }
        drop(work_tx);

        for handle in handles {
            if handle.join().is_err() {
                sticky.record(Error::internal_unexpected(format!(
                    "{} worker thread panicked",
                    label
                )));
            }
        }

        dispatched
    });

    PoolRun {
        dispatched,
        completed: done_rx.into_iter().collect(),
        error: sticky.into_inner(),
    }
}
