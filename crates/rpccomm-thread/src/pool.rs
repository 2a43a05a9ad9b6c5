use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, ThreadError};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads for long-running tasks.
///
/// Tasks are taken in submission order by whichever worker is free.
/// [`ThreadPool::wait`] blocks until every submitted task has returned.
/// Dropping the pool lets queued tasks finish and joins the workers.
pub struct ThreadPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    outstanding: Arc<Outstanding>,
}

struct Outstanding {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Outstanding {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_one(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }
}

impl ThreadPool {
    /// Start a pool with `size` worker threads.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(ThreadError::EmptyPool);
        }

        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let outstanding = Arc::new(Outstanding {
            count: Mutex::new(0),
            drained: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let outstanding = Arc::clone(&outstanding);
            let handle = std::thread::Builder::new()
                .name(format!("rpccomm-worker-{id}"))
                .spawn(move || worker_loop(id, &receiver, &outstanding))
                .map_err(ThreadError::Spawn)?;
            workers.push(handle);
        }
        debug!(size, "thread pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
            outstanding,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Submit a task to run on the next free worker.
    pub fn push_task<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(ThreadError::ShutDown)?;
        *self.outstanding.lock() += 1;
        if sender.send(Box::new(task)).is_err() {
            self.outstanding.finish_one();
            return Err(ThreadError::ShutDown);
        }
        Ok(())
    }

    /// Block until every submitted task has returned.
    pub fn wait(&self) {
        let mut count = self.outstanding.lock();
        while *count > 0 {
            count = self
                .outstanding
                .drained
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Tasks submitted but not yet returned.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Closing the channel makes idle workers exit once the queue is empty.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("thread pool stopped");
    }
}

fn worker_loop(id: usize, receiver: &Mutex<Receiver<Task>>, outstanding: &Outstanding) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(task) = next else {
            break;
        };
        if catch_unwind(AssertUnwindSafe(task)).is_err() {
            warn!(worker = id, "task panicked");
        }
        outstanding.finish_one();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::barrier::CountBarrier;

    #[test]
    fn empty_pool_rejected() {
        assert!(matches!(ThreadPool::new(0), Err(ThreadError::EmptyPool)));
    }

    #[test]
    fn runs_all_tasks_and_waits() {
        let pool = ThreadPool::new(2).unwrap();
        assert_eq!(pool.size(), 2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.push_task(move || {
                std::thread::sleep(Duration::from_millis(2));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn long_running_tasks_run_concurrently() {
        // Each task blocks until both have started, so this only completes
        // if the two workers run them at the same time.
        let pool = ThreadPool::new(2).unwrap();
        let started = Arc::new(CountBarrier::new(2));

        for _ in 0..2 {
            let started = Arc::clone(&started);
            pool.push_task(move || {
                started.signal();
                assert!(started.wait_timeout(Duration::from_secs(5)));
            })
            .unwrap();
        }

        pool.wait();
        assert_eq!(started.remaining(), 0);
    }

    #[test]
    fn panicking_task_does_not_wedge_wait() {
        let pool = ThreadPool::new(1).unwrap();
        pool.push_task(|| panic!("boom")).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        pool.push_task(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.wait();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_without_tasks_returns_immediately() {
        let pool = ThreadPool::new(1).unwrap();
        pool.wait();
    }

    #[test]
    fn drop_finishes_queued_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(1).unwrap();
            for _ in 0..3 {
                let counter = Arc::clone(&counter);
                pool.push_task(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
