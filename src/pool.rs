//! Task queue and worker pool
//!
//! The multiplexer produces tasks; a fixed pool of worker threads
//! consumes them. The queue is the only coupling between the I/O loop
//! and room-state processing, so a slow broadcast never stalls reads.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::types::ConnectionId;

/// A unit of work handed from the I/O loop to the pool
///
/// Tasks are enqueued in arrival order per connection: every complete
/// framed line becomes one `Message`, and a detected disconnect becomes
/// exactly one `Close`, always after that connection's last `Message`.
#[derive(Debug)]
pub enum Task {
    /// A complete line received on a connection
    Message {
        /// Connection the line arrived on
        conn: ConnectionId,
        /// The line, terminator stripped
        line: String,
    },
    /// A connection was detected as gone
    Close {
        /// Connection that disconnected
        conn: ConnectionId,
    },
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    stopped: bool,
}

/// Blocking FIFO queue shared between producers and workers
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task and wake one waiting worker
    pub fn push(&self, task: Task) {
        {
            let mut state = self.state.lock().expect("task queue poisoned");
            state.tasks.push_back(task);
        }
        self.ready.notify_one();
    }

    /// Pop the next task, blocking until one is available
    ///
    /// Returns `None` once shutdown has been requested. The stop flag
    /// wins over the backlog: a stopped queue dequeues nothing further.
    pub fn pop(&self) -> Option<Task> {
        let mut state = self.state.lock().expect("task queue poisoned");
        loop {
            if state.stopped {
                return None;
            }
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            state = self.ready.wait(state).expect("task queue poisoned");
        }
    }

    /// Request shutdown and wake every waiting worker
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock().expect("task queue poisoned");
            state.stopped = true;
        }
        self.ready.notify_all();
    }

    /// Number of tasks not yet dequeued
    pub fn pending(&self) -> usize {
        self.state.lock().expect("task queue poisoned").tasks.len()
    }
}

/// Fixed pool of worker threads consuming a [`TaskQueue`]
///
/// Each worker pops one task at a time and runs the handler to
/// completion before popping the next. Shutdown (explicit or on drop)
/// stops the queue, wakes every worker, and joins them all before
/// returning; in-flight tasks finish, undrained tasks are abandoned.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers running `handler` for every popped task
    pub fn new<F>(size: usize, handler: F) -> Self
    where
        F: Fn(Task) + Send + Sync + 'static,
    {
        let queue = Arc::new(TaskQueue::new());
        let handler = Arc::new(handler);

        let workers = (0..size)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let handler = Arc::clone(&handler);
                thread::Builder::new()
                    .name(format!("worker-{}", i))
                    .spawn(move || {
                        debug!("worker started");
                        while let Some(task) = queue.pop() {
                            handler(task);
                        }
                        debug!("worker exiting");
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self { queue, workers }
    }

    /// Handle to the shared queue, for producers
    pub fn queue(&self) -> Arc<TaskQueue> {
        Arc::clone(&self.queue)
    }

    /// Enqueue a task on the pool's queue
    pub fn submit(&self, task: Task) {
        self.queue.push(task);
    }

    /// Stop the queue and join all workers
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    fn message(conn: usize, line: &str) -> Task {
        Task::Message {
            conn: ConnectionId(conn),
            line: line.to_string(),
        }
    }

    #[test]
    fn test_tasks_processed_in_fifo_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_handler = Arc::clone(&seen);

        // A single worker makes completion order equal to queue order
        let pool = WorkerPool::new(1, move |task| {
            if let Task::Message { line, .. } = task {
                seen_in_handler.lock().unwrap().push(line);
            }
        });

        for i in 0..10 {
            pool.submit(message(1, &i.to_string()));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().unwrap().len() < 10 {
            assert!(Instant::now() < deadline, "tasks were not drained in time");
            thread::sleep(Duration::from_millis(10));
        }

        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_shutdown_wakes_idle_workers() {
        let mut pool = WorkerPool::new(4, |_task| {});
        // All four workers are blocked on an empty queue; shutdown must
        // wake and join every one of them.
        pool.shutdown();
        assert!(pool.workers.is_empty());
    }

    #[test]
    fn test_stopped_queue_dequeues_nothing_further() {
        let queue = TaskQueue::new();
        queue.push(message(1, "a"));
        queue.push(message(1, "b"));
        queue.push(message(1, "c"));

        assert!(queue.pop().is_some());

        queue.shutdown();

        // Two tasks remain undrained, but the stop flag wins
        assert!(queue.pop().is_none());
        assert_eq!(queue.pending(), 2);
    }

    #[test]
    fn test_in_flight_task_completes_during_shutdown() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_in_handler = Arc::clone(&finished);

        let mut pool = WorkerPool::new(1, move |_task| {
            thread::sleep(Duration::from_millis(100));
            finished_in_handler.store(true, Ordering::SeqCst);
        });

        pool.submit(message(1, "slow"));
        // Let the worker dequeue before requesting shutdown
        thread::sleep(Duration::from_millis(30));

        pool.shutdown();
        assert!(finished.load(Ordering::SeqCst));
    }
}
