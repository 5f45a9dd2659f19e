//! Fair reader/writer lock
//!
//! The registry's concurrency primitive: any number of concurrent
//! readers, or one exclusive writer. Unlike a naive readers-preferred
//! lock, a pending writer blocks newly arriving readers, so membership
//! mutations cannot be starved by a steady stream of broadcasts.

use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Admission bookkeeping, protected by the gate mutex
#[derive(Debug, Default)]
struct Gate {
    readers: usize,
    writer_active: bool,
    writers_waiting: usize,
}

/// Reader/writer lock with writer fairness
///
/// A Mutex+Condvar gate decides admission; the inner `RwLock` only
/// stores the data and hands out guards. The gate's accounting
/// guarantees an admitted thread never contends on the inner lock.
///
/// Readers wait while a writer is active *or waiting*; writers wait
/// while a writer is active or any reader holds the lock.
#[derive(Debug, Default)]
pub struct FairRwLock<T> {
    gate: Mutex<Gate>,
    cond: Condvar,
    data: RwLock<T>,
}

impl<T> FairRwLock<T> {
    /// Create a lock holding `value`
    pub fn new(value: T) -> Self {
        Self {
            gate: Mutex::new(Gate::default()),
            cond: Condvar::new(),
            data: RwLock::new(value),
        }
    }

    /// Acquire the lock in shared mode, blocking while a writer is
    /// active or waiting
    pub fn read(&self) -> ReadGuard<'_, T> {
        let mut gate = self.gate.lock().expect("lock gate poisoned");
        while gate.writer_active || gate.writers_waiting > 0 {
            gate = self.cond.wait(gate).expect("lock gate poisoned");
        }
        gate.readers += 1;
        drop(gate);

        let inner = self.data.read().expect("lock storage poisoned");
        ReadGuard {
            lock: self,
            inner: Some(inner),
        }
    }

    /// Acquire the lock exclusively, blocking until all readers and any
    /// active writer have released
    pub fn write(&self) -> WriteGuard<'_, T> {
        let mut gate = self.gate.lock().expect("lock gate poisoned");
        gate.writers_waiting += 1;
        while gate.writer_active || gate.readers > 0 {
            gate = self.cond.wait(gate).expect("lock gate poisoned");
        }
        gate.writers_waiting -= 1;
        gate.writer_active = true;
        drop(gate);

        let inner = self.data.write().expect("lock storage poisoned");
        WriteGuard {
            lock: self,
            inner: Some(inner),
        }
    }
}

/// RAII shared guard
#[derive(Debug)]
pub struct ReadGuard<'a, T> {
    lock: &'a FairRwLock<T>,
    inner: Option<RwLockReadGuard<'a, T>>,
}

impl<T> std::ops::Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner.as_ref().expect("guard already released")
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        // Release storage before opening the gate to the next writer
        self.inner.take();
        let mut gate = self.lock.gate.lock().expect("lock gate poisoned");
        gate.readers -= 1;
        if gate.readers == 0 {
            self.lock.cond.notify_all();
        }
    }
}

/// RAII exclusive guard
#[derive(Debug)]
pub struct WriteGuard<'a, T> {
    lock: &'a FairRwLock<T>,
    inner: Option<RwLockWriteGuard<'a, T>>,
}

impl<T> std::ops::Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner.as_ref().expect("guard already released")
    }
}

impl<T> std::ops::DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner.as_mut().expect("guard already released")
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.inner.take();
        let mut gate = self.lock.gate.lock().expect("lock gate poisoned");
        gate.writer_active = false;
        self.lock.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_readers_run_concurrently() {
        let lock = Arc::new(FairRwLock::new(0u32));
        let barrier = Arc::new(Barrier::new(2));

        // Both threads must be inside a read guard at the same time to
        // pass the barrier; mutual exclusion between readers would hang.
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let guard = lock.read();
                    barrier.wait();
                    assert_eq!(*guard, 0);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_writer_excludes_readers() {
        let lock = Arc::new(FairRwLock::new(0u32));
        let reader_entered = Arc::new(AtomicBool::new(false));

        let guard = lock.write();

        let handle = {
            let lock = Arc::clone(&lock);
            let reader_entered = Arc::clone(&reader_entered);
            thread::spawn(move || {
                let guard = lock.read();
                reader_entered.store(true, Ordering::SeqCst);
                assert_eq!(*guard, 7);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!reader_entered.load(Ordering::SeqCst));

        // Mutate, then let the reader in
        let mut guard = guard;
        *guard = 7;
        drop(guard);

        handle.join().unwrap();
        assert!(reader_entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pending_writer_blocks_new_readers() {
        let lock = Arc::new(FairRwLock::new(0u32));
        let order = Arc::new(StdMutex::new(Vec::new()));

        let first_read = lock.read();

        // Writer queues up behind the held read guard
        let writer = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let mut guard = lock.write();
                *guard += 1;
                order.lock().unwrap().push("writer");
            })
        };
        thread::sleep(Duration::from_millis(100));

        // A late reader must not overtake the waiting writer
        let reader = {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            thread::spawn(move || {
                let guard = lock.read();
                order.lock().unwrap().push("reader");
                assert_eq!(*guard, 1);
            })
        };
        thread::sleep(Duration::from_millis(100));
        assert!(order.lock().unwrap().is_empty());

        drop(first_read);
        writer.join().unwrap();
        reader.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
    }

    #[test]
    fn test_write_then_read() {
        let lock = FairRwLock::new(String::new());

        {
            let mut guard = lock.write();
            guard.push_str("hello");
        }

        assert_eq!(*lock.read(), "hello");
    }
}
