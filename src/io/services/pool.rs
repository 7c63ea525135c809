//! Bounded worker pool for write batches.
//!
//! One producer feeds a queue of [`Batch`]es with room for twice as many
//! batches as there are workers. When every worker is busy and the queue is
//! full, [`BatchQueue::submit`] blocks, which throttles the reader to the
//! speed of the database.
//!
//! Shutdown is cooperative: the producer returns, the queue is closed, and
//! every worker finishes the batch it holds before the pool returns. Workers
//! are scoped threads, so nothing outlives [`WorkerPool::run`].

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::sync::Mutex;
use std::thread;

/// A write statement and the source record it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based source record index.
    pub record: u64,
    /// Statement text.
    pub text: String,
}

/// Statements executed sequentially by one worker.
///
/// A throughput grouping only: there is no rollback across a batch.
#[derive(Debug, Default)]
pub struct Batch {
    statements: Vec<Statement>,
    capacity: usize,
}

impl Batch {
    /// Creates an empty batch that is full at `capacity` statements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            statements: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a statement.
    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    /// Returns whether the batch reached its capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.statements.len() >= self.capacity
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns whether the batch has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Takes the statements out, leaving an empty batch of the same capacity.
    #[must_use]
    pub fn take(&mut self) -> Self {
        let statements =
            std::mem::replace(&mut self.statements, Vec::with_capacity(self.capacity));
        Self {
            statements,
            capacity: self.capacity,
        }
    }

    /// The statements, in submission order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

impl IntoIterator for Batch {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

/// Producer side of the pool's queue.
#[derive(Debug)]
pub struct BatchQueue {
    sender: SyncSender<Batch>,
}

impl BatchQueue {
    /// Hands a batch to the workers, blocking while the queue is full.
    ///
    /// Empty batches are dropped. Returns `false` if no worker is left to
    /// receive the batch.
    pub fn submit(&self, batch: Batch) -> bool {
        if batch.is_empty() {
            return true;
        }
        self.sender.send(batch).is_ok()
    }
}

/// Fixed-size pool of scoped worker threads.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Creates a pool with `workers` threads (at least one).
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Number of worker threads.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Capacity of the batch queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.workers * 2
    }

    /// Runs `produce` on the calling thread while the workers run `execute`
    /// on each submitted batch.
    ///
    /// Returns what `produce` returned, once every submitted batch has been
    /// handled.
    pub fn run<R, P, E>(&self, produce: P, execute: E) -> R
    where
        P: FnOnce(&BatchQueue) -> R,
        E: Fn(Batch) + Sync,
    {
        let (sender, receiver) = sync_channel::<Batch>(self.queue_capacity());
        let receiver = Mutex::new(receiver);

        thread::scope(|scope| {
            for worker in 0..self.workers {
                let receiver = &receiver;
                let execute = &execute;
                scope.spawn(move || {
                    let handled = worker_loop(receiver, execute);
                    tracing::debug!(worker, handled, "Worker finished");
                });
            }

            let queue = BatchQueue { sender };
            // Dropping the queue closes the channel and lets workers drain.
            produce(&queue)
        })
    }
}

fn worker_loop<E: Fn(Batch)>(receiver: &Mutex<Receiver<Batch>>, execute: &E) -> usize {
    let mut handled = 0;
    loop {
        let next = match receiver.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => return handled,
        };
        let Ok(batch) = next else {
            return handled;
        };
        execute(batch);
        handled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn statement(record: u64) -> Statement {
        Statement {
            record,
            text: format!("INSERT {record}"),
        }
    }

    #[test]
    fn test_every_statement_runs_once() {
        let seen = Mutex::new(Vec::new());
        let pool = WorkerPool::new(4);
        let submitted = pool.run(
            |queue| {
                let mut batch = Batch::with_capacity(3);
                let mut count = 0;
                for record in 1..=100 {
                    batch.push(statement(record));
                    count += 1;
                    if batch.is_full() {
                        assert!(queue.submit(batch.take()));
                    }
                }
                assert!(queue.submit(batch.take()));
                count
            },
            |batch| {
                let mut seen = seen.lock().unwrap();
                seen.extend(batch.into_iter().map(|s| s.record));
            },
        );

        let seen = seen.into_inner().unwrap();
        assert_eq!(submitted, 100);
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.iter().copied().collect::<BTreeSet<_>>().len(), 100);
    }

    #[test]
    fn test_batch_preserves_order() {
        let mut batch = Batch::with_capacity(2);
        batch.push(statement(1));
        assert!(!batch.is_full());
        batch.push(statement(2));
        assert!(batch.is_full());
        let taken = batch.take();
        assert!(batch.is_empty());
        let records: Vec<_> = taken.statements().iter().map(|s| s.record).collect();
        assert_eq!(records, vec![1, 2]);
    }

    #[test]
    fn test_in_flight_batches_finish_before_return() {
        let done = AtomicUsize::new(0);
        WorkerPool::new(2).run(
            |queue| {
                for record in 0..6 {
                    let mut batch = Batch::with_capacity(1);
                    batch.push(statement(record));
                    queue.submit(batch);
                }
            },
            |_| {
                thread::sleep(std::time::Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(done.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_accepted_batches_run_after_stop() {
        use std::sync::atomic::AtomicBool;

        let stop = AtomicBool::new(false);
        let executed = Mutex::new(BTreeSet::new());
        let accepted = WorkerPool::new(1).run(
            |queue| {
                let mut accepted = BTreeSet::new();
                for record in 1..=50 {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let mut batch = Batch::with_capacity(1);
                    batch.push(statement(record));
                    if queue.submit(batch) {
                        accepted.insert(record);
                    }
                }
                accepted
            },
            |batch| {
                thread::sleep(std::time::Duration::from_millis(20));
                stop.store(true, Ordering::SeqCst);
                executed.lock().unwrap().extend(batch.into_iter().map(|s| s.record));
            },
        );

        assert!(accepted.len() < 50);
        assert!(accepted.len() > 1);
        assert_eq!(executed.into_inner().unwrap(), accepted);
    }

    #[test]
    fn test_queue_capacity() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.workers(), 1);
        assert_eq!(pool.queue_capacity(), 2);
    }
}
