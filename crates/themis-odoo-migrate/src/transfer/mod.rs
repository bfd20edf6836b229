//! Size-bounded batch submission with bisection on failure.
//!
//! Records carrying a binary payload are grouped so the summed payload size
//! of one submission stays under a ceiling. A rejected batch is split in two
//! and each half retried, down to single records; a rejected single record
//! is logged and dropped. The split work is kept on an explicit stack, so
//! depth is bounded by log2 of the batch size.

mod store;

pub use store::{DocumentStore, FsDocumentStore};

use crate::core::Record;
use crate::error::Result;
use crate::target::Destination;
use async_trait::async_trait;
use tracing::{info, warn};

/// A record ready for submission, with the size it counts against the
/// ceiling.
#[derive(Debug, Clone)]
pub struct SizedRecord {
    pub record: Record,
    pub payload_size: usize,
    /// Identifies the record in logs when it fails on its own.
    pub label: String,
}

/// Where batches go.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Submit one batch, returning the created ids.
    async fn submit(&self, batch: &[SizedRecord]) -> Result<Vec<i64>>;
}

/// Sends batches to one model method of the destination.
pub struct ModelSink<'a, D: ?Sized> {
    destination: &'a D,
    model: &'a str,
    method: &'a str,
}

impl<'a, D: Destination + ?Sized> ModelSink<'a, D> {
    pub fn new(destination: &'a D, model: &'a str, method: &'a str) -> Self {
        Self {
            destination,
            model,
            method,
        }
    }
}

#[async_trait]
impl<'a, D: Destination + ?Sized> BatchSink for ModelSink<'a, D> {
    async fn submit(&self, batch: &[SizedRecord]) -> Result<Vec<i64>> {
        let records = batch.iter().map(|r| r.record.clone()).collect();
        self.destination
            .create_with(self.model, self.method, records)
            .await
    }
}

/// Outcome of one submission run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Ids created, over all successful submissions.
    pub created: usize,
    /// Submissions attempted, bisection retries included.
    pub attempts: usize,
    /// Items `prepare` turned away.
    pub skipped: usize,
    /// Labels of records rejected on their own.
    pub failed: Vec<String>,
}

/// Groups records under a payload ceiling and submits them.
#[derive(Debug, Clone, Copy)]
pub struct BatchSubmitter {
    max_batch_bytes: usize,
}

impl BatchSubmitter {
    pub fn new(max_batch_bytes: usize) -> Self {
        Self { max_batch_bytes }
    }

    /// Drain `pending` from the end, turning each item into a record with
    /// `prepare` (which may decline it), and submit fill-then-flush: a record
    /// joins the current batch when `current + size < ceiling`, otherwise the
    /// current batch is submitted first.
    pub async fn run<T, F, K>(&self, sink: &K, mut pending: Vec<T>, mut prepare: F) -> BatchReport
    where
        F: FnMut(T) -> Option<SizedRecord>,
        K: BatchSink + ?Sized,
    {
        let mut report = BatchReport::default();
        let mut current: Vec<SizedRecord> = Vec::new();
        let mut current_size = 0usize;

        while let Some(item) = pending.pop() {
            let Some(record) = prepare(item) else {
                report.skipped += 1;
                continue;
            };
            if current_size + record.payload_size < self.max_batch_bytes {
                current_size += record.payload_size;
                current.push(record);
            } else {
                self.submit_bisecting(sink, std::mem::take(&mut current), &mut report)
                    .await;
                current_size = record.payload_size;
                current.push(record);
            }
        }

        if !current.is_empty() {
            self.submit_bisecting(sink, current, &mut report).await;
        }

        report
    }

    /// Submit a batch, halving it on failure until single records remain.
    async fn submit_bisecting<K>(&self, sink: &K, batch: Vec<SizedRecord>, report: &mut BatchReport)
    where
        K: BatchSink + ?Sized,
    {
        let mut stack = vec![batch];

        while let Some(batch) = stack.pop() {
            if batch.is_empty() {
                continue;
            }
            report.attempts += 1;

            match sink.submit(&batch).await {
                Ok(ids) => {
                    info!("Created {} documents.", ids.len());
                    report.created += ids.len();
                }
                Err(e) if batch.len() == 1 => {
                    let label = batch[0].label.clone();
                    warn!("Error occurred when migrating document {}: {}", label, e);
                    report.failed.push(label);
                }
                Err(e) => {
                    warn!(
                        "Error occurred when migrating {} documents: {}. Splitting into 2 ...",
                        batch.len(),
                        e
                    );
                    let mut first = batch;
                    let second = first.split_off(first.len() / 2);
                    // First half on top, so halves run in order.
                    stack.push(second);
                    stack.push(first);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every submission; fails batches larger than `max_ok` and any
    /// batch containing a label in `poison`.
    struct Recorder {
        max_ok: usize,
        poison: Vec<String>,
        sizes: Mutex<Vec<usize>>,
        labels: Mutex<Vec<Vec<String>>>,
    }

    impl Recorder {
        fn new(max_ok: usize, poison: &[&str]) -> Self {
            Self {
                max_ok,
                poison: poison.iter().map(|s| s.to_string()).collect(),
                sizes: Mutex::new(Vec::new()),
                labels: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BatchSink for Recorder {
        async fn submit(&self, batch: &[SizedRecord]) -> Result<Vec<i64>> {
            self.sizes.lock().unwrap().push(batch.len());
            self.labels
                .lock()
                .unwrap()
                .push(batch.iter().map(|r| r.label.clone()).collect());
            if batch.len() > self.max_ok || batch.iter().any(|r| self.poison.contains(&r.label)) {
                return Err(MigrateError::destination("cases.document", "rejected"));
            }
            Ok((0..batch.len() as i64).collect())
        }
    }

    fn sized(label: &str, size: usize) -> SizedRecord {
        let mut record = Record::new();
        record.insert("name".into(), json!(label));
        SizedRecord {
            record,
            payload_size: size,
            label: label.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fill_then_flush() {
        let sink = Recorder::new(usize::MAX, &[]);
        let items = vec![sized("a", 10), sized("b", 10), sized("c", 10)];
        let report = BatchSubmitter::new(25).run(&sink, items, Some).await;

        assert_eq!(*sink.sizes.lock().unwrap(), vec![2, 1]);
        // Drained from the end
        assert_eq!(sink.labels.lock().unwrap()[0], vec!["c", "b"]);
        assert_eq!(report.created, 3);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_bisection_reaches_single_records() {
        let sink = Recorder::new(1, &["a", "b", "c", "d"]);
        let items = vec![sized("a", 1), sized("b", 1), sized("c", 1), sized("d", 1)];
        let report = BatchSubmitter::new(100).run(&sink, items, Some).await;

        let sizes = sink.sizes.lock().unwrap().clone();
        assert_eq!(sizes, vec![4, 2, 1, 1, 2, 1, 1]);
        assert_eq!(sizes.iter().filter(|s| **s == 1).count(), 4);
        assert_eq!(report.failed.len(), 4);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn test_single_failure_does_not_stop_the_run() {
        let sink = Recorder::new(1, &["b"]);
        let items = vec![sized("a", 1), sized("b", 1), sized("c", 1), sized("d", 1)];
        let report = BatchSubmitter::new(100).run(&sink, items, Some).await;

        assert_eq!(report.failed, vec!["b".to_string()]);
        assert_eq!(report.created, 3);
    }

    #[tokio::test]
    async fn test_oversized_record_goes_alone() {
        let sink = Recorder::new(usize::MAX, &[]);
        let items = vec![sized("small", 1), sized("huge", 500)];
        let report = BatchSubmitter::new(100).run(&sink, items, Some).await;

        assert_eq!(*sink.sizes.lock().unwrap(), vec![1, 1]);
        assert_eq!(report.created, 2);
    }

    #[tokio::test]
    async fn test_declined_items_are_counted() {
        let sink = Recorder::new(usize::MAX, &[]);
        let report = BatchSubmitter::new(100)
            .run(&sink, vec![1, 2, 3], |n| (n != 2).then(|| sized(&n.to_string(), 1)))
            .await;

        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 2);
        assert_eq!(report.attempts, 1);
    }
}
