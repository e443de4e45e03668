//! Typed stage queues.
//!
//! Each stage has its own bounded channel whose element is the minimal
//! reference into the catalog, so worker bodies stay single-purpose and
//! re-read fresh state instead of trusting stale snapshots. Producers
//! block on a full queue, which is what propagates backpressure upstream.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// One seed to crawl.
#[derive(Clone, Debug)]
pub struct CrawlJob {
    pub task_id: i64,
    pub seed_url: String,
}

/// One file whose bytes are missing.
#[derive(Clone, Debug)]
pub struct DownloadJob {
    pub task_id: i64,
    pub file_id: i64,
}

/// One downloaded file awaiting text extraction.
#[derive(Clone, Debug)]
pub struct ExtractJob {
    pub task_id: i64,
    pub file_id: i64,
}

/// One extracted file awaiting naming. Carries the decoded text as the
/// stage-to-stage payload; everything else is re-read from the catalog.
#[derive(Clone, Debug)]
pub struct RenameJob {
    pub task_id: i64,
    pub file_id: i64,
    pub text: String,
}

/// Shared receiver for multiple workers pulling from one bounded channel.
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Receive the next item; `None` once the channel is closed and
    /// drained.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// A bounded stage queue: cloneable sender plus shared receiver.
pub fn stage_queue<T>(capacity: usize) -> (mpsc::Sender<T>, SharedReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, SharedReceiver::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn workers_share_one_receiver() {
        let (tx, rx) = stage_queue::<u32>(4);
        for n in 0..4 {
            tx.send(n).await.unwrap();
        }
        drop(tx);

        let a = rx.clone();
        let b = rx.clone();
        let (from_a, from_b) = tokio::join!(
            async {
                let mut got = Vec::new();
                while let Some(n) = a.recv().await {
                    got.push(n);
                }
                got
            },
            async {
                let mut got = Vec::new();
                while let Some(n) = b.recv().await {
                    got.push(n);
                }
                got
            }
        );
        let mut all: Vec<u32> = from_a.into_iter().chain(from_b).collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn send_blocks_when_full() {
        let (tx, rx) = stage_queue::<u32>(1);
        tx.send(0).await.unwrap();
        // Queue is full: a second send must not complete until a recv
        let pending = tx.send(1);
        tokio::pin!(pending);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), &mut pending)
                .await
                .is_err()
        );
        assert_eq!(rx.recv().await, Some(0));
        pending.await.unwrap();
        assert_eq!(rx.recv().await, Some(1));
    }
}
