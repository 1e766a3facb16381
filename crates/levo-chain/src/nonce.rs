use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::SendTimedOut;

/// Hands out nonces for the shared signer and serializes submissions.
///
/// The lock is held from nonce assignment until the node has accepted (or
/// rejected) the transaction, so concurrent sessions never race for the
/// same nonce. Both the pending-count fetch and the send are bounded by
/// `send_timeout`, so a stalled node cannot hold the lock forever. Any
/// rejected or timed-out send drops the cached value and the next
/// submission resyncs from the pending count.
#[derive(Debug)]
pub struct NonceSequencer {
    next: Mutex<Option<u64>>,
    send_timeout: Duration,
}

impl NonceSequencer {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            next: Mutex::new(None),
            send_timeout,
        }
    }

    pub async fn submit_with<T, E, F, FFut, S, SFut>(&self, fetch: F, send: S) -> Result<T, E>
    where
        E: From<SendTimedOut>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<u64, E>>,
        S: FnOnce(u64) -> SFut,
        SFut: Future<Output = Result<T, E>>,
    {
        let mut guard = self.next.lock().await;
        let nonce = match *guard {
            Some(n) => n,
            None => {
                let n = timeout(self.send_timeout, fetch())
                    .await
                    .map_err(|_| SendTimedOut(self.send_timeout))??;
                debug!(nonce = n, "Nonce synced from chain");
                n
            }
        };

        match timeout(self.send_timeout, send(nonce)).await {
            Ok(Ok(value)) => {
                *guard = Some(nonce + 1);
                Ok(value)
            }
            Ok(Err(e)) => {
                warn!(nonce, "Submission rejected, nonce will be resynced");
                *guard = None;
                Err(e)
            }
            Err(_) => {
                warn!(
                    nonce,
                    timeout_secs = self.send_timeout.as_secs(),
                    "Send timed out, nonce will be resynced"
                );
                *guard = None;
                Err(SendTimedOut(self.send_timeout).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use levo_models::FailureKind;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn sequencer() -> NonceSequencer {
        NonceSequencer::new(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn sequential_submissions_increment() {
        let seq = sequencer();
        let fetches = AtomicU64::new(0);
        let fetch = || async {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ExecutionError>(7)
        };

        let a = seq.submit_with(fetch, |n| async move { Ok::<_, ExecutionError>(n) }).await;
        let b = seq
            .submit_with(|| async { Ok::<_, ExecutionError>(0) }, |n| async move { Ok(n) })
            .await;
        assert_eq!(a, Ok(7));
        assert_eq!(b, Ok(8));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_send_forces_resync() {
        let seq = sequencer();
        let _ = seq
            .submit_with(|| async { Ok::<_, ExecutionError>(3) }, |_| async {
                Err::<u64, _>(ExecutionError::from_message("nonce too low"))
            })
            .await;
        let next = seq
            .submit_with(|| async { Ok::<_, ExecutionError>(5) }, |n| async move { Ok(n) })
            .await;
        assert_eq!(next, Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_send_times_out_and_releases_the_lock() {
        let seq = sequencer();
        let stalled = seq
            .submit_with(|| async { Ok::<_, ExecutionError>(3) }, |_| {
                std::future::pending::<Result<u64, ExecutionError>>()
            })
            .await
            .unwrap_err();
        assert_eq!(stalled.kind, FailureKind::Timeout);

        // The lock is free again and the cached nonce was dropped.
        let next = seq
            .submit_with(|| async { Ok::<_, ExecutionError>(4) }, |n| async move { Ok(n) })
            .await;
        assert_eq!(next, Ok(4));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_fetch_times_out() {
        let seq = sequencer();
        let err = seq
            .submit_with(
                || std::future::pending::<Result<u64, ExecutionError>>(),
                |n| async move { Ok(n) },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn concurrent_submissions_get_distinct_nonces() {
        let seq = Arc::new(sequencer());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let seq = seq.clone();
            handles.push(tokio::spawn(async move {
                seq.submit_with(|| async { Ok::<_, ExecutionError>(100) }, |n| async move {
                    tokio::task::yield_now().await;
                    Ok(n)
                })
                .await
            }));
        }

        let mut nonces = Vec::new();
        for h in handles {
            nonces.push(h.await.unwrap().unwrap());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, (100..116).collect::<Vec<_>>());
    }
}
