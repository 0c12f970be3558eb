//! Per-account sequence counter.
//!
//! Transactions from one account must carry strictly increasing sequence
//! numbers. The counter is cached between submissions and serialized behind
//! an async mutex so concurrent callers sharing one account never sign with
//! the same number.

use std::future::Future;

use nimbus_core::error::{ExternalError, NimbusError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct AccountSequence {
    cached: Mutex<Option<AccountInfo>>,
}

impl AccountSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached account state, if any.
    pub async fn peek(&self) -> Option<AccountInfo> {
        *self.cached.lock().await
    }

    /// Drop the cached value; the next submission refetches it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Run `send` with the next sequence number while holding the counter.
    ///
    /// `fetch` reads the authoritative value from the chain when nothing is
    /// cached. A sequence mismatch refetches and retries once; any other
    /// failure clears the cache.
    pub async fn run<T, F, FF, S, SF>(&self, fetch: F, send: S) -> Result<T, NimbusError>
    where
        F: Fn() -> FF,
        FF: Future<Output = Result<AccountInfo, NimbusError>>,
        S: Fn(AccountInfo) -> SF,
        SF: Future<Output = Result<T, NimbusError>>,
    {
        let mut cached = self.cached.lock().await;
        let mut retried = false;
        loop {
            let info = match *cached {
                Some(info) => info,
                None => fetch().await?,
            };
            match send(info).await {
                Ok(value) => {
                    *cached = Some(AccountInfo {
                        sequence: info.sequence + 1,
                        ..info
                    });
                    return Ok(value);
                }
                Err(NimbusError::External(ExternalError::SequenceMismatch(log))) if !retried => {
                    warn!(sequence = info.sequence, %log, "sequence mismatch, refetching");
                    *cached = None;
                    retried = true;
                }
                Err(e) => {
                    *cached = None;
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn info(sequence: u64) -> AccountInfo {
        AccountInfo {
            account_number: 9,
            sequence,
        }
    }

    #[tokio::test]
    async fn increments_cached_sequence() {
        let seq = AccountSequence::new();
        let counter = AtomicU64::new(0);
        let fetches = &counter;
        let fetch = move || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            Ok::<_, NimbusError>(info(4))
        };
        let send = |i: AccountInfo| async move { Ok::<_, NimbusError>(i.sequence) };

        let a = seq.run(fetch, send).await.unwrap();
        let b = seq.run(fetch, send).await.unwrap();
        assert_eq!((a, b), (4, 5));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(seq.peek().await, Some(info(6)));
    }

    #[tokio::test]
    async fn mismatch_refetches_and_retries_once() {
        let seq = AccountSequence::new();
        let chain = Arc::new(AtomicU64::new(10));
        // Stale cache: the chain has moved on.
        seq.run(
            || async { Ok::<_, NimbusError>(info(3)) },
            |_| async { Ok::<_, NimbusError>(()) },
        )
        .await
        .unwrap();

        let fetch = || {
            let chain = Arc::clone(&chain);
            async move { Ok::<_, NimbusError>(info(chain.load(Ordering::SeqCst))) }
        };
        let send = |i: AccountInfo| {
            let chain = Arc::clone(&chain);
            async move {
                if i.sequence == chain.load(Ordering::SeqCst) {
                    Ok(i.sequence)
                } else {
                    Err(NimbusError::from(ExternalError::SequenceMismatch(
                        "account sequence mismatch".into(),
                    )))
                }
            }
        };
        assert_eq!(seq.run(fetch, send).await.unwrap(), 10);
        assert_eq!(seq.peek().await, Some(info(11)));
    }

    #[tokio::test]
    async fn second_mismatch_is_surfaced() {
        let seq = AccountSequence::new();
        let err = seq
            .run(
                || async { Ok::<_, NimbusError>(info(1)) },
                |_| async {
                    Err::<(), _>(NimbusError::from(ExternalError::SequenceMismatch(
                        "again".into(),
                    )))
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(seq.peek().await, None);
    }

    #[tokio::test]
    async fn other_failures_clear_the_cache() {
        let seq = AccountSequence::new();
        seq.run(
            || async { Ok::<_, NimbusError>(info(1)) },
            |_| async { Ok::<_, NimbusError>(()) },
        )
        .await
        .unwrap();
        let err = seq
            .run(
                || async { Ok::<_, NimbusError>(info(1)) },
                |_| async {
                    Err::<(), _>(NimbusError::Rejected {
                        code: 5,
                        log: "out of gas".into(),
                    })
                },
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(seq.peek().await, None);
    }
}
