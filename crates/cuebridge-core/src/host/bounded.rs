//! Timeout wrapper for host calls.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use super::{ComponentStore, HostInfo, HostPage, TimelineCommand, TimelineStatus};
use crate::error::{Error, Result};
use crate::value::ParamValue;

/// Bounds every call on the wrapped store.
///
/// A call that does not finish within the timeout fails with
/// [`Error::HostUnreachable`]. Nothing is retried here.
pub struct BoundedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: ComponentStore> BoundedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, op: &str, fut: impl Future<Output = Result<T>> + Send) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Host call '{}' timed out after {:?}", op, self.timeout);
                Err(Error::HostUnreachable(format!(
                    "{} did not answer within {:?}",
                    op, self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl<S: ComponentStore> ComponentStore for BoundedStore<S> {
    async fn info(&self) -> Result<HostInfo> {
        self.bounded("info", self.inner.info()).await
    }

    async fn custom_pages(&self, path: &str) -> Result<Vec<HostPage>> {
        self.bounded("custom_pages", self.inner.custom_pages(path)).await
    }

    async fn find_components(&self, root: &str, max_depth: usize) -> Result<Vec<String>> {
        self.bounded("find_components", self.inner.find_components(root, max_depth))
            .await
    }

    async fn get(&self, path: &str, parameter: &str) -> Result<ParamValue> {
        self.bounded("get", self.inner.get(path, parameter)).await
    }

    async fn set(&self, path: &str, parameter: &str, value: ParamValue) -> Result<()> {
        self.bounded("set", self.inner.set(path, parameter, value)).await
    }

    async fn pulse(&self, path: &str, parameter: &str) -> Result<()> {
        self.bounded("pulse", self.inner.pulse(path, parameter)).await
    }

    async fn run_script(&self, code: &str) -> Result<()> {
        self.bounded("run_script", self.inner.run_script(code)).await
    }

    async fn timeline(&self, command: TimelineCommand) -> Result<TimelineStatus> {
        self.bounded("timeline", self.inner.timeline(command)).await
    }

    async fn timeline_status(&self) -> Result<TimelineStatus> {
        self.bounded("timeline_status", self.inner.timeline_status()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStore;

    /// A host that never answers.
    struct Unresponsive;

    #[async_trait]
    impl ComponentStore for Unresponsive {
        async fn info(&self) -> Result<HostInfo> {
            std::future::pending().await
        }
        async fn custom_pages(&self, _path: &str) -> Result<Vec<HostPage>> {
            std::future::pending().await
        }
        async fn find_components(&self, _root: &str, _max_depth: usize) -> Result<Vec<String>> {
            std::future::pending().await
        }
        async fn get(&self, _path: &str, _parameter: &str) -> Result<ParamValue> {
            std::future::pending().await
        }
        async fn set(&self, _path: &str, _parameter: &str, _value: ParamValue) -> Result<()> {
            std::future::pending().await
        }
        async fn pulse(&self, _path: &str, _parameter: &str) -> Result<()> {
            std::future::pending().await
        }
        async fn run_script(&self, _code: &str) -> Result<()> {
            std::future::pending().await
        }
        async fn timeline(&self, _command: TimelineCommand) -> Result<TimelineStatus> {
            std::future::pending().await
        }
        async fn timeline_status(&self) -> Result<TimelineStatus> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresponsive_host_is_reported() {
        let store = BoundedStore::new(Unresponsive, Duration::from_millis(500));
        let err = store.set("/a", "b", ParamValue::Int(1)).await;
        assert!(matches!(err, Err(Error::HostUnreachable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_passes_through() {
        let store = BoundedStore::new(MemoryStore::new("t"), Duration::from_millis(500));
        let err = store.custom_pages("/missing").await;
        assert!(matches!(err, Err(Error::NotFound(_))));
        assert!(!store.exists("/missing").await.unwrap());
    }
}
