use std::num::NonZeroUsize;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error};
use tokio::sync::Semaphore;

use crate::EngineError;

/// Runs blocking work on a bounded set of worker threads.
///
/// At most `size` operations execute at once; extra callers wait for a slot
/// without blocking the async runtime. A slot is released when its operation
/// returns, fails or panics.
#[derive(Debug, Clone)]
pub struct BlockingOffloader {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingOffloader {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// One worker per available CPU.
    pub fn with_default_size() -> Self {
        Self::new(default_pool_size())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running operation.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T, E>(&self, label: &str, op: F) -> Result<T, EngineError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<EngineError> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::Configuration("worker pool is shut down".into()))?;
        engine_debug!("offload_start label={} free={}", label, self.available());

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            op()
        });

        match handle.await {
            Ok(result) => result.map_err(Into::into),
            Err(join) => {
                engine_error!("offload_panic label={} error=\"{}\"", label, join);
                Err(EngineError::scrape(
                    format!("blocking operation `{label}` did not complete"),
                    Some(Box::new(join)),
                ))
            }
        }
    }
}

pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
