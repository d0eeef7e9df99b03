use std::sync::Arc;

use crate::error::AppError;
use crate::infra::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<DbPool>,
}

impl AppState {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Run one use case against the pool on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&DbPool) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || f(pool.as_ref()))
            .await
            .map_err(|e| AppError::Server(format!("use case task failed: {e}")))?
    }
}
