//! 并发限制器
//!
//! 限制同时运行的浏览器会话数，名额已满时立即拒绝而不是排队

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{AppError, Result};

/// 并发限制器
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

/// 运行名额，drop 时自动归还
#[derive(Debug)]
pub struct JobPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// 非阻塞获取名额
    pub fn try_acquire(&self) -> Result<JobPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map(|permit| JobPermit { _permit: permit })
            .map_err(|_| AppError::RateLimited { limit: self.limit })
    }

    /// 正在使用的名额数
    pub fn active(&self) -> usize {
        self.limit.saturating_sub(self.semaphore.available_permits())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
