//! 指数退避
//!
//! `RetryPolicy` 同时用于两处：发布重投信封时的进程内重试，以及
//! 计算消息下一次重投的等待时间。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::PipelineError;

/// 第 N 次重试前等待 `initial_delay * multiplier^N`，不超过 `max_delay`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 不含首次执行
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// `attempt` 从 0 开始
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        // 取整到毫秒
        Duration::from_millis((secs * 1000.0).round() as u64)
    }

    /// `failed_retries` 为已经失败的重试轮次
    pub fn should_retry(&self, failed_retries: u32) -> bool {
        failed_retries < self.max_retries
    }
}

/// 按策略重试异步操作
///
/// `is_retryable` 返回 false 的错误立即返回，不消耗重试次数。
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&PipelineError) -> bool,
    mut operation: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut failed_retries = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if failed_retries > 0 {
                    info!(operation = operation_name, retries = failed_retries, "重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !is_retryable(&err) || !policy.should_retry(failed_retries) {
            warn!(
                operation = operation_name,
                retries = failed_retries,
                retryable = is_retryable(&err),
                error = %err,
                "放弃重试"
            );
            return Err(err);
        }

        let delay = policy.delay_for_attempt(failed_retries);
        warn!(
            operation = operation_name,
            retries = failed_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "失败，退避后重试"
        );
        tokio::time::sleep(delay).await;
        failed_retries += 1;
    }
}
