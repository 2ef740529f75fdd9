//! 统一可观测性模块
//!
//! 日志与 Prometheus 指标的统一初始化入口，两个服务共用同一套指标命名。

pub mod logging;
pub mod metrics;
pub mod middleware;

use ::tracing::{info, warn};
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有指标服务器的生命周期，进程退出前应保持存活。
pub struct ObservabilityGuard {
    _metrics_handle: Option<metrics::MetricsHandle>,
}

impl ObservabilityGuard {
    /// 空守卫（测试或禁用指标时使用）
    pub fn empty() -> Self {
        Self {
            _metrics_handle: None,
        }
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!("Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// 先安装日志订阅者，再按配置启动 Prometheus 导出。
///
/// ```ignore
/// let config = AppConfig::load("webhook-api")?;
/// let _guard = observability::init(&config.observability).await?;
/// ```
pub async fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    if let Err(e) = logging::init(config) {
        // 订阅者已被安装时沿用现有的
        warn!(error = %e, "日志订阅者已存在，跳过安装");
    }

    info!(
        service = %config.service_name,
        metrics_enabled = config.metrics_enabled,
        metrics_port = config.metrics_port,
        json_logs = config.json_logs,
        "Observability initialized"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init(config).await?)
    } else {
        None
    };

    Ok(ObservabilityGuard {
        _metrics_handle: metrics_handle,
    })
}
