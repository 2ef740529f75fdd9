//! 消费端错误分类
//!
//! 封闭的错误种类集合决定一条消息是确认丢弃还是重投：
//! 数据本身有问题的错误是永久性的，基础设施故障才值得重试。

use leitura_shared::error::PipelineError;

/// 错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 队列消息无法解析
    InvalidMessage,
    /// 请求体在存储中不存在
    PayloadNotFound,
    /// 读取请求体时的瞬时故障
    PayloadFetchFailure,
    /// 请求体不是合法的 JSON
    InvalidPayloadJson,
    /// 国家名无法映射为 ISO3
    CountryNotFound,
    /// 写入阅读存储失败
    StoreWriteFailure,
}

impl ErrorKind {
    /// 用于日志字段和指标标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidMessage => "invalid_message",
            Self::PayloadNotFound => "payload_not_found",
            Self::PayloadFetchFailure => "payload_fetch_failure",
            Self::InvalidPayloadJson => "invalid_payload_json",
            Self::CountryNotFound => "country_not_found",
            Self::StoreWriteFailure => "store_write_failure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 只有请求体读取故障和存储写入故障可重试
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::PayloadFetchFailure | ErrorKind::StoreWriteFailure
    )
}

/// 消费端错误
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("队列消息格式无效: {0}")]
    InvalidMessage(String),

    #[error("请求体不存在: {key}")]
    PayloadNotFound { key: String },

    #[error("读取请求体失败: {0}")]
    PayloadFetch(#[source] PipelineError),

    #[error("请求体 JSON 无效: {0}")]
    InvalidPayloadJson(String),

    #[error("国家未收录: {country}")]
    CountryNotFound { country: String },

    #[error("写入阅读记录失败: {0}")]
    StoreWrite(#[source] PipelineError),
}

impl ConsumerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMessage(_) => ErrorKind::InvalidMessage,
            Self::PayloadNotFound { .. } => ErrorKind::PayloadNotFound,
            Self::PayloadFetch(_) => ErrorKind::PayloadFetchFailure,
            Self::InvalidPayloadJson(_) => ErrorKind::InvalidPayloadJson,
            Self::CountryNotFound { .. } => ErrorKind::CountryNotFound,
            Self::StoreWrite(_) => ErrorKind::StoreWriteFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        is_retryable(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(is_retryable(ErrorKind::PayloadFetchFailure));
        assert!(is_retryable(ErrorKind::StoreWriteFailure));

        assert!(!is_retryable(ErrorKind::InvalidMessage));
        assert!(!is_retryable(ErrorKind::PayloadNotFound));
        assert!(!is_retryable(ErrorKind::InvalidPayloadJson));
        assert!(!is_retryable(ErrorKind::CountryNotFound));
    }

    #[test]
    fn test_error_kind_mapping() {
        let err = ConsumerError::PayloadNotFound {
            key: "payloads/abc.json".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::PayloadNotFound);
        assert!(!err.is_retryable());

        let err = ConsumerError::StoreWrite(PipelineError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.kind(), ErrorKind::StoreWriteFailure);
        assert!(err.is_retryable());

        let err = ConsumerError::PayloadFetch(PipelineError::Database(sqlx::Error::PoolClosed));
        assert_eq!(err.kind(), ErrorKind::PayloadFetchFailure);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ConsumerError::CountryNotFound {
            country: "Atlântida".to_string(),
        };
        assert_eq!(err.to_string(), "国家未收录: Atlântida");

        let err = ConsumerError::InvalidMessage("expected value at line 1".to_string());
        assert_eq!(err.to_string(), "队列消息格式无效: expected value at line 1");

        let err = ConsumerError::PayloadNotFound {
            key: "payloads/x.json".to_string(),
        };
        assert_eq!(err.to_string(), "请求体不存在: payloads/x.json");

        assert_eq!(ErrorKind::StoreWriteFailure.to_string(), "store_write_failure");
    }
}
