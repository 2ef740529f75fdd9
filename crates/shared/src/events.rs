//! 事件模型
//!
//! 定义阅读挑战 webhook 的请求体结构、队列中传递的消息指针，
//! 以及写入阅读存储的规范化记录。字段名与上游 JSON 保持一致。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 阅读记录的固定分区键
pub const READING_PARTITION_KEY: &str = "EVENT#LEITURA";

/// 参与处理的挑战类型
pub const PROCESSABLE_TIPOS: [&str; 2] = ["leitura", "atividade"];

// ---------------------------------------------------------------------------
// WebhookPayload — 上游提交的完整请求体
// ---------------------------------------------------------------------------

/// 显式的 `null` 与缺失字段一样取默认值
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// 用户资料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Perfil {
    #[validate(length(min = 1, message = "Missing required field: perfil.nome"))]
    #[serde(deserialize_with = "null_as_default")]
    pub nome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub link: String,
    /// 头像 URL
    #[serde(deserialize_with = "null_as_default")]
    pub imagem: String,
}

/// 活动系列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Maratona {
    #[serde(deserialize_with = "null_as_default")]
    pub nome: String,
    #[serde(deserialize_with = "null_as_default")]
    pub identificador: String,
}

/// 书籍版本信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Edicao {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub titulo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capa: Option<String>,
}

/// 挑战关联的一次阅读进度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Vinculado {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub completo: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub progresso: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avaliacao: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comentario: Option<String>,
    /// `YYYY-MM-DD` 或 RFC-3339
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edicao: Option<Edicao>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dia_marcado: Option<String>,
}

/// 单个挑战条目，`descricao` 是国家名
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Desafio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub descricao: String,
    #[serde(deserialize_with = "null_as_default")]
    pub categoria: String,
    #[serde(deserialize_with = "null_as_default")]
    pub concluido: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub tipo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vinculados: Vec<Vinculado>,
}

impl Desafio {
    /// 未识别的类型直接跳过，既不算成功也不算失败
    pub fn is_processable(&self) -> bool {
        PROCESSABLE_TIPOS.contains(&self.tipo.as_str())
    }
}

/// webhook 请求体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct WebhookPayload {
    #[validate(nested)]
    #[serde(deserialize_with = "null_as_default")]
    pub perfil: Perfil,
    #[serde(deserialize_with = "null_as_default")]
    pub maratona: Maratona,
    #[validate(length(min = 1, message = "No desafios provided"))]
    #[serde(deserialize_with = "null_as_default")]
    pub desafios: Vec<Desafio>,
}

impl WebhookPayload {
    /// 校验必填字段，返回第一条面向调用方的错误信息
    ///
    /// 先检查 `perfil.nome`，再检查 `desafios`，保证信息稳定。
    pub fn validation_message(&self) -> Option<String> {
        let errors = self.validate().err()?;
        for field in ["perfil", "desafios"] {
            if let Some(message) = first_message(&errors, field) {
                return Some(message);
            }
        }
        Some(errors.to_string())
    }
}

/// 在嵌套的校验错误中取出指定字段的第一条信息
fn first_message(errors: &ValidationErrors, field: &str) -> Option<String> {
    match errors.errors().get(field)? {
        ValidationErrorsKind::Field(list) => list
            .iter()
            .find_map(|e| e.message.as_ref().map(|m| m.to_string())),
        ValidationErrorsKind::Struct(inner) => inner
            .errors()
            .keys()
            .find_map(|key| first_message(inner, key)),
        ValidationErrorsKind::List(items) => items
            .values()
            .find_map(|inner| inner.errors().keys().find_map(|key| first_message(inner, key))),
    }
}

// ---------------------------------------------------------------------------
// QueueMessage — 队列中的消息指针
// ---------------------------------------------------------------------------

/// 队列消息
///
/// 只携带指向原始请求体的 UUID，完整内容由消费端从 Payload Store 读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub uuid: String,
    pub user: String,
    /// RFC-3339
    pub timestamp: String,
}

impl QueueMessage {
    pub fn new(uuid: impl Into<String>, user: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            uuid: uuid.into(),
            user: user.into(),
            timestamp: timestamp.to_rfc3339(),
        }
    }

    /// 解析消息时间戳，格式不合法时回退为当前时间
    pub fn parsed_timestamp(&self) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

// ---------------------------------------------------------------------------
// NormalizedReading — 规范化阅读记录
// ---------------------------------------------------------------------------

/// 写入阅读存储的记录
///
/// 主键为 (`pk`, `sk`)，`sk` 形如 `{uuid}#{iso3}#{index}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReading {
    pub pk: String,
    pub sk: String,
    pub iso3: String,
    pub pais: String,
    pub categoria: String,
    /// 0..=100
    pub progresso: i32,
    pub user: String,
    #[serde(rename = "imagemURL")]
    pub imagem_url: String,
    pub livro: String,
    #[serde(rename = "capaURL")]
    pub capa_url: String,
    pub webhook_uuid: String,
    /// RFC-3339
    pub updated_at: String,
}

/// 阅读记录的排序键
pub fn reading_sort_key(uuid: &str, iso3: &str, index: usize) -> String {
    format!("{uuid}#{iso3}#{index}")
}
