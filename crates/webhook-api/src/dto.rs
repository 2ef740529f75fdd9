//! 响应结构
//!
//! 字段名与前端约定的 JSON 保持一致。

use serde::{Deserialize, Serialize};

/// 202：已入队
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAccepted {
    pub success: bool,
    pub uuid: String,
    pub status: String,
    pub message: String,
}

/// 200：系列不在白名单内，直接忽略
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookIgnored {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryProgress {
    pub iso3: String,
    pub progress: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub countries: Vec<CountryProgress>,
    pub total: usize,
}

/// 用户最近一次阅读所在的国家
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocation {
    pub user: String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
    #[serde(rename = "capaURL")]
    pub capa_url: String,
    pub iso3: String,
    pub pais: String,
    pub livro: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLocationsResponse {
    pub users: Vec<UserLocation>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryReading {
    pub user: String,
    #[serde(rename = "avatarURL")]
    pub avatar_url: String,
    #[serde(rename = "capaURL")]
    pub capa_url: String,
    pub livro: String,
    pub progresso: i32,
    pub categoria: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryReadingsResponse {
    pub readings: Vec<CountryReading>,
    pub total: usize,
}
