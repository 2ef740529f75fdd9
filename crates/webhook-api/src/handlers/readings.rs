//! 单个国家的阅读列表

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::{info, warn};

use crate::dto::{CountryReading, CountryReadingsResponse};
use crate::error::{ApiError, Result};
use crate::query::ReadingRow;
use crate::state::AppState;

/// 规范化路径中的 ISO3 代码：去空白、转大写，必须是 3 个 ASCII 字母
pub fn normalize_iso3(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    (code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())).then_some(code)
}

/// 按进度降序、更新时间降序排列
pub fn sort_country_readings(rows: Vec<ReadingRow>) -> Vec<CountryReading> {
    let mut rows = rows;
    rows.sort_by(|a, b| {
        b.progresso
            .cmp(&a.progresso)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
    });

    rows.into_iter()
        .map(|row| CountryReading {
            user: row.user_name,
            avatar_url: row.imagem_url,
            capa_url: row.capa_url,
            livro: row.livro,
            progresso: row.progresso,
            categoria: row.categoria,
            updated_at: row.updated_at,
        })
        .collect()
}

pub async fn get_country_readings(
    State(state): State<AppState>,
    Path(iso3): Path<String>,
) -> Result<Json<CountryReadingsResponse>> {
    let Some(code) = normalize_iso3(&iso3) else {
        warn!(iso3 = %iso3, "ISO3 代码格式错误");
        return Err(ApiError::InvalidIso3);
    };

    let rows = state
        .readings
        .country_readings(&code, 1)
        .await
        .map_err(ApiError::Query)?;
    let readings = sort_country_readings(rows);

    info!(iso3 = %code, readings = readings.len(), "国家阅读列表已生成");

    Ok(Json(CountryReadingsResponse {
        total: readings.len(),
        readings,
    }))
}
