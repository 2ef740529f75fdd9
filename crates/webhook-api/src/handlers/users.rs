//! 用户最近阅读位置

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use tracing::info;

use crate::dto::{UserLocation, UserLocationsResponse};
use crate::error::{ApiError, Result};
use crate::query::ReadingRow;
use crate::state::AppState;

/// 每个用户取 `updated_at` 最新的一条记录
///
/// 进度为 0 或用户名为空的记录不参与。时间相同时保留先出现的记录。
pub fn latest_user_locations(rows: &[ReadingRow]) -> Vec<UserLocation> {
    let mut latest: BTreeMap<&str, &ReadingRow> = BTreeMap::new();

    for row in rows {
        if row.user_name.is_empty() || row.progresso < 1 {
            continue;
        }
        latest
            .entry(row.user_name.as_str())
            .and_modify(|current| {
                if row.updated_at > current.updated_at {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    latest
        .into_values()
        .map(|row| UserLocation {
            user: row.user_name.clone(),
            avatar_url: row.imagem_url.clone(),
            capa_url: row.capa_url.clone(),
            iso3: row.iso3.clone(),
            pais: row.pais.clone(),
            livro: row.livro.clone(),
            timestamp: row.updated_at.clone(),
        })
        .collect()
}

pub async fn get_users(State(state): State<AppState>) -> Result<Json<UserLocationsResponse>> {
    let rows = state.readings.all_readings().await.map_err(ApiError::Query)?;
    let users = latest_user_locations(&rows);

    info!(readings = rows.len(), users = users.len(), "用户位置已生成");

    Ok(Json(UserLocationsResponse {
        total: users.len(),
        users,
    }))
}
