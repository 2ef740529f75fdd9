//! 国家进度统计

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use tracing::info;

use crate::dto::{CountryProgress, StatsResponse};
use crate::error::{ApiError, Result};
use crate::query::ReadingRow;
use crate::state::AppState;

/// 每个国家取所有阅读记录中的最大进度，按 ISO3 排序
pub fn country_progress(rows: &[ReadingRow]) -> Vec<CountryProgress> {
    let mut best: BTreeMap<&str, i32> = BTreeMap::new();
    for row in rows.iter().filter(|r| !r.iso3.is_empty()) {
        let entry = best.entry(row.iso3.as_str()).or_insert(row.progresso);
        *entry = (*entry).max(row.progresso);
    }

    best.into_iter()
        .map(|(iso3, progress)| CountryProgress {
            iso3: iso3.to_string(),
            progress,
        })
        .collect()
}

pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let rows = state.readings.all_readings().await.map_err(ApiError::Query)?;
    let countries = country_progress(&rows);

    info!(readings = rows.len(), countries = countries.len(), "统计已生成");

    Ok(Json(StatsResponse {
        total: countries.len(),
        countries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingQueue, StaticReadings, TestApp, VALID_KEY, json_body, row};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;

    #[test]
    fn test_country_progress_takes_maximum() {
        let rows = vec![
            row("ana", "BRA", 40, "2026-01-10T00:00:00+00:00"),
            row("bia", "BRA", 75, "2026-01-11T00:00:00+00:00"),
            row("ana", "ARG", 10, "2026-01-12T00:00:00+00:00"),
            row("caio", "BRA", 20, "2026-01-13T00:00:00+00:00"),
        ];

        assert_eq!(
            country_progress(&rows),
            vec![
                CountryProgress { iso3: "ARG".to_string(), progress: 10 },
                CountryProgress { iso3: "BRA".to_string(), progress: 75 },
            ]
        );
    }

    #[test]
    fn test_country_progress_empty() {
        assert!(country_progress(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = TestApp::with(
            Arc::new(RecordingQueue::default()),
            StaticReadings {
                rows: vec![
                    row("ana", "PRT", 100, "2026-02-01T00:00:00+00:00"),
                    row("bia", "JPN", 30, "2026-02-02T00:00:00+00:00"),
                ],
                ..Default::default()
            },
        );

        let response = app
            .send(
                Request::get("/stats")
                    .header("x-api-key", VALID_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["total"], 2);
        assert_eq!(json["countries"][0]["iso3"], "JPN");
        assert_eq!(json["countries"][0]["progress"], 30);
        assert_eq!(json["countries"][1]["iso3"], "PRT");
        assert_eq!(json["countries"][1]["progress"], 100);
    }

    #[tokio::test]
    async fn test_stats_requires_api_key() {
        let app = TestApp::new();
        let response = app
            .send(Request::get("/stats").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stats_query_failure() {
        let app = TestApp::with(
            Arc::new(RecordingQueue::default()),
            StaticReadings {
                fail: true,
                ..Default::default()
            },
        );
        let response = app
            .send(
                Request::get("/stats")
                    .header("x-api-key", VALID_KEY)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "INTERNAL_ERROR");
        assert_eq!(json["message"], "Error fetching data");
    }
}
