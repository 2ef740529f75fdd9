//! 挑战条目处理器
//!
//! 把请求体中的每个挑战条目转换为一条规范化阅读记录：
//!
//! 1. 跳过未识别的 `tipo`
//! 2. 扫描关联进度：最大进度、最近更新条目的书名和封面、最近更新时间
//! 3. `concluido` 为真时进度记为 100，随后截断到 0..=100
//! 4. 清理国家名和分类中的 emoji，映射为 ISO3
//! 5. 写入阅读存储
//!
//! 单个条目失败只记录在结果中，不会中断其余条目。

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use leitura_shared::events::{
    Desafio, NormalizedReading, READING_PARTITION_KEY, Vinculado, WebhookPayload,
    reading_sort_key,
};
use leitura_shared::mapping::resolve_iso3;
use leitura_shared::observability::metrics;
use leitura_shared::text::strip_emojis;
use tracing::{debug, error, info, warn};

use crate::error::ConsumerError;
use crate::reading_store::ReadingStore;

/// 处理一条消息时共用的元数据
#[derive(Debug, Clone)]
pub struct ProcessingMeta {
    pub uuid: String,
    pub user: String,
    pub avatar_url: String,
    pub timestamp: DateTime<Utc>,
}

/// 单个挑战条目的处理结果
///
/// 未识别类型的条目 `processed` 为假且没有错误，即“跳过”。
#[derive(Debug)]
pub struct ProcessingResult {
    pub iso3: Option<String>,
    pub country: String,
    pub processed: bool,
    pub error: Option<ConsumerError>,
}

impl ProcessingResult {
    fn skipped() -> Self {
        Self {
            iso3: None,
            country: String::new(),
            processed: false,
            error: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        !self.processed && self.error.is_none()
    }
}

/// 一次请求体处理的汇总
#[derive(Debug, Default)]
pub struct ProcessingSummary {
    pub processed: usize,
    pub failed: usize,
    pub results: Vec<ProcessingResult>,
}

impl ProcessingSummary {
    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }
}

/// 从关联进度中提取的数据
#[derive(Debug, Clone, PartialEq)]
pub struct DesafioData {
    pub progress: i32,
    pub latest_update: DateTime<Utc>,
    pub book_title: String,
    pub cover_url: String,
}

/// 把进度截断到 0..=100
pub fn clamp_progress(progress: i64) -> i32 {
    progress.clamp(0, 100) as i32
}

/// 解析 `updatedAt`：先按 `YYYY-MM-DD`，再按 RFC-3339
pub fn parse_updated_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 带时间戳的候选字段，用于挑选最近更新条目的书名和封面
struct Latest<'a> {
    value: &'a str,
    at: Option<DateTime<Utc>>,
}

impl<'a> Latest<'a> {
    /// 有时间戳的候选优先；同为有时间戳时取更晚（相同则取后出现）；
    /// 同为无时间戳时取后出现的
    fn offer(slot: &mut Option<Self>, value: &'a str, at: Option<DateTime<Utc>>) {
        if value.is_empty() {
            return;
        }
        let replace = match (slot.as_ref().map(|c| c.at), at) {
            (None, _) => true,
            (Some(None), _) => true,
            (Some(Some(_)), None) => false,
            (Some(Some(current)), Some(candidate)) => candidate >= current,
        };
        if replace {
            *slot = Some(Self { value, at });
        }
    }
}

/// 汇总一个挑战条目的关联进度
///
/// `fallback` 用于没有可解析时间戳的情况（包括没有关联进度）。
pub fn extract_desafio_data(desafio: &Desafio, fallback: DateTime<Utc>) -> DesafioData {
    let mut max_progress: i64 = 0;
    let mut latest_update: Option<DateTime<Utc>> = None;
    let mut title: Option<Latest<'_>> = None;
    let mut cover: Option<Latest<'_>> = None;

    for vinculado in &desafio.vinculados {
        max_progress = max_progress.max(vinculado.progresso);

        let at = parse_updated_at(&vinculado.updated_at);
        if let Some(at) = at {
            latest_update = Some(latest_update.map_or(at, |current| current.max(at)));
        }

        let (book_title, cover_url) = edition_fields(vinculado);
        Latest::offer(&mut title, book_title, at);
        Latest::offer(&mut cover, cover_url, at);
    }

    if desafio.concluido {
        max_progress = 100;
    }

    DesafioData {
        progress: clamp_progress(max_progress),
        latest_update: latest_update.unwrap_or(fallback),
        book_title: title.map(|t| t.value.to_string()).unwrap_or_default(),
        cover_url: cover.map(|c| c.value.to_string()).unwrap_or_default(),
    }
}

fn edition_fields(vinculado: &Vinculado) -> (&str, &str) {
    match &vinculado.edicao {
        Some(edicao) => (
            edicao.titulo.as_deref().unwrap_or_default(),
            edicao.capa.as_deref().unwrap_or_default(),
        ),
        None => ("", ""),
    }
}

/// 挑战条目处理器
pub struct DesafioProcessor {
    store: Arc<dyn ReadingStore>,
}

impl DesafioProcessor {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// 顺序处理请求体中的全部挑战条目
    pub async fn process_all(
        &self,
        payload: &WebhookPayload,
        meta: &ProcessingMeta,
    ) -> ProcessingSummary {
        let mut summary = ProcessingSummary {
            results: Vec::with_capacity(payload.desafios.len()),
            ..Default::default()
        };

        for (index, desafio) in payload.desafios.iter().enumerate() {
            let result = self.process_desafio(desafio, index, meta).await;

            let label = match (&result.error, result.processed) {
                (_, true) => "processed",
                (Some(e), _) => e.kind().as_str(),
                (None, false) => "skipped",
            };
            metrics::record_desafio(label);

            if result.processed {
                summary.processed += 1;
            } else if result.error.is_some() {
                summary.failed += 1;
            }
            summary.results.push(result);
        }

        summary
    }

    async fn process_desafio(
        &self,
        desafio: &Desafio,
        index: usize,
        meta: &ProcessingMeta,
    ) -> ProcessingResult {
        if !desafio.is_processable() {
            debug!(uuid = %meta.uuid, index, tipo = %desafio.tipo, "跳过未识别类型的挑战条目");
            return ProcessingResult::skipped();
        }

        // 没有关联进度记当前时间；有关联进度但日期都无法解析时记消息时间
        let fallback = if desafio.vinculados.is_empty() {
            Utc::now()
        } else {
            meta.timestamp
        };
        let data = extract_desafio_data(desafio, fallback);

        let country = strip_emojis(&desafio.descricao);
        let category = strip_emojis(&desafio.categoria);

        let Some(iso3) = resolve_iso3(&country) else {
            warn!(
                uuid = %meta.uuid,
                user = %meta.user,
                country = %country,
                original = %desafio.descricao,
                "国家名无法映射为 ISO3"
            );
            return ProcessingResult {
                iso3: None,
                error: Some(ConsumerError::CountryNotFound {
                    country: country.clone(),
                }),
                country,
                processed: false,
            };
        };

        let reading = NormalizedReading {
            pk: READING_PARTITION_KEY.to_string(),
            sk: reading_sort_key(&meta.uuid, iso3, index),
            iso3: iso3.to_string(),
            pais: country.clone(),
            categoria: category,
            progresso: data.progress,
            user: meta.user.clone(),
            imagem_url: meta.avatar_url.clone(),
            livro: data.book_title,
            capa_url: data.cover_url,
            webhook_uuid: meta.uuid.clone(),
            updated_at: data.latest_update.to_rfc3339(),
        };

        if let Err(e) = self.store.save(&reading).await {
            error!(uuid = %meta.uuid, iso3, error = %e, "写入阅读记录失败");
            return ProcessingResult {
                iso3: Some(iso3.to_string()),
                country,
                processed: false,
                error: Some(ConsumerError::StoreWrite(e)),
            };
        }

        info!(
            uuid = %meta.uuid,
            user = %meta.user,
            iso3,
            country = %country,
            category = %reading.categoria,
            progress = reading.progresso,
            "挑战条目已处理"
        );

        ProcessingResult {
            iso3: Some(iso3.to_string()),
            country,
            processed: true,
            error: None,
        }
    }
}
