//! Операции маршрутов: выдача страницы и создание датасетов (mock / CSV).

use serde::{Deserialize, Serialize};

use super::{content, Dispatcher, Incoming, Reply, RequestContext};
use crate::error::{ProxyError, Result};
use crate::page::{Column, PageInfo};
use crate::pagination::{PageChain, Paginator};
use crate::source::csv_file::resolve_source_path;
use crate::source::{CsvSource, MockColumn, MockSource};

/// Тело запроса /page.
#[derive(Debug, Deserialize)]
pub struct PageRequest {
    pub hash: String,
    pub token: String,
}

/// Тело запроса /create: `max_records` случайных записей.
#[derive(Debug, Deserialize)]
pub struct MockCreateRequest {
    #[serde(rename = "max_records")]
    pub record_count: usize,
    pub columns: Vec<MockColumn>,
    pub records_per_page: usize,
    #[serde(default)]
    pub inline_first_page: bool,
}

/// Тело запроса /existing: CSV-файл на стороне сервера.
#[derive(Debug, Deserialize)]
pub struct ExistingRequest {
    pub file_name: String,
    pub columns: Vec<Column>,
    pub records_per_page: usize,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default)]
    pub inline_first_page: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub hash: String,
    pub tokens: Vec<String>,
}

pub(super) fn retrieve_page(d: &Dispatcher, ctx: &RequestContext, req: &Incoming) -> Result<Reply> {
    let types = content::negotiate(req.content_types.iter().map(String::as_str));
    if types.is_empty() {
        return Err(ProxyError::UnsupportedContentType(content::supported_types()));
    }

    let pg: PageRequest = serde_json::from_slice(&req.body)?;
    let info = PageInfo::new(pg.hash, pg.token).with_content_types(types);

    let mut worker = d.pool().acquire();
    ctx.log.debug(format_args!("Page {}: worker {}", info.page_token, worker.id()));
    let body = worker.fetch(&ctx.store, &info)?;
    Ok(Reply::json(200, body))
}

pub(super) fn create_mock(d: &Dispatcher, ctx: &RequestContext, req: &Incoming) -> Result<Reply> {
    let p: MockCreateRequest = serde_json::from_slice(&req.body)?;
    for col in &p.columns {
        col.validate()
            .map_err(|e| ProxyError::InvalidInput(format!("{:#}", e)))?;
    }
    let columns: Vec<Column> = p.columns.iter().map(MockColumn::column).collect();
    let source = MockSource::new(p.columns, p.record_count);

    let chain = paginator(d, ctx).paginate(source, &columns, p.records_per_page)?;
    chain_reply(chain, p.inline_first_page)
}

pub(super) fn create_from_file(d: &Dispatcher, ctx: &RequestContext, req: &Incoming) -> Result<Reply> {
    let p: ExistingRequest = serde_json::from_slice(&req.body)?;
    if p.records_per_page == 0 {
        return Err(ProxyError::InvalidInput("records_per_page must be at least 1".into()));
    }

    let path = resolve_source_path(&p.file_name, d.ingest_root()).map_err(|e| {
        ctx.log.error(format_args!("{:#}", e));
        ProxyError::InvalidInput(format!("{:#}", e))
    })?;
    let source = CsvSource::open(&path, p.has_header).map_err(|e| {
        ctx.log.error(format_args!("{:#}", e));
        ProxyError::InvalidInput(format!("{:#}", e))
    })?;

    let chain = paginator(d, ctx).paginate(source, &p.columns, p.records_per_page)?;
    chain_reply(chain, p.inline_first_page)
}

fn paginator(d: &Dispatcher, ctx: &RequestContext) -> Paginator {
    Paginator::new(ctx.store.clone(), d.tasks().clone(), ctx.log.clone())
}

fn chain_reply(chain: PageChain, inline_first_page: bool) -> Result<Reply> {
    if inline_first_page {
        let first = chain.first_token().to_string();
        return Ok(Reply::json(200, chain.first_page)
            .with_header("X-Dataset-Hash", chain.dataset_hash)
            .with_header("X-Page-Token", first));
    }
    let body = serde_json::to_vec(&CreateResponse {
        hash: chain.dataset_hash,
        tokens: chain.tokens,
    })
    .map_err(|_| ProxyError::Internal)?;
    Ok(Reply::json(200, body))
}
