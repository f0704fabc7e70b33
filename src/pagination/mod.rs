//! pagination - нарезка потока записей в цепочку страниц в PageStore.
//!
//! Алгоритм:
//! - новый dataset hash и токен первой страницы;
//! - копим записи до records_per_page + 1 (одна запись "заглядывания" вперёд
//!   говорит, что следующая страница существует);
//! - при переполнении: новый токен, страница из первых records_per_page записей
//!   с meta.next = новый токен, лишняя запись переносится в следующую пачку;
//! - остаток пишется терминальной страницей с meta.next = "".
//!
//! Первая страница пишется СИНХРОННО (к ответу она гарантированно читаема),
//! все последующие - фоновыми задачами BackgroundTasks без ожидания.
//! Ошибка первой страницы обрывает операцию; ошибка фоновой - только лог,
//! клиент по такому next-токену позже получит InvalidPageReference.

use crate::error::{ProxyError, Result};
use crate::logging::Logger;
use crate::page::{Column, Page, PageHeader, PageInfo, Record, END_OF_CHAIN};
use crate::store::PageStore;
use crate::token::new_token;

mod tasks;
mod walk;

pub use tasks::{BackgroundTasks, TaskCounts};
pub use walk::{walk_chain, ChainWalk};

const BATCH_PREALLOC: usize = 1024;

/// Результат пагинации: всё, что нужно клиенту, чтобы сразу начать чтение.
#[derive(Clone, Debug)]
pub struct PageChain {
    pub dataset_hash: String,
    /// Токены всех страниц в порядке цепочки; tokens[0] - первая страница.
    pub tokens: Vec<String>,
    /// JSON первой страницы (уже записанной синхронно).
    pub first_page: Vec<u8>,
}

impl PageChain {
    pub fn first_token(&self) -> &str {
        &self.tokens[0]
    }
}

pub struct Paginator {
    store: PageStore,
    tasks: BackgroundTasks,
    log: Logger,
}

impl Paginator {
    pub fn new(store: PageStore, tasks: BackgroundTasks, log: Logger) -> Self {
        Self { store, tasks, log }
    }

    /// Разложить `records` в цепочку страниц по `records_per_page` записей.
    pub fn paginate<I>(&self, records: I, columns: &[Column], records_per_page: usize) -> Result<PageChain>
    where
        I: IntoIterator<Item = anyhow::Result<Record>>,
    {
        if records_per_page == 0 {
            return Err(ProxyError::InvalidInput(
                "records_per_page must be at least 1".to_string(),
            ));
        }

        let header = PageHeader::from_columns(columns);
        let dataset_hash = new_token();
        let mut cur_token = new_token();
        let mut tokens = vec![cur_token.clone()];
        let mut first_page: Option<Vec<u8>> = None;

        // records_per_page приходит из запроса: не резервируем память под него целиком
        let mut batch: Vec<Record> = Vec::with_capacity(records_per_page.min(BATCH_PREALLOC));

        for rec in records {
            let rec = rec.map_err(|e| {
                self.log.error(format_args!("error reading record: {:#}", e));
                ProxyError::InvalidInput(format!("{:#}", e))
            })?;
            batch.push(rec);

            if batch.len() > records_per_page {
                let carry = batch.split_off(records_per_page);
                let full = std::mem::replace(&mut batch, carry);
                let next_token = new_token();

                let page = Page::new(next_token.clone(), header.clone(), full);
                self.persist(&dataset_hash, &cur_token, &page, &mut first_page)?;

                tokens.push(next_token.clone());
                cur_token = next_token;
            }
        }

        let last = Page::new(END_OF_CHAIN.to_string(), header, batch);
        self.persist(&dataset_hash, &cur_token, &last, &mut first_page)?;

        self.log.debug(format_args!("Hash: {}, Pages: {:?}", dataset_hash, tokens));

        Ok(PageChain {
            dataset_hash,
            tokens,
            // persist всегда заполняет first_page на первом вызове
            first_page: first_page.unwrap_or_default(),
        })
    }

    /// Первая страница - синхронно, остальные - в фоне.
    fn persist(
        &self,
        dataset_hash: &str,
        token: &str,
        page: &Page,
        first_page: &mut Option<Vec<u8>>,
    ) -> Result<()> {
        let bytes = page.to_json().map_err(|e| {
            self.log.error(format_args!("Page {}: encode error - {}", token, e));
            ProxyError::Internal
        })?;
        let info = PageInfo::new(dataset_hash, token);

        if first_page.is_none() {
            self.store.write(&bytes, &info).map_err(|e| {
                self.log.error(format_args!("Page {}: first page write failed - {}", token, e));
                ProxyError::from(e)
            })?;
            *first_page = Some(bytes);
            return Ok(());
        }

        let store = self.store.clone();
        self.tasks.spawn(
            format!("Page {}", token),
            self.log.clone(),
            move || store.write(&bytes, &info),
        );
        Ok(())
    }
}
