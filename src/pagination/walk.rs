//! Обход цепочки страниц от первого токена по meta.next до пустого сентинела.
//!
//! Фоновые страницы могут быть ещё не записаны: InvalidPageReference на
//! только что полученном next-токене повторяется (with_retry), а не считается фатальным.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use crate::error::{ProxyError, Result};
use crate::page::{Page, PageInfo};
use crate::store::{PageStore, StoreError};

pub struct ChainWalk<'a> {
    store: &'a PageStore,
    dataset_hash: String,
    next: Option<String>,
    seen: HashSet<String>,
    retries: u32,
    retry_delay: Duration,
}

/// Итератор по страницам датасета начиная с `first_token`.
pub fn walk_chain<'a>(store: &'a PageStore, dataset_hash: &str, first_token: &str) -> ChainWalk<'a> {
    ChainWalk {
        store,
        dataset_hash: dataset_hash.to_string(),
        next: Some(first_token.to_string()),
        seen: HashSet::new(),
        retries: 0,
        retry_delay: Duration::from_millis(20),
    }
}

impl<'a> ChainWalk<'a> {
    /// Сколько раз повторять чтение не-первой страницы, которой ещё нет.
    pub fn with_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    fn fetch(&self, token: &str, first: bool) -> Result<Page> {
        let info = PageInfo::new(self.dataset_hash.as_str(), token);
        let mut attempt = 0u32;
        let bytes = loop {
            match self.store.read(&info) {
                Ok(b) => break b,
                Err(StoreError::InvalidPageReference) if !first && attempt < self.retries => {
                    attempt += 1;
                    thread::sleep(self.retry_delay);
                }
                Err(e) => return Err(e.into()),
            }
        };
        Page::from_json(&bytes).map_err(|_| ProxyError::CorruptOrTamperedPage)
    }
}

impl<'a> Iterator for ChainWalk<'a> {
    type Item = Result<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next.take()?;
        if !self.seen.insert(token.clone()) {
            // цикл в цепочке - повреждённые данные
            return Some(Err(ProxyError::CorruptOrTamperedPage));
        }
        let first = self.seen.len() == 1;
        match self.fetch(&token, first) {
            Ok(page) => {
                self.next = page.next_token().map(str::to_string);
                Some(Ok(page))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
