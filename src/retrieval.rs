//! PageWorker - переиспользуемый воркер чтения страниц из HandlerPool.
//!
//! Держит scratch-буфер под распаковку: store.read_into пишет прямо в него,
//! так что на горячем пути нет аллокации под промежуточный payload.

use crate::error::{ProxyError, Result};
use crate::page::PageInfo;
use crate::pool::Recycle;
use crate::server::content;
use crate::store::PageStore;

pub const DEFAULT_SCRATCH_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
pub struct PageWorker {
    id: usize,
    scratch: Vec<u8>,
    served: u64,
}

impl PageWorker {
    pub fn new(id: usize, scratch_capacity: usize) -> Self {
        Self {
            id,
            scratch: Vec::with_capacity(scratch_capacity),
            served: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Сколько запросов обслужил этот воркер.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Текущая логическая длина scratch (0 после recycle).
    pub fn scratch_len(&self) -> usize {
        self.scratch.len()
    }

    /// Прочитать страницу и отрендерить в первый согласованный тип контента.
    pub fn fetch(&mut self, store: &PageStore, info: &PageInfo) -> Result<Vec<u8>> {
        let content_type = info
            .requested_content_types
            .first()
            .ok_or_else(|| ProxyError::UnsupportedContentType(content::supported_types()))?;
        self.served += 1;
        store.read_into(info, &mut self.scratch)?;
        content::render(content_type, &self.scratch)
    }
}

impl Recycle for PageWorker {
    fn recycle(&mut self) {
        self.scratch.clear();
    }
}
