//! Logger - явная способность логирования, передаваемая компонентам при создании.
//!
//! Поверх фасада `log` (sink настраивает бинарь через env_logger).
//! Каждый Logger несёт scope (обычно request id), который префиксует все сообщения,
//! так что фоновые записи страниц остаются привязаны к запросу, их породившему.

use std::fmt;
use std::sync::Arc;

use log::Level;

pub const LOG_TARGET: &str = "dataproxy";

#[derive(Clone, Debug)]
pub struct Logger {
    scope: Arc<str>,
}

impl Logger {
    /// Корневой логгер без scope (старт сервера, CLI).
    pub fn root() -> Self {
        Self { scope: Arc::from("-") }
    }

    pub fn scoped<S: AsRef<str>>(&self, scope: S) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn info<D: fmt::Display>(&self, msg: D) {
        self.emit(Level::Info, msg);
    }

    pub fn debug<D: fmt::Display>(&self, msg: D) {
        self.emit(Level::Debug, msg);
    }

    pub fn warn<D: fmt::Display>(&self, msg: D) {
        self.emit(Level::Warn, msg);
    }

    pub fn error<D: fmt::Display>(&self, msg: D) {
        self.emit(Level::Error, msg);
    }

    fn emit<D: fmt::Display>(&self, lvl: Level, msg: D) {
        log::log!(target: LOG_TARGET, lvl, "{} {}", self.scope, msg);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::root()
    }
}
