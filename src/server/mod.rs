//! server - диспетчер запросов: жизненный цикл + подключаемые операции маршрутов.
//!
//! Жизненный цикл запроса (Dispatcher::handle):
//! - маршрут по пути (неизвестный -> 404);
//! - новый request id и логгер со scope этого id;
//! - проверка метода (405) и авторизация (401);
//! - операция маршрута (handlers::*), её ошибки -> {"error": "..."} со статусом;
//! - паника операции ловится здесь же и превращается в 400 "Request error";
//!   lease пула при этом возвращается через Drop.
//!
//! Транспорт (tiny_http) отделён в http.rs: Dispatcher работает с Incoming/Reply
//! и тестируется без сети.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::{ProxyError, Result};
use crate::logging::Logger;
use crate::pagination::BackgroundTasks;
use crate::pool::{HandlerPool, PoolStats};
use crate::retrieval::{PageWorker, DEFAULT_SCRATCH_CAPACITY};
use crate::store::PageStore;
use crate::token::new_token;

pub mod content;
pub mod handlers;
pub mod http;

pub use http::HttpServer;

const ERROR_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Транспортно-независимый входящий запрос.
#[derive(Clone, Debug, Default)]
pub struct Incoming {
    pub method: String,
    /// Путь без query-строки.
    pub path: String,
    /// Значения заголовков Content-Type (их может быть несколько).
    pub content_types: Vec<String>,
    pub body: Vec<u8>,
}

impl Incoming {
    pub fn new<M: Into<String>, P: Into<String>>(method: M, path: P) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn post<P: Into<String>, B: Into<Vec<u8>>>(path: P, body: B) -> Self {
        Self::new("POST", path).with_body(body)
    }

    pub fn with_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_content_type<S: Into<String>>(mut self, ct: S) -> Self {
        self.content_types.push(ct.into());
        self
    }
}

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content::APPLICATION_JSON,
            headers: Vec::new(),
            body,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Стандартный конверт ошибки: {"error": "..."}.
    pub fn error(e: &ProxyError) -> Self {
        #[derive(Serialize)]
        struct ErrResponse<'a> {
            error: &'a str,
        }
        let msg = e.to_string();
        let body = serde_json::to_vec(&ErrResponse { error: &msg })
            .unwrap_or_else(|_| br#"{"error":"Request error"}"#.to_vec());
        Self {
            status: e.status(),
            content_type: ERROR_CONTENT_TYPE,
            headers: Vec::new(),
            body,
        }
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, k: K, v: V) -> Self {
        self.headers.push((k.into(), v.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Alive,
    Page,
    Create,
    Existing,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/alive" => Some(Route::Alive),
            "/page" => Some(Route::Page),
            "/create" => Some(Route::Create),
            "/existing" => Some(Route::Existing),
            _ => None,
        }
    }

    pub fn pattern(self) -> &'static str {
        match self {
            Route::Alive => "/alive",
            Route::Page => "/page",
            Route::Create => "/create",
            Route::Existing => "/existing",
        }
    }

    /// Требуемый HTTP-метод (None - любой).
    pub fn method(self) -> Option<&'static str> {
        match self {
            Route::Alive => None,
            Route::Page | Route::Create | Route::Existing => Some("POST"),
        }
    }
}

/// Точка расширения для проверки прав запрашивающего.
pub trait Authorizer: Send + Sync {
    /// Err(message) -> 401 с этим сообщением.
    fn authorize(&self, req: &Incoming) -> std::result::Result<(), String>;
}

/// Разрешает всё (поведение по умолчанию).
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _req: &Incoming) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Состояние одного запроса, передаваемое операции маршрута.
pub struct RequestContext {
    pub id: String,
    pub log: Logger,
    pub store: PageStore,
}

pub struct Dispatcher {
    store: PageStore,
    pool: HandlerPool<PageWorker>,
    tasks: BackgroundTasks,
    authorizer: Box<dyn Authorizer>,
    ingest_root: Option<PathBuf>,
    log: Logger,
}

impl Dispatcher {
    pub fn new(cfg: &ServerConfig, log: Logger) -> Self {
        Self {
            store: PageStore::new(Arc::new(cfg.store.clone()), log.clone()),
            pool: HandlerPool::new(cfg.max_handlers, |id| {
                PageWorker::new(id, DEFAULT_SCRATCH_CAPACITY)
            }),
            tasks: BackgroundTasks::new(),
            authorizer: Box::new(AllowAll),
            ingest_root: cfg.ingest_root.clone(),
            log,
        }
    }

    pub fn with_authorizer<A: Authorizer + 'static>(mut self, a: A) -> Self {
        self.authorizer = Box::new(a);
        self
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn pool(&self) -> &HandlerPool<PageWorker> {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub(crate) fn ingest_root(&self) -> Option<&std::path::Path> {
        self.ingest_root.as_deref()
    }

    /// Обработать запрос целиком. Никогда не паникует наружу.
    pub fn handle(&self, req: &Incoming) -> Reply {
        let Some(route) = Route::from_path(&req.path) else {
            return Reply::error(&ProxyError::NotFound);
        };
        if route == Route::Alive {
            return Reply::text(200, "up\n");
        }

        let id = new_token();
        let log = self.log.scoped(&id);
        let ctx = RequestContext {
            store: self.store.with_logger(log.clone()),
            id,
            log,
        };

        ctx.log.info(format_args!("Processing {}", route.pattern()));
        let reply = match catch_unwind(AssertUnwindSafe(|| self.process(route, req, &ctx))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                ctx.log.warn(format_args!("{} failed: {}", route.pattern(), e));
                Reply::error(&e)
            }
            Err(panic) => {
                let what = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                ctx.log.error(format_args!("Processing error {}", what));
                Reply::error(&ProxyError::Internal)
            }
        };
        ctx.log.info(format_args!("Completed {} ({})", route.pattern(), reply.status));
        reply
    }

    fn process(&self, route: Route, req: &Incoming, ctx: &RequestContext) -> Result<Reply> {
        if let Some(m) = route.method() {
            if !req.method.eq_ignore_ascii_case(m) {
                return Err(ProxyError::MethodNotAllowed(m));
            }
        }
        self.authorizer
            .authorize(req)
            .map_err(ProxyError::Unauthorized)?;

        match route {
            Route::Alive => Ok(Reply::text(200, "up\n")),
            Route::Page => handlers::retrieve_page(self, ctx, req),
            Route::Create => handlers::create_mock(self, ctx, req),
            Route::Existing => handlers::create_from_file(self, ctx, req),
        }
    }

    /// Дождаться фоновых записей страниц (для упорядоченной остановки).
    pub fn drain(&self, timeout: Option<Duration>) -> bool {
        let pending = self.tasks.in_flight();
        if pending > 0 {
            self.log.info(format_args!("Draining {} background page writes", pending));
        }
        let done = self.tasks.wait_idle(timeout);
        if !done {
            self.log.warn(format_args!(
                "Abandoning {} background page writes",
                self.tasks.in_flight()
            ));
        }
        done
    }
}
