// Базовые модули
pub mod config;
pub mod error;
pub mod logging;
pub mod page;
pub mod token;

// Codec (сжатие + AEAD) и файловое хранилище страниц
pub mod codec;  // src/codec/{mod,compress,aead}.rs
pub mod store;  // src/store/mod.rs

// Пагинация и источники записей
pub mod pagination; // src/pagination/{mod,tasks,walk}.rs
pub mod source;     // src/source/{mod,mock,csv_file}.rs

// Пул воркеров чтения
pub mod pool;
pub mod retrieval;

// Диспетчер запросов + HTTP (tiny_http)
pub mod server; // src/server/{mod,content,handlers,http}.rs

// Удобные реэкспорты
pub use config::{ServerConfig, StoreConfig};
pub use error::ProxyError;
pub use logging::Logger;
pub use page::{Column, Page, PageInfo};
pub use pagination::{walk_chain, BackgroundTasks, PageChain, Paginator};
pub use pool::{HandlerPool, Lease, Recycle};
pub use retrieval::PageWorker;
pub use server::{Dispatcher, HttpServer, Incoming, Reply};
pub use store::{page_key, PageStore, StoreError};
