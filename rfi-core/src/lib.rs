//! Нормализация архивных RFI файлов GBT
//!
//! Разбор заголовка или восстановление метаданных по имени файла,
//! канонизация колонок, ремонт слипшихся значений, проверка частоты по
//! диапазону приёмника, дедупликация внутри файла и запись через порт
//! хранилища.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use std::{path::Path, sync::Arc};
//!
//! use rfi_core::{FileIngestor, IngestConfig, MemoryStore, Uploader};
//! use rfi_types::ReceiverCatalog;
//!
//! let config = IngestConfig::default();
//! let catalog = Arc::new(ReceiverCatalog::gbt());
//! let ingestor = FileIngestor::new(config.clone(), catalog.clone());
//! let uploader = Uploader::new(catalog, config.primary_composite_key.clone());
//!
//! let file = ingestor.ingest_path(Path::new("TRFI_052819_L1_rfiscan1.txt"))?;
//! let mut store = MemoryStore::new();
//! uploader.upload(&mut store, &file)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod error;
pub mod header;
pub mod ingest;
pub mod line;
pub mod source;
pub mod store;
pub mod time;
pub mod upload;
pub mod validator;

pub use aggregate::*;
pub use analysis::*;
pub use config::*;
pub use error::*;
pub use header::*;
pub use ingest::*;
pub use line::*;
pub use source::*;
pub use store::*;
pub use upload::*;
pub use validator::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
