//! Archive of exported map documents.

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

use crate::document::Document;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Summary of an archived map, read back from its document.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMap {
    pub id: String,
    pub title: String,
    pub export_date: String,
    pub geometry_count: usize,
}

/// Somewhere exported documents are kept.
pub trait DocumentStore: Send + Sync {
    /// Archive a document under a name derived from its title and export
    /// time. Returns the id it was stored under.
    fn save(&self, document: &Document) -> BoxFuture<'_, StorageResult<String>>;

    /// Every readable archived map, sorted by id.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<StoredMap>>>;
}

/// Keep ASCII letters, digits, `-` and `_`; replace everything else with `_`.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Download name for an exported map: `carte_<title>_<timestamp>.<ext>`.
///
/// An empty title becomes `export`.
pub fn suggested_file_name(title: &str, extension: &str, at: DateTime<Utc>) -> String {
    let title = title.trim();
    let stem = if title.is_empty() { "export".to_string() } else { sanitize(title) };
    format!("carte_{}_{}.{}", stem, at.format("%Y-%m-%dT%H-%M-%S"), extension)
}

/// Archive id for a document: the suggested file name without extension.
///
/// Falls back to the current time when the export date is unreadable.
pub fn document_id(document: &Document) -> String {
    let at = DateTime::parse_from_rfc3339(&document.export_date)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            log::debug!("Unreadable export date '{}'", document.export_date);
            Utc::now()
        });
    let name = suggested_file_name(&document.map_title, "json", at);
    name.trim_end_matches(".json").to_string()
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
