//! Line-window reads over log files, a tail cache for descending reads, and
//! fan-out of one query to several hosts.

mod cache;
mod directory;
mod engine;
mod error;
mod fanout;
mod model;
mod pool;
mod query;
mod reader;
mod scanner;

pub use cache::{CacheEntry, CachedTail, FileSlot, TailCache, DEFAULT_CACHE_CAPACITY};
pub use directory::DirectoryScanner;
pub use engine::{FileReadEngine, ReadRequest};
pub use error::{classify_io_error, LogFilesError, Result};
pub use fanout::{
    classify_hosts, resolve_file, CoordinatorConfig, FanoutCoordinator, HostPlan, LocalIdentity,
    QueryTarget, RemoteQuery, RemoteRequest, LOCALHOST, LOOPBACK,
};
pub use model::{FileHandle, FileRead, HostResult, HostStatus, LineWindow, ReadOrder};
pub use pool::WorkerPool;
pub use query::{
    parse_hosts, resolve_hosts, QueryDefaults, QueryParams, RawQuery, DEFAULT_HOSTS, UNSPECIFIED,
};
pub use reader::{KeywordFilter, LineReader, ScanOutcome, ScannedLine};
pub use scanner::{ByteLineScanner, LineSpan, BOUNDARY_SCAN_CHUNK_BYTES, MAX_LINE_CHUNK_BYTES};

#[cfg(test)]
mod tests;
