//! One logical query spread over the local log directory and remote peers.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};

use crate::cache::{TailCache, DEFAULT_CACHE_CAPACITY};
use crate::directory::DirectoryScanner;
use crate::engine::FileReadEngine;
use crate::error::{LogFilesError, Result};
use crate::model::{HostResult, ReadOrder};
use crate::pool::WorkerPool;
use crate::query::{QueryDefaults, QueryParams, RawQuery};
use crate::scanner::MAX_LINE_CHUNK_BYTES;

pub const LOCALHOST: &str = "localhost";
pub const LOOPBACK: &str = "127.0.0.1";

/// What a peer is asked for. Peers always read from their own default end;
/// a cursor is meaningless against another host's files and is not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub file_name: Option<String>,
    pub max_lines: Option<usize>,
    pub keyword: String,
    pub order: ReadOrder,
}

impl RemoteRequest {
    fn from_params(target: &QueryTarget, params: &QueryParams) -> Self {
        Self {
            file_name: match target {
                QueryTarget::Directory => None,
                QueryTarget::File(name) => Some(name.clone()),
            },
            max_lines: params.max_lines,
            keyword: params.filter.as_str().to_string(),
            order: params.order,
        }
    }

    /// Query-string pairs in the form peers accept.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let n_lines = self
            .max_lines
            .map_or(crate::query::UNSPECIFIED, |max| i64::try_from(max).unwrap_or(i64::MAX));
        vec![
            ("n_lines", n_lines.to_string()),
            ("keyword", self.keyword.clone()),
            ("order_by", self.order.code().to_string()),
        ]
    }
}

/// Transport to a single peer. An `Err` means the peer could not be reached
/// or answered with something unusable; it becomes that host's record.
pub trait RemoteQuery: Send + Sync {
    fn query_host<'a>(
        &'a self,
        host: &'a str,
        request: &'a RemoteRequest,
    ) -> BoxFuture<'a, Result<HostResult>>;
}

/// The address this process answers to.
pub trait LocalIdentity: Send + Sync {
    fn local_address(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    Directory,
    File(String),
}

/// Host list split into "read locally" and "ask a peer".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPlan {
    pub includes_self: bool,
    pub remotes: Vec<String>,
}

/// Every self alias collapses into a single local read. Remote hosts keep
/// their order and multiplicity.
pub fn classify_hosts(hosts: &[String], own_address: &str) -> HostPlan {
    let mut plan = HostPlan::default();
    for host in hosts {
        if host == LOCALHOST || host == LOOPBACK || host == own_address {
            plan.includes_self = true;
        } else {
            plan.remotes.push(host.clone());
        }
    }
    plan
}

/// Joins `name` onto the log directory. Absolute names and names that climb
/// out of the directory are refused.
pub fn resolve_file(log_directory: &Path, name: &str) -> Result<PathBuf> {
    let candidate = Path::new(name);
    let escapes = candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(LogFilesError::invalid(format!(
            "file_name {name} must be a relative path inside the log directory"
        )));
    }
    Ok(log_directory.join(candidate))
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub log_directory: PathBuf,
    pub cache_capacity: usize,
    pub workers: usize,
    pub max_line_chunk: usize,
    pub defaults: QueryDefaults,
}

impl CoordinatorConfig {
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            workers: WorkerPool::with_available_parallelism().size(),
            max_line_chunk: MAX_LINE_CHUNK_BYTES,
            defaults: QueryDefaults::default(),
        }
    }
}

pub struct FanoutCoordinator {
    log_directory: PathBuf,
    defaults: QueryDefaults,
    own_address: String,
    engine: Arc<FileReadEngine>,
    scanner: DirectoryScanner,
    pool: WorkerPool,
    remote: Arc<dyn RemoteQuery>,
}

impl FanoutCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        remote: Arc<dyn RemoteQuery>,
        identity: Arc<dyn LocalIdentity>,
    ) -> Self {
        let own_address = identity.local_address();
        let pool = WorkerPool::new(config.workers);
        let engine = Arc::new(
            FileReadEngine::new(
                Arc::new(TailCache::new(config.cache_capacity)),
                own_address.clone(),
            )
            .with_max_line_chunk(config.max_line_chunk),
        );
        Self {
            log_directory: config.log_directory,
            defaults: config.defaults,
            own_address,
            scanner: DirectoryScanner::new(engine.clone(), pool.clone()),
            engine,
            pool,
            remote,
        }
    }

    pub fn engine(&self) -> &Arc<FileReadEngine> {
        &self.engine
    }

    pub fn own_address(&self) -> &str {
        &self.own_address
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    /// Validates `raw`, then reads locally and asks every remote host at the
    /// same time. Remote records come back in host-list order with the local
    /// record last. Only invalid parameters fail the call; every other
    /// failure becomes the affected host's record.
    pub async fn execute(&self, target: &QueryTarget, raw: &RawQuery) -> Result<Vec<HostResult>> {
        let params = QueryParams::validate(raw, &self.defaults)?;
        let local_path = match target {
            QueryTarget::Directory => None,
            QueryTarget::File(name) => Some(resolve_file(&self.log_directory, name)?),
        };
        let plan = classify_hosts(&params.hosts, &self.own_address);
        if let (true, Some(path), Some(start)) = (plan.includes_self, &local_path, params.start) {
            self.check_local_cursor(path.clone(), start).await?;
        }
        let request = RemoteRequest::from_params(target, &params);

        tracing::debug!(
            local = plan.includes_self,
            remotes = plan.remotes.len(),
            target = ?target,
            "fanning out query"
        );

        let remote = join_all(plan.remotes.iter().map(|host| self.query_remote(host, &request)));
        let local = async {
            if plan.includes_self {
                Some(self.read_local(local_path, &params).await)
            } else {
                None
            }
        };
        let (mut results, local) = tokio::join!(remote, local);
        results.extend(local);
        Ok(results)
    }

    /// A bad local cursor fails the whole request, so it is checked before
    /// any peer is asked.
    async fn check_local_cursor(&self, path: PathBuf, start: u64) -> Result<()> {
        let engine = self.engine.clone();
        self.pool
            .run_blocking(move || engine.validate_cursor(&path, start))
            .await
    }

    async fn query_remote(&self, host: &str, request: &RemoteRequest) -> HostResult {
        match self.pool.run(self.remote.query_host(host, request)).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) | Err(err) => {
                tracing::warn!(host, error = %err, "remote query failed");
                HostResult::from_error(host, &err)
            }
        }
    }

    async fn read_local(&self, path: Option<PathBuf>, params: &QueryParams) -> HostResult {
        let outcome = match path {
            None => {
                self.scanner
                    .scan_all(&self.log_directory, params.order, params.max_lines, &params.filter)
                    .await
            }
            Some(path) => {
                let engine = self.engine.clone();
                let request = params.read_request();
                self.pool
                    .run_blocking(move || engine.read_file(&path, &request))
                    .await
                    .map(|read| vec![read])
            }
        };
        match outcome {
            Ok(files) => HostResult::success(self.own_address.clone(), files),
            Err(err) => {
                tracing::warn!(error = %err, "local read failed");
                HostResult::from_error(self.own_address.clone(), &err)
            }
        }
    }
}
