use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use super::*;

const OWN_ADDRESS: &str = "10.0.0.5";

fn write_log(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write log");
    path
}

struct FixedIdentity(&'static str);

impl LocalIdentity for FixedIdentity {
    fn local_address(&self) -> String {
        self.0.to_string()
    }
}

/// Answers from a per-host table; hosts not in the table are unreachable.
#[derive(Default)]
struct ScriptedRemote {
    answers: HashMap<String, HostResult>,
    calls: Mutex<Vec<(String, RemoteRequest)>>,
}

impl ScriptedRemote {
    fn answering(host: &str, result: HostResult) -> Self {
        let mut remote = Self::default();
        remote.answers.insert(host.to_string(), result);
        remote
    }

    fn calls(&self) -> Vec<(String, RemoteRequest)> {
        self.calls.lock().expect("calls").clone()
    }
}

impl RemoteQuery for ScriptedRemote {
    fn query_host<'a>(
        &'a self,
        host: &'a str,
        request: &'a RemoteRequest,
    ) -> BoxFuture<'a, Result<HostResult>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("calls")
                .push((host.to_string(), request.clone()));
            self.answers
                .get(host)
                .cloned()
                .ok_or_else(|| LogFilesError::unreachable(host, "connection refused"))
        })
    }
}

fn coordinator(dir: &Path, remote: Arc<ScriptedRemote>) -> FanoutCoordinator {
    let mut config = CoordinatorConfig::new(dir);
    config.workers = 2;
    FanoutCoordinator::new(config, remote, Arc::new(FixedIdentity(OWN_ADDRESS)))
}

fn query(n_lines: i64, order_by: i64, hosts: &str) -> RawQuery {
    RawQuery {
        n_lines: Some(n_lines),
        order_by: Some(order_by),
        hosts: Some(hosts.to_string()),
        ..RawQuery::default()
    }
}

mod fanout;
