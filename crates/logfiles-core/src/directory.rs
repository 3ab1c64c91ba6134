use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::engine::{FileReadEngine, ReadRequest};
use crate::error::{LogFilesError, Result};
use crate::model::{FileRead, ReadOrder};
use crate::pool::WorkerPool;
use crate::reader::KeywordFilter;

/// Reads every file of one directory concurrently.
#[derive(Clone)]
pub struct DirectoryScanner {
    engine: Arc<FileReadEngine>,
    pool: WorkerPool,
}

impl DirectoryScanner {
    pub fn new(engine: Arc<FileReadEngine>, pool: WorkerPool) -> Self {
        Self { engine, pool }
    }

    /// One [`FileRead`] per entry that could be read. Entries that fail
    /// (subdirectories, files removed mid-scan, unreadable files) are left
    /// out. Only a failure to list the directory itself is an error.
    pub async fn scan_all(
        &self,
        directory: &Path,
        order: ReadOrder,
        max_lines: Option<usize>,
        filter: &KeywordFilter,
    ) -> Result<Vec<FileRead>> {
        let entries = list_entries(directory)?;
        let request = ReadRequest {
            start: None,
            max_lines,
            order,
            filter: filter.clone(),
        };

        let reads = entries.into_iter().map(|path| {
            let engine = self.engine.clone();
            let request = request.clone();
            let pool = self.pool.clone();
            async move {
                let outcome = pool
                    .run_blocking({
                        let path = path.clone();
                        move || engine.read_file(&path, &request)
                    })
                    .await;
                (path, outcome)
            }
        });

        let mut files = Vec::new();
        for (path, outcome) in join_all(reads).await {
            match outcome {
                Ok(read) => files.push(read),
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "skipping unreadable entry"
                    );
                }
            }
        }
        Ok(files)
    }
}

fn list_entries(directory: &Path) -> Result<Vec<PathBuf>> {
    let reader = std::fs::read_dir(directory).map_err(|err| listing_error(directory, &err))?;
    let mut entries = Vec::new();
    for entry in reader {
        match entry {
            Ok(entry) => entries.push(entry.path()),
            Err(err) => {
                tracing::warn!(
                    directory = %directory.display(),
                    error = %err,
                    "skipping directory entry"
                );
            }
        }
    }
    entries.sort();
    Ok(entries)
}

fn listing_error(directory: &Path, err: &io::Error) -> LogFilesError {
    match err.kind() {
        io::ErrorKind::NotFound => LogFilesError::FileNotFound(directory.to_path_buf()),
        _ => LogFilesError::PathUnreadable(directory.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cache::TailCache;

    fn scanner() -> DirectoryScanner {
        let engine = Arc::new(FileReadEngine::new(Arc::new(TailCache::default()), "10.0.0.5"));
        DirectoryScanner::new(engine, WorkerPool::new(2))
    }

    #[tokio::test]
    async fn reads_every_file_and_skips_subdirectories() {
        let dir = tempfile::tempdir().expect("tmp");
        fs::write(dir.path().join("a.log"), "a1\na2\n").expect("write");
        fs::write(dir.path().join("b.log"), "b1\n").expect("write");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");

        let files = scanner()
            .scan_all(dir.path(), ReadOrder::Descending, Some(1), &KeywordFilter::default())
            .await
            .expect("scan");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].window.lines, vec!["a2"]);
        assert_eq!(files[1].window.lines, vec!["b1"]);
    }

    #[tokio::test]
    async fn empty_directory_yields_no_files() {
        let dir = tempfile::tempdir().expect("tmp");
        let files = scanner()
            .scan_all(dir.path(), ReadOrder::Ascending, None, &KeywordFilter::default())
            .await
            .expect("scan");
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().expect("tmp");
        let err = scanner()
            .scan_all(
                &dir.path().join("gone"),
                ReadOrder::Ascending,
                None,
                &KeywordFilter::default(),
            )
            .await
            .expect_err("missing");
        assert!(matches!(err, LogFilesError::FileNotFound(_)));
    }
}
