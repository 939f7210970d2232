use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use job_board::board::{FilesystemResumeStorage, JobBoardService, MemoryStore};
use job_board::config::StorageConfig;
use job_board::error::AppError;
use tracing::info;

pub(crate) type BoardService = JobBoardService<MemoryStore, FilesystemResumeStorage>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Open the configured store and resume directory. Without a data file the store lives only
/// as long as the process.
pub(crate) fn open_service(storage: &StorageConfig) -> Result<Arc<BoardService>, AppError> {
    let store = match &storage.data_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            info!(path = %path.display(), "opening job board store");
            MemoryStore::open(path)?
        }
        None => MemoryStore::default(),
    };
    let resumes = FilesystemResumeStorage::new(&storage.media_root);

    Ok(Arc::new(JobBoardService::new(
        Arc::new(store),
        Arc::new(resumes),
    )))
}
