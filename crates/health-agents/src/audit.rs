//! Per-request audit artifacts and the request context that carries them.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use health_core::AgentError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Artifact holding the caller's question, written before dispatch.
pub const QUESTION_ARTIFACT: &str = "question.txt";

/// Artifact holding the delivered answer, written after every specialist returned.
pub const FINAL_ARTIFACT: &str = "final_response.md";

/// Destination for write-once audit artifacts.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists `contents` as `artifact` for `request_id`.
    ///
    /// Writing the same artifact twice for one request is an error.
    async fn write(&self, request_id: &str, artifact: &str, contents: &str) -> Result<(), AgentError>;
}

/// Writes artifacts to `<root>/<request_id>/<artifact>`.
///
/// All writes go through one mutex, so at most one file write is in flight
/// and concurrent callers are served in arrival order. Each file is written to a
/// temporary name and renamed into place, so readers never see partial content.
pub struct FsAuditSink {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FsAuditSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), write_lock: tokio::sync::Mutex::new(()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of an artifact, whether or not it exists yet.
    pub fn path_for(&self, request_id: &str, artifact: &str) -> PathBuf {
        self.root.join(request_id).join(artifact)
    }
}

fn check_component(kind: &str, value: &str) -> Result<(), AgentError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);
    if valid {
        return Ok(());
    }
    Err(AgentError::Audit(format!("invalid {} '{}'", kind, value)))
}

fn audit_err(path: &Path, e: std::io::Error) -> AgentError {
    AgentError::Audit(format!("{}: {}", path.display(), e))
}

#[async_trait]
impl AuditSink for FsAuditSink {
    async fn write(&self, request_id: &str, artifact: &str, contents: &str) -> Result<(), AgentError> {
        check_component("request id", request_id)?;
        check_component("artifact", artifact)?;

        let _guard = self.write_lock.lock().await;

        let dir = self.root.join(request_id);
        let target = dir.join(artifact);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| audit_err(&dir, e))?;

        if tokio::fs::try_exists(&target).await.map_err(|e| audit_err(&target, e))? {
            return Err(AgentError::Audit(format!("{} already written", target.display())));
        }

        let staging = dir.join(format!(".{}.tmp", artifact));
        tokio::fs::write(&staging, contents).await.map_err(|e| audit_err(&staging, e))?;
        tokio::fs::rename(&staging, &target).await.map_err(|e| audit_err(&target, e))?;

        debug!("Audit: wrote {} ({} bytes)", target.display(), contents.len());
        Ok(())
    }
}

/// One recorded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub request_id: String,
    pub artifact: String,
    pub contents: String,
}

/// Keeps artifacts in memory, in write order.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Contents of one artifact, if written.
    pub fn get(&self, request_id: &str, artifact: &str) -> Option<String> {
        self.records()
            .into_iter()
            .find(|r| r.request_id == request_id && r.artifact == artifact)
            .map(|r| r.contents)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, request_id: &str, artifact: &str, contents: &str) -> Result<(), AgentError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AgentError::Audit("audit log poisoned".into()))?;

        if records.iter().any(|r| r.request_id == request_id && r.artifact == artifact) {
            return Err(AgentError::Audit(format!("{}/{} already written", request_id, artifact)));
        }
        records.push(AuditRecord {
            request_id: request_id.to_string(),
            artifact: artifact.to_string(),
            contents: contents.to_string(),
        });
        Ok(())
    }
}

/// Everything scoped to one request, passed explicitly through the call chain.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub audit: Arc<dyn AuditSink>,
    pub cancel: CancellationToken,
}

impl RequestContext {
    /// New context with a fresh request id.
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        let request_id = Uuid::new_v4().to_string();
        info!("Request {} started", request_id);
        Self {
            request_id,
            started_at: Utc::now(),
            audit,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    pub async fn record(&self, artifact: &str, contents: &str) -> Result<(), AgentError> {
        self.audit.write(&self.request_id, artifact, contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_sink_writes_once_per_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsAuditSink::new(dir.path());

        sink.write("req-1", QUESTION_ARTIFACT, "How do I sleep better?").await.unwrap();
        let written = std::fs::read_to_string(sink.path_for("req-1", QUESTION_ARTIFACT)).unwrap();
        assert_eq!(written, "How do I sleep better?");

        let err = sink.write("req-1", QUESTION_ARTIFACT, "again").await.unwrap_err();
        assert!(matches!(err, AgentError::Audit(_)));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("req-1"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn fs_sink_rejects_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsAuditSink::new(dir.path());
        assert!(sink.write("../escape", QUESTION_ARTIFACT, "x").await.is_err());
        assert!(sink.write("req", "a/b.txt", "x").await.is_err());
    }

    #[tokio::test]
    async fn concurrent_fs_writes_all_land_intact() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(FsAuditSink::new(dir.path()));

        let writes = (0..16).map(|i| {
            let sink = Arc::clone(&sink);
            async move {
                let body = format!("request {i} ").repeat(200);
                sink.write(&format!("req-{i}"), FINAL_ARTIFACT, &body).await.map(|_| body)
            }
        });
        let bodies = futures::future::join_all(writes).await;

        for (i, body) in bodies.into_iter().enumerate() {
            let body = body.unwrap();
            let on_disk = std::fs::read_to_string(sink.path_for(&format!("req-{i}"), FINAL_ARTIFACT)).unwrap();
            assert_eq!(on_disk, body);
        }
    }

    #[tokio::test]
    async fn memory_sink_keeps_write_order() {
        let sink = MemoryAuditSink::new();
        sink.write("r", QUESTION_ARTIFACT, "q").await.unwrap();
        sink.write("r", FINAL_ARTIFACT, "a").await.unwrap();

        let artifacts: Vec<_> = sink.records().into_iter().map(|r| r.artifact).collect();
        assert_eq!(artifacts, vec![QUESTION_ARTIFACT, FINAL_ARTIFACT]);
        assert_eq!(sink.get("r", FINAL_ARTIFACT).as_deref(), Some("a"));
        assert!(sink.write("r", FINAL_ARTIFACT, "b").await.is_err());
    }
}
