//! Ingestion adapter: upload → stored bytes → pending rows → notification,
//! and later the one-time extraction fill.

use taskroute_core::{ArtifactStatus, Error, Result, TranscriptStatus};
use taskroute_store::{Artifact, SqliteStore, Transcript, TranscriptUpdate};
use tracing::{debug, info, warn};

use crate::content::ContentStore;
use crate::notify::{IngestEvent, Notifier};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Prefix of substituted transcript text when extraction yields nothing.
pub const PLACEHOLDER_MARKER: &str = "[placeholder]";

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// An uploaded file as received from the HTTP layer.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Rows created by one ingestion.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReceipt {
    pub artifact: Artifact,
    pub transcript: Transcript,
    /// Whether the workflow notifier accepted the event.
    pub notified: bool,
}

/// Handles artifact ingestion against the store, a content backend and a
/// notifier.
pub struct Ingester<'a> {
    store: &'a SqliteStore,
    content: &'a dyn ContentStore,
    notifier: &'a dyn Notifier,
}

impl<'a> Ingester<'a> {
    pub fn new(store: &'a SqliteStore, content: &'a dyn ContentStore, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            content,
            notifier,
        }
    }

    /// Store the upload, create the `uploaded` artifact and `processing`
    /// transcript, then notify the workflow service. A notification failure
    /// is logged and does not undo the ingestion.
    pub fn ingest(&self, upload: Upload) -> Result<IngestReceipt> {
        if upload.bytes.is_empty() {
            return Err(Error::InvalidInput("uploaded file is empty".into()));
        }
        if upload.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(Error::InvalidInput(format!(
                "uploaded file is {} bytes, limit is {}",
                upload.bytes.len(),
                MAX_UPLOAD_BYTES
            )));
        }

        let name = sanitize_filename(&upload.filename);
        let media_type = upload
            .media_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        let locator = self.content.store(&upload.bytes, &media_type)?;
        let artifact = self
            .store
            .insert_artifact(&name, &media_type, &locator, upload.bytes.len() as i64)?;
        let transcript = self.store.insert_transcript(&artifact.id)?;

        let event = IngestEvent {
            artifact_id: artifact.id.clone(),
            content_id: transcript.id.clone(),
        };
        let notified = match self.notifier.notify(&event) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Notification via {} failed for artifact {}: {}",
                    self.notifier.name(),
                    artifact.id,
                    e
                );
                false
            }
        };

        info!(
            "Ingested {} ({} bytes, {}) as artifact {}, content {}",
            name,
            upload.bytes.len(),
            media_type,
            artifact.id,
            transcript.id
        );

        Ok(IngestReceipt {
            artifact,
            transcript,
            notified,
        })
    }

    /// Fill the transcript for `content_id` from its artifact. The fill
    /// happens once; a transcript that is no longer `processing` is returned
    /// as stored. Empty extractions are replaced with a placeholder.
    pub fn complete_extraction(&self, content_id: &str) -> Result<Transcript> {
        let transcript = self
            .store
            .get_transcript(content_id)?
            .ok_or_else(|| Error::NotFound(format!("content {}", content_id)))?;
        if transcript.status != TranscriptStatus::Processing {
            debug!("Content {} already {}", content_id, transcript.status);
            return Ok(transcript);
        }

        let artifact = self
            .store
            .get_artifact(&transcript.artifact_id)?
            .ok_or_else(|| Error::NotFound(format!("artifact {}", transcript.artifact_id)))?;

        let extraction = self
            .content
            .fetch(&artifact.storage_locator)
            .and_then(|bytes| self.content.extract_text(&bytes, &artifact.media_type));
        let extraction = match extraction {
            Ok(extraction) => extraction,
            Err(e) => {
                let msg = format!("extraction failed: {}", e);
                self.store.fail_transcript(content_id, &msg)?;
                self.store
                    .set_artifact_status(&artifact.id, ArtifactStatus::Failed, Some(&msg))?;
                warn!("Content {}: {}", content_id, msg);
                return Err(match e {
                    Error::NotFound(what) => Error::Storage(format!("{} is missing", what)),
                    other => other,
                });
            }
        };

        let is_placeholder = extraction.text.trim().is_empty();
        let text = if is_placeholder {
            placeholder_text(&artifact.original_name)
        } else {
            extraction.text
        };
        let update = TranscriptUpdate {
            text,
            language: extraction.language,
            duration_ms: extraction.duration_ms,
            is_placeholder,
        };
        if self.store.complete_transcript(content_id, &update)? {
            info!(
                "Extracted {} chars for content {}{}",
                update.text.len(),
                content_id,
                if is_placeholder { " (placeholder)" } else { "" }
            );
        }

        self.store
            .get_transcript(content_id)?
            .ok_or_else(|| Error::NotFound(format!("content {}", content_id)))
    }
}

/// Placeholder text carrying [`PLACEHOLDER_MARKER`].
pub fn placeholder_text(original_name: &str) -> String {
    format!(
        "{} no text could be extracted from {}",
        PLACEHOLDER_MARKER, original_name
    )
}

/// Strip directory components from an uploaded filename.
fn sanitize_filename(name: &str) -> String {
    let name = name.replace('/', "").replace('\\', "").replace("..", "");
    let name = name.trim();
    if name.is_empty() {
        "unnamed".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Extraction, LocalContentStore};
    use crate::notify::QueueNotifier;

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _event: &IngestEvent) -> Result<()> {
            Err(Error::Notification("workflow service down".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct BrokenContent;

    impl ContentStore for BrokenContent {
        fn store(&self, _bytes: &[u8], _media_type: &str) -> Result<String> {
            Ok("local://00".into())
        }

        fn fetch(&self, _locator: &str) -> Result<Vec<u8>> {
            Err(Error::Storage("bucket unavailable".into()))
        }

        fn extract_text(&self, _bytes: &[u8], _media_type: &str) -> Result<Extraction> {
            Ok(Extraction::default())
        }
    }

    fn setup() -> (SqliteStore, LocalContentStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("db")).unwrap();
        let content = LocalContentStore::new(dir.path().join("uploads")).unwrap();
        (store, content, dir)
    }

    fn upload(name: &str, media: &str, bytes: &[u8]) -> Upload {
        Upload {
            filename: name.into(),
            media_type: Some(media.into()),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_ingest_creates_pending_rows_and_notifies() {
        let (store, content, _dir) = setup();
        let (notifier, mut rx) = QueueNotifier::new();
        let ingester = Ingester::new(&store, &content, &notifier);

        let receipt = ingester
            .ingest(upload("notes.txt", "text/plain", b"Ship the release on Friday."))
            .unwrap();
        assert_eq!(receipt.artifact.status, ArtifactStatus::Uploaded);
        assert_eq!(receipt.transcript.status, TranscriptStatus::Processing);
        assert!(receipt.transcript.text.is_empty());
        assert!(receipt.notified);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.artifact_id, receipt.artifact.id);
        assert_eq!(event.content_id, receipt.transcript.id);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notification_failure_keeps_ingestion() {
        let (store, content, _dir) = setup();
        let ingester = Ingester::new(&store, &content, &FailingNotifier);

        let receipt = ingester
            .ingest(upload("a.txt", "text/plain", b"hello"))
            .unwrap();
        assert!(!receipt.notified);
        assert!(store.get_artifact(&receipt.artifact.id).unwrap().is_some());
        assert!(store.get_transcript(&receipt.transcript.id).unwrap().is_some());
    }

    #[test]
    fn test_rejects_empty_upload() {
        let (store, content, _dir) = setup();
        let ingester = Ingester::new(&store, &content, &FailingNotifier);
        let err = ingester.ingest(upload("a.txt", "text/plain", b"")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.stats().unwrap().artifacts, 0);
    }

    #[test]
    fn test_complete_extraction_once() {
        let (store, content, _dir) = setup();
        let (notifier, _rx) = QueueNotifier::new();
        let ingester = Ingester::new(&store, &content, &notifier);
        let receipt = ingester
            .ingest(upload("notes.txt", "text/plain", b"Budget review moved to Monday."))
            .unwrap();

        let filled = ingester.complete_extraction(&receipt.transcript.id).unwrap();
        assert_eq!(filled.status, TranscriptStatus::Ready);
        assert_eq!(filled.text, "Budget review moved to Monday.");
        assert!(!filled.is_placeholder);

        let again = ingester.complete_extraction(&receipt.transcript.id).unwrap();
        assert_eq!(again.completed_at, filled.completed_at);
    }

    #[test]
    fn test_empty_extraction_gets_placeholder() {
        let (store, content, _dir) = setup();
        let (notifier, _rx) = QueueNotifier::new();
        let ingester = Ingester::new(&store, &content, &notifier);
        let receipt = ingester
            .ingest(upload("call.wav", "audio/wav", b"RIFF0000WAVEfmt "))
            .unwrap();

        let filled = ingester.complete_extraction(&receipt.transcript.id).unwrap();
        assert!(filled.is_placeholder);
        assert!(filled.text.starts_with(PLACEHOLDER_MARKER));
        assert!(filled.text.contains("call.wav"));
    }

    #[test]
    fn test_extraction_failure_marks_rows_failed() {
        let (store, _content, _dir) = setup();
        let ingester = Ingester::new(&store, &BrokenContent, &FailingNotifier);
        let receipt = ingester
            .ingest(upload("a.txt", "text/plain", b"hello"))
            .unwrap();

        let err = ingester.complete_extraction(&receipt.transcript.id).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));

        let transcript = store.get_transcript(&receipt.transcript.id).unwrap().unwrap();
        assert_eq!(transcript.status, TranscriptStatus::Failed);
        let artifact = store.get_artifact(&receipt.artifact.id).unwrap().unwrap();
        assert_eq!(artifact.status, ArtifactStatus::Failed);
        assert!(artifact.error_message.unwrap().contains("bucket unavailable"));
    }

    #[test]
    fn test_unknown_content() {
        let (store, content, _dir) = setup();
        let ingester = Ingester::new(&store, &content, &FailingNotifier);
        assert!(matches!(
            ingester.complete_extraction("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("  "), "unnamed");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }
}
