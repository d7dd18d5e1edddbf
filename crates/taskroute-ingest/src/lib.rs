//! TaskRoute Ingest — accepts uploaded artifacts, stores their bytes,
//! extracts text and tells the workflow service the content is ready to be
//! routed.

pub mod content;
pub mod ingest;
pub mod notify;

pub use content::{ContentStore, Extraction, LocalContentStore};
pub use ingest::{IngestReceipt, Ingester, Upload, MAX_UPLOAD_BYTES, PLACEHOLDER_MARKER};
pub use notify::{IngestEvent, LogNotifier, Notifier, QueueNotifier, WebhookNotifier};
