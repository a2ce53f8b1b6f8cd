use crate::entities::files;
use crate::services::ai::ContentPart;
use crate::services::storage::BlobStore;
use std::sync::Arc;

/// MIME types the analysis model accepts as inline binary. Everything else
/// is described to the model as text so it knows the file exists.
fn is_inline_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
        || mime_type.starts_with("audio/")
        || mime_type.starts_with("video/")
        || mime_type == "application/pdf"
}

/// Converts stored file records into the content-part sequence a model call
/// expects, pulling bytes through the blob store adapter.
pub struct ContentMarshaler {
    storage: Arc<dyn BlobStore>,
}

impl ContentMarshaler {
    pub fn new(storage: Arc<dyn BlobStore>) -> Self {
        Self { storage }
    }

    /// Marshal files in input order. Files whose bytes cannot be fetched
    /// from either storage tier (or come back empty) are skipped; one
    /// missing historical file must not block analysis of the rest.
    pub async fn marshal(&self, files: &[files::Model]) -> Vec<ContentPart> {
        let mut parts = Vec::with_capacity(files.len());

        for file in files {
            let data = match self.storage.fetch(&file.filename).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(
                        "Skipping file {} ({}): {}",
                        file.id,
                        file.filename,
                        e
                    );
                    continue;
                }
            };

            if data.is_empty() {
                // Zero-length objects historically indicate a half-written upload.
                tracing::warn!("Skipping empty file {} ({})", file.id, file.filename);
                continue;
            }

            if is_inline_mime(&file.mime_type) {
                parts.push(ContentPart::InlineData {
                    mime_type: file.mime_type.clone(),
                    data: data.to_vec(),
                });
            } else {
                parts.push(ContentPart::Text(format!(
                    "Attached file \"{}\" ({}, {} bytes) is not a media type that can be analyzed directly.",
                    file.original_name, file.mime_type, file.size
                )));
            }
        }

        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::LocalBlobStore;
    use bytes::Bytes;
    use chrono::Utc;

    fn file_record(id: &str, filename: &str, mime_type: &str) -> files::Model {
        files::Model {
            id: id.to_string(),
            filename: filename.to_string(),
            original_name: format!("{}.orig", id),
            mime_type: mime_type.to_string(),
            size: 3,
            session_id: "session-1".to_string(),
            user_id: None,
            title: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_inline_mimes() {
        assert!(is_inline_mime("image/png"));
        assert!(is_inline_mime("audio/mpeg"));
        assert!(is_inline_mime("video/mp4"));
        assert!(is_inline_mime("application/pdf"));
        assert!(!is_inline_mime("application/zip"));
        assert!(!is_inline_mime("text/plain"));
    }

    #[tokio::test]
    async fn skips_missing_and_empty_files_preserving_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        store.put("a.png", Bytes::from_static(b"aaa")).await.unwrap();
        store.put("c.png", Bytes::from_static(b"ccc")).await.unwrap();
        store.put("d.png", Bytes::new()).await.unwrap();

        let files = vec![
            file_record("a", "a.png", "image/png"),
            file_record("b", "b.png", "image/png"), // never stored
            file_record("c", "c.png", "image/png"),
            file_record("d", "d.png", "image/png"), // empty object
        ];

        let marshaler = ContentMarshaler::new(store);
        let parts = marshaler.marshal(&files).await;

        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            ContentPart::InlineData {
                mime_type: "image/png".to_string(),
                data: b"aaa".to_vec(),
            }
        );
        assert_eq!(
            parts[1],
            ContentPart::InlineData {
                mime_type: "image/png".to_string(),
                data: b"ccc".to_vec(),
            }
        );
    }

    #[tokio::test]
    async fn unsupported_type_becomes_text_part() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path()));
        store
            .put("notes.zip", Bytes::from_static(b"zip"))
            .await
            .unwrap();

        let files = vec![file_record("z", "notes.zip", "application/zip")];
        let parts = ContentMarshaler::new(store).marshal(&files).await;

        match &parts[0] {
            ContentPart::Text(text) => {
                assert!(text.contains("z.orig"));
                assert!(text.contains("application/zip"));
            }
            other => panic!("expected text part, got {:?}", other),
        }
    }
}
