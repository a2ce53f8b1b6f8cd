use crate::entities::files;
use crate::services::ai::{ContentPart, GenerativeModel};
use crate::services::prompts::TITLE_INSTRUCTION;
use crate::services::storage::BlobStore;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use std::sync::Arc;

/// Generates short descriptive titles for image files that lack one.
///
/// This is a best-effort side task: every failure is logged and swallowed
/// per file, and the pass reports how many titles it managed to write.
pub struct TitleGenerator {
    db: DatabaseConnection,
    storage: Arc<dyn BlobStore>,
    model: Arc<dyn GenerativeModel>,
}

impl TitleGenerator {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn BlobStore>,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self { db, storage, model }
    }

    /// Runs once per untitled image, sequentially. A failed file never
    /// stops the loop.
    pub async fn ensure_titles(&self, files: &[files::Model]) -> usize {
        let mut written = 0;

        for file in files {
            if !file.mime_type.starts_with("image/") || file.title.is_some() {
                continue;
            }
            match self.generate_one(file).await {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::warn!("Title generation failed for file {}: {}", file.id, e);
                }
            }
        }

        written
    }

    async fn generate_one(&self, file: &files::Model) -> anyhow::Result<()> {
        let data = self.storage.fetch(&file.filename).await?;
        if data.is_empty() {
            anyhow::bail!("stored object is empty");
        }

        let parts = [
            ContentPart::text(TITLE_INSTRUCTION),
            ContentPart::InlineData {
                mime_type: file.mime_type.clone(),
                data: data.to_vec(),
            },
        ];

        let title = self.model.generate(&parts).await?;
        let title = title.trim();
        if title.is_empty() {
            anyhow::bail!("model returned a blank title");
        }

        let mut active: files::ActiveModel = file.clone().into();
        active.title = Set(Some(title.to_string()));
        active.update(&self.db).await?;

        tracing::debug!("Titled image {}: {}", file.id, title);
        Ok(())
    }
}
