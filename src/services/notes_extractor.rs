use crate::entities::notes;
use crate::services::ai::CompletionModel;
use crate::services::prompts::EXTRACTION_PROMPT;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Hard cap on notes persisted per extraction call.
pub const MAX_EXTRACTED_NOTES: usize = 5;

const VALID_CATEGORIES: [&str; 3] = ["technique", "advice", "resource"];

#[derive(Debug, Deserialize)]
struct NoteCandidate {
    title: Option<String>,
    content: Option<String>,
    category: Option<String>,
    link: Option<String>,
}

/// A candidate that survived validation and may be persisted.
struct ValidNote {
    title: String,
    content: String,
    category: String,
    link: Option<String>,
}

fn validate(candidate: NoteCandidate) -> Option<ValidNote> {
    let title = candidate.title?.trim().to_string();
    let content = candidate.content?.trim().to_string();
    let category = candidate.category?.trim().to_string();

    if title.is_empty() || content.is_empty() {
        return None;
    }
    if !VALID_CATEGORIES.contains(&category.as_str()) {
        return None;
    }

    let link = candidate
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    Some(ValidNote {
        title,
        content,
        category,
        link,
    })
}

/// Locate the outermost JSON object or array inside arbitrary model output
/// (code fences, leading prose, trailing commentary).
fn extract_json_slice(raw: &str) -> Option<&str> {
    let obj = raw.find('{').zip(raw.rfind('}'));
    let arr = raw.find('[').zip(raw.rfind(']'));

    let (start, end) = match (obj, arr) {
        (Some((os, oe)), Some((as_, ae))) => {
            if as_ < os {
                (as_, ae)
            } else {
                (os, oe)
            }
        }
        (Some(pair), None) => pair,
        (None, Some(pair)) => pair,
        (None, None) => return None,
    };

    if start >= end {
        return None;
    }
    Some(&raw[start..=end])
}

/// Defensive parse: accept a bare array or an object with an `items` or
/// `notes` property. Anything else is a parse failure.
fn parse_candidates(raw: &str) -> Option<Vec<NoteCandidate>> {
    let value: Value = serde_json::from_str(raw.trim())
        .ok()
        .or_else(|| serde_json::from_str(extract_json_slice(raw)?).ok())?;

    let items = if value.is_array() {
        value
    } else {
        value
            .get("items")
            .or_else(|| value.get("notes"))?
            .clone()
    };

    serde_json::from_value(items).ok()
}

/// Extracts durable notes from an AI critique via a secondary model.
///
/// Fully best-effort from the pipeline's perspective: the orchestrator
/// inspects the returned `Result`, logs failures, and continues.
pub struct NoteExtractor {
    db: DatabaseConnection,
    model: Arc<dyn CompletionModel>,
}

impl NoteExtractor {
    pub fn new(db: DatabaseConnection, model: Arc<dyn CompletionModel>) -> Self {
        Self { db, model }
    }

    /// Returns the number of notes persisted. A parse failure creates
    /// nothing; malformed items are dropped, not retried.
    pub async fn extract(
        &self,
        response_text: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> anyhow::Result<usize> {
        let raw = self.model.complete(EXTRACTION_PROMPT, response_text).await?;

        let Some(candidates) = parse_candidates(&raw) else {
            anyhow::bail!("extraction response was not parseable JSON");
        };

        let valid: Vec<ValidNote> = candidates
            .into_iter()
            .filter_map(validate)
            .take(MAX_EXTRACTED_NOTES)
            .collect();

        let now = Utc::now();
        let mut created = 0;

        for note in valid {
            let active = notes::ActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                user_id: Set(user_id.to_string()),
                conversation_id: Set(Some(conversation_id.to_string())),
                title: Set(note.title),
                content: Set(note.content),
                link: Set(note.link),
                note_type: Set("ai_extracted".to_string()),
                category: Set(note.category),
                tags: Set(serde_json::json!([])),
                created_at: Set(now),
                updated_at: Set(now),
            };
            active.insert(&self.db).await?;
            created += 1;
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_with_items() {
        let raw = r#"{"items": [{"title": "Layering", "content": "Glaze thin over dry paint.", "category": "technique"}]}"#;
        let parsed = parse_candidates(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title.as_deref(), Some("Layering"));
    }

    #[test]
    fn parses_bare_array_and_notes_property() {
        let bare = r#"[{"title": "t", "content": "c", "category": "advice"}]"#;
        assert_eq!(parse_candidates(bare).unwrap().len(), 1);

        let notes = r#"{"notes": [{"title": "t", "content": "c", "category": "advice"}]}"#;
        assert_eq!(parse_candidates(notes).unwrap().len(), 1);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Here you go:\n```json\n{\"items\": [{\"title\": \"t\", \"content\": \"c\", \"category\": \"resource\"}]}\n```";
        assert_eq!(parse_candidates(raw).unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        assert!(parse_candidates("I could not find any notes.").is_none());
        assert!(parse_candidates("{\"unrelated\": true}").is_none());
    }

    #[test]
    fn validation_drops_incomplete_or_miscategorized_items() {
        let missing_content = NoteCandidate {
            title: Some("t".into()),
            content: None,
            category: Some("advice".into()),
            link: None,
        };
        assert!(validate(missing_content).is_none());

        let bad_category = NoteCandidate {
            title: Some("t".into()),
            content: Some("c".into()),
            category: Some("general".into()),
            link: None,
        };
        assert!(validate(bad_category).is_none());

        let ok = NoteCandidate {
            title: Some("t".into()),
            content: Some("c".into()),
            category: Some("technique".into()),
            link: Some("".into()),
        };
        let valid = validate(ok).unwrap();
        assert!(valid.link.is_none());
    }
}
