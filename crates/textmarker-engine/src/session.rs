/*!
 * Per-document command session.
 *
 * All state an interaction needs — the document identifier, the current
 * color, the store handle — lives in an explicit [`Session`] value threaded
 * through every operation. Event sources (a selection gesture, a removal
 * click, a popup message) translate into one closed set of commands routed
 * through [`Session::dispatch`]; nothing in the engine reacts to raw events.
 *
 * Tree mutations run to completion inside a single dispatch; the only
 * suspension points are persistence calls, and a persistence failure aborts
 * the command without retry.
 */

use chrono::Utc;
use thiserror::Error;

use crate::dom::{DomRange, DomTree};
use crate::export;
use crate::highlight::{Highlight, HighlightId};
use crate::marking::{self, RestoreReport};
use crate::store::{AnchorStore, HighlightStorage, StorageError};

/// The closed command set the UI collaborator can issue.
#[derive(Debug, Clone)]
pub enum Cmd {
    /// A completed selection gesture: persist and mark it.
    Select { range: DomRange },
    /// A removal gesture on an existing highlight.
    RemoveById { id: HighlightId },
    SetColor { color: String },
    GetColor,
    GetHighlights,
    /// Destructive wipe of the document's highlight set. Confirmation is the
    /// caller's job.
    ClearAll,
}

/// Response paired with each command, at most one per dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Created(Highlight),
    Removed { existed: bool },
    Color(String),
    ColorSet,
    Highlights {
        document_id: String,
        highlights: Vec<Highlight>,
    },
    Cleared,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to render export: {0}")]
    Export(#[from] serde_json::Error),
}

/// Export formats offered to the UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

pub struct Session<S> {
    document_id: String,
    color: String,
    store: AnchorStore<S>,
}

impl<S: HighlightStorage> Session<S> {
    pub fn new(document_id: impl Into<String>, color: impl Into<String>, storage: S) -> Self {
        Self {
            document_id: document_id.into(),
            color: color.into(),
            store: AnchorStore::new(storage),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Route one command. Every path that touches storage may fail with a
    /// storage error; tree mutations themselves are infallible.
    pub async fn dispatch(&mut self, tree: &mut DomTree, cmd: Cmd) -> Result<Reply, SessionError> {
        match cmd {
            Cmd::Select { range } => {
                let highlight = Highlight::from_selection(tree, &range, &self.color);
                self.store
                    .append(&self.document_id, highlight.clone())
                    .await?;
                marking::apply(tree, &range, &highlight.color, highlight.id);
                Ok(Reply::Created(highlight))
            }
            Cmd::RemoveById { id } => {
                let existed = self.store.remove(&self.document_id, id).await?;
                marking::remove(tree, tree.root(), id);
                Ok(Reply::Removed { existed })
            }
            Cmd::SetColor { color } => {
                self.color = color;
                Ok(Reply::ColorSet)
            }
            Cmd::GetColor => Ok(Reply::Color(self.color.clone())),
            Cmd::GetHighlights => {
                let highlights = self.store.get(&self.document_id).await?;
                Ok(Reply::Highlights {
                    document_id: self.document_id.clone(),
                    highlights,
                })
            }
            Cmd::ClearAll => {
                self.store.clear_all(&self.document_id).await?;
                marking::strip_all(tree, tree.root());
                Ok(Reply::Cleared)
            }
        }
    }

    /// The page-load flow: load the persisted set and replay it against a
    /// freshly built tree.
    pub async fn restore(&self, tree: &mut DomTree) -> Result<RestoreReport, SessionError> {
        let highlights = self.store.get(&self.document_id).await?;
        Ok(marking::restore_all(tree, tree.root(), &highlights))
    }

    /// Render the current highlight list in the requested format, or `None`
    /// when there is nothing to export — in which case the caller must not
    /// write a file.
    pub async fn export(&self, format: ExportFormat) -> Result<Option<String>, SessionError> {
        let highlights = self.store.get(&self.document_id).await?;
        if highlights.is_empty() {
            return Ok(None);
        }
        let exported_at = Utc::now();
        let rendered = match format {
            ExportFormat::Markdown => {
                export::to_markdown(&self.document_id, &highlights, exported_at)
            }
            ExportFormat::Json => export::to_json(&self.document_id, &highlights, exported_at)?,
        };
        Ok(Some(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::markup;
    use crate::dom::range::find_text;
    use crate::marking::is_mark;
    use crate::store::MemoryStorage;
    use pretty_assertions::assert_eq;

    const DOC: &str = "<p>The quick fox jumps over the lazy dog</p>";

    fn session() -> Session<MemoryStorage> {
        Session::new("file:///tmp/doc.html", "#ffff00", MemoryStorage::new())
    }

    fn mark_count(tree: &DomTree) -> usize {
        tree.descendants(tree.root())
            .into_iter()
            .filter(|node| is_mark(tree, *node))
            .count()
    }

    #[tokio::test]
    async fn test_select_persists_and_marks() {
        let mut tree = markup::parse(DOC);
        let mut session = session();

        let range = find_text(&tree, "quick fox").unwrap();
        let reply = session
            .dispatch(&mut tree, Cmd::Select { range })
            .await
            .unwrap();

        let Reply::Created(highlight) = reply else {
            panic!("expected Created reply");
        };
        assert_eq!(highlight.text, "quick fox");
        assert_eq!(highlight.color, "#ffff00");
        assert_eq!(mark_count(&tree), 1);

        let reply = session.dispatch(&mut tree, Cmd::GetHighlights).await.unwrap();
        let Reply::Highlights { highlights, document_id } = reply else {
            panic!("expected Highlights reply");
        };
        assert_eq!(document_id, "file:///tmp/doc.html");
        assert_eq!(highlights.len(), 1);
    }

    #[tokio::test]
    async fn test_set_color_applies_to_later_selections() {
        let mut tree = markup::parse(DOC);
        let mut session = session();

        let reply = session.dispatch(&mut tree, Cmd::GetColor).await.unwrap();
        assert_eq!(reply, Reply::Color("#ffff00".to_string()));

        session
            .dispatch(
                &mut tree,
                Cmd::SetColor {
                    color: "#baffc9".to_string(),
                },
            )
            .await
            .unwrap();

        let range = find_text(&tree, "lazy dog").unwrap();
        let reply = session
            .dispatch(&mut tree, Cmd::Select { range })
            .await
            .unwrap();
        let Reply::Created(highlight) = reply else {
            panic!("expected Created reply");
        };
        assert_eq!(highlight.color, "#baffc9");
    }

    #[tokio::test]
    async fn test_remove_by_id_deletes_record_and_mark() {
        let mut tree = markup::parse(DOC);
        let mut session = session();

        let range = find_text(&tree, "quick fox").unwrap();
        let Reply::Created(highlight) = session
            .dispatch(&mut tree, Cmd::Select { range })
            .await
            .unwrap()
        else {
            panic!("expected Created reply");
        };

        let reply = session
            .dispatch(&mut tree, Cmd::RemoveById { id: highlight.id })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Removed { existed: true });
        assert_eq!(mark_count(&tree), 0);
        assert_eq!(tree.serialize_children(tree.root()), DOC);

        let reply = session
            .dispatch(&mut tree, Cmd::RemoveById { id: highlight.id })
            .await
            .unwrap();
        assert_eq!(reply, Reply::Removed { existed: false });
    }

    #[tokio::test]
    async fn test_clear_all_empties_document() {
        let mut tree = markup::parse(DOC);
        let mut session = session();

        for needle in ["quick", "lazy"] {
            let range = find_text(&tree, needle).unwrap();
            session
                .dispatch(&mut tree, Cmd::Select { range })
                .await
                .unwrap();
        }

        session.dispatch(&mut tree, Cmd::ClearAll).await.unwrap();

        assert_eq!(mark_count(&tree), 0);
        let Reply::Highlights { highlights, .. } = session
            .dispatch(&mut tree, Cmd::GetHighlights)
            .await
            .unwrap()
        else {
            panic!("expected Highlights reply");
        };
        assert!(highlights.is_empty());
    }

    #[tokio::test]
    async fn test_export_empty_list_yields_none() {
        let session = session();

        assert_eq!(session.export(ExportFormat::Markdown).await.unwrap(), None);
        assert_eq!(session.export(ExportFormat::Json).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_export_renders_stored_highlights() {
        let mut tree = markup::parse(DOC);
        let mut session = session();
        let range = find_text(&tree, "quick fox").unwrap();
        session
            .dispatch(&mut tree, Cmd::Select { range })
            .await
            .unwrap();

        let markdown = session
            .export(ExportFormat::Markdown)
            .await
            .unwrap()
            .unwrap();
        assert!(markdown.contains("# Highlights from file:///tmp/doc.html"));
        assert!(markdown.contains("> quick fox"));

        let json = session.export(ExportFormat::Json).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["documentId"], "file:///tmp/doc.html");
        assert_eq!(value["highlights"][0]["text"], "quick fox");
    }

    #[tokio::test]
    async fn test_restore_replays_persisted_set_on_fresh_tree() {
        let mut tree = markup::parse(DOC);
        let mut session = session();
        let range = find_text(&tree, "quick fox").unwrap();
        session
            .dispatch(&mut tree, Cmd::Select { range })
            .await
            .unwrap();

        // Reload: a brand-new tree from the same markup.
        let mut fresh = markup::parse(DOC);
        let report = session.restore(&mut fresh).await.unwrap();

        assert_eq!(report, RestoreReport { applied: 1, lost: 0 });
        assert_eq!(mark_count(&fresh), 1);
        assert_eq!(fresh.text_content(fresh.root()), tree.text_content(tree.root()));
    }
}
