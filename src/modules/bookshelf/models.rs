use std::fmt;

use bookshelf_db::{Collection, Row, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::shelf::Shelf;

/// Row id of a shelf entry. Ids are scoped to one shelf and change when a book moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One book on one user's shelf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShelfEntry {
    pub id: EntryId,
    pub shelf: Shelf,
    pub title: String,
    /// Catalog order is preserved.
    pub authors: Vec<String>,
}

impl ShelfEntry {
    pub fn from_row(shelf: Shelf, collection: &Collection, row: &Row) -> Result<Self, StoreError> {
        let id = row
            .get(collection.id_field)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                StoreError::Decode(format!(
                    "{} row without numeric {}",
                    collection.name, collection.id_field
                ))
            })?;
        let title = row
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Decode(format!("{} row {id} without title", collection.name)))?;
        let authors = match row.get("authors") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self {
            id: EntryId(id),
            shelf,
            title: title.to_string(),
            authors,
        })
    }
}

/// The three shelves of one user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Bookshelf {
    #[serde(rename = "to-read")]
    pub to_read: Vec<ShelfEntry>,
    pub reading: Vec<ShelfEntry>,
    pub read: Vec<ShelfEntry>,
}

/// Body of `POST /addbooktoshelf`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddBookRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub table: Option<String>,
}

/// Body of `DELETE /move`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveBookRequest {
    pub book_id: Option<EntryId>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Body of `DELETE /move-btn`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveByTitleRequest {
    pub title: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Body of `DELETE /delete`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveBookRequest {
    pub book_id: Option<EntryId>,
    pub bookshelf: Option<String>,
}

/// Body of `DELETE /clear`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearShelfRequest {
    pub bookshelf: Option<String>,
}

/// Success envelope shared by every bookshelf endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
        }
    }
}

/// Payload returned after an add or a move.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EntryCreated {
    pub id: EntryId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_reads_shelf_specific_id_field() {
        let collection = Shelf::Reading.collection();
        let row = json!({
            "being_read_id": 12,
            "title": "Dune",
            "authors": ["Frank Herbert"],
            "user_id": "u1"
        });

        let entry = ShelfEntry::from_row(Shelf::Reading, &collection, row.as_object().unwrap()).unwrap();
        assert_eq!(entry.id, EntryId(12));
        assert_eq!(entry.authors, vec!["Frank Herbert".to_string()]);
    }

    #[test]
    fn entry_without_id_is_a_decode_error() {
        let collection = Shelf::Read.collection();
        let row = json!({"to_read_id": 1, "title": "Dune"});

        let err = ShelfEntry::from_row(Shelf::Read, &collection, row.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn serialized_entry_uses_shelf_slug() {
        let entry = ShelfEntry {
            id: EntryId(1),
            shelf: Shelf::ToRead,
            title: "Dune".to_string(),
            authors: vec![],
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({"id": 1, "shelf": "to-read", "title": "Dune", "authors": []}));
    }
}
