use bookshelf_db::{Collection, Row, StoreError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Shared catalog of books offered to visitors.
pub const CATALOG: Collection = Collection {
    name: "books",
    id_field: "id",
};

pub const AUTHOR_FIELD: &str = "author";
pub const GENRE_FIELD: &str = "genre";
pub const PAGE_COUNT_FIELD: &str = "page_count";

/// One book of the recommended catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBook {
    pub id: i64,
    pub title: String,
    #[serde(rename = "author", default, deserialize_with = "one_or_many")]
    pub authors: Vec<String>,
    #[serde(rename = "genre", default, deserialize_with = "one_or_many")]
    pub genres: Vec<String>,
    #[serde(default)]
    pub page_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

impl CatalogBook {
    pub fn from_row(row: Row) -> Result<Self, StoreError> {
        serde_json::from_value(Value::Object(row))
            .map_err(|e| StoreError::Decode(format!("{} row: {e}", CATALOG.name)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Catalog rows hold author and genre lists; a lone string counts as a one-item list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

/// Query of `GET /filter`. Blank strings and a negative page count mean "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFilter {
    pub author: Option<String>,
    pub genre: Option<String>,
    pub page_count: Option<i64>,
}

impl CatalogFilter {
    pub fn author(&self) -> Option<&str> {
        non_blank(self.author.as_deref())
    }

    pub fn genre(&self) -> Option<&str> {
        non_blank(self.genre.as_deref())
    }

    pub fn max_pages(&self) -> Option<i64> {
        self.page_count.filter(|pages| *pages >= 0)
    }
}

/// Payload of `GET /pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageBound {
    pub page_count: Option<i64>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn catalog_row_accepts_lists_and_single_values() {
        let listed = CatalogBook::from_row(row(json!({
            "id": 1,
            "title": "Good Omens",
            "author": ["Terry Pratchett", "Neil Gaiman"],
            "genre": ["Fantasy"],
            "page_count": 412
        })))
        .unwrap();
        assert_eq!(listed.authors.len(), 2);
        assert_eq!(listed.page_count, Some(412));

        let single = CatalogBook::from_row(row(json!({
            "id": 2,
            "title": "Dune",
            "author": "Frank Herbert",
            "genre": null
        })))
        .unwrap();
        assert_eq!(single.authors, vec!["Frank Herbert".to_string()]);
        assert!(single.genres.is_empty());
        assert_eq!(single.page_count, None);
    }

    #[test]
    fn catalog_row_without_title_is_a_decode_error() {
        let err = CatalogBook::from_row(row(json!({"id": 3}))).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn blank_and_negative_filters_mean_any() {
        let filter = CatalogFilter {
            author: Some("  ".to_string()),
            genre: Some(" Fantasy ".to_string()),
            page_count: Some(-1),
        };
        assert_eq!(filter.author(), None);
        assert_eq!(filter.genre(), Some("Fantasy"));
        assert_eq!(filter.max_pages(), None);
    }

    #[test]
    fn serialized_book_uses_catalog_field_names() {
        let book = CatalogBook {
            id: 1,
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            genres: vec![],
            page_count: Some(412),
            isbn: None,
            cover: None,
        };
        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            json!({"id": 1, "title": "Dune", "author": ["Frank Herbert"], "genre": [], "page_count": 412})
        );
    }
}
