//! The three shelves every user owns and the collections behind them.

use std::fmt;
use std::str::FromStr;

use bookshelf_db::Collection;
use serde::Serialize;
use thiserror::Error;

const TO_READ: Collection = Collection {
    name: "books_to_read",
    id_field: "to_read_id",
};
const READING: Collection = Collection {
    name: "books_being_read",
    id_field: "being_read_id",
};
const READ: Collection = Collection {
    name: "books_read",
    id_field: "read_id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shelf {
    ToRead,
    Reading,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown shelf '{0}'")]
pub struct UnknownShelf(pub String);

impl Shelf {
    pub const ALL: [Shelf; 3] = [Shelf::ToRead, Shelf::Reading, Shelf::Read];

    /// Canonical name used in URLs and responses.
    pub fn as_str(self) -> &'static str {
        match self {
            Shelf::ToRead => "to-read",
            Shelf::Reading => "reading",
            Shelf::Read => "read",
        }
    }

    pub fn collection(self) -> Collection {
        resolve_shelf(self)
    }
}

/// Backing collection and row-id field of a shelf.
pub fn resolve_shelf(shelf: Shelf) -> Collection {
    match shelf {
        Shelf::ToRead => TO_READ,
        Shelf::Reading => READING,
        Shelf::Read => READ,
    }
}

impl FromStr for Shelf {
    type Err = UnknownShelf;

    /// Accepts the canonical names plus the aliases older clients send.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "to-read" | "to-read-books" | "will-read" | "books_to_read" => Ok(Shelf::ToRead),
            "reading" | "reading-books" | "being-read" | "books_being_read" => Ok(Shelf::Reading),
            "read" | "read-books" | "have-read" | "books_read" => Ok(Shelf::Read),
            _ => Err(UnknownShelf(value.to_string())),
        }
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
