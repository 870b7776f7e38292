//! Shared fixtures for the integration suite: a `Book`/`Review` schema over
//! `backend::memory`, and the `BookProperty` enum a real code generator
//! would otherwise produce from entity annotations.
#![cfg(feature = "memory-backend")]

use std::collections::HashSet;
use std::sync::OnceLock;

use filterql::backend::memory::{MemoryBackend, MemorySchema};
use filterql::{DataType, Op, PropertyReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookProperty {
    Title,
    Status,
    Rating,
}

impl PropertyReference for BookProperty {
    fn declared_type(&self) -> DataType {
        match self {
            BookProperty::Title | BookProperty::Status => DataType::String,
            BookProperty::Rating => DataType::Int64,
        }
    }

    fn supported_operators(&self) -> &'static HashSet<Op> {
        static TITLE_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
        static STATUS_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
        static RATING_OPS: OnceLock<HashSet<Op>> = OnceLock::new();
        match self {
            BookProperty::Title => TITLE_OPS.get_or_init(|| {
                [Op::Eq, Op::Ne, Op::Matches, Op::NotMatches, Op::Custom]
                    .into_iter()
                    .collect()
            }),
            BookProperty::Status => STATUS_OPS.get_or_init(|| {
                [Op::Eq, Op::Ne, Op::In, Op::NotIn].into_iter().collect()
            }),
            BookProperty::Rating => RATING_OPS.get_or_init(|| {
                [Op::Eq, Op::Gt, Op::Gte, Op::Lt, Op::Lte, Op::Range]
                    .into_iter()
                    .collect()
            }),
        }
    }

    fn owning_entity_type(&self) -> &'static str {
        "Book"
    }

    fn name(&self) -> &'static str {
        match self {
            BookProperty::Title => "title",
            BookProperty::Status => "status",
            BookProperty::Rating => "rating",
        }
    }
}

pub fn book_schema() -> MemorySchema {
    MemorySchema::new()
        .entity("Book", &["id"])
        .entity("Review", &["id"])
        .scalar_field("Book", "id", DataType::Int64)
        .scalar_field("Book", "title", DataType::String)
        .scalar_field("Book", "status", DataType::String)
        .scalar_field("Book", "rating", DataType::Int64)
        .collection_field("Book", "reviews", "Review", Some("bookId"))
        .scalar_field("Review", "id", DataType::Int64)
        .scalar_field("Review", "bookId", DataType::Int64)
        .scalar_field("Review", "text", DataType::String)
        .scalar_field("Review", "value", DataType::Int64)
}

/// Seeds three books and a handful of reviews exercising pagination and
/// aggregate paths.
pub fn seeded_backend() -> MemoryBackend {
    use filterql::Value;

    let backend = MemoryBackend::new(book_schema(), "Book");
    backend.insert(
        "Book",
        [
            ("id".to_string(), Value::Int64(1)),
            ("title".to_string(), Value::String("Dune".to_string())),
            ("status".to_string(), Value::String("available".to_string())),
            ("rating".to_string(), Value::Int64(5)),
        ]
        .into_iter()
        .collect(),
    );
    backend.insert(
        "Book",
        [
            ("id".to_string(), Value::Int64(2)),
            ("title".to_string(), Value::String("Hyperion".to_string())),
            ("status".to_string(), Value::String("checked_out".to_string())),
            ("rating".to_string(), Value::Int64(3)),
        ]
        .into_iter()
        .collect(),
    );
    backend.insert(
        "Book",
        [
            ("id".to_string(), Value::Int64(3)),
            ("title".to_string(), Value::String("Foundation".to_string())),
            ("status".to_string(), Value::String("available".to_string())),
            ("rating".to_string(), Value::Int64(4)),
        ]
        .into_iter()
        .collect(),
    );

    for (id, book_id, text, value) in [
        (10, 1, "Brilliant", 5),
        (11, 1, "Slow start", 3),
        (12, 1, "Classic", 5),
        (13, 3, "Short but dense", 4),
    ] {
        backend.insert(
            "Review",
            [
                ("id".to_string(), Value::Int64(id)),
                ("bookId".to_string(), Value::Int64(book_id)),
                ("text".to_string(), Value::String(text.to_string())),
                ("value".to_string(), Value::Int64(value)),
            ]
            .into_iter()
            .collect(),
        );
    }

    backend
}
