//! Demo command: seeds the in-memory reference backend with a handful of
//! books and reviews, runs one `FilterRequest` through the full C1–C10
//! pipeline, and prints the resulting rows as JSON.
//!
//! Not a production client — `filterql` ships no concrete relational
//! backend, so this exists purely to exercise the library end-to-end from a
//! command line.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use clap::Parser;

use filterql::backend::memory::{MemoryBackend, MemorySchema};
use filterql::{
    DataType, FilterDefinition, FilterQlError, FilterQueryFactory, FilterRequest, Op,
    OperatorRegistry, PropertyReference, RawValue,
};

#[derive(Debug, Parser)]
#[command(name = "filterql-cli", about = "Run a FilterQL query against the in-memory reference backend")]
struct Args {
    /// Filter operator, e.g. EQ, GT, MATCHES.
    #[arg(long, default_value = "EQ")]
    op: String,

    /// Filter value, compared against the chosen property.
    #[arg(long)]
    value: Option<String>,

    /// Property to filter on.
    #[arg(long, value_enum, default_value = "title")]
    property: BookPropertyArg,

    /// Projection field list, comma-separated compact syntax allowed.
    #[arg(long, value_delimiter = ',', default_values_t = vec!["title".to_string(), "reviews.text".to_string()])]
    select: Vec<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BookPropertyArg {
    Title,
    Status,
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BookProperty {
    Title,
    Status,
    Rating,
}

impl From<BookPropertyArg> for BookProperty {
    fn from(value: BookPropertyArg) -> Self {
        match value {
            BookPropertyArg::Title => BookProperty::Title,
            BookPropertyArg::Status => BookProperty::Status,
            BookPropertyArg::Rating => BookProperty::Rating,
        }
    }
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
                [Op::Eq, Op::Ne, Op::Matches, Op::NotMatches].into_iter().collect()
            }),
            BookProperty::Status => STATUS_OPS.get_or_init(|| {
                [Op::Eq, Op::Ne, Op::In, Op::NotIn].into_iter().collect()
            }),
            BookProperty::Rating => RATING_OPS.get_or_init(|| {
                [Op::Eq, Op::Gt, Op::Gte, Op::Lt, Op::Lte, Op::Range].into_iter().collect()
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

fn seeded_backend() -> MemoryBackend {
    use filterql::Value;

    let schema = MemorySchema::new()
        .entity("Book", &["id"])
        .entity("Review", &["id"])
        .scalar_field("Book", "id", DataType::Int64)
        .scalar_field("Book", "title", DataType::String)
        .scalar_field("Book", "status", DataType::String)
        .scalar_field("Book", "rating", DataType::Int64)
        .collection_field("Book", "reviews", "Review", Some("bookId"))
        .scalar_field("Review", "id", DataType::Int64)
        .scalar_field("Review", "bookId", DataType::Int64)
        .scalar_field("Review", "text", DataType::String);

    let backend = MemoryBackend::new(schema, "Book");
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
        "Review",
        [
            ("id".to_string(), Value::Int64(10)),
            ("bookId".to_string(), Value::Int64(1)),
            ("text".to_string(), Value::String("Brilliant".to_string())),
        ]
        .into_iter()
        .collect(),
    );
    backend.insert(
        "Review",
        [
            ("id".to_string(), Value::Int64(11)),
            ("bookId".to_string(), Value::Int64(1)),
            ("text".to_string(), Value::String("Slow start".to_string())),
        ]
        .into_iter()
        .collect(),
    );
    backend
}

fn raw_value_of(property: BookProperty, raw: Option<&str>) -> Option<RawValue> {
    let raw = raw?;
    Some(match property.declared_type() {
        DataType::Int64 | DataType::Float64 => raw
            .parse::<f64>()
            .map(RawValue::Number)
            .unwrap_or_else(|_| RawValue::String(raw.to_string())),
        _ => RawValue::String(raw.to_string()),
    })
}

fn main() -> Result<(), FilterQlError> {
    let config = filterql::Config::load().unwrap_or_default();
    filterql::telemetry::init(&config.logging);

    let args = Args::parse();
    let property: BookProperty = args.property.into();
    let backend = seeded_backend();
    let registry = Arc::new(OperatorRegistry::new());
    let query = FilterQueryFactory::of::<BookProperty>(registry, config.coercion.to_policy(), config.limits.max_dsl_length);

    let request = FilterRequest::new()
        .with_filter("f1", FilterDefinition::new(property, args.op.clone(), raw_value_of(property, args.value.as_deref())))
        .with_combine_with("f1")
        .with_projection(args.select.clone());

    let mut executor = query.to_executor(&request, &backend, &backend.root(), backend.schema(), &[])?;
    let rows = executor.execute_with(&backend, None)?;

    let materialized: Vec<_> = rows.iter().map(|row| row.to_map()).collect();
    println!("{}", serde_json::to_string_pretty(&to_json(&materialized)).unwrap_or_default());

    Ok(())
}

fn to_json(rows: &[std::collections::HashMap<String, filterql::row::FieldValue>]) -> serde_json::Value {
    serde_json::Value::Array(rows.iter().map(|row| field_map_to_json(row)).collect())
}

fn field_map_to_json(map: &std::collections::HashMap<String, filterql::row::FieldValue>) -> serde_json::Value {
    let entries = map.iter().map(|(k, v)| (k.clone(), field_value_to_json(v))).collect();
    serde_json::Value::Object(entries)
}

fn field_value_to_json(value: &filterql::row::FieldValue) -> serde_json::Value {
    use filterql::row::FieldValue;
    use filterql::Value;

    match value {
        FieldValue::Scalar(Value::Null) => serde_json::Value::Null,
        FieldValue::Scalar(Value::Int64(n)) => serde_json::json!(n),
        FieldValue::Scalar(Value::Float64(n)) => serde_json::json!(n),
        FieldValue::Scalar(Value::Bool(b)) => serde_json::json!(b),
        FieldValue::Scalar(Value::String(s)) => serde_json::json!(s),
        FieldValue::Scalar(Value::Uuid(u)) => serde_json::json!(u.to_string()),
        FieldValue::Scalar(Value::DateTime(dt)) => serde_json::json!(dt.to_rfc3339()),
        FieldValue::Scalar(Value::List(items)) => {
            serde_json::Value::Array(items.iter().map(|v| field_value_to_json(&FieldValue::Scalar(v.clone()))).collect())
        }
        FieldValue::Nested(nested) => field_map_to_json(nested),
        FieldValue::Collection(rows) => serde_json::Value::Array(rows.iter().map(field_map_to_json).collect()),
    }
}
