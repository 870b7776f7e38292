//! # Projection Field Parser (C5, spec.md §4.5)
//!
//! Parses compact projection specs such as
//! `a.b[size=10,sort=x:desc].c,d` into per-path collection options and flat
//! field lists, and produces a merged `collectionPath → Pagination` map.
//!
//! ```text
//! spec     = seg {"." seg} ["," field {"," field}]
//! seg      = name ["[" option {"," option} "]"]
//! option   = "size=" posint | "page=" uint | "sort=" sortspec {"," sortspec}
//! sortspec = name [":" ("asc"|"desc")]
//! name     = (letter|"_") {letter|digit|"_"|"-"}
//! ```

use std::collections::HashMap;

use crate::error::ProjectionDefinitionError;

pub const MAX_PROJECTION_PAGE_SIZE: usize = 10_000;

/// A single `(field, direction)` sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Per-collection pagination options parsed from a `[...]` segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pagination {
    pub page: Option<u64>,
    pub size: Option<usize>,
    pub sort: Vec<SortKey>,
}

/// One fully expanded field path from a projection set, e.g.
/// `"books.title"` after `"books.title,year"` compact-notation expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(pub String);

/// The parsed result of an entire projection set: every expanded field
/// path, plus the merged per-collection-path pagination map.
#[derive(Debug, Clone, Default)]
pub struct ParsedProjection {
    pub fields: Vec<FieldPath>,
    pub collection_options: HashMap<String, Pagination>,
}

/// Parse a full projection set (the `projection: [...]` array of spec.md §3).
pub fn parse_projection(specs: &[String]) -> Result<ParsedProjection, ProjectionDefinitionError> {
    let mut fields = Vec::new();
    let mut collection_options: HashMap<String, Pagination> = HashMap::new();

    for spec in specs {
        let (segments, leaf_fields) = parse_one_spec(spec)?;

        let mut running_path = Vec::new();
        for seg in &segments {
            running_path.push(seg.name.clone());
            if let Some(options) = &seg.options {
                let path_key = running_path.join(".");
                match collection_options.get(&path_key) {
                    Some(existing) if existing != options => {
                        return Err(ProjectionDefinitionError::ConflictingOptions { path: path_key });
                    }
                    _ => {
                        collection_options.insert(path_key, options.clone());
                    }
                }
            }
        }

        let prefix = segments.iter().map(|s| s.name.clone()).collect::<Vec<_>>().join(".");
        for field in leaf_fields {
            let full = if prefix.is_empty() {
                field
            } else {
                format!("{prefix}.{field}")
            };
            fields.push(FieldPath(full));
        }
    }

    Ok(ParsedProjection {
        fields,
        collection_options,
    })
}

struct Segment {
    name: String,
    options: Option<Pagination>,
}

fn parse_one_spec(spec: &str) -> Result<(Vec<Segment>, Vec<String>), ProjectionDefinitionError> {
    let malformed = |reason: &str| ProjectionDefinitionError::MalformedSegment {
        segment: spec.to_string(),
        reason: reason.to_string(),
    };

    if spec.trim().is_empty() {
        return Err(malformed("empty projection segment"));
    }
    if spec.starts_with('.') || spec.ends_with('.') || spec.contains("..") {
        return Err(malformed("leading, trailing, or consecutive dots are not allowed"));
    }

    // Split off the trailing comma-separated field list, if any, at the
    // top level (not inside brackets).
    let (path_part, field_part) = split_top_level_comma(spec);

    let dotted = path_part.split('.').collect::<Vec<_>>();
    let mut segments = Vec::with_capacity(dotted.len());
    for raw_seg in dotted {
        segments.push(parse_segment(spec, raw_seg)?);
    }

    // The last dotted segment is itself always a leaf field name (e.g. the
    // `title` in `books.title`, or the whole of a bare `name` spec); any
    // comma-separated names after it are siblings under the same prefix
    // (the `,year` in `books[...].title,year` or `a.b.c,d,e`).
    let last = segments.pop().ok_or_else(|| malformed("empty path"))?;
    if last.options.is_some() {
        return Err(malformed("a collection segment cannot itself be the leaf field"));
    }
    let mut leaf_fields = vec![last.name];
    if let Some(rest) = field_part {
        for s in rest.split(',') {
            leaf_fields.push(validate_name(s.trim()).map_err(|_| malformed("invalid field name after comma"))?.to_string());
        }
    }

    Ok((segments, leaf_fields))
}

/// Splits a spec like `"a.b[opt].c,d"` into `("a.b[opt]", Some("c,d"))`, or
/// `("a.b[opt]", None)` if there is no top-level comma. Commas inside `[...]`
/// are not split points.
fn split_top_level_comma(spec: &str) -> (&str, Option<&str>) {
    let mut depth = 0i32;
    for (i, c) in spec.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => return (&spec[..i], Some(&spec[i + 1..])),
            _ => {}
        }
    }
    (spec, None)
}

fn parse_segment(spec: &str, raw: &str) -> Result<Segment, ProjectionDefinitionError> {
    let malformed = |reason: &str| ProjectionDefinitionError::MalformedSegment {
        segment: spec.to_string(),
        reason: reason.to_string(),
    };

    let raw = raw.trim();
    if let Some(bracket_start) = raw.find('[') {
        if !raw.ends_with(']') {
            return Err(malformed("unbalanced '[' in collection options"));
        }
        let name = validate_name(raw[..bracket_start].trim())?;
        let options_str = &raw[bracket_start + 1..raw.len() - 1];
        let options = parse_options(options_str, &malformed)?;
        Ok(Segment {
            name: name.to_string(),
            options: Some(options),
        })
    } else {
        let name = validate_name(raw)?;
        Ok(Segment {
            name: name.to_string(),
            options: None,
        })
    }
}

fn parse_options(
    s: &str,
    malformed: &dyn Fn(&str) -> ProjectionDefinitionError,
) -> Result<Pagination, ProjectionDefinitionError> {
    let mut pagination = Pagination::default();
    // A bare token with no '=' can only be a continuation of the active
    // `sort=` option (every real option starts with `size=`/`page=`/`sort=`),
    // so `sort=year:desc,name:asc` reads as one `sort` option with two keys
    // without needing a second delimiter.
    let mut in_sort = false;
    for raw_opt in s.split(',') {
        let opt = raw_opt.trim();
        if opt.is_empty() {
            continue;
        }
        let Some((key, value)) = opt.split_once('=') else {
            if !in_sort {
                return Err(malformed("collection option missing '='"));
            }
            pagination.sort.push(parse_sort_spec(opt, malformed)?);
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "size" => {
                let size: i64 = value
                    .parse()
                    .map_err(|_| malformed("size must be an integer"))?;
                if size < 1 || size as usize > MAX_PROJECTION_PAGE_SIZE {
                    return Err(ProjectionDefinitionError::SizeOutOfRange {
                        size,
                        max: MAX_PROJECTION_PAGE_SIZE,
                    });
                }
                pagination.size = Some(size as usize);
                in_sort = false;
            }
            "page" => {
                let page: i64 = value
                    .parse()
                    .map_err(|_| malformed("page must be an integer"))?;
                if page < 0 {
                    return Err(ProjectionDefinitionError::NegativePage { page });
                }
                pagination.page = Some(page as u64);
                in_sort = false;
            }
            "sort" => {
                pagination.sort.push(parse_sort_spec(value, malformed)?);
                in_sort = true;
            }
            other => {
                return Err(malformed(&format!("unknown collection option '{other}'")));
            }
        }
    }
    Ok(pagination)
}

fn parse_sort_spec(
    s: &str,
    malformed: &dyn Fn(&str) -> ProjectionDefinitionError,
) -> Result<SortKey, ProjectionDefinitionError> {
    let s = s.trim();
    match s.split_once(':') {
        Some((field, dir)) => {
            let field = validate_name(field)?;
            let descending = match dir.trim().to_ascii_lowercase().as_str() {
                "asc" => false,
                "desc" => true,
                _ => return Err(malformed("sort direction must be 'asc' or 'desc'")),
            };
            Ok(SortKey {
                field: field.to_string(),
                descending,
            })
        }
        None => Ok(SortKey {
            field: validate_name(s)?.to_string(),
            descending: false,
        }),
    }
}

fn validate_name(s: &str) -> Result<&str, ProjectionDefinitionError> {
    let s = s.trim();
    let malformed = || ProjectionDefinitionError::MalformedSegment {
        segment: s.to_string(),
        reason: "invalid field/segment name".to_string(),
    };
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return Err(malformed()),
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(malformed());
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_field_compact_syntax_equivalence() {
        // Scenario D
        let compact = parse_projection(&["address.city,country,postalCode".to_string()]).unwrap();
        let expanded = parse_projection(&[
            "address.city".to_string(),
            "address.country".to_string(),
            "address.postalCode".to_string(),
        ])
        .unwrap();
        let mut a: Vec<String> = compact.fields.iter().map(|f| f.0.clone()).collect();
        let mut b: Vec<String> = expanded.fields.iter().map(|f| f.0.clone()).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn collection_with_inline_pagination() {
        // Scenario C
        let parsed = parse_projection(&[
            "name".to_string(),
            "email".to_string(),
            "books[size=10,page=0,sort=year:desc].title,year".to_string(),
        ])
        .unwrap();

        let options = parsed.collection_options.get("books").unwrap();
        assert_eq!(options.size, Some(10));
        assert_eq!(options.page, Some(0));
        assert_eq!(
            options.sort,
            vec![SortKey {
                field: "year".to_string(),
                descending: true
            }]
        );

        let fields: Vec<String> = parsed.fields.iter().map(|f| f.0.clone()).collect();
        assert!(fields.contains(&"books.title".to_string()));
    }

    #[test]
    fn collection_sort_option_accepts_multiple_keys() {
        let parsed = parse_projection(&["books[sort=year:desc,name:asc].title".to_string()]).unwrap();

        let options = parsed.collection_options.get("books").unwrap();
        assert_eq!(
            options.sort,
            vec![
                SortKey {
                    field: "year".to_string(),
                    descending: true
                },
                SortKey {
                    field: "name".to_string(),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn conflicting_options_for_same_collection_rejected() {
        // Scenario F
        let err = parse_projection(&[
            "books[size=10].title".to_string(),
            "books[size=20].author".to_string(),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ProjectionDefinitionError::ConflictingOptions { path } if path == "books"
        ));
    }

    #[test]
    fn identical_options_for_same_collection_allowed() {
        let parsed = parse_projection(&[
            "books[size=10].title".to_string(),
            "books[size=10].author".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed.collection_options.get("books").unwrap().size, Some(10));
    }

    #[test]
    fn size_bounds_enforced() {
        assert!(matches!(
            parse_projection(&["books[size=0].title".to_string()]),
            Err(ProjectionDefinitionError::SizeOutOfRange { size: 0, .. })
        ));
        assert!(matches!(
            parse_projection(&["books[size=-1].title".to_string()]),
            Err(ProjectionDefinitionError::SizeOutOfRange { size: -1, .. })
        ));
        assert!(matches!(
            parse_projection(&["books[size=10001].title".to_string()]),
            Err(ProjectionDefinitionError::SizeOutOfRange { size: 10001, .. })
        ));
        assert!(parse_projection(&["books[size=10000].title".to_string()]).is_ok());
    }

    #[test]
    fn consecutive_or_boundary_dots_rejected() {
        assert!(parse_projection(&["a..b".to_string()]).is_err());
        assert!(parse_projection(&[".a.b".to_string()]).is_err());
        assert!(parse_projection(&["a.b.".to_string()]).is_err());
    }

    #[test]
    fn whitespace_around_commas_and_brackets_is_stripped() {
        let parsed = parse_projection(&["books[ size = 10 , sort = year : desc ].title , year".to_string()]);
        assert!(parsed.is_ok());
    }

    #[test]
    fn simple_scalar_field_has_no_options() {
        let parsed = parse_projection(&["name".to_string()]).unwrap();
        assert_eq!(parsed.fields.len(), 1);
        assert_eq!(parsed.fields[0].0, "name");
        assert!(parsed.collection_options.is_empty());
    }
}
