use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

use crate::error::{AppError, Result};

/// A filterable column of `fs_files`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileField {
    Id,
    Filename,
    ContentType,
    Checksum,
    Length,
    ChunkSize,
    /// A top-level key of the metadata object
    Metadata(String),
}

impl FileField {
    fn parse(key: &str) -> Result<Self> {
        let field = match key {
            "id" | "_id" => FileField::Id,
            "filename" => FileField::Filename,
            "content_type" | "contentType" => FileField::ContentType,
            "checksum" => FileField::Checksum,
            "length" => FileField::Length,
            "chunk_size" | "chunkSize" => FileField::ChunkSize,
            _ => match key.strip_prefix("metadata.") {
                Some(name)
                    if !name.is_empty()
                        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
                {
                    FileField::Metadata(name.to_string())
                }
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "Unknown filter field: {}",
                        key
                    )))
                }
            },
        };
        Ok(field)
    }

    fn is_integer(&self) -> bool {
        matches!(self, FileField::Length | FileField::ChunkSize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterValue {
    Text(String),
    Integer(i64),
}

/// Exact-match conditions over file metadata, joined with `AND`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    conditions: Vec<(FileField, FilterValue)>,
}

impl FileFilter {
    pub fn from_params(params: HashMap<String, String>) -> Result<Self> {
        let mut conditions = Vec::with_capacity(params.len());
        for (key, raw) in params {
            let field = FileField::parse(&key)?;
            let value = if field.is_integer() {
                let n = raw.trim().parse().map_err(|_| {
                    AppError::BadRequest(format!("Filter {} expects an integer", key))
                })?;
                FilterValue::Integer(n)
            } else {
                FilterValue::Text(raw)
            };
            conditions.push((field, value));
        }
        // Stable SQL text regardless of map iteration order
        conditions.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self { conditions })
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append ` WHERE ...` for the conditions, or nothing when there are none
    pub fn push_where(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        for (i, (field, value)) in self.conditions.iter().enumerate() {
            query.push(if i == 0 { " WHERE " } else { " AND " });
            match field {
                FileField::Id => query.push("id = "),
                FileField::Filename => query.push("filename = "),
                FileField::ContentType => query.push("content_type = "),
                FileField::Checksum => query.push("checksum = "),
                FileField::Length => query.push("length = "),
                FileField::ChunkSize => query.push("chunk_size = "),
                FileField::Metadata(name) => {
                    query.push("CAST(json_extract(metadata, ");
                    query.push_bind(format!("$.{}", name));
                    query.push(") AS TEXT) = ")
                }
            };
            match value {
                FilterValue::Text(s) => query.push_bind(s.clone()),
                FilterValue::Integer(n) => query.push_bind(*n),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_builds_where_clause() {
        let filter = FileFilter::from_params(params(&[
            ("filename", "test.png"),
            ("contentType", "image/png"),
        ]))
        .unwrap();

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM fs_files");
        filter.push_where(&mut query);
        assert_eq!(
            query.sql(),
            "SELECT * FROM fs_files WHERE filename = ? AND content_type = ?"
        );
    }

    #[test]
    fn test_empty_filter_adds_nothing() {
        let filter = FileFilter::from_params(HashMap::new()).unwrap();
        assert!(filter.is_empty());
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM fs_files");
        filter.push_where(&mut query);
        assert_eq!(query.sql(), "SELECT * FROM fs_files");
    }

    #[test]
    fn test_metadata_key() {
        let filter = FileFilter::from_params(params(&[("metadata.owner", "alice")])).unwrap();
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM fs_files");
        filter.push_where(&mut query);
        assert_eq!(
            query.sql(),
            "SELECT id FROM fs_files WHERE CAST(json_extract(metadata, ?) AS TEXT) = ?"
        );
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        assert!(FileFilter::from_params(params(&[("owner", "x")])).is_err());
        assert!(FileFilter::from_params(params(&[("metadata.a b", "x")])).is_err());
        assert!(FileFilter::from_params(params(&[("metadata.", "x")])).is_err());
        assert!(FileFilter::from_params(params(&[("length", "big")])).is_err());
    }
}
