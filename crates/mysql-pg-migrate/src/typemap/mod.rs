//! MySQL to PostgreSQL type mapping.
//!
//! The mapper takes the full MySQL column declaration (`int(10) unsigned`,
//! `decimal(10,2)`, `enum('a','b')`) and produces the PostgreSQL type to
//! splice into `CREATE TABLE`: uppercased, padded with a single leading and
//! trailing space.
//!
//! MySQL integer display widths are meaningless in PostgreSQL and are
//! dropped; `unsigned`/`zerofill` promote to the next wider type since an
//! unsigned 32-bit value does not fit in `int4`.

use crate::error::{MigrateError, Result};

/// Result of a type mapping operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    /// The PostgreSQL type, uppercase, padded with one space on each side.
    pub pg_type: String,

    /// Whether the produced type carries a `(...)` length suffix.
    pub has_length_suffix: bool,
}

/// One dictionary entry, keyed by the lowercase MySQL base type.
struct MapEntry {
    /// PostgreSQL type for the plain declaration.
    pg: &'static str,

    /// PostgreSQL type when the column is `unsigned` or `zerofill`.
    promoted: &'static str,

    /// Whether the MySQL `(...)` suffix is carried over verbatim. Integer
    /// widths and value lists never are.
    keeps_length: bool,
}

const fn entry(pg: &'static str, promoted: &'static str, keeps_length: bool) -> MapEntry {
    MapEntry {
        pg,
        promoted,
        keeps_length,
    }
}

fn lookup(base: &str) -> Option<MapEntry> {
    Some(match base {
        "tinyint" | "smallint" | "year" => entry("SMALLINT", "INT", false),
        "mediumint" | "int" | "integer" => entry("INT", "BIGINT", false),
        "bigint" => entry("BIGINT", "BIGINT", false),
        "float" => entry("REAL", "DOUBLE PRECISION", false),
        "double" | "real" => entry("DOUBLE PRECISION", "DOUBLE PRECISION", false),
        "decimal" | "dec" => entry("DECIMAL", "DECIMAL", true),
        "numeric" => entry("NUMERIC", "NUMERIC", true),
        "char" => entry("CHARACTER", "CHARACTER", true),
        "varchar" => entry("CHARACTER VARYING", "CHARACTER VARYING", true),
        "enum" | "set" => entry("CHARACTER VARYING(255)", "CHARACTER VARYING(255)", false),
        "date" => entry("DATE", "DATE", false),
        "time" => entry("TIME", "TIME", false),
        "datetime" | "timestamp" => entry("TIMESTAMP", "TIMESTAMP", false),
        "tinytext" | "text" | "mediumtext" | "longtext" => entry("TEXT", "TEXT", false),
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            entry("BYTEA", "BYTEA", false)
        }
        "bit" => entry("BIT VARYING", "BIT VARYING", false),
        "json" => entry("JSON", "JSON", false),
        "geometry" => entry("GEOMETRY", "GEOMETRY", false),
        "point" => entry("POINT", "POINT", false),
        "polygon" => entry("POLYGON", "POLYGON", false),
        "linestring" => entry("LINE", "LINE", false),
        _ => return None,
    })
}

/// Map a full MySQL column declaration to a PostgreSQL type string.
///
/// Returns `UnsupportedType` for base types with no dictionary entry, which
/// is fatal for the containing `CREATE TABLE`.
pub fn map(raw_type: &str) -> Result<MappedType> {
    let mut tokens = raw_type.split_whitespace();
    let base_decl = tokens
        .next()
        .ok_or_else(|| MigrateError::UnsupportedType {
            raw_type: raw_type.to_string(),
        })?
        .to_lowercase();
    let promote = tokens.any(|t| {
        let t = t.to_lowercase();
        t == "unsigned" || t == "zerofill"
    });

    let (base, suffix) = match base_decl.find('(') {
        Some(i) => (&base_decl[..i], &base_decl[i..]),
        None => (base_decl.as_str(), ""),
    };

    // MySQL's de-facto currency declaration gets a dedicated mapping.
    if base == "decimal" && suffix == "(19,2)" {
        let pg = if promote { "NUMERIC" } else { "MONEY" };
        return Ok(MappedType {
            pg_type: format!(" {} ", pg),
            has_length_suffix: false,
        });
    }

    let entry = lookup(base).ok_or_else(|| MigrateError::UnsupportedType {
        raw_type: raw_type.to_string(),
    })?;

    let chosen = if promote { entry.promoted } else { entry.pg };

    if !entry.keeps_length || suffix.is_empty() {
        return Ok(MappedType {
            pg_type: format!(" {} ", chosen),
            has_length_suffix: false,
        });
    }

    // PostgreSQL rejects zero-length character types.
    let suffix = if suffix == "(0)" { "(1)" } else { suffix };

    Ok(MappedType {
        pg_type: format!(" {}{} ", chosen, suffix),
        has_length_suffix: true,
    })
}
