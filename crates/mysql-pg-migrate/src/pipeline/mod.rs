//! Per-table data transfer.
//!
//! Each table is copied in size-bounded chunks: the SELECT projection is
//! shaped per column class (spatial as hex WKB, bit as a 0/1 string, zero
//! dates as `-INFINITY`, binary as hex), rows stream out of MySQL, are
//! re-encoded as COPY text and delivered in batches of `rows_per_chunk`
//! lines. A failed chunk is retried one row per COPY so a single bad row
//! never loses the chunk.

use std::time::Instant;

use futures::TryStreamExt;
use sqlx::mysql::MySqlRow;
use sqlx::{Row, ValueRef};
use tokio::sync::watch;

use crate::copy::{encode_row, CopyValue};
use crate::core::schema::SourceTable;
use crate::core::{qualify_mysql, quote_mysql_ident};
use crate::logging::Logger;
use crate::source::MysqlSource;
use crate::target::BulkSession;

/// How a column is projected in the SELECT and decoded off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnShape {
    /// Spatial value, shipped as hex WKB.
    Spatial,
    /// Binary value, shipped as hex.
    Binary,
    /// Bit field, shipped as a '0'/'1' string.
    Bit,
    /// Date/datetime/timestamp; zero dates become `-INFINITY`.
    Temporal,
    TinyInt { unsigned: bool },
    SmallInt { unsigned: bool },
    Int { unsigned: bool },
    BigInt { unsigned: bool },
    Float,
    Double,
    Decimal,
    /// Character data, validated against the target encoding.
    Text,
    /// Anything else is cast to CHAR on the server.
    CharCast,
}

impl ColumnShape {
    /// Classify a MySQL type declaration.
    pub fn classify(raw_type: &str) -> Self {
        let lower = raw_type.to_lowercase();
        let unsigned = lower.contains("unsigned") || lower.contains("zerofill");
        let base = {
            let decl = lower.split_whitespace().next().unwrap_or("");
            match decl.find('(') {
                Some(i) => &decl[..i],
                None => decl,
            }
        };

        match base {
            "geometry" | "point" | "linestring" | "polygon" => ColumnShape::Spatial,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnShape::Binary
            }
            "bit" => ColumnShape::Bit,
            "date" | "datetime" | "timestamp" => ColumnShape::Temporal,
            "tinyint" => ColumnShape::TinyInt { unsigned },
            "smallint" => ColumnShape::SmallInt { unsigned },
            "mediumint" | "int" | "integer" => ColumnShape::Int { unsigned },
            "bigint" => ColumnShape::BigInt { unsigned },
            "float" => ColumnShape::Float,
            "double" | "real" => ColumnShape::Double,
            "decimal" | "dec" | "numeric" => ColumnShape::Decimal,
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum"
            | "set" => ColumnShape::Text,
            _ => ColumnShape::CharCast,
        }
    }

    /// The SELECT projection for this column.
    pub fn projection(&self, field: &str) -> String {
        let q = quote_mysql_ident(field);
        match self {
            ColumnShape::Spatial => format!("HEX(ST_AsWKB({q})) AS {q}"),
            ColumnShape::Binary => format!("HEX({q}) AS {q}"),
            ColumnShape::Bit => format!("BIN({q}) AS {q}"),
            ColumnShape::Temporal => format!(
                "IF({q} IN ('0000-00-00','0000-00-00 00:00:00'), '-INFINITY', {q}) AS {q}"
            ),
            ColumnShape::CharCast => format!("CAST({q} AS CHAR) AS {q}"),
            _ => q,
        }
    }
}

/// Rows per COPY batch for a table of `size_mb` with `row_count` rows.
pub fn rows_per_chunk(size_mb: f64, chunk_target_mb: f64, row_count: i64) -> usize {
    let chunks = (size_mb / chunk_target_mb.max(1.0)).ceil().max(1.0);
    let rows = (row_count as f64 / chunks).ceil();
    (rows as usize).max(1)
}

/// Build the shaped SELECT for a table.
pub fn build_select(database: &str, table: &SourceTable, shapes: &[ColumnShape]) -> String {
    let projections = table
        .columns
        .iter()
        .zip(shapes.iter())
        .map(|(c, s)| s.projection(&c.field))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {}",
        projections,
        qualify_mysql(database, &table.name)
    )
}

/// Outcome of loading one table.
#[derive(Debug, Clone)]
pub struct TableLoadStats {
    /// Source row count at discovery time.
    pub rows_attempted: i64,

    /// Attempted minus actually copied.
    pub rows_failed: i64,

    /// Wall-clock load time.
    pub elapsed_seconds: f64,
}

/// Stream one table from the source into the destination.
pub async fn load_table(
    source: &MysqlSource,
    bulk: &BulkSession,
    schema: &str,
    table: &SourceTable,
    chunk_target_mb: f64,
    logger: &Logger,
    cancel: &watch::Receiver<bool>,
) -> TableLoadStats {
    let started = Instant::now();
    let rows_attempted = table.row_count;
    let per_chunk = rows_per_chunk(table.size_mb, chunk_target_mb, table.row_count);

    let shapes: Vec<ColumnShape> = table
        .columns
        .iter()
        .map(|c| ColumnShape::classify(&c.raw_type))
        .collect();
    let columns: Vec<String> = table.columns.iter().map(|c| c.field.clone()).collect();
    let select = build_select(source.database(), table, &shapes);
    let dest = format!("{}.{}", schema, table.name);

    let mut copied = 0i64;
    let mut lines: Vec<String> = Vec::with_capacity(per_chunk.min(65_536));

    {
        let mut stream = sqlx::query(&select).fetch(source.pool());
        loop {
            match stream.try_next().await {
                Ok(Some(row)) => {
                    match decode_row(&row, &shapes) {
                        Ok(values) => lines.push(encode_row(&values)),
                        Err(raw) => logger.rejected_row(&dest, &raw),
                    }
                    if lines.len() >= per_chunk {
                        flush_chunk(bulk, schema, table, &columns, &mut lines, logger, &mut copied)
                            .await;
                        if *cancel.borrow() {
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    logger.error(&format!("source read failed for {}: {}", dest, e));
                    break;
                }
            }
        }
    }

    flush_chunk(bulk, schema, table, &columns, &mut lines, logger, &mut copied).await;

    let elapsed_seconds = started.elapsed().as_secs_f64();
    logger.info(&format!(
        "{}: copied {} of {} rows in {:.2}s",
        dest, copied, rows_attempted, elapsed_seconds
    ));

    TableLoadStats {
        rows_attempted,
        rows_failed: (rows_attempted - copied).max(0),
        elapsed_seconds,
    }
}

/// COPY the buffered lines; on failure, re-issue one row per COPY so only
/// the offending rows are lost.
async fn flush_chunk(
    bulk: &BulkSession,
    schema: &str,
    table: &SourceTable,
    columns: &[String],
    lines: &mut Vec<String>,
    logger: &Logger,
    copied: &mut i64,
) {
    if lines.is_empty() {
        return;
    }
    let dest = format!("{}.{}", schema, table.name);
    let data = lines.concat();

    match bulk.copy(schema, &table.name, columns, data).await {
        Ok(n) => *copied += n as i64,
        Err(e) => {
            logger.error(&format!(
                "chunk COPY into {} failed: {}; retrying row by row",
                dest, e
            ));
            for line in lines.iter() {
                match bulk.copy(schema, &table.name, columns, line.clone()).await {
                    Ok(n) => *copied += n as i64,
                    Err(_) => logger.rejected_row(&dest, line.trim_end()),
                }
            }
        }
    }
    lines.clear();
}

/// Decode one source row into COPY values. `Err` carries a lossy rendering
/// of the raw row for the rejected-row log.
fn decode_row(
    row: &MySqlRow,
    shapes: &[ColumnShape],
) -> std::result::Result<Vec<CopyValue>, String> {
    let mut values = Vec::with_capacity(shapes.len());

    for (i, shape) in shapes.iter().enumerate() {
        let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
        if is_null {
            values.push(CopyValue::Null);
            continue;
        }

        let value = match shape {
            ColumnShape::Spatial | ColumnShape::Binary => row
                .try_get::<String, _>(i)
                .map(CopyValue::Hex)
                .map_err(|_| raw_row_lossy(row))?,
            ColumnShape::Bit | ColumnShape::Temporal | ColumnShape::CharCast => row
                .try_get::<String, _>(i)
                .map(CopyValue::Text)
                .map_err(|_| raw_row_lossy(row))?,
            ColumnShape::Text => {
                let bytes = row
                    .try_get::<Vec<u8>, _>(i)
                    .map_err(|_| raw_row_lossy(row))?;
                match String::from_utf8(bytes) {
                    Ok(s) => CopyValue::Text(s),
                    Err(_) => return Err(raw_row_lossy(row)),
                }
            }
            ColumnShape::TinyInt { unsigned: false } => scalar_value(row.try_get::<i8, _>(i), row)?,
            ColumnShape::TinyInt { unsigned: true } => scalar_value(row.try_get::<u8, _>(i), row)?,
            ColumnShape::SmallInt { unsigned: false } => scalar_value(row.try_get::<i16, _>(i), row)?,
            ColumnShape::SmallInt { unsigned: true } => scalar_value(row.try_get::<u16, _>(i), row)?,
            ColumnShape::Int { unsigned: false } => scalar_value(row.try_get::<i32, _>(i), row)?,
            ColumnShape::Int { unsigned: true } => scalar_value(row.try_get::<u32, _>(i), row)?,
            ColumnShape::BigInt { unsigned: false } => scalar_value(row.try_get::<i64, _>(i), row)?,
            ColumnShape::BigInt { unsigned: true } => scalar_value(row.try_get::<u64, _>(i), row)?,
            ColumnShape::Float => scalar_value(row.try_get::<f32, _>(i), row)?,
            ColumnShape::Double => scalar_value(row.try_get::<f64, _>(i), row)?,
            ColumnShape::Decimal => {
                scalar_value(row.try_get::<rust_decimal::Decimal, _>(i), row)?
            }
        };
        values.push(value);
    }

    Ok(values)
}

fn scalar_value<T: ToString>(
    decoded: std::result::Result<T, sqlx::Error>,
    row: &MySqlRow,
) -> std::result::Result<CopyValue, String> {
    decoded
        .map(|v| CopyValue::Text(v.to_string()))
        .map_err(|_| raw_row_lossy(row))
}

/// Best-effort textual rendering of a row for the rejected-row log.
fn raw_row_lossy(row: &MySqlRow) -> String {
    let mut fields = Vec::with_capacity(row.len());
    for i in 0..row.len() {
        let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
        if is_null {
            fields.push("NULL".to_string());
        } else if let Ok(bytes) = row.try_get::<Vec<u8>, _>(i) {
            fields.push(String::from_utf8_lossy(&bytes).into_owned());
        } else if let Ok(s) = row.try_get::<String, _>(i) {
            fields.push(s);
        } else {
            fields.push("?".to_string());
        }
    }
    fields.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, TableKind};

    #[test]
    fn test_classify_shapes() {
        assert_eq!(ColumnShape::classify("geometry"), ColumnShape::Spatial);
        assert_eq!(ColumnShape::classify("point"), ColumnShape::Spatial);
        assert_eq!(ColumnShape::classify("varbinary(16)"), ColumnShape::Binary);
        assert_eq!(ColumnShape::classify("longblob"), ColumnShape::Binary);
        assert_eq!(ColumnShape::classify("bit(1)"), ColumnShape::Bit);
        assert_eq!(ColumnShape::classify("datetime"), ColumnShape::Temporal);
        assert_eq!(ColumnShape::classify("date"), ColumnShape::Temporal);
        assert_eq!(
            ColumnShape::classify("tinyint(3) unsigned"),
            ColumnShape::TinyInt { unsigned: true }
        );
        assert_eq!(
            ColumnShape::classify("int(11)"),
            ColumnShape::Int { unsigned: false }
        );
        assert_eq!(ColumnShape::classify("decimal(10,2)"), ColumnShape::Decimal);
        assert_eq!(ColumnShape::classify("varchar(255)"), ColumnShape::Text);
        assert_eq!(ColumnShape::classify("enum('a','b')"), ColumnShape::Text);
        assert_eq!(ColumnShape::classify("time"), ColumnShape::CharCast);
        assert_eq!(ColumnShape::classify("json"), ColumnShape::CharCast);
    }

    #[test]
    fn test_projections() {
        assert_eq!(
            ColumnShape::Spatial.projection("loc"),
            "HEX(ST_AsWKB(`loc`)) AS `loc`"
        );
        assert_eq!(ColumnShape::Binary.projection("img"), "HEX(`img`) AS `img`");
        assert_eq!(ColumnShape::Bit.projection("flags"), "BIN(`flags`) AS `flags`");
        assert_eq!(
            ColumnShape::Temporal.projection("d"),
            "IF(`d` IN ('0000-00-00','0000-00-00 00:00:00'), '-INFINITY', `d`) AS `d`"
        );
        assert_eq!(ColumnShape::CharCast.projection("t"), "CAST(`t` AS CHAR) AS `t`");
        assert_eq!(
            ColumnShape::Int { unsigned: false }.projection("n"),
            "`n`"
        );
    }

    #[test]
    fn test_rows_per_chunk_bound() {
        // 100 MB at a 10 MB target over 50 rows: batches of at most 5.
        assert_eq!(rows_per_chunk(100.0, 10.0, 50), 5);
        // One-chunk table takes everything at once.
        assert_eq!(rows_per_chunk(1.0, 10.0, 1000), 1000);
        // Rounding goes up, never to zero.
        assert_eq!(rows_per_chunk(25.0, 10.0, 10), 4);
        assert_eq!(rows_per_chunk(5.0, 10.0, 0), 1);
        // The chunk target is floored at 1 MB.
        assert_eq!(rows_per_chunk(10.0, 0.1, 100), 10);
    }

    #[test]
    fn test_build_select_shapes_projections() {
        let table = SourceTable {
            name: "t".into(),
            kind: TableKind::BaseTable,
            columns: vec![
                Column {
                    field: "id".into(),
                    raw_type: "int(11)".into(),
                    nullable: false,
                    default: None,
                    extra: String::new(),
                    comment: None,
                },
                Column {
                    field: "d".into(),
                    raw_type: "datetime".into(),
                    nullable: true,
                    default: None,
                    extra: String::new(),
                    comment: None,
                },
                Column {
                    field: "img".into(),
                    raw_type: "blob".into(),
                    nullable: true,
                    default: None,
                    extra: String::new(),
                    comment: None,
                },
            ],
            indexes: vec![],
            foreign_keys: vec![],
            comment: None,
            row_count: 3,
            size_mb: 1.0,
            create_view: None,
        };
        let shapes: Vec<ColumnShape> = table
            .columns
            .iter()
            .map(|c| ColumnShape::classify(&c.raw_type))
            .collect();
        let select = build_select("src", &table, &shapes);
        assert!(select.starts_with("SELECT `id`, IF(`d` IN"));
        assert!(select.contains("HEX(`img`) AS `img`"));
        assert!(select.ends_with("FROM `src`.`t`"));
    }
}
