//! Persistent log sinks.
//!
//! The engine writes four files under the logs directory: `all.log` (info
//! and up), `errors-only.log`, `report-only.log` (the summary table) and
//! `views.log` (view warnings). Failed view DDL is preserved under
//! `not_created_views/<name>.sql`. The logger is passed by value into
//! components; console output goes through `tracing` alongside the files.

use crate::error::Result;
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File-backed log sinks for one migration run.
pub struct Logger {
    all: Mutex<File>,
    errors: Mutex<File>,
    report: Mutex<File>,
    views: Mutex<File>,
    dir: PathBuf,
}

impl Logger {
    /// Create the logs directory and open fresh sink files.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            all: Mutex::new(File::create(dir.join("all.log"))?),
            errors: Mutex::new(File::create(dir.join("errors-only.log"))?),
            report: Mutex::new(File::create(dir.join("report-only.log"))?),
            views: Mutex::new(File::create(dir.join("views.log"))?),
            dir: dir.to_path_buf(),
        })
    }

    /// The logs directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn stamp(msg: &str) -> String {
        format!("[{}] {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"), msg)
    }

    fn append(file: &Mutex<File>, line: &str) {
        if let Ok(mut f) = file.lock() {
            let _ = f.write_all(line.as_bytes());
        }
    }

    /// Informational message: console and `all.log`.
    pub fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
        Self::append(&self.all, &Self::stamp(msg));
    }

    /// Error message: console, `all.log` and `errors-only.log`.
    pub fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
        let line = Self::stamp(msg);
        Self::append(&self.all, &line);
        Self::append(&self.errors, &line);
    }

    /// View warning: console and `views.log`.
    pub fn view_warning(&self, msg: &str) {
        tracing::warn!("{}", msg);
        Self::append(&self.views, &Self::stamp(msg));
    }

    /// Raw summary-report line: `report-only.log` only, no timestamp.
    pub fn report_line(&self, line: &str) {
        Self::append(&self.report, &format!("{}\n", line));
    }

    /// A rejected row: marker line naming the table, then the row verbatim.
    pub fn rejected_row(&self, table: &str, raw: &str) {
        tracing::warn!("rejected row in {}", table);
        let mut block = Self::stamp(&format!("rejected row in {}", table));
        block.push_str(raw);
        block.push('\n');
        Self::append(&self.all, &block);
        Self::append(&self.errors, &block);
    }

    /// Preserve the source DDL of a view that failed to install.
    pub fn dump_failed_view(&self, view_name: &str, ddl: &str) -> Result<PathBuf> {
        let dir = self.dir.join("not_created_views");
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.sql", view_name));
        fs::write(&path, ddl)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sinks_created_and_routed() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::create(tmp.path()).unwrap();

        logger.info("starting");
        logger.error("bad thing");
        logger.view_warning("view skipped");
        logger.report_line("TABLE  |  RECORDS");

        let all = fs::read_to_string(tmp.path().join("all.log")).unwrap();
        let errors = fs::read_to_string(tmp.path().join("errors-only.log")).unwrap();
        let report = fs::read_to_string(tmp.path().join("report-only.log")).unwrap();
        let views = fs::read_to_string(tmp.path().join("views.log")).unwrap();

        assert!(all.contains("starting"));
        assert!(all.contains("bad thing"));
        assert!(!all.contains("view skipped"));
        assert!(errors.contains("bad thing"));
        assert!(!errors.contains("starting"));
        assert_eq!(report, "TABLE  |  RECORDS\n");
        assert!(views.contains("view skipped"));
    }

    #[test]
    fn test_rejected_row_written_verbatim_after_marker() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::create(tmp.path()).unwrap();

        logger.rejected_row("db.t", "1\t\\N\tbad");

        let errors = fs::read_to_string(tmp.path().join("errors-only.log")).unwrap();
        let marker_at = errors.find("rejected row in db.t").unwrap();
        let row_at = errors.find("1\t\\N\tbad").unwrap();
        assert!(marker_at < row_at);
    }

    #[test]
    fn test_dump_failed_view() {
        let tmp = TempDir::new().unwrap();
        let logger = Logger::create(tmp.path()).unwrap();

        let path = logger
            .dump_failed_view("v_orders", "CREATE VIEW `v_orders` AS select 1")
            .unwrap();
        assert!(path.ends_with("not_created_views/v_orders.sql"));
        let saved = fs::read_to_string(path).unwrap();
        assert!(saved.contains("CREATE VIEW"));
    }
}
