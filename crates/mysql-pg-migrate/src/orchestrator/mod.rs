//! Migration orchestrator - main workflow coordinator.
//!
//! Phases run in a fixed order: validate, create/choose the destination
//! schema, discover the source structure, per-table work (CREATE TABLE,
//! data load, deferred DDL), foreign keys, views, summary. Per-table work
//! fans out to a configurable number of workers; each worker owns a table
//! through its whole create-copy-constrain pipeline, and foreign keys are
//! a global barrier behind all of them. Fatal failures (schema, discovery,
//! CREATE TABLE) abort the run and leave partial state in place.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::Config;
use crate::core::schema::{MigrationPlan, SourceTable, SummaryRow, TableKind};
use crate::ddl::DdlEmitter;
use crate::error::{MigrateError, Result};
use crate::logging::Logger;
use crate::pipeline;
use crate::report;
use crate::source::MysqlSource;
use crate::target::PgTarget;
use crate::views::rewrite_view;

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    logger: Arc<Logger>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// "completed" or "cancelled".
    pub status: String,

    /// Destination schema the data landed in.
    pub target_schema: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration finished.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables migrated.
    pub tables_total: usize,

    /// Views discovered.
    pub views_total: usize,

    /// Views successfully installed.
    pub views_created: usize,

    /// Total rows copied.
    pub rows_transferred: i64,

    /// Total rows lost to encoding or COPY failures.
    pub rows_failed: i64,

    /// Per-table summary rows.
    pub summary: Vec<SummaryRow>,
}

impl MigrationResult {
    /// Convert to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pick the first free schema name: the base if untaken, otherwise
/// `base_1`, `base_2`, ... in order.
pub fn derive_schema_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

impl Orchestrator {
    /// Create a new orchestrator: sets up the working directory and the
    /// log sinks.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        if let Some(dir) = &config.temp_dir_path {
            std::fs::create_dir_all(dir)?;
        }
        let logger = Arc::new(Logger::create(&config.logs_dir())?);
        Ok(Self { config, logger })
    }

    /// Run the migration.
    pub async fn run(self, cancel: Option<watch::Receiver<bool>>) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let cancel = cancel.unwrap_or_else(|| watch::channel(false).1);

        let workers = self.config.worker_count();
        let source = MysqlSource::connect(&self.config.source, workers + 1).await?;
        // One pooled DDL connection per worker plus headroom for the
        // sequential phases; bulk COPY connections are separate.
        let target = Arc::new(PgTarget::connect(&self.config.target, workers + 2).await?);

        let schema = self.choose_schema(&target, source.database()).await?;
        self.logger
            .info(&format!("destination schema: {}", schema));

        let discovered = source.discover().await?;
        let (tables, views): (Vec<_>, Vec<_>) = discovered
            .into_iter()
            .partition(|t| t.kind == TableKind::BaseTable);
        let plan = MigrationPlan {
            target_schema: schema.clone(),
            tables,
            views,
            chunk_target_mb: self.config.chunk_target_mb(),
        };
        self.logger.info(&format!(
            "discovered {} tables and {} views in '{}'",
            plan.tables.len(),
            plan.views.len(),
            source.database()
        ));

        let summaries = self.run_table_phase(&source, &target, &plan, &cancel).await?;

        let cancelled = *cancel.borrow();

        if !self.config.data_only && !cancelled {
            self.install_foreign_keys(&target, &plan).await;
        }

        let mut views_created = 0;
        if !self.config.data_only && !cancelled {
            views_created = self
                .install_views(&source, &target, &plan)
                .await;
        }

        let rendered = report::render_summary(&summaries);
        for line in rendered.lines() {
            self.logger.report_line(line);
        }
        self.logger.info("migration summary:");
        self.logger.info(&format!("\n{}", rendered));

        // The working directory is only removed on a clean exit.
        if !cancelled {
            if let Some(dir) = &self.config.temp_dir_path {
                let _ = std::fs::remove_dir_all(dir);
            }
        }

        let completed_at = Utc::now();
        let rows_transferred = summaries
            .iter()
            .map(|s| s.rows_attempted - s.rows_failed)
            .sum();
        let rows_failed = summaries.iter().map(|s| s.rows_failed).sum();

        Ok(MigrationResult {
            run_id,
            status: if cancelled { "cancelled" } else { "completed" }.to_string(),
            target_schema: schema,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            tables_total: plan.tables.len(),
            views_total: plan.views.len(),
            views_created,
            rows_transferred,
            rows_failed,
            summary: summaries,
        })
    }

    /// Reuse the operator-supplied schema or derive a fresh unique name
    /// from the source database name, then make sure it exists.
    async fn choose_schema(&self, target: &PgTarget, source_db: &str) -> Result<String> {
        match &self.config.schema {
            Some(name) => {
                if !target.schema_exists(name).await? {
                    target.create_schema(name).await?;
                }
                Ok(name.clone())
            }
            None => {
                let taken: HashSet<String> = target.schema_names().await?.into_iter().collect();
                let name = derive_schema_name(source_db, &taken);
                target.create_schema(&name).await?;
                Ok(name)
            }
        }
    }

    /// Phase 4/5: per-table create, copy and deferred DDL across workers.
    async fn run_table_phase(
        &self,
        source: &MysqlSource,
        target: &Arc<PgTarget>,
        plan: &MigrationPlan,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Vec<SummaryRow>> {
        let queue: Arc<Mutex<VecDeque<SourceTable>>> =
            Arc::new(Mutex::new(plan.tables.iter().cloned().collect()));
        let summaries: Arc<Mutex<Vec<SummaryRow>>> = Arc::new(Mutex::new(Vec::new()));
        let fatal = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..self.config.worker_count() {
            let queue = Arc::clone(&queue);
            let summaries = Arc::clone(&summaries);
            let fatal = Arc::clone(&fatal);
            let source = source.clone();
            let target = Arc::clone(target);
            let logger = Arc::clone(&self.logger);
            let schema = plan.target_schema.clone();
            let chunk_target_mb = plan.chunk_target_mb;
            let data_only = self.config.data_only;
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let bulk = target.bulk_session().await?;
                loop {
                    if fatal.load(Ordering::Relaxed) || *cancel.borrow() {
                        break;
                    }
                    let table = queue.lock().unwrap().pop_front();
                    let Some(table) = table else { break };

                    let emitter = DdlEmitter {
                        target: &target,
                        schema: &schema,
                        logger: &logger,
                    };

                    if let Err(e) = emitter.create_table(&table).await {
                        fatal.store(true, Ordering::Relaxed);
                        return Err(e);
                    }
                    emitter.table_comment(&table).await;

                    let stats = pipeline::load_table(
                        &source,
                        &bulk,
                        &schema,
                        &table,
                        chunk_target_mb,
                        &logger,
                        &cancel,
                    )
                    .await;

                    if !data_only {
                        emitter.deferred_ddl(&table).await;
                    }

                    summaries.lock().unwrap().push(SummaryRow {
                        qualified_name: format!("{}.{}", schema, table.name),
                        rows_attempted: stats.rows_attempted,
                        rows_failed: stats.rows_failed,
                        elapsed_seconds: stats.elapsed_seconds,
                    });
                }
                Ok::<(), MigrateError>(())
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| MigrateError::pool(e.to_string(), "joining table worker"))??;
        }

        let summaries = Arc::try_unwrap(summaries)
            .map(|m| m.into_inner().unwrap_or_default())
            .unwrap_or_default();
        Ok(summaries)
    }

    /// Phase 6: foreign keys, only after every table is created and
    /// populated.
    async fn install_foreign_keys(&self, target: &PgTarget, plan: &MigrationPlan) {
        let emitter = DdlEmitter {
            target,
            schema: &plan.target_schema,
            logger: &self.logger,
        };
        for table in &plan.tables {
            let failures = emitter.foreign_keys(table).await;
            if failures == 0 && !table.foreign_keys.is_empty() {
                self.logger.info(&format!(
                    "installed {} foreign keys on {}.{}",
                    table.foreign_keys.len(),
                    plan.target_schema,
                    table.name
                ));
            }
        }
    }

    /// Phase 7: rewrite and install views; failures are dumped, never
    /// fatal.
    async fn install_views(
        &self,
        source: &MysqlSource,
        target: &PgTarget,
        plan: &MigrationPlan,
    ) -> usize {
        let relation_names: Vec<String> = plan
            .tables
            .iter()
            .chain(plan.views.iter())
            .map(|t| t.name.clone())
            .collect();

        let mut created = 0;
        for view in &plan.views {
            let Some(raw) = &view.create_view else {
                self.logger
                    .view_warning(&format!("no CREATE VIEW text for '{}'", view.name));
                continue;
            };
            let sql = rewrite_view(
                raw,
                &plan.target_schema,
                &view.name,
                source.database(),
                &relation_names,
            );
            match target.execute(&sql).await {
                Ok(_) => {
                    created += 1;
                    self.logger.info(&format!(
                        "created view {}.{}",
                        plan.target_schema, view.name
                    ));
                }
                Err(e) => {
                    let err = MigrateError::View {
                        view: view.name.clone(),
                        message: e.to_string(),
                    };
                    self.logger.view_warning(&err.to_string());
                    if let Err(io) = self.logger.dump_failed_view(&view.name, raw) {
                        self.logger
                            .error(&format!("could not save failed view DDL: {}", io));
                    }
                }
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schema_name_untaken_base() {
        assert_eq!(derive_schema_name("db", &taken(&[])), "db");
    }

    #[test]
    fn test_schema_name_first_free_slot() {
        // db, db_1 and db_3 exist: the first free slot is db_2, not db_4.
        assert_eq!(
            derive_schema_name("db", &taken(&["db", "db_1", "db_3"])),
            "db_2"
        );
    }

    #[test]
    fn test_schema_name_sequential_probing() {
        assert_eq!(derive_schema_name("db", &taken(&["db"])), "db_1");
        assert_eq!(derive_schema_name("db", &taken(&["db", "db_1"])), "db_2");
    }
}
