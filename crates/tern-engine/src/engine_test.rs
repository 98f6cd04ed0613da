use super::*;
use async_trait::async_trait;
use std::path::Path;
use tempfile::TempDir;
use tern_core::{AppliedRecord, MigrationSource};
use tern_db::{DuckDbBackend, SqlValue};
use tern_store::{StoreError, StoreResult, TableStore};

struct Fixture {
    dir: TempDir,
    db: Arc<dyn Database>,
    store: Arc<TableStore>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db: Arc<dyn Database> = Arc::new(DuckDbBackend::in_memory().unwrap());
        let store = Arc::new(TableStore::new(Arc::clone(&db), "tern_migrations").unwrap());
        Self { dir, db, store }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Inline unit creating and dropping `table`.
    fn reversible(&self, relative: &str, table: &str) {
        self.write(
            relative,
            &format!("-- up\nCREATE TABLE {table} (id INT);\n-- down\nDROP TABLE {table};\n"),
        );
    }

    fn engine(&self) -> Engine {
        let store: Arc<dyn MigrationStore> = self.store.clone();
        self.engine_with_store(store)
    }

    fn engine_with_store(&self, store: Arc<dyn MigrationStore>) -> Engine {
        let loader = Loader::new(MigrationSource::new(self.root()));
        Engine::new(loader, store, Arc::clone(&self.db))
    }

    async fn applied_ids(&self, scope: Option<&str>) -> Vec<u64> {
        let scope = scope.map(|s| Scope::parse(s).unwrap());
        self.store
            .list_applied(scope.as_ref())
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.value())
            .collect()
    }

    async fn table_exists(&self, table: &str) -> bool {
        let mut tx = self.db.begin().await.unwrap();
        let rows = tx
            .query(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                &[SqlValue::from(table)],
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        rows[0][0].as_i64() == Some(1)
    }
}

fn ids(values: &[UnitId]) -> Vec<u64> {
    values.iter().map(|id| id.value()).collect()
}

/// Store whose writes fail for one identifier.
struct FlakyStore {
    inner: Arc<TableStore>,
    fail_on: UnitId,
}

#[async_trait]
impl MigrationStore for FlakyStore {
    async fn initialize(&self) -> StoreResult<()> {
        self.inner.initialize().await
    }

    async fn list_applied(&self, scope: Option<&Scope>) -> StoreResult<Vec<AppliedRecord>> {
        self.inner.list_applied(scope).await
    }

    async fn record_applied(&self, unit: &MigrationUnit) -> StoreResult<AppliedRecord> {
        if unit.id == self.fail_on {
            return Err(StoreError::WriteError("disk full".to_string()));
        }
        self.inner.record_applied(unit).await
    }

    async fn record_reverted(&self, unit: &MigrationUnit) -> StoreResult<()> {
        if unit.id == self.fail_on {
            return Err(StoreError::WriteError("disk full".to_string()));
        }
        self.inner.record_reverted(unit).await
    }
}

#[tokio::test]
async fn test_up_applies_only_unapplied_units_in_order() {
    let fx = Fixture::new();
    fx.reversible("1_first.sql", "first");
    fx.reversible("2_second.sql", "second");
    fx.reversible("3_third.sql", "third");

    let mut engine = fx.engine();
    let result = engine.run(Direction::Up, Some(Limit::Count(1)), None).await;
    assert!(result.is_success());
    assert_eq!(ids(&result.completed), vec![1]);

    let result = engine.run(Direction::Up, None, None).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.direction, Direction::Up);
    assert_eq!(ids(&result.completed), vec![2, 3]);
    assert_eq!(fx.applied_ids(None).await, vec![1, 2, 3]);
    assert!(fx.table_exists("third").await);
    assert_eq!(engine.state(), EngineState::Settled);
}

#[tokio::test]
async fn test_second_up_is_a_no_op() {
    let fx = Fixture::new();
    fx.reversible("1_first.sql", "first");
    fx.reversible("2_second.sql", "second");

    let mut engine = fx.engine();
    assert_eq!(engine.run(Direction::Up, None, None).await.completed.len(), 2);

    let again = engine.run(Direction::Up, None, None).await;
    assert!(again.is_success());
    assert!(again.completed.is_empty());
    assert_eq!(again.exit_code(), 0);
    assert_eq!(fx.applied_ids(None).await, vec![1, 2]);
}

#[tokio::test]
async fn test_up_then_down_round_trips_store() {
    let fx = Fixture::new();
    fx.reversible("1_base.sql", "base");
    fx.reversible("2_extra.sql", "extra");

    let mut engine = fx.engine();
    engine
        .run(Direction::Up, Some(Limit::Count(1)), None)
        .await;
    let before = fx.applied_ids(None).await;

    let up = engine.run(Direction::Up, None, None).await;
    assert_eq!(ids(&up.completed), vec![2]);
    let down = engine.run(Direction::Down, None, None).await;
    assert!(down.is_success());
    assert_eq!(down.direction, Direction::Down);
    assert_eq!(ids(&down.completed), vec![2]);

    assert_eq!(fx.applied_ids(None).await, before);
    assert!(!fx.table_exists("extra").await);
    assert!(fx.table_exists("base").await);
}

#[tokio::test]
async fn test_failure_stops_batch_at_failing_unit() {
    let fx = Fixture::new();
    fx.reversible("1_ok.sql", "ok");
    fx.write("2_broken.sql", "-- up\nCREATE TABLE half (id INT);\nSELEC nonsense;\n");
    fx.reversible("3_later.sql", "later");

    let mut engine = fx.engine();
    let result = engine.run(Direction::Up, None, None).await;

    assert!(!result.is_success());
    assert_eq!(result.exit_code(), 1);
    assert_eq!(ids(&result.completed), vec![1]);
    let err = result.error.unwrap();
    assert!(matches!(err, EngineError::Procedure { .. }));
    assert_eq!(err.failed_unit(), Some(UnitId::new(2)));
    assert!(err.to_string().contains("2_broken"));

    assert_eq!(fx.applied_ids(None).await, vec![1]);
    assert!(!fx.table_exists("half").await);
    assert!(!fx.table_exists("later").await);
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn test_rerun_resumes_at_fixed_unit() {
    let fx = Fixture::new();
    fx.reversible("1_ok.sql", "ok");
    fx.write("2_broken.sql", "-- up\nSELEC nonsense;\n");
    fx.reversible("3_later.sql", "later");

    let first = fx.engine().run(Direction::Up, None, None).await;
    assert_eq!(ids(&first.completed), vec![1]);

    fx.reversible("2_broken.sql", "fixed");
    let second = fx.engine().run(Direction::Up, None, None).await;
    assert!(second.is_success());
    assert_eq!(ids(&second.completed), vec![2, 3]);
}

#[tokio::test]
async fn test_failed_engine_is_halted() {
    let fx = Fixture::new();
    fx.write("1_broken.sql", "SELEC nonsense;");

    let mut engine = fx.engine();
    assert!(!engine.run(Direction::Up, None, None).await.is_success());

    let result = engine.run(Direction::Up, None, None).await;
    assert!(matches!(result.error, Some(EngineError::Halted)));
    assert!(result.completed.is_empty());
}

#[tokio::test]
async fn test_down_on_irreversible_unit_leaves_store_unchanged() {
    let fx = Fixture::new();
    fx.reversible("1_reversible.sql", "reversible");
    fx.write("2_one_way.sql", "CREATE TABLE one_way (id INT);");

    let mut engine = fx.engine();
    assert!(engine.run(Direction::Up, None, None).await.is_success());

    let result = engine
        .run(Direction::Down, Some(Limit::Count(1)), None)
        .await;
    let err = result.error.unwrap();
    assert!(matches!(err, EngineError::Irreversible { .. }));
    assert_eq!(err.failed_unit(), Some(UnitId::new(2)));
    assert!(result.completed.is_empty());
    assert_eq!(fx.applied_ids(None).await, vec![1, 2]);
    assert!(fx.table_exists("one_way").await);
}

#[tokio::test]
async fn test_irreversible_unit_deeper_in_plan_blocks_whole_batch() {
    let fx = Fixture::new();
    fx.write("1_one_way.sql", "CREATE TABLE one_way (id INT);");
    fx.reversible("2_reversible.sql", "reversible");

    let mut engine = fx.engine();
    engine.run(Direction::Up, None, None).await;

    let result = engine.run(Direction::Down, Some(Limit::All), None).await;
    assert!(matches!(result.error, Some(EngineError::Irreversible { .. })));
    assert!(result.completed.is_empty());
    assert!(fx.table_exists("reversible").await);
}

#[tokio::test]
async fn test_scopes_share_global_order() {
    let fx = Fixture::new();
    fx.reversible("1_root_a.sql", "root_a");
    fx.reversible("test/2_scoped.sql", "scoped");
    fx.reversible("3_root_b.sql", "root_b");

    let result = fx.engine().run(Direction::Up, None, None).await;
    assert_eq!(ids(&result.completed), vec![1, 2, 3]);

    assert_eq!(fx.applied_ids(Some("test")).await, vec![2]);
    assert_eq!(fx.applied_ids(None).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_older_unit_in_another_scope_is_not_applied() {
    let fx = Fixture::new();
    fx.reversible("10_root.sql", "root_t");
    let mut engine = fx.engine();
    assert_eq!(ids(&engine.run(Direction::Up, None, None).await.completed), vec![10]);

    fx.reversible("test/5_scoped.sql", "scoped");
    let result = engine.run(Direction::Up, None, None).await;
    assert!(result.is_success());
    assert!(result.completed.is_empty());
    assert!(!fx.table_exists("scoped").await);

    let status = engine.status(None).await.unwrap();
    assert_eq!(status[0].id, UnitId::new(5));
    assert_eq!(status[0].status, UnitStatus::OutOfOrder);
}

#[tokio::test]
async fn test_scoped_up_respects_mark_of_whole_subtree() {
    let fx = Fixture::new();
    fx.reversible("a/5_outer.sql", "outer_t");
    fx.reversible("a/b/10_inner.sql", "inner_t");

    let inner = Scope::parse("a/b").unwrap();
    let mut engine = fx.engine();
    let result = engine.run(Direction::Up, None, Some(&inner)).await;
    assert_eq!(ids(&result.completed), vec![10]);

    let outer = Scope::parse("a").unwrap();
    let result = engine.run(Direction::Up, None, Some(&outer)).await;
    assert!(result.is_success());
    assert!(result.completed.is_empty());
    assert_eq!(fx.applied_ids(Some("a")).await, vec![10]);
}

#[tokio::test]
async fn test_scope_filter_limits_batch() {
    let fx = Fixture::new();
    fx.reversible("1_root.sql", "root_t");
    fx.reversible("test/2_scoped.sql", "scoped");
    fx.reversible("test/nested/3_deep.sql", "deep");
    fx.reversible("other/4_other.sql", "other_t");

    let scope = Scope::parse("test").unwrap();
    let mut engine = fx.engine();
    let result = engine.run(Direction::Up, None, Some(&scope)).await;
    assert_eq!(ids(&result.completed), vec![2, 3]);
    assert!(!fx.table_exists("root_t").await);

    let result = engine
        .run(Direction::Down, Some(Limit::All), Some(&scope))
        .await;
    assert_eq!(ids(&result.completed), vec![3, 2]);
    assert!(fx.applied_ids(None).await.is_empty());
}

#[tokio::test]
async fn test_down_defaults_to_one_unit() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("2_b.sql", "b");

    let mut engine = fx.engine();
    engine.run(Direction::Up, None, None).await;
    let result = engine.run(Direction::Down, None, None).await;
    assert_eq!(ids(&result.completed), vec![2]);
    assert_eq!(fx.applied_ids(None).await, vec![1]);
}

#[tokio::test]
async fn test_through_limits() {
    let fx = Fixture::new();
    fx.reversible("10_a.sql", "a");
    fx.reversible("20_b.sql", "b");
    fx.reversible("30_c.sql", "c");

    let mut engine = fx.engine();
    let up = engine
        .run(Direction::Up, Some(Limit::Through(UnitId::new(20))), None)
        .await;
    assert_eq!(ids(&up.completed), vec![10, 20]);

    engine.run(Direction::Up, None, None).await;
    let down = engine
        .run(Direction::Down, Some(Limit::Through(UnitId::new(20))), None)
        .await;
    assert_eq!(ids(&down.completed), vec![30, 20]);
    assert_eq!(fx.applied_ids(None).await, vec![10]);
}

#[tokio::test]
async fn test_pair_scripts_run_like_inline_units() {
    let fx = Fixture::new();
    fx.write("5_pair.up.sql", "CREATE TABLE paired (id INT);");
    fx.write("5_pair.down.sql", "DROP TABLE paired;");

    let mut engine = fx.engine();
    engine.run(Direction::Up, None, None).await;
    assert!(fx.table_exists("paired").await);
    let down = engine.run(Direction::Down, None, None).await;
    assert!(down.is_success());
    assert!(!fx.table_exists("paired").await);
}

#[tokio::test]
async fn test_empty_procedure_is_recorded() {
    let fx = Fixture::new();
    fx.write("1_placeholder.sql", "-- up\n-- nothing yet\n-- down\n");

    let result = fx.engine().run(Direction::Up, None, None).await;
    assert!(result.is_success());
    assert_eq!(fx.applied_ids(None).await, vec![1]);
}

#[tokio::test]
async fn test_duplicate_ids_fail_before_mutation() {
    let fx = Fixture::new();
    fx.reversible("1_first.sql", "first");
    fx.reversible("a/2_left.sql", "left_t");
    fx.reversible("b/2_right.sql", "right_t");

    let mut engine = fx.engine();
    let result = engine.run(Direction::Up, None, None).await;
    assert!(matches!(result.error, Some(EngineError::Consistency { .. })));
    assert!(result.completed.is_empty());
    assert!(!fx.table_exists("first").await);
    assert!(fx.applied_ids(None).await.is_empty());
    assert_eq!(engine.state(), EngineState::Failed);
}

#[tokio::test]
async fn test_duplicate_ids_in_one_scope_are_consistency_error() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("1_b.sql", "b");

    let result = fx.engine().run(Direction::Up, None, None).await;
    let err = result.error.unwrap();
    assert!(matches!(err, EngineError::Consistency { .. }), "{err:?}");
    assert!(err.to_string().contains("[R002]"));
    assert!(!fx.table_exists("a").await);
    assert!(fx.applied_ids(None).await.is_empty());
}

#[tokio::test]
async fn test_discovery_error_fails_run() {
    let fx = Fixture::new();
    fx.write("notanumber_oops.sql", "SELECT 1;");

    let result = fx.engine().run(Direction::Up, None, None).await;
    assert!(matches!(result.error, Some(EngineError::Discovery(_))));
}

#[tokio::test]
async fn test_oversized_identifier_fails_before_any_change() {
    let fx = Fixture::new();
    fx.reversible("1_small.sql", "small");
    fx.reversible("10000000000000000000_huge.sql", "huge");

    let result = fx.engine().run(Direction::Up, None, None).await;
    assert!(matches!(
        result.error,
        Some(EngineError::Discovery(DiscoveryError::BadIdentifier { .. }))
    ));
    assert!(result.completed.is_empty());
    assert!(!fx.table_exists("small").await);
    assert!(!fx.table_exists("huge").await);
}

#[tokio::test]
async fn test_down_with_missing_unit_is_consistency_error() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("2_b.sql", "b");
    fx.engine().run(Direction::Up, None, None).await;

    std::fs::remove_file(fx.root().join("2_b.sql")).unwrap();
    let result = fx.engine().run(Direction::Down, None, None).await;
    assert!(matches!(result.error, Some(EngineError::Consistency { .. })));
    assert_eq!(fx.applied_ids(None).await, vec![1, 2]);
}

#[tokio::test]
async fn test_store_write_failure_is_store_inconsistency() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("2_b.sql", "b");
    fx.reversible("3_c.sql", "c");

    let flaky = Arc::new(FlakyStore {
        inner: Arc::clone(&fx.store),
        fail_on: UnitId::new(2),
    });
    let result = fx.engine_with_store(flaky).run(Direction::Up, None, None).await;

    assert_eq!(ids(&result.completed), vec![1]);
    let err = result.error.unwrap();
    assert!(matches!(err, EngineError::StoreInconsistency { .. }));
    assert_eq!(err.failed_unit(), Some(UnitId::new(2)));
    // The change itself committed
    assert!(fx.table_exists("b").await);
    assert!(!fx.table_exists("c").await);
    assert_eq!(fx.applied_ids(None).await, vec![1]);
}

#[tokio::test]
async fn test_status_reports_each_unit() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("2_b.sql", "b");
    fx.write("3_c.sql", "CREATE TABLE c (id INT);");
    fx.reversible("4_d.sql", "d");

    let mut engine = fx.engine();
    engine.run(Direction::Up, Some(Limit::Count(1)), None).await;
    // Apply 3 out of band so that 2 falls below the high-water mark
    let unit3 = Loader::new(MigrationSource::new(fx.root()))
        .discover(None)
        .unwrap()
        .collect_units()
        .unwrap()
        .remove(2);
    fx.store.record_applied(&unit3).await.unwrap();

    let status = engine.status(None).await.unwrap();
    let states: Vec<(u64, &UnitStatus)> =
        status.iter().map(|e| (e.id.value(), &e.status)).collect();
    assert!(matches!(states[0], (1, UnitStatus::Applied { .. })));
    assert!(matches!(states[1], (2, UnitStatus::OutOfOrder)));
    assert!(matches!(states[2], (3, UnitStatus::Applied { .. })));
    assert!(matches!(states[3], (4, UnitStatus::Pending)));
    assert!(!status[2].reversible);

    // Out-of-order units are never applied
    let result = engine.run(Direction::Up, None, None).await;
    assert_eq!(ids(&result.completed), vec![4]);
}

#[tokio::test]
async fn test_status_lists_missing_units() {
    let fx = Fixture::new();
    fx.reversible("1_a.sql", "a");
    fx.reversible("2_b.sql", "b");
    fx.engine().run(Direction::Up, None, None).await;
    std::fs::remove_file(fx.root().join("1_a.sql")).unwrap();

    let status = fx.engine().status(None).await.unwrap();
    assert_eq!(status.len(), 2);
    assert_eq!(status[0].status, UnitStatus::Missing);
    assert_eq!(status[0].name, "a");

    let json = serde_json::to_value(&status[0]).unwrap();
    assert_eq!(json["status"]["state"], "missing");
}

#[tokio::test]
async fn test_missing_migrations_root_is_empty_batch() {
    let fx = Fixture::new();
    let loader = Loader::new(MigrationSource::new(fx.root().join("absent")));
    let store: Arc<dyn MigrationStore> = fx.store.clone();
    let mut engine = Engine::new(loader, store, Arc::clone(&fx.db));

    let result = engine.run(Direction::Up, None, None).await;
    assert!(result.is_success());
    assert!(result.completed.is_empty());
}
