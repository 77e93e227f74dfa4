//! End-to-end integration tests
//!
//! These tests run the whole pipeline against a JSON snapshot fixture:
//! 1. Copy tests/fixtures/customers.json into a temporary directory
//! 2. Seed an in-memory store from it and load the index
//! 3. Query reports or apply mutations through the write-through protocol
//! 4. Reload from the snapshot file and check what was persisted
//!
//! The fixture covers every contract status, both withdrawal statuses,
//! comma decimals, an accented region name, an unknown region code, an
//! unknown field and a duplicate primary key.

#[cfg(test)]
mod tests {
    use investor_index::core::traits::{ExternalStore, RecordSource, SnapshotWriter};
    use investor_index::core::{load_all, ContractRequest, CustomerIndex, LedgerEngine};
    use investor_index::io::{JsonSnapshotFile, MemoryStore};
    use investor_index::types::{CustomerRecord, LedgerError, WithdrawalStatus};
    use investor_index::RetryPolicy;
    use rstest::{fixture, rstest};
    use rust_decimal::Decimal;
    use serde_json::{json, Map, Value};
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const ANA: &str = "11111111111";
    const BRUNO: &str = "22222222222";
    const CARLA: &str = "33333333333";
    const DIEGO: &str = "44444444444";

    /// Temporary copy of the fixture snapshot
    struct Workspace {
        _dir: TempDir,
        path: PathBuf,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("customers.json");
        fs::copy("tests/fixtures/customers.json", &path).expect("Failed to copy fixture");
        Workspace { _dir: dir, path }
    }

    /// Open the ledger the way the binary does
    fn open<S, F>(path: &PathBuf, seed: F) -> LedgerEngine<S, JsonSnapshotFile>
    where
        S: ExternalStore,
        F: FnOnce(Vec<CustomerRecord>) -> S,
    {
        let snapshot = JsonSnapshotFile::new(path);
        let records = snapshot.read_all().expect("Failed to read snapshot");
        let index = CustomerIndex::from_tree(load_all(&snapshot).expect("Failed to load index"));
        LedgerEngine::new(index, seed(records), snapshot, RetryPolicy::none())
    }

    fn open_memory(path: &PathBuf) -> LedgerEngine<MemoryStore, JsonSnapshotFile> {
        open(path, |records| MemoryStore::from_records(records))
    }

    fn dec(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    #[rstest]
    fn test_load_keeps_first_duplicate_and_every_key(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        let keys: Vec<_> = engine.all().into_iter().map(|r| r.tax_id).collect();
        assert_eq!(keys, vec![ANA, BRUNO, CARLA, DIEGO]);
        assert_eq!(engine.by_key(CARLA).unwrap().name, "Carla Dias");
        assert!(engine.index().is_height_balanced());

        let ana = engine.by_key(ANA).unwrap();
        assert_eq!(ana.extra.get("phone"), Some(&json!("+55 11 5555-0101")));
    }

    #[rstest]
    fn test_round_trip_reproduces_record_set(workspace: Workspace) {
        let snapshot = JsonSnapshotFile::new(&workspace.path);
        let input = snapshot.read_all().unwrap();
        let tree = load_all(&snapshot).unwrap();

        let loaded: HashSet<_> = tree.iter().map(|(k, _)| k.clone()).collect();
        let expected: HashSet<_> = input.iter().map(|r| r.tax_id.clone()).collect();
        assert_eq!(loaded, expected);
    }

    #[rstest]
    #[case::ana(ANA, "3000", "210", "2210", "50", "200", "3410", "100", "800")]
    #[case::bruno(BRUNO, "500", "120", "120", "0", "0", "620", "0", "120")]
    #[case::carla(CARLA, "0", "0", "0", "0", "0", "0", "0", "0")]
    #[case::diego_rejected_only(DIEGO, "0", "0", "0", "0", "0", "0", "0", "0")]
    #[allow(clippy::too_many_arguments)]
    fn test_derived_financials(
        workspace: Workspace,
        #[case] key: &str,
        #[case] spent: &str,
        #[case] profit: &str,
        #[case] available: &str,
        #[case] coins: &str,
        #[case] referral: &str,
        #[case] platform_value: &str,
        #[case] withdrawn: &str,
        #[case] net_receivable: &str,
    ) {
        let engine = open_memory(&workspace.path);
        let f = engine.view(key).unwrap().financials;

        assert_eq!(f.total_spent, dec(spent));
        assert_eq!(f.total_profit, dec(profit));
        assert_eq!(f.available_balance, dec(available));
        assert_eq!(f.total_coins, dec(coins));
        assert_eq!(f.total_referral, dec(referral));
        assert_eq!(f.total_platform_value, dec(platform_value));
        assert_eq!(f.amount_withdrawn, dec(withdrawn));
        assert_eq!(f.net_receivable, dec(net_receivable));
    }

    #[rstest]
    fn test_platform_reports(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        let totals = engine.platform_totals();
        assert_eq!(totals.total_coins, dec("50"));
        assert_eq!(totals.total_platform_balance, dec("1720"));
        assert_eq!(totals.total_earnings, dec("330"));
        assert_eq!(totals.total_withdrawals_paid, dec("50"));
        assert_eq!(totals.final_balance, dec("1670"));

        let top: Vec<_> = engine.top_investors(3).into_iter().map(|t| t.key).collect();
        assert_eq!(top, vec![ANA, BRUNO, CARLA]);

        let regions = engine.count_by_region();
        assert_eq!(regions["SP"], 1);
        assert_eq!(regions["PA"], 1);
        assert_eq!(regions["RJ"], 1);
        assert_eq!(regions.values().sum::<usize>(), 3);

        assert_eq!(engine.contracts().len(), 5);
        assert_eq!(engine.withdrawals().len(), 2);
        assert_eq!(engine.purchase_timeline().len(), 3);
        let idle: Vec<_> = engine
            .customers_without_contracts()
            .into_iter()
            .map(|r| r.tax_id)
            .collect();
        assert_eq!(idle, vec![CARLA]);
    }

    #[rstest]
    fn test_mutation_is_persisted_to_snapshot(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        engine.add_withdrawal(BRUNO, dec("20")).unwrap();
        engine
            .add_contract(CARLA, ContractRequest::new("C-9", dec("750"), dec("36")))
            .unwrap();

        let reopened = open_memory(&workspace.path);
        let bruno = reopened.by_key(BRUNO).unwrap();
        assert_eq!(bruno.withdrawals.len(), 1);
        assert_eq!(bruno.withdrawals[0].status, WithdrawalStatus::Requested);
        assert_eq!(reopened.view(CARLA).unwrap().financials.total_spent, dec("750"));
        assert_eq!(reopened.by_key(CARLA).unwrap().name, "Carla Dias");
    }

    #[rstest]
    fn test_field_edits_and_referral(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        let fields: Map<String, Value> = json!({"state": "BA", "nickname": "bru"})
            .as_object()
            .cloned()
            .unwrap();
        engine.update_fields(BRUNO, fields).unwrap();
        engine.set_verification(BRUNO, true, false).unwrap();
        let (ana, bruno) = engine
            .credit_referral(ANA, BRUNO, "Bruno Reis", dec("500"))
            .unwrap();

        assert_eq!(ana.referrals.len(), 2);
        assert_eq!(ana.referrals[1].value, dec("50"));
        assert_eq!(bruno.referrer, None);
        assert_eq!(bruno.state.as_deref(), Some("BA"));
        assert_eq!(bruno.documents_sent, Some(true));

        let key_change = json!({"tax_id": "99999999999"}).as_object().cloned().unwrap();
        assert!(matches!(
            engine.update_fields(BRUNO, key_change),
            Err(LedgerError::Validation { .. })
        ));
        assert!(engine.by_key("99999999999").is_none());
    }

    #[rstest]
    fn test_rewrite_snapshot_drops_duplicates(workspace: Workspace) {
        let engine = open_memory(&workspace.path);
        assert_eq!(engine.rewrite_snapshot(), Ok(4));

        let records = JsonSnapshotFile::new(&workspace.path).read_all().unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.windows(2).all(|w| w[0].tax_id < w[1].tax_id));
    }

    #[rstest]
    fn test_sweep_accrues_only_eligible_contracts(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        let report = engine.accrue_all();

        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 3);
        assert!(report.failures.is_empty());

        let expected = dec("10") + dec("30") / Decimal::from(1080);
        let reopened = open_memory(&workspace.path);
        assert_eq!(reopened.by_key(ANA).unwrap().contracts[0].accrued_yield_pct, expected);
        assert_eq!(reopened.by_key(ANA).unwrap().contracts[1].accrued_yield_pct, dec("5.5"));

        let marker = JsonSnapshotFile::new(&workspace.path)
            .last_sweep()
            .unwrap()
            .expect("sweep should be recorded");
        assert_eq!(marker.finished_at, report.finished_at);
        assert_eq!((marker.updated, marker.unchanged, marker.failed), (1, 3, 0));
    }

    #[rstest]
    #[case::decrease("accrued_yield_pct", json!(5))]
    #[case::over_cap("accrued_yield_pct", json!(99))]
    #[case::cap_lowered_below_accrued("yield_cap_pct", json!(8))]
    fn test_contract_edit_cannot_break_yield_bounds(
        workspace: Workspace,
        #[case] field: &str,
        #[case] value: Value,
    ) {
        let engine = open_memory(&workspace.path);

        let result = engine.update_contract_field(ANA, "C-1", field, value);

        assert!(matches!(result, Err(LedgerError::Validation { .. })));
        let reopened = open_memory(&workspace.path);
        let contract = &reopened.by_key(ANA).unwrap().contracts[0];
        assert_eq!(contract.accrued_yield_pct, dec("10"));
        assert_eq!(reopened.view(ANA).unwrap().financials.total_profit, dec("210"));
    }

    /// Store that refuses writes for one key
    struct RefusingStore {
        inner: MemoryStore,
        refused: &'static str,
    }

    impl ExternalStore for RefusingStore {
        fn get_by_store_id(&self, id: &str) -> Result<Option<CustomerRecord>, LedgerError> {
            self.inner.get_by_store_id(id)
        }

        fn set_by_store_id(&self, id: &str, record: &CustomerRecord) -> Result<(), LedgerError> {
            if id == self.refused {
                return Err(LedgerError::upstream("store write", "quota exceeded"));
            }
            self.inner.set_by_store_id(id, record)
        }

        fn update_fields(&self, id: &str, fields: &Map<String, Value>) -> Result<(), LedgerError> {
            self.inner.update_fields(id, fields)
        }
    }

    #[rstest]
    fn test_sweep_reports_failures_and_continues(workspace: Workspace) {
        let engine = open(&workspace.path, |records| RefusingStore {
            inner: MemoryStore::from_records(records),
            refused: ANA,
        });

        let report = engine.accrue_all();

        assert_eq!(report.updated, 0);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, ANA);
        assert_eq!(report.failures[0].contract_ids, vec!["C-1".to_string()]);
        assert_eq!(engine.by_key(ANA).unwrap().contracts[0].accrued_yield_pct, dec("10"));
    }

    #[rstest]
    fn test_unknown_customer_is_not_found(workspace: Workspace) {
        let engine = open_memory(&workspace.path);

        assert!(engine.by_key("00000000000").is_none());
        assert!(matches!(
            engine.add_withdrawal("00000000000", dec("1")),
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[rstest]
    fn test_malformed_snapshot_is_fatal(workspace: Workspace) {
        fs::write(&workspace.path, r#"[{"tax_id": "1", "withdrawals": [{"amount": "abc"}]}]"#)
            .unwrap();

        let snapshot = JsonSnapshotFile::new(&workspace.path);
        let result = LedgerEngine::load(
            &snapshot,
            MemoryStore::new(),
            JsonSnapshotFile::new(&workspace.path),
            RetryPolicy::none(),
        );
        assert!(matches!(result, Err(LedgerError::MalformedSnapshot { .. })));
    }

    #[test]
    fn test_missing_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        let snapshot = JsonSnapshotFile::new(dir.path().join("absent.json"));
        assert!(matches!(load_all(&snapshot), Err(LedgerError::FileNotFound { .. })));

        snapshot.upsert(&CustomerRecord::new("1", "First")).unwrap();
        assert_eq!(load_all(&snapshot).unwrap().len(), 1);
    }
}
