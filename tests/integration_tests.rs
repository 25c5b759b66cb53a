//! Integration tests for dossier-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use dossier_core::utils::MemoryStorage;
use dossier_core::{
    Account, ConciliationMember, Counters, Dossier, DossierConfig, DossierStorage, Entry,
    EntryStatus, LedgerError, MemberKind,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn config() -> DossierConfig {
    DossierConfig {
        label: "Integration dossier".to_string(),
        currency: "EUR".to_string(),
        exercice_begin: date(2024, 1, 1),
        exercice_end: date(2024, 12, 31),
    }
}

async fn open_dossier() -> (Dossier<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::new();
    let mut dossier = Dossier::new(storage.clone(), config());

    let mut clients = Account::new(
        "411000".to_string(),
        "Clients".to_string(),
        "EUR".to_string(),
    );
    clients.settleable = true;
    dossier.create_account(clients).await.unwrap();

    let mut bank = Account::new("512000".to_string(), "Bank".to_string(), "EUR".to_string());
    bank.reconciliable = true;
    dossier.create_account(bank).await.unwrap();

    dossier
        .create_account(Account::new(
            "701000".to_string(),
            "Sales".to_string(),
            "EUR".to_string(),
        ))
        .await
        .unwrap();

    (dossier, storage)
}

fn debit(account: &str, ledger: &str, amount: i64) -> Entry {
    Entry::debit(
        format!("Movement on {account}"),
        date(2024, 3, 15),
        date(2024, 3, 15),
        account.to_string(),
        "EUR".to_string(),
        ledger.to_string(),
        BigDecimal::from(amount),
    )
}

fn credit(account: &str, ledger: &str, amount: i64) -> Entry {
    Entry::credit(
        format!("Movement on {account}"),
        date(2024, 3, 15),
        date(2024, 3, 15),
        account.to_string(),
        "EUR".to_string(),
        ledger.to_string(),
        BigDecimal::from(amount),
    )
}

#[tokio::test]
async fn test_entry_lifecycle_against_account_buckets() {
    let (mut dossier, _) = open_dossier().await;

    // insert: the rough debit of 411000 grows by exactly 100
    let e1 = dossier.insert_entry(debit("411000", "VT", 100)).await.unwrap();
    let account = dossier.account("411000").await.unwrap().unwrap();
    assert_eq!(account.rough_debit, BigDecimal::from(100));
    assert_eq!(account.validated_debit, BigDecimal::from(0));

    // validate: the amount moves from the rough to the validated bucket
    dossier.validate_entry(e1.id.unwrap()).await.unwrap();
    let account = dossier.account("411000").await.unwrap().unwrap();
    assert_eq!(account.rough_debit, BigDecimal::from(0));
    assert_eq!(account.validated_debit, BigDecimal::from(100));

    // delete after validation is refused and balances stay put
    let refused = dossier.delete_entry(e1.id.unwrap()).await;
    assert!(matches!(
        refused,
        Err(LedgerError::InvalidStateTransition {
            operation: "delete",
            status: EntryStatus::Validated,
        })
    ));
    let account = dossier.account("411000").await.unwrap().unwrap();
    assert_eq!(account.rough_debit, BigDecimal::from(0));
    assert_eq!(account.validated_debit, BigDecimal::from(100));
}

#[tokio::test]
async fn test_validate_refused_from_every_non_rough_status() {
    let (mut dossier, mut storage) = open_dossier().await;

    // deleted entry
    let deleted = dossier.insert_entry(debit("411000", "VT", 10)).await.unwrap();
    dossier.delete_entry(deleted.id.unwrap()).await.unwrap();
    assert!(matches!(
        dossier.validate_entry(deleted.id.unwrap()).await,
        Err(LedgerError::InvalidStateTransition {
            operation: "validate",
            status: EntryStatus::Deleted,
        })
    ));

    // past entry, written the way an exercice forward would
    let account = dossier.account("411000").await.unwrap().unwrap();
    let mut past = debit("411000", "VT", 10);
    past.id = Some(9000);
    past.status = EntryStatus::Past;
    past.effect_date = date(2023, 6, 1);
    storage.insert_entry(&past, &account).await.unwrap();
    assert!(matches!(
        dossier.validate_entry(9000).await,
        Err(LedgerError::InvalidStateTransition {
            operation: "validate",
            status: EntryStatus::Past,
        })
    ));

    // future entry
    let mut future = debit("411000", "VT", 10);
    future.effect_date = date(2025, 2, 1);
    let future = dossier.insert_entry(future).await.unwrap();
    assert!(matches!(
        dossier.validate_entry(future.id.unwrap()).await,
        Err(LedgerError::InvalidStateTransition {
            operation: "validate",
            status: EntryStatus::Future,
        })
    ));

    // none of the refused calls touched the buckets
    let account = dossier.account("411000").await.unwrap().unwrap();
    assert_eq!(account.validated_debit, BigDecimal::from(0));
}

#[tokio::test]
async fn test_bucket_reconstruction_after_mixed_operations() {
    let (mut dossier, _) = open_dossier().await;

    let d1 = dossier.insert_entry(debit("411000", "VT", 120)).await.unwrap();
    let c1 = dossier.insert_entry(credit("701000", "VT", 120)).await.unwrap();
    dossier.insert_entry(debit("512000", "BQ", 45)).await.unwrap();
    let doomed = dossier.insert_entry(credit("411000", "BQ", 45)).await.unwrap();

    dossier.validate_entry(d1.id.unwrap()).await.unwrap();
    dossier.validate_entry(c1.id.unwrap()).await.unwrap();
    dossier.delete_entry(doomed.id.unwrap()).await.unwrap();

    let report = dossier.check_balances().await.unwrap();
    // stored buckets match the entry set even though rough totals are
    // one-legged here
    assert!(report
        .issues
        .iter()
        .all(|i| !i.contains("differs from entries")));
    assert_eq!(report.total_validated_debit, BigDecimal::from(120));
    assert_eq!(report.total_validated_credit, BigDecimal::from(120));
}

#[tokio::test]
async fn test_counters_stay_distinct_across_dossier_handles() {
    let storage = MemoryStorage::new();

    // two handles over the same dossier store, as two processes would be
    let mut first = Counters::new(storage.clone());
    let mut second = Counters::new(storage.clone());

    let mut values = Vec::new();
    for _ in 0..10 {
        values.push(first.get_next_entry_id().await.unwrap());
        values.push(second.get_next_entry_id().await.unwrap());
    }

    let expected: Vec<u64> = (1..=20).collect();
    assert_eq!(values, expected);
}

#[tokio::test]
async fn test_settlement_scenario_partial_then_unsettle() {
    let (mut dossier, _) = open_dossier().await;

    let e1 = dossier.insert_entry(debit("411000", "VT", 100)).await.unwrap();
    let e2 = dossier.insert_entry(credit("411000", "BQ", 60)).await.unwrap();
    let (id1, id2) = (e1.id.unwrap(), e2.id.unwrap());

    let number = dossier.settle(&[id1, id2]).await.unwrap();

    let e1 = dossier.entry(id1).await.unwrap().unwrap();
    let e2 = dossier.entry(id2).await.unwrap().unwrap();
    assert_eq!(e1.settlement.map(|s| s.number), Some(number));
    assert_eq!(e2.settlement.map(|s| s.number), Some(number));

    // unsettling one entry leaves the other settled under the same id
    dossier.unsettle_entry(id1).await.unwrap();
    let e1 = dossier.entry(id1).await.unwrap().unwrap();
    let e2 = dossier.entry(id2).await.unwrap().unwrap();
    assert!(e1.settlement.is_none());
    assert_eq!(e2.settlement.map(|s| s.number), Some(number));
}

#[tokio::test]
async fn test_settlement_survives_validation() {
    let (mut dossier, _) = open_dossier().await;

    let e1 = dossier.insert_entry(debit("411000", "VT", 100)).await.unwrap();
    let id = e1.id.unwrap();
    dossier.validate_entry(id).await.unwrap();

    // settlement linkage is still legal on a validated entry
    let number = dossier.settle(&[id]).await.unwrap();
    let entry = dossier.entry(id).await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Validated);
    assert_eq!(entry.settlement.map(|s| s.number), Some(number));
}

#[tokio::test]
async fn test_conciliation_scenario() {
    let (mut dossier, _) = open_dossier().await;

    let e1 = dossier.insert_entry(credit("512000", "BQ", 250)).await.unwrap();
    let e2 = dossier.insert_entry(credit("512000", "BQ", 80)).await.unwrap();

    let group = dossier.conciliate(e1.id.unwrap(), 301).await.unwrap();

    let by_entry = dossier
        .conciliation_group_by_member(MemberKind::Entry, e1.id.unwrap())
        .await
        .unwrap()
        .unwrap();
    let by_line = dossier
        .conciliation_group_by_member(MemberKind::BatLine, 301)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_entry.id, group.id);
    assert_eq!(by_line.id, group.id);

    // reconciling the same bank line against another entry is refused
    assert!(matches!(
        dossier.conciliate(e2.id.unwrap(), 301).await,
        Err(LedgerError::AlreadyReconciled {
            kind: MemberKind::BatLine,
            id: 301,
            ..
        })
    ));
}

#[tokio::test]
async fn test_conciliation_dissolution_cascade() {
    let (mut dossier, _) = open_dossier().await;

    let e1 = dossier.insert_entry(credit("512000", "BQ", 250)).await.unwrap();
    let group = dossier.conciliate(e1.id.unwrap(), 301).await.unwrap();
    dossier
        .add_to_conciliation(group.id, ConciliationMember::bat_line(302))
        .await
        .unwrap();

    let gone = dossier
        .remove_from_conciliation(group.id, ConciliationMember::entry(e1.id.unwrap()))
        .await
        .unwrap();
    assert!(gone.is_none());

    assert!(dossier.conciliation_group(group.id).await.unwrap().is_none());
    for line in [301, 302] {
        assert!(dossier
            .conciliation_group_by_member(MemberKind::BatLine, line)
            .await
            .unwrap()
            .is_none());
    }
}

#[tokio::test]
async fn test_account_deletion_policy() {
    let (mut dossier, _) = open_dossier().await;

    let entry = dossier.insert_entry(debit("411000", "VT", 10)).await.unwrap();
    assert!(!dossier.account_is_deletable("411000").await.unwrap());

    // a deleted entry still counts as a reference
    dossier.delete_entry(entry.id.unwrap()).await.unwrap();
    assert!(!dossier.account_is_deletable("411000").await.unwrap());
    assert!(dossier.delete_account("411000").await.is_err());

    // an untouched account goes away
    assert!(dossier.account_is_deletable("701000").await.unwrap());
    dossier.delete_account("701000").await.unwrap();
    assert!(dossier.account("701000").await.unwrap().is_none());
}

#[tokio::test]
async fn test_archive_balances_through_dossier() {
    let (mut dossier, _) = open_dossier().await;

    dossier.insert_entry(debit("411000", "VT", 100)).await.unwrap();
    let archived = dossier
        .archive_balances("411000", date(2024, 3, 31))
        .await
        .unwrap();

    assert_eq!(archived.archived.len(), 1);
    assert_eq!(archived.archived[0].debit, BigDecimal::from(100));
    assert_eq!(archived.archived[0].credit, BigDecimal::from(0));
}

#[tokio::test]
async fn test_invalid_entry_is_refused_before_any_write() {
    let (mut dossier, _) = open_dossier().await;

    let mut unlabeled = debit("411000", "VT", 10);
    unlabeled.label = String::new();
    assert!(matches!(
        dossier.insert_entry(unlabeled).await,
        Err(LedgerError::InvalidData { field: "label", .. })
    ));

    let mut both_sides = debit("411000", "VT", 10);
    both_sides.credit = BigDecimal::from(10);
    assert!(matches!(
        dossier.insert_entry(both_sides).await,
        Err(LedgerError::InvalidData { field: "amount", .. })
    ));

    // nothing was allocated or posted
    assert_eq!(dossier.counters().get_last_entry_id().await.unwrap(), 0);
    let account = dossier.account("411000").await.unwrap().unwrap();
    assert_eq!(account.rough_debit, BigDecimal::from(0));
}
