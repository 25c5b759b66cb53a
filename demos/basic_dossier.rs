//! Basic dossier usage example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use dossier_core::utils::MemoryStorage;
use dossier_core::{Account, Dossier, DossierConfig, Entry, MemberKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("📒 Dossier Core - Basic Ledger Example\n");

    let config = DossierConfig {
        label: "Demo company".to_string(),
        currency: "EUR".to_string(),
        exercice_begin: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        exercice_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    };
    let mut dossier = Dossier::new(MemoryStorage::new(), config);

    // 1. Set up a minimal chart of accounts
    println!("📊 Setting up Chart of Accounts...");
    let mut clients = Account::new(
        "411000".to_string(),
        "Clients".to_string(),
        "EUR".to_string(),
    );
    clients.settleable = true;
    dossier.create_account(clients).await?;

    let mut bank = Account::new("512000".to_string(), "Bank".to_string(), "EUR".to_string());
    bank.reconciliable = true;
    dossier.create_account(bank).await?;

    dossier
        .create_account(Account::new(
            "701000".to_string(),
            "Sales".to_string(),
            "EUR".to_string(),
        ))
        .await?;
    println!("  ✓ Created accounts 411000, 512000, 701000\n");

    // 2. Record an invoice: debit the client, credit sales
    println!("💰 Recording an invoice of €1,200...");
    let invoice = dossier
        .insert_entry(Entry::debit(
            "Invoice 2024-041".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "411000".to_string(),
            "EUR".to_string(),
            "VT".to_string(),
            BigDecimal::from(1200),
        ))
        .await?;
    dossier
        .insert_entry(Entry::credit(
            "Invoice 2024-041".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            "701000".to_string(),
            "EUR".to_string(),
            "VT".to_string(),
            BigDecimal::from(1200),
        ))
        .await?;

    let account = dossier.account("411000").await?.unwrap();
    println!(
        "  ✓ Entry {} is {}, rough debit on 411000 = {}\n",
        invoice.id.unwrap(),
        invoice.status,
        account.rough_debit
    );

    // 3. Validate the client leg
    println!("✅ Validating the client entry...");
    let validated = dossier.validate_entry(invoice.id.unwrap()).await?;
    let account = dossier.account("411000").await?.unwrap();
    println!(
        "  ✓ Entry {} is now {}, validated debit = {}, rough debit = {}\n",
        validated.id.unwrap(),
        validated.status,
        account.validated_debit,
        account.rough_debit
    );

    // 4. The payment arrives: record it and settle both entries
    println!("🤝 Recording a partial payment of €700 and settling...");
    let payment = dossier
        .insert_entry(Entry::credit(
            "Payment inv. 2024-041".to_string(),
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            "411000".to_string(),
            "EUR".to_string(),
            "BQ".to_string(),
            BigDecimal::from(700),
        ))
        .await?;

    let settlement = dossier
        .settle(&[invoice.id.unwrap(), payment.id.unwrap()])
        .await?;
    println!("  ✓ Both entries settled under settlement {settlement}\n");

    // 5. Reconcile the payment against the imported bank line 88
    println!("🏦 Reconciling the payment with bank line 88...");
    let bank_move = dossier
        .insert_entry(Entry::debit(
            "Payment inv. 2024-041".to_string(),
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            "512000".to_string(),
            "EUR".to_string(),
            "BQ".to_string(),
            BigDecimal::from(700),
        ))
        .await?;
    dossier.conciliate(bank_move.id.unwrap(), 88).await?;
    let group = dossier
        .conciliation_group_by_member(MemberKind::BatLine, 88)
        .await?
        .unwrap();
    println!(
        "  ✓ Conciliation group {} holds {} members\n",
        group.id,
        group.members.len()
    );

    // 6. Check integrity
    println!("🔍 Checking balance integrity...");
    let report = dossier.check_balances().await?;
    println!(
        "  ✓ valid = {}, validated totals = {} / {}",
        report.is_valid, report.total_validated_debit, report.total_validated_credit
    );
    for issue in &report.issues {
        println!("  ⚠ {issue}");
    }

    Ok(())
}
