//! Validation utilities

use crate::types::*;
use bigdecimal::BigDecimal;

/// Validate an account number: non-empty, at most 64 characters, leading
/// class digit, alphanumeric
pub fn validate_account_number(number: &str) -> LedgerResult<()> {
    if number.trim().is_empty() {
        return Err(LedgerError::InvalidData {
            field: "account",
            reason: "account number cannot be empty".to_string(),
        });
    }

    if number.len() > 64 {
        return Err(LedgerError::InvalidData {
            field: "account",
            reason: "account number cannot exceed 64 characters".to_string(),
        });
    }

    if !number.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(LedgerError::InvalidData {
            field: "account",
            reason: "account number must start with a class digit".to_string(),
        });
    }

    if !number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LedgerError::InvalidData {
            field: "account",
            reason: "account number can only contain alphanumeric characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a label: non-empty, at most 256 characters
pub fn validate_label(label: &str) -> LedgerResult<()> {
    if label.trim().is_empty() {
        return Err(LedgerError::InvalidData {
            field: "label",
            reason: "label cannot be empty".to_string(),
        });
    }

    if label.len() > 256 {
        return Err(LedgerError::InvalidData {
            field: "label",
            reason: "label cannot exceed 256 characters".to_string(),
        });
    }

    Ok(())
}

/// Validate an ISO currency code: three uppercase ASCII letters
pub fn validate_currency(currency: &str) -> LedgerResult<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(LedgerError::InvalidData {
            field: "currency",
            reason: format!("'{currency}' is not a valid ISO currency code"),
        });
    }

    Ok(())
}

/// Validate a ledger mnemonic: non-empty, at most 64 characters
pub fn validate_ledger_mnemo(mnemo: &str) -> LedgerResult<()> {
    if mnemo.trim().is_empty() {
        return Err(LedgerError::InvalidData {
            field: "ledger",
            reason: "ledger mnemonic cannot be empty".to_string(),
        });
    }

    if mnemo.len() > 64 {
        return Err(LedgerError::InvalidData {
            field: "ledger",
            reason: "ledger mnemonic cannot exceed 64 characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a debit/credit pair: exactly one strictly positive, the other
/// exactly zero
pub fn validate_amounts(debit: &BigDecimal, credit: &BigDecimal) -> LedgerResult<()> {
    let zero = BigDecimal::from(0);

    if *debit < zero || *credit < zero {
        return Err(LedgerError::InvalidData {
            field: "amount",
            reason: "amounts cannot be negative".to_string(),
        });
    }

    match (*debit > zero, *credit > zero) {
        (true, true) => Err(LedgerError::InvalidData {
            field: "amount",
            reason: "an entry carries either a debit or a credit, not both".to_string(),
        }),
        (false, false) => Err(LedgerError::InvalidData {
            field: "amount",
            reason: "an entry must carry a strictly positive amount".to_string(),
        }),
        _ => Ok(()),
    }
}
