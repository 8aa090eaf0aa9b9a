//! Human-facing document numbers.

/// Prefix of generated customer numbers.
pub const CUSTOMER_NUMBER_PREFIX: char = 'K';

/// Next customer number given how many customers the tenant already has.
///
/// `0` yields `K0001`; numbers past `K9999` keep growing (`K10000`).
pub fn next_customer_number(existing: u64) -> String {
    format!("{}{:04}", CUSTOMER_NUMBER_PREFIX, existing.saturating_add(1))
}
