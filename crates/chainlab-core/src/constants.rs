use std::time::Duration;

pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const HEADER_SIZE: usize = 80;
pub const NONCE_OFFSET: usize = HEADER_SIZE - 4;
pub const ZERO_HASH_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const BLOCK_FIELD_DELIMITER: char = '|';
pub const BLOCK_INTERVAL_SECS: u64 = 60;
pub const MAX_MINING_TRIES: u64 = 10_000_000;
pub const TAMPER_MARKER: &str = " *tampered*";

/// Upper bound on a single input poll, so countdown alerts keep firing.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const ALERT_WINDOW_SECS: u64 = 5;
pub const CANCEL_KEYWORDS: [&str; 3] = ["exit", "quit", "cancel"];

pub const SAMPLE_PAYLOADS: [&str; 8] = [
    "Payroll transfers",
    "Supplier A payment",
    "Customer refund",
    "Quarterly bonus",
    "Ledger adjustment",
    "Office supplies",
    "Invoice #8421",
    "Travel reimbursement",
];
