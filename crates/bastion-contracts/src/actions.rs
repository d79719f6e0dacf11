//! Canonical action names for audit records.
//!
//! Callers may record any action string; these constants keep the common
//! ones spelled consistently across producers.

// Authentication
pub const AUTH_SUCCESS: &str = "auth_success";
pub const AUTH_FAILURE: &str = "auth_failure";
pub const AUTH_RATE_LIMITED: &str = "auth_rate_limited";

// Key lifecycle and crypto operations
pub const KEY_GENERATED: &str = "key_generated";
pub const KEY_ROTATED: &str = "key_rotated";
pub const KEY_REVOKED: &str = "key_revoked";
pub const ENCRYPT_SUCCESS: &str = "encrypt_success";
pub const DECRYPT_SUCCESS: &str = "decrypt_success";
pub const DECRYPT_FAILURE: &str = "decrypt_failure";

// Post-quantum posture
pub const PQC_CIPHER_DETECTED: &str = "pqc_cipher_detected";
pub const QUANTUM_RISK_DETECTED: &str = "quantum_risk_detected";

// Governance
pub const RULE_VIOLATION: &str = "rule_violation";
pub const STRIKE_ISSUED: &str = "strike_issued";
pub const BAN_TRIGGERED: &str = "ban_triggered";

// Access control
pub const ACCESS_GRANTED: &str = "access_granted";
pub const ACCESS_DENIED: &str = "access_denied";
pub const PERMISSION_CHANGED: &str = "permission_changed";

// Anchoring
pub const TX_SUBMITTED: &str = "tx_submitted";
pub const TX_CONFIRMED: &str = "tx_confirmed";
pub const TX_FAILED: &str = "tx_failed";
