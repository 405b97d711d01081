/// Explicit audit stamping for catalog writes
///
/// Every insert and update takes a `Stamp`. The caller builds it right
/// before the write, so nothing is populated behind its back.
use chrono::{DateTime, Utc};

use crate::config::AuditConfig;

/// Who touched a record and when
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamp {
    pub at: DateTime<Utc>,
    /// Acting user; always `None` while auditing is disabled
    pub by: Option<i64>,
}

impl Stamp {
    /// Stamp for the current moment. The actor is dropped unless auditing is on.
    pub fn now(actor: Option<i64>, audit: &AuditConfig) -> Self {
        Self::at(Utc::now(), actor, audit)
    }

    pub fn at(at: DateTime<Utc>, actor: Option<i64>, audit: &AuditConfig) -> Self {
        Self {
            at,
            by: if audit.enabled { actor } else { None },
        }
    }

    /// Stamp with no actor, for system-initiated writes
    pub fn system() -> Self {
        Self {
            at: Utc::now(),
            by: None,
        }
    }
}
