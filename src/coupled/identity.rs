//! Child identity issuance.
//!
//! One process-wide counter backs every coupling definition. Identities are
//! never reused, so an id uniquely names one registrant lifetime: remounting
//! a component registers it under a fresh id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of one registered child.
///
/// Carries no meaning beyond identity and issuance order: ids issued later
/// compare greater than ids issued earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildId(u64);

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_CHILD_ID: AtomicU64 = AtomicU64::new(1);

/// Issue a fresh identity, strictly greater than every identity issued
/// before it in this process.
pub fn next_child_id() -> ChildId {
    ChildId(NEXT_CHILD_ID.fetch_add(1, Ordering::Relaxed))
}
