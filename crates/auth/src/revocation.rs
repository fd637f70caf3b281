//! Short-lived session denylist.
//!
//! Tokens stay self-verifying; this list is consulted only after a token has
//! passed signature and expiry checks. It holds two kinds of entry:
//!
//! - identity cut-offs: every session of an identity issued in a whole
//!   second strictly before the cut-off is revoked. Claims carry whole
//!   seconds, so a session issued in the same second as the revocation
//!   survives; a fresh sign-in right after a revocation is never born dead.
//! - token digests: one exact token, used by sign-out so the presented
//!   session dies even when it shares a second with the revocation.
//!
//! Both kinds are kept for one token lifetime, after which every affected
//! token has expired on its own.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use sha2::{Digest, Sha256};

use labtrack_core::UserId;

use crate::IdentityContext;

type TokenDigest = [u8; 32];

fn digest(token: &str) -> TokenDigest {
    Sha256::digest(token.as_bytes()).into()
}

#[derive(Debug, Default)]
struct Entries {
    identities: HashMap<UserId, DateTime<Utc>>,
    tokens: HashMap<TokenDigest, DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RevocationList {
    retention: Duration,
    entries: RwLock<Entries>,
}

impl RevocationList {
    /// `retention` should equal the session TTL.
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Revoke all sessions of `identity_id` issued in a second before `at`.
    pub fn revoke(&self, identity_id: UserId, at: DateTime<Utc>) {
        let cutoff = at.trunc_subsecs(0);
        if let Ok(mut entries) = self.entries.write() {
            let entry = entries.identities.entry(identity_id).or_insert(cutoff);
            if *entry < cutoff {
                *entry = cutoff;
            }
        }
    }

    /// Revoke exactly one presented token.
    pub fn revoke_token(&self, token: &str, at: DateTime<Utc>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.tokens.insert(digest(token), at);
        }
    }

    pub fn is_revoked(&self, context: &IdentityContext, token: &str, now: DateTime<Utc>) -> bool {
        let Ok(entries) = self.entries.read() else {
            // A poisoned list cannot vouch for anyone.
            return true;
        };

        let live = |at: &DateTime<Utc>| now < *at + self.retention;

        let identity_revoked = entries
            .identities
            .get(&context.identity_id())
            .is_some_and(|cutoff| context.issued_at() < *cutoff && live(cutoff));
        if identity_revoked {
            return true;
        }

        entries.tokens.get(&digest(token)).is_some_and(live)
    }

    /// Drop entries older than one token lifetime. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.identities.len() + entries.tokens.len();
        let retention = self.retention;
        entries.identities.retain(|_, at| now < *at + retention);
        entries.tokens.retain(|_, at| now < *at + retention);
        before - (entries.identities.len() + entries.tokens.len())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.identities.len() + e.tokens.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use labtrack_core::RoleId;

    use super::*;
    use crate::RoleName;

    fn session(identity_id: UserId, issued_at: DateTime<Utc>) -> IdentityContext {
        IdentityContext::new(identity_id, RoleId::new(), RoleName::USER, issued_at.trunc_subsecs(0))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::milliseconds(400)
    }

    #[test]
    fn sessions_from_earlier_seconds_are_revoked() {
        let list = RevocationList::new(Duration::hours(1));
        let user = UserId::new();
        list.revoke(user, t0());

        assert!(list.is_revoked(&session(user, t0() - Duration::minutes(5)), "a", t0()));
        assert!(list.is_revoked(&session(user, t0() - Duration::seconds(1)), "b", t0()));
        assert!(!list.is_revoked(&session(UserId::new(), t0() - Duration::minutes(5)), "c", t0()));
    }

    #[test]
    fn session_issued_in_the_revocation_second_survives() {
        let list = RevocationList::new(Duration::hours(1));
        let user = UserId::new();
        list.revoke(user, t0());

        // Signed in again 300ms after the revocation, same wall-clock second.
        let fresh = session(user, t0() + Duration::milliseconds(300));
        assert!(!list.is_revoked(&fresh, "fresh", t0() + Duration::seconds(2)));
        assert!(!list.is_revoked(&fresh, "fresh", t0() + Duration::minutes(30)));
    }

    #[test]
    fn revoked_token_is_rejected_even_within_the_same_second() {
        let list = RevocationList::new(Duration::hours(1));
        let user = UserId::new();
        let old = session(user, t0() - Duration::milliseconds(100));
        list.revoke(user, t0());
        list.revoke_token("old-token", t0());

        assert!(list.is_revoked(&old, "old-token", t0() + Duration::seconds(1)));
        assert!(!list.is_revoked(&old, "other-token", t0() + Duration::seconds(1)));
    }

    #[test]
    fn entries_lapse_after_retention() {
        let list = RevocationList::new(Duration::hours(1));
        let user = UserId::new();
        list.revoke(user, t0());
        list.revoke_token("tok", t0());

        let later = t0() + Duration::hours(1);
        assert!(!list.is_revoked(&session(user, t0() - Duration::minutes(1)), "tok", later));
        assert_eq!(list.purge_expired(later), 2);
        assert!(list.is_empty());
    }

    #[test]
    fn later_revocation_wins() {
        let list = RevocationList::new(Duration::hours(1));
        let user = UserId::new();
        list.revoke(user, t0() + Duration::minutes(10));
        list.revoke(user, t0());
        assert!(list.is_revoked(
            &session(user, t0() + Duration::minutes(5)),
            "x",
            t0() + Duration::minutes(6)
        ));
    }
}
