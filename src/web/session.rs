use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

pub const SESSION_COOKIE: &str = "poll_admin";

const KEY_CONTEXT: &str = "ticket-poll 2024-10 admin session";

/// Proof that the bearer logged in with the admin password.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdminSession {
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks signed admin session tokens of the form
/// `{expiry unix seconds}.{epoch}.{keyed blake3 of both, hex}`.
///
/// Only tokens carrying the current epoch verify. The epoch starts at the
/// time the key is derived and moves on every logout, so logging out or
/// restarting the server ends every outstanding session.
pub struct SessionKey {
    key: [u8; 32],
    epoch: AtomicI64,
}

impl SessionKey {
    pub fn derive(secret: &str) -> SessionKey {
        SessionKey {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            epoch: AtomicI64::new(Utc::now().timestamp_micros()),
        }
    }

    /// `None` when `now + ttl` is not a representable time.
    pub fn issue(&self, now: DateTime<Utc>, ttl: Duration) -> Option<(AdminSession, String)> {
        let expires_at = now.checked_add_signed(ttl)?;
        let payload = format!(
            "{}.{}",
            expires_at.timestamp(),
            self.epoch.load(Ordering::SeqCst)
        );
        let tag = blake3::keyed_hash(&self.key, payload.as_bytes());
        Some((AdminSession { expires_at }, format!("{payload}.{}", tag.to_hex())))
    }

    /// Expired, revoked, malformed, or forged tokens yield `None`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Option<AdminSession> {
        let (payload, tag) = token.rsplit_once('.')?;
        let tag = blake3::Hash::from_hex(tag).ok()?;
        // Hash equality is constant-time
        if blake3::keyed_hash(&self.key, payload.as_bytes()) != tag {
            return None;
        }

        let (expiry, epoch) = payload.split_once('.')?;
        if epoch.parse::<i64>().ok()? != self.epoch.load(Ordering::SeqCst) {
            return None;
        }
        let expires_at = DateTime::from_timestamp(expiry.parse().ok()?, 0)?;
        (expires_at > now).then_some(AdminSession { expires_at })
    }

    /// Invalidates every token issued so far.
    pub fn revoke_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Compares digests so the time taken does not depend on where the inputs differ.
pub fn password_matches(expected: &str, supplied: &str) -> bool {
    blake3::hash(expected.as_bytes()) == blake3::hash(supplied.as_bytes())
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    )
}

pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
