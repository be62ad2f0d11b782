use crate::calc::ClassSummary;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;

/// Keeps the value of the most recently completed computation.
///
/// A value offered with a sequence number not greater than the held one is
/// dropped, so a slow, older computation cannot overwrite a newer result.
#[derive(Debug, Clone)]
pub struct LatestSlot<T> {
    seq: u64,
    value: Option<T>,
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self {
            seq: 0,
            value: None,
        }
    }
}

impl<T> LatestSlot<T> {
    pub fn offer(&mut self, seq: u64, value: T) -> bool {
        if self.value.is_some() && seq <= self.seq {
            return false;
        }
        self.seq = seq;
        self.value = Some(value);
        true
    }

    pub fn latest(&self) -> Option<(u64, &T)> {
        self.value.as_ref().map(|v| (self.seq, v))
    }
}

/// Signed-in identity. Created by `auth.signIn`/`auth.signUp`, dropped by
/// `auth.signOut` or when a different workspace is opened.
#[derive(Debug)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub started_at: String,
    fetch_seq: u64,
    pub summaries: LatestSlot<Vec<ClassSummary>>,
}

impl Session {
    pub fn start(user_id: String, email: String) -> Self {
        Self {
            user_id,
            email,
            started_at: crate::db::now_rfc3339(),
            fetch_seq: 0,
            summaries: LatestSlot::default(),
        }
    }

    pub fn next_fetch_seq(&mut self) -> u64 {
        self.fetch_seq += 1;
        self.fetch_seq
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
