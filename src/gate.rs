use sha2::{Digest, Sha256};
use tracing::warn;

/// Shared-secret check run before any file is read.
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    secret: Option<[u8; 32]>,
}

impl AccessGate {
    /// A gate with no secret configured lets everyone through, with a
    /// warning on every start.
    pub fn new(secret: Option<&str>) -> Self {
        let secret = secret.filter(|s| !s.is_empty()).map(digest);
        if secret.is_none() {
            warn!("no access secret configured (--access-secret / FLEET_KPI_SECRET); access is open");
        }
        Self { secret }
    }

    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn check(&self, entered: &str) -> bool {
        match &self.secret {
            None => true,
            // Digests have a fixed length, so the comparison does not leak the
            // secret's length.
            Some(expected) => digest(entered) == *expected,
        }
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}
