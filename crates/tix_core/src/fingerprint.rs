use sha2::{Digest, Sha256};

fn normalize_part(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Derive a fingerprint for reports that arrive without one.
///
/// Stable across whitespace and case differences in the descriptive fields, so repeated
/// reports of the same issue collapse onto one ticket.
pub fn derive_fingerprint(title: &str, category: &str, location: &str) -> String {
    let payload = format!(
        "title={}|category={}|location={}",
        normalize_part(title),
        normalize_part(category),
        normalize_part(location)
    );
    let digest = Sha256::digest(payload.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_whitespace_and_case() {
        let a = derive_fingerprint("Disk  Full", "Infra", "db-01");
        let b = derive_fingerprint(" disk full ", "infra", "DB-01");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn distinguishes_fields() {
        let a = derive_fingerprint("disk full", "infra", "db-01");
        let b = derive_fingerprint("disk full", "infra", "db-02");
        let c = derive_fingerprint("disk full infra", "", "db-01");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
