use crate::peer::types::SessionDescription;
use sha2::{Digest, Sha256};

/// DTLS certificate fingerprint line (`a=fingerprint:...`) of a description
pub fn dtls_fingerprint(desc: &SessionDescription) -> Option<&str> {
    desc.body
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("a=fingerprint:"))
}

/// Short verification string both peers can read out to each other.
///
/// Independent of which side is local: the two fingerprint lines are sorted
/// before hashing. 48 bits, 12 hex chars.
pub fn session_fingerprint(
    local: &SessionDescription,
    remote: &SessionDescription,
) -> Option<String> {
    let mut lines = [dtls_fingerprint(local)?, dtls_fingerprint(remote)?];
    lines.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(lines[0].as_bytes());
    hasher.update(b"\n");
    hasher.update(lines[1].as_bytes());
    let digest = hasher.finalize();
    Some(hex::encode(&digest[..6]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::types::SdpKind;

    fn sdp(kind: SdpKind, fp: &str) -> SessionDescription {
        SessionDescription {
            kind,
            body: format!(
                "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\na=fingerprint:sha-256 {fp}\r\n"
            ),
        }
    }

    #[test]
    fn both_sides_compute_the_same_value() {
        let a = sdp(SdpKind::Offer, "AA:BB");
        let b = sdp(SdpKind::Answer, "CC:DD");
        let ours = session_fingerprint(&a, &b).unwrap();
        let theirs = session_fingerprint(&b, &a).unwrap();
        assert_eq!(ours, theirs);
        assert_eq!(ours.len(), 12);
    }

    #[test]
    fn different_certificates_change_the_value() {
        let a = sdp(SdpKind::Offer, "AA:BB");
        let b = sdp(SdpKind::Answer, "CC:DD");
        let c = sdp(SdpKind::Answer, "EE:FF");
        assert_ne!(session_fingerprint(&a, &b), session_fingerprint(&a, &c));
    }

    #[test]
    fn missing_fingerprint_yields_none() {
        let a = sdp(SdpKind::Offer, "AA:BB");
        let bare = SessionDescription::answer("v=0\r\n");
        assert_eq!(session_fingerprint(&a, &bare), None);
        assert_eq!(dtls_fingerprint(&a), Some("sha-256 AA:BB"));
    }
}
