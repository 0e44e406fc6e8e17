//! Access Gate Module
//!
//! A crude allow-list on the client's `User-Agent`. The string is split on single
//! spaces and every token is checked against each marker prefix. The request is
//! allowed only when the number of matches equals the number of markers.
//!
//! This counts matches rather than checking presence, so a repeated marker can
//! stand in for a missing one. It is not a security boundary.

pub const DEFAULT_MARKERS: [&str; 2] = ["Croqujs/", "Electron/"];

#[derive(Debug, Clone)]
pub struct AccessGate {
    markers: Vec<String>,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl AccessGate {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    /// Number of (token, marker) pairs where the token starts with the marker.
    pub fn count_matches(&self, user_agent: &str) -> usize {
        user_agent
            .split(' ')
            .map(|token| {
                self.markers
                    .iter()
                    .filter(|marker| token.starts_with(marker.as_str()))
                    .count()
            })
            .sum()
    }

    pub fn allows(&self, user_agent: &str) -> bool {
        self.count_matches(user_agent) == self.markers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                      Croqujs/1.4.0 Chrome/83.0.4103.122 Electron/9.1.0 Safari/537.36";

    #[test]
    fn test_both_markers_allowed() {
        assert!(AccessGate::default().allows(UA));
    }

    #[test]
    fn test_missing_marker_rejected() {
        let gate = AccessGate::default();
        assert!(!gate.allows("Mozilla/5.0 Chrome/83.0 Electron/9.1.0"));
        assert!(!gate.allows("Mozilla/5.0 Croqujs/1.4.0"));
        assert!(!gate.allows(""));
    }

    #[test]
    fn test_marker_must_be_token_prefix() {
        let gate = AccessGate::default();
        assert!(!gate.allows("xCroqujs/1.0 xElectron/9.0"));
        assert_eq!(gate.count_matches("(Croqujs/1.0;Electron/9.0)"), 0);
    }

    #[test]
    fn test_count_semantics_quirk() {
        let gate = AccessGate::default();
        // two copies of one marker still total two
        assert!(gate.allows("Electron/9.0 Electron/9.1"));
        // three matches is too many
        assert!(!gate.allows("Croqujs/1.0 Electron/9.0 Electron/9.1"));
    }

    #[test]
    fn test_custom_markers() {
        let gate = AccessGate::new(vec!["Foo/".to_string()]);
        assert!(gate.allows("Bar/1 Foo/2"));
        assert!(!gate.allows(UA));
    }
}
