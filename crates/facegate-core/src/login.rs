//! Live match classification.

use crate::matcher::FaceMatch;
use crate::registry::{Account, Registry};
use serde::{Deserialize, Serialize};

/// Outcome shown to the user while scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginResult {
    #[default]
    Pending,
    Success,
    Failed,
}

/// Tracks the candidate account across ticks of one scan session.
///
/// The first accepted match fixes the candidate; later ticks only report
/// `Success` while they keep matching that same account.
#[derive(Debug, Clone, Default)]
pub struct LoginTracker {
    candidate: Option<Account>,
    result: LoginResult,
    scanned: bool,
}

impl LoginTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result(&self) -> LoginResult {
        self.result
    }

    pub fn candidate(&self) -> Option<&Account> {
        self.candidate.as_ref()
    }

    /// True once at least one tick has been classified.
    pub fn scanned(&self) -> bool {
        self.scanned
    }

    /// Classify the best match of one tick.
    pub fn observe(&mut self, best: Option<&FaceMatch>, registry: &Registry) -> LoginResult {
        self.scanned = true;
        self.result = match best {
            Some(m) if !m.is_unknown() => {
                let matched = registry.find(&m.label);
                match (&self.candidate, matched) {
                    (None, Some(account)) => {
                        tracing::info!(account = %account.id, distance = m.distance, "candidate account fixed");
                        self.candidate = Some(account.clone());
                        LoginResult::Success
                    }
                    (Some(candidate), _) if candidate.id == m.label => LoginResult::Success,
                    _ => LoginResult::Failed,
                }
            }
            _ => LoginResult::Failed,
        };
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(vec![
            Account { id: "alice".into(), full_name: "Alice".into(), picture: "alice.jpg".into() },
            Account { id: "bob".into(), full_name: "Bob".into(), picture: "bob.jpg".into() },
        ])
    }

    fn hit(label: &str, distance: f32) -> FaceMatch {
        FaceMatch { label: label.into(), distance }
    }

    #[test]
    fn test_initial_state() {
        let t = LoginTracker::new();
        assert_eq!(t.result(), LoginResult::Pending);
        assert!(t.candidate().is_none());
        assert!(!t.scanned());
    }

    #[test]
    fn test_first_match_fixes_candidate() {
        let reg = registry();
        let mut t = LoginTracker::new();
        assert_eq!(t.observe(Some(&hit("alice", 0.3)), &reg), LoginResult::Success);
        assert_eq!(t.candidate().map(|a| a.id.as_str()), Some("alice"));
        assert!(t.scanned());
    }

    #[test]
    fn test_other_account_fails_after_candidate() {
        let reg = registry();
        let mut t = LoginTracker::new();
        t.observe(Some(&hit("alice", 0.3)), &reg);
        assert_eq!(t.observe(Some(&hit("bob", 0.2)), &reg), LoginResult::Failed);
        assert_eq!(t.candidate().map(|a| a.id.as_str()), Some("alice"));
        assert_eq!(t.observe(Some(&hit("alice", 0.4)), &reg), LoginResult::Success);
    }

    #[test]
    fn test_unknown_and_no_face_fail() {
        let reg = registry();
        let mut t = LoginTracker::new();
        assert_eq!(t.observe(Some(&hit(crate::matcher::UNKNOWN_LABEL, 0.9)), &reg), LoginResult::Failed);
        assert_eq!(t.observe(None, &reg), LoginResult::Failed);
        assert!(t.candidate().is_none());
    }

    #[test]
    fn test_label_missing_from_registry_fails() {
        let reg = registry();
        let mut t = LoginTracker::new();
        assert_eq!(t.observe(Some(&hit("mallory", 0.1)), &reg), LoginResult::Failed);
        assert!(t.candidate().is_none());
    }

    #[test]
    fn test_result_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&LoginResult::Success).unwrap(), "\"SUCCESS\"");
    }
}
