use super::{ConnectionId, RoomId};
use crate::error::SessionError;
use crate::models::SupportedLanguage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Queued,
    InRoom(RoomId),
}

/// Language pair declared on queue join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Preferences {
    pub native: SupportedLanguage,
    pub target: SupportedLanguage,
}

impl Preferences {
    /// Validate raw codes from a join request
    pub fn parse(native: Option<&str>, target: Option<&str>) -> Result<Self, SessionError> {
        let (Some(native), Some(target)) = (native, target) else {
            return Err(SessionError::PreferenceMismatch(
                "Both native and target language are required".to_string(),
            ));
        };

        let native = SupportedLanguage::from_code(native).ok_or_else(|| {
            SessionError::PreferenceMismatch(format!("Unsupported language: {}", native))
        })?;
        let target = SupportedLanguage::from_code(target).ok_or_else(|| {
            SessionError::PreferenceMismatch(format!("Unsupported language: {}", target))
        })?;

        if native == target {
            return Err(SessionError::PreferenceMismatch(
                "Native and target language must differ".to_string(),
            ));
        }

        Ok(Self { native, target })
    }

    /// Each side speaks what the other wants to learn
    pub fn mirrors(&self, other: &Preferences) -> bool {
        self.native == other.target && self.target == other.native
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub preferences: Option<Preferences>,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
}

/// Live connections and what each one is doing
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, now: DateTime<Utc>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            Connection {
                id,
                preferences: None,
                state: ConnectionState::Idle,
                connected_at: now,
            },
        );
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|conn| conn.state)
    }

    pub fn preferences(&self, id: ConnectionId) -> Option<Preferences> {
        self.connections.get(&id).and_then(|conn| conn.preferences)
    }

    /// Returns false for unknown ids
    pub fn set_preferences(&mut self, id: ConnectionId, preferences: Preferences) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => {
                conn.preferences = Some(preferences);
                true
            }
            None => false,
        }
    }

    pub fn set_state(&mut self, id: ConnectionId, state: ConnectionState) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.state = state;
        }
    }

    /// Idempotent: unknown ids yield `None`
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_codes() {
        let prefs = Preferences::parse(Some("EN"), Some("pt")).unwrap();
        assert_eq!(prefs.native, SupportedLanguage::English);
        assert_eq!(prefs.target, SupportedLanguage::Portuguese);
    }

    #[test]
    fn test_parse_rejects_bad_preferences() {
        for (native, target) in [
            (Some("en"), Some("en")),
            (Some("en"), Some("EN")),
            (None, Some("pt")),
            (Some("en"), None),
            (Some("en"), Some("klingon")),
        ] {
            assert!(
                matches!(
                    Preferences::parse(native, target),
                    Err(SessionError::PreferenceMismatch(_))
                ),
                "{:?} -> {:?} should be rejected",
                native,
                target
            );
        }
    }

    #[test]
    fn test_mirror_rule() {
        let en_pt = Preferences::parse(Some("en"), Some("pt")).unwrap();
        let pt_en = Preferences::parse(Some("pt"), Some("en")).unwrap();
        let pt_es = Preferences::parse(Some("pt"), Some("es")).unwrap();

        assert!(en_pt.mirrors(&pt_en));
        assert!(pt_en.mirrors(&en_pt));
        assert!(!en_pt.mirrors(&pt_es));
        assert!(!en_pt.mirrors(&en_pt));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let id = registry.register(Utc::now());

        assert_eq!(registry.state(id), Some(ConnectionState::Idle));
        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.unregister(Uuid::new_v4()).is_none());
        assert!(registry.is_empty());
    }
}
