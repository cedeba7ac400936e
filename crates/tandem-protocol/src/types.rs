use serde::{Deserialize, Serialize};

/// Side of a room. The caller always sends the first offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Caller,
    Callee,
}

impl Role {
    pub fn opposite(self) -> Self {
        match self {
            Role::Caller => Role::Callee,
            Role::Callee => Role::Caller,
        }
    }
}

/// Entry of the language catalog served at `GET /languages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageData {
    pub code: String,
    pub name: String,
}

/// Counters exposed at `GET /api/stats`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStats {
    pub online: usize,
    pub queued: usize,
    pub active_rooms: usize,
    pub total_matches: u64,
}
