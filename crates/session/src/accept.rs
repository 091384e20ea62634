//! Which incoming invitations the accept loop takes.

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AcceptPolicy {
    /// First invitation from anyone.
    #[default]
    Any,
    Only(String),
    OneOf(Vec<String>),
}

impl AcceptPolicy {
    pub fn accepts(&self, inviter: &str) -> bool {
        match self {
            AcceptPolicy::Any => true,
            AcceptPolicy::Only(name) => name == inviter,
            AcceptPolicy::OneOf(names) => names.iter().any(|n| n == inviter),
        }
    }
}

impl From<&str> for AcceptPolicy {
    fn from(name: &str) -> Self {
        AcceptPolicy::Only(name.to_string())
    }
}

impl From<Vec<String>> for AcceptPolicy {
    fn from(names: Vec<String>) -> Self {
        AcceptPolicy::OneOf(names)
    }
}

/// An invitation waiting for the accept loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvite {
    pub inviter: String,
    pub room_id: String,
}
