use std::sync::{Arc, RwLock};

/// Display name the relay uses to route our envelopes.
///
/// Shared by every clone; rebinding overwrites the name for envelopes sent
/// afterwards and touches nothing else.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    name: Arc<RwLock<Option<String>>>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, username: &str) {
        let mut name = self.name.write().unwrap_or_else(|e| e.into_inner());
        *name = Some(username.to_string());
    }

    pub fn username(&self) -> Option<String> {
        self.name
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.username().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_binding() {
        let identity = Identity::new();
        let other = identity.clone();
        assert!(!other.is_bound());

        identity.bind("alice");
        assert_eq!(other.username().as_deref(), Some("alice"));

        other.bind("bob");
        assert_eq!(identity.username().as_deref(), Some("bob"));
    }
}
