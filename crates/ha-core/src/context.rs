//! Context handle for tracing a coordinator or flow instance

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Logging context owned by a single integration instance
///
/// Each coordinator and config flow receives its own Context instead of
/// reaching for a module-level logger. The context names the integration
/// domain and the instance, and [`Context::span`] turns it into a
/// `tracing` span that is attached to every remote call the instance makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// Integration domain (e.g., "comelit")
    pub domain: String,

    /// Instance name, usually derived from the host or entry title
    pub name: String,

    /// Context this one was derived from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    /// Create a root context for an integration instance
    pub fn new(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            domain: domain.into(),
            name: name.into(),
            parent_id: None,
        }
    }

    /// Derive a context for a sub-component of the same integration
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            domain: self.domain.clone(),
            name: name.into(),
            parent_id: Some(self.id.clone()),
        }
    }

    /// Span carrying this context's identity
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "integration",
            domain = %self.domain,
            name = %self.name,
            context_id = %self.id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_inherits_domain() {
        let root = Context::new("comelit", "comelit-10.0.0.5-coordinator");
        let child = root.child("config_flow");

        assert_eq!(child.domain, "comelit");
        assert_eq!(child.name, "config_flow");
        assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
        assert_ne!(child.id, root.id);
    }
}
