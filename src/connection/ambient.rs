//! Identity/session data supplied by the accept layer.

use std::collections::BTreeMap;

/// Ambient data captured when a connection is accepted.
///
/// Whatever the HTTP/route layer knows about the peer at upgrade time
/// (authenticated identity, session attributes, remote address) is copied in
/// here once. Later changes on the request side are not visible to handlers.
///
/// ```rust
/// use evdispatch::Ambient;
///
/// let ambient = Ambient::new()
///     .with_identity("alice")
///     .with_attribute("room", "lobby");
///
/// assert_eq!(ambient.identity(), Some("alice"));
/// assert_eq!(ambient.attribute("room"), Some("lobby"));
/// assert_eq!(ambient.attribute("missing"), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ambient {
    identity: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl Ambient {
    /// Empty ambient data (anonymous peer, no attributes).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the authenticated identity.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Adds a session attribute; a repeated key overwrites the previous value.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(key.into(), value.into());
        self
    }

    /// Authenticated identity, if any.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Looks up a session attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All session attributes, ordered by key.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
