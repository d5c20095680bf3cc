use std::fmt;

/// A namespace-resolved name: `{uri}local`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub uri: String,
    pub local_name: String,
}

impl ExpandedName {
    pub fn new(uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            local_name: local_name.into(),
        }
    }

    /// A name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new("", local_name)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.uri.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.uri, self.local_name)
        }
    }
}

/// Splits a lexical QName into its optional prefix and local part.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ExpandedName::local("x").to_string(), "x");
        assert_eq!(ExpandedName::new("urn:a", "x").to_string(), "{urn:a}x");
    }

    #[test]
    fn test_split() {
        assert_eq!(split_qname("p:item"), (Some("p"), "item"));
        assert_eq!(split_qname("item"), (None, "item"));
    }
}
