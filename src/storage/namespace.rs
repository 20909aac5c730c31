/// Maps logical keys onto the physical keys of a shared store by prefixing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespacer {
    prefix: String,
}

impl Namespacer {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Strips the prefix. Keys outside the namespace come back unchanged;
    /// check [`is_valid_key`](Self::is_valid_key) first.
    pub fn unnamespaced_key<'a>(&self, physical: &'a str) -> &'a str {
        physical.strip_prefix(self.prefix.as_str()).unwrap_or(physical)
    }

    pub fn is_valid_key(&self, physical: &str) -> bool {
        physical.starts_with(self.prefix.as_str())
    }
}
