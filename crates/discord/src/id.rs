//! Host identifier namespace.
//!
//! Native Discord snowflakes are exposed to the host as `dc_<snowflake>` so
//! they cannot collide with IDs minted by other adapters. Users and channels
//! share the prefix.

/// A prefix-based mapping between native IDs and host IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdNamespace {
    prefix: &'static str,
}

/// Namespace used by this adapter.
pub const DISCORD: IdNamespace = IdNamespace::new("dc_");

impl Default for IdNamespace {
    fn default() -> Self {
        DISCORD
    }
}

impl IdNamespace {
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    pub fn to_host_user(&self, native: &str) -> String {
        format!("{}{native}", self.prefix)
    }

    pub fn to_host_group(&self, native: &str) -> String {
        format!("{}{native}", self.prefix)
    }

    /// Native ID for `host`. Input without the prefix is returned unchanged.
    pub fn strip_prefix<'a>(&self, host: &'a str) -> &'a str {
        host.strip_prefix(self.prefix).unwrap_or(host)
    }

    /// Native ID for `host`, or `None` if `host` belongs to another namespace.
    pub fn try_strip_prefix<'a>(&self, host: &'a str) -> Option<&'a str> {
        host.strip_prefix(self.prefix).filter(|rest| !rest.is_empty())
    }

    pub fn owns(&self, host: &str) -> bool {
        self.try_strip_prefix(host).is_some()
    }
}
