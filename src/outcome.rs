use std::fmt;

/// The result of resolving a probe permission against a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The most specific matching entry grants the probe.
    Allow,
    /// The most specific matching entry is negated.
    Deny,
    /// No entry matched; the caller decides the default.
    Unknown,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
            Outcome::Unknown => "unknown",
        })
    }
}
