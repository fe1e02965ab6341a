use std::fmt;

/// What a load reads from: a location to fetch, or the markup itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntrySource {
    Location(String),
    Markup(String),
}

impl EntrySource {
    /// Strings with their own protocol (`scheme://`) are locations; anything
    /// else, including protocol-relative `//host/...`, is literal markup.
    pub fn parse(entry: &str) -> Self {
        if net::has_own_protocol(entry) {
            EntrySource::Location(entry.trim().to_string())
        } else {
            EntrySource::Markup(entry.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntrySource::Location(s) | EntrySource::Markup(s) => s,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            EntrySource::Location(url) => Some(url),
            EntrySource::Markup(_) => None,
        }
    }
}

impl From<&str> for EntrySource {
    fn from(entry: &str) -> Self {
        Self::parse(entry)
    }
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
