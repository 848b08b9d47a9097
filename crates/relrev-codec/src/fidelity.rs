use std::fmt;

/// Issue text length kept by the lossy encodings.
pub const DEFAULT_TRUNCATED_TEXT_LEN: usize = 500;

/// How much detail an encoding keeps.
///
/// Ordered from most to least faithful; each step drops strictly more than
/// the one before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fidelity {
    /// Every field of every record.
    Full,
    /// Issue text cut to `text_limit` characters, attachment metadata dropped.
    Truncated { text_limit: usize },
    /// As `Truncated`, and only the most recent record per item.
    LatestOnly { text_limit: usize },
}

impl Fidelity {
    /// The encodings tried, in order, before giving a partition up.
    pub fn ladder(text_limit: usize) -> [Fidelity; 3] {
        [
            Self::Full,
            Self::Truncated { text_limit },
            Self::LatestOnly { text_limit },
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Truncated { .. } => "truncated",
            Self::LatestOnly { .. } => "latest-only",
        }
    }

    pub fn text_limit(&self) -> Option<usize> {
        match self {
            Self::Full => None,
            Self::Truncated { text_limit } | Self::LatestOnly { text_limit } => Some(*text_limit),
        }
    }

    pub fn keeps_attachments(&self) -> bool {
        matches!(self, Self::Full)
    }

    pub fn keeps_history(&self) -> bool {
        !matches!(self, Self::LatestOnly { .. })
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// First `limit` characters of `text`.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}
