//! Admin notices.
//!
//! Handlers return request-scoped [`Notice`]s. Notices that must survive until the next
//! admin page render are pushed to the store as [`StoredNotice`]s; one-shot notices are
//! marked consumed when shown, standing notices stay until dismissed.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Error,
    Warning,
    Success,
}

impl NoticeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeLevel::Error => "error",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Success => "success",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "error" => Some(NoticeLevel::Error),
            "warning" => Some(NoticeLevel::Warning),
            "success" => Some(NoticeLevel::Success),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Survives being shown; cleared only by an explicit dismiss.
    #[serde(default)]
    pub standing: bool,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            standing: false,
        }
    }

    pub fn standing(mut self) -> Self {
        self.standing = true;
        self
    }
}

/// A notice as persisted by a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNotice {
    pub id: u64,
    pub notice: Notice,
    pub consumed: bool,
}
