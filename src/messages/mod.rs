// Flash messages
// One-shot notices stored in the `messages` session section until read

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::session::SessionSection;

pub const MESSAGES_SECTION: &str = "messages";

/// Unread messages kept per kind; older ones are dropped first
pub const MAX_PER_KIND: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Info,
    Warning,
    Danger,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Success,
        MessageKind::Info,
        MessageKind::Warning,
        MessageKind::Danger,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Success => "success",
            MessageKind::Info => "info",
            MessageKind::Warning => "warning",
            MessageKind::Danger => "danger",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

pub struct Messages {
    section: SessionSection,
}

impl Messages {
    pub fn new(section: SessionSection) -> Self {
        Self { section }
    }

    pub fn add(&self, text: impl Into<String>, kind: MessageKind) {
        let key = kind.as_str();
        let mut texts: Vec<String> = self.section.get(key).unwrap_or_default();
        texts.push(text.into());
        if texts.len() > MAX_PER_KIND {
            let overflow = texts.len() - MAX_PER_KIND;
            texts.drain(..overflow);
        }
        if let Err(e) = self.section.set(key, &texts) {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.add(text, MessageKind::Info);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.add(text, MessageKind::Success);
    }

    pub fn warning(&self, text: impl Into<String>) {
        self.add(text, MessageKind::Warning);
    }

    pub fn danger(&self, text: impl Into<String>) {
        self.add(text, MessageKind::Danger);
    }

    /// Peek at pending messages grouped by kind
    pub fn pending(&self) -> BTreeMap<MessageKind, Vec<String>> {
        MessageKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.section
                    .get::<Vec<String>>(kind.as_str())
                    .filter(|texts| !texts.is_empty())
                    .map(|texts| (kind, texts))
            })
            .collect()
    }

    /// Return all pending messages and forget them
    pub fn take(&self) -> Vec<Message> {
        let messages = self
            .pending()
            .into_iter()
            .flat_map(|(kind, texts)| texts.into_iter().map(move |text| Message { kind, text }))
            .collect();
        self.section.clear();
        messages
    }
}
