use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    pub kind: ToastKind,
    pub title: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title: None,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// In-memory toast queue, newest first.
pub struct ToastStore {
    toasts: Vec<Toast>,
    max_toasts: usize,
}

impl ToastStore {
    pub fn new() -> Self {
        Self {
            toasts: Vec::new(),
            max_toasts: 20,
        }
    }

    /// Push a toast and return its id.
    pub fn push(&mut self, toast: Toast) -> String {
        let id = toast.id.clone();
        self.toasts.insert(0, toast);
        if self.toasts.len() > self.max_toasts {
            self.toasts.truncate(self.max_toasts);
        }
        id
    }

    /// Remove a toast. Returns it if it was still queued.
    pub fn dismiss(&mut self, id: &str) -> Option<Toast> {
        let pos = self.toasts.iter().position(|t| t.id == id)?;
        Some(self.toasts.remove(pos))
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.first()
    }

    pub fn all(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

impl Default for ToastStore {
    fn default() -> Self {
        Self::new()
    }
}
