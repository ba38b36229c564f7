//! Transient notifications ("toasts").
//!
//! A toast is a one-line message that lives for a few seconds. The
//! presentation layer decides how to draw them; this module only keeps the
//! queue and ages entries out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a toast stays visible.
pub const DEFAULT_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    pub created_at: Instant,
}

/// Shared toast queue. Clones share the same queue.
#[derive(Debug, Clone)]
pub struct Toasts {
    queue: Arc<Mutex<VecDeque<Toast>>>,
    ttl: Duration,
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Toasts {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Toast>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, level: ToastLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ToastLevel::Error => tracing::warn!(message = %message, "Error toast"),
            ToastLevel::Info | ToastLevel::Success => tracing::info!(message = %message, "Toast"),
        }
        self.lock().push_back(Toast {
            level,
            message,
            created_at: Instant::now(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(ToastLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(ToastLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(ToastLevel::Error, message);
    }

    /// Toasts still visible at `now`. Expired ones are dropped.
    #[must_use]
    pub fn active(&self, now: Instant) -> Vec<Toast> {
        let mut queue = self.lock();
        queue.retain(|toast| now.saturating_duration_since(toast.created_at) < self.ttl);
        queue.iter().cloned().collect()
    }

    /// Remove and return every queued toast.
    pub fn drain(&self) -> Vec<Toast> {
        self.lock().drain(..).collect()
    }
}
