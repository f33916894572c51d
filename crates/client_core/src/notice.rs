use std::time::{Duration, Instant};

pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient feedback shown after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

/// Holds at most one notice; a newer notice replaces the current one and
/// restarts the timeout.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: Option<(Notice, Instant)>,
}

impl NoticeBoard {
    pub fn show(&mut self, notice: Notice, now: Instant) {
        self.current = Some((notice, now + NOTICE_TTL));
    }

    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(notice, _)| notice)
    }

    /// Drops an expired notice; returns `true` if one was removed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some((_, expires_at)) if now >= *expires_at => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.current
            .as_ref()
            .map(|(_, expires_at)| expires_at.saturating_duration_since(now))
    }
}
