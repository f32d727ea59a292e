use std::{fmt, sync::Arc, time::Duration};

use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Loading,
    Success,
    Failure,
    Info,
}

/// A user-visible status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: Uuid,
    pub kind: NoticeKind,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            NoticeKind::Loading => "…",
            NoticeKind::Success => "✓",
            NoticeKind::Failure => "✗",
            NoticeKind::Info => "i",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Holds the single notice currently on screen.
///
/// A newer notice always replaces the current one. A flashed notice clears
/// itself after its lifetime, unless something else was shown meanwhile.
#[derive(Clone)]
pub struct NoticeBoard {
    tx: Arc<watch::Sender<Option<Notice>>>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Show a notice that stays until replaced or cleared.
    pub fn show(&self, kind: NoticeKind, message: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        self.tx.send_replace(Some(Notice {
            id,
            kind,
            message: message.into(),
        }));
        id
    }

    /// Show a notice that clears itself after `ttl`.
    pub fn flash(&self, kind: NoticeKind, message: impl Into<String>, ttl: Duration) -> Uuid {
        let id = self.show(kind, message);
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            tx.send_if_modified(|current| {
                if current.as_ref().map(|n| n.id) == Some(id) {
                    *current = None;
                    true
                } else {
                    false
                }
            });
        });
        id
    }

    pub fn current(&self) -> Option<Notice> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Notice>> {
        self.tx.subscribe()
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Hand every notice shown from now on to `sink`, on a background task.
    pub fn echo<F>(&self, mut sink: F) -> NoticeEcho
    where
        F: FnMut(&Notice) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let (stop, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let notice = rx.borrow_and_update().clone();
                        if let Some(notice) = notice {
                            sink(&notice);
                        }
                    }
                    _ = &mut stopped => {
                        if rx.has_changed().unwrap_or(false) {
                            let notice = rx.borrow_and_update().clone();
                            if let Some(notice) = notice {
                                sink(&notice);
                            }
                        }
                        break;
                    }
                }
            }
        });
        NoticeEcho { stop, task }
    }
}

/// Running echo started by [`NoticeBoard::echo`].
pub struct NoticeEcho {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl NoticeEcho {
    /// Stop echoing. A notice shown but not yet handed over is delivered
    /// before this returns.
    pub async fn finish(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Notice echo task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn flashed_notice_clears_after_ttl() {
        let board = NoticeBoard::new();
        board.flash(NoticeKind::Success, "Success!", Duration::from_secs(2));
        assert_eq!(board.current().unwrap().message, "Success!");

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(board.current().is_some());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(board.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_does_not_clear_a_newer_notice() {
        let board = NoticeBoard::new();
        board.flash(NoticeKind::Info, "Data hasn't changed", Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(1)).await;
        board.show(NoticeKind::Loading, "Loading...");

        tokio::time::sleep(Duration::from_secs(5)).await;
        let current = board.current().unwrap();
        assert_eq!(current.kind, NoticeKind::Loading);
        assert_eq!(current.to_string(), "[…] Loading...");
    }

    #[tokio::test]
    async fn finished_echo_still_delivers_the_last_notice() {
        let board = NoticeBoard::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let echo = {
            let seen = Arc::clone(&seen);
            board.echo(move |notice| seen.lock().unwrap().push(notice.message.clone()))
        };

        // Shown right before finishing, with no await in between.
        board.flash(NoticeKind::Info, "Data hasn't changed", Duration::from_secs(2));
        echo.finish().await;

        assert_eq!(*seen.lock().unwrap(), ["Data hasn't changed"]);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let board = NoticeBoard::new();
        let mut rx = board.subscribe();
        board.show(NoticeKind::Failure, "HTTP error status: 500");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().kind, NoticeKind::Failure);

        board.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
