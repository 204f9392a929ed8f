// Cancellation signal for blocking allocation batches

use tokio::sync::watch;

/// Checked between units of blocking work
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Token that is never cancelled
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Cancel side of the pair
pub struct CancelSender {
    tx: watch::Sender<bool>,
}

impl CancelSender {
    pub fn cancel(&self) {
        // send_replace never fails, even with every token dropped
        self.tx.send_replace(true);
    }
}

/// Create a cancellation pair
pub fn cancel_channel() -> (CancelSender, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSender { tx }, CancelToken { rx })
}
