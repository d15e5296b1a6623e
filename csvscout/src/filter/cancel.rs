use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Creates a linked cancel handle and observer.
///
/// Nothing is ever sent on the underlying channel; dropping the sender
/// disconnects it, which every observer sees both from a non-blocking check
/// and as a ready arm inside `select!`.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = bounded(0);
    (CancelHandle { tx: Some(tx) }, Cancellation { rx })
}

/// Owned by the orchestrator. Dropping it also cancels.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    pub fn cancel(&mut self) {
        self.tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Cloned into every worker
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: Receiver<()>,
}

impl Cancellation {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Becomes ready once cancelled; for use as a `select!` arm
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let (mut handle, observer) = cancellation();
        let clone = observer.clone();
        assert!(!observer.is_cancelled());
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(observer.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_drop_cancels() {
        let (handle, observer) = cancellation();
        drop(handle);
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_cancel_wakes_blocked_select() {
        let (mut handle, observer) = cancellation();
        let (tx, _rx) = bounded::<u32>(0);

        let waiter = std::thread::spawn(move || {
            select! {
                send(tx, 1) -> _ => false,
                recv(observer.receiver()) -> _ => true,
            }
        });

        std::thread::sleep(Duration::from_millis(20));
        handle.cancel();
        assert!(waiter.join().unwrap());
    }
}
