use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;

use std::future::Future;

/// Handle to a spawned listener; cancelling or dropping it stops the listener.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Drives `stream` to completion on its own task, handing every item to `on_item`.
    pub fn spawn<S, T, F, Fut>(stream: S, mut on_item: F) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let handle = tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                on_item(item).await;
            }
        });
        Self { handle }
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn cancel_stops_delivery() -> anyhow::Result<()> {
        let (tx, rx) = mpsc::unbounded_channel::<u32>();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let subscription = Subscription::spawn(UnboundedReceiverStream::new(rx), move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tx.send(1)?;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.cancel();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(tx.send(2).is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
