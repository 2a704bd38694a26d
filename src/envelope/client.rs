use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::instrument;

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use super::{config::EnvelopeConfig, error::EnvelopeError, *};

const RETIRED_CAPACITY: usize = 256;
const BROADCAST_CAPACITY: usize = 100;

enum Pending {
    Request(oneshot::Sender<Envelope>),
    Stream(mpsc::UnboundedSender<Envelope>),
}

#[derive(Default)]
struct PendingTable {
    entries: HashMap<String, Pending>,
    retired: VecDeque<String>,
    retired_ids: HashSet<String>,
}

impl PendingTable {
    /// Removes `id` and remembers it so late deliveries can be recognised.
    fn remove(&mut self, id: &str) -> Option<Pending> {
        let pending = self.entries.remove(id)?;
        if self.retired.len() == RETIRED_CAPACITY {
            if let Some(oldest) = self.retired.pop_front() {
                self.retired_ids.remove(&oldest);
            }
        }
        self.retired.push_back(id.to_string());
        self.retired_ids.insert(id.to_string());
        Some(pending)
    }
}

type SharedTable = Arc<Mutex<PendingTable>>;

fn lock(table: &SharedTable) -> MutexGuard<'_, PendingTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drops the pending entry once the waiting call returns, however it returns.
struct PendingGuard {
    id: String,
    table: SharedTable,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.table).remove(&self.id);
    }
}

/// Foreground side of the envelope protocol.
///
/// Correlates responses to requests through an explicit pending table and fans
/// every uncorrelated envelope out to broadcast subscribers.
#[derive(Clone)]
pub struct MessageClient {
    outbound: mpsc::Sender<Envelope>,
    pending: SharedTable,
    broadcasts: broadcast::Sender<Envelope>,
    config: EnvelopeConfig,
}

impl MessageClient {
    pub fn new(
        outbound: mpsc::Sender<Envelope>,
        inbound: mpsc::Receiver<Envelope>,
        config: EnvelopeConfig,
    ) -> Self {
        let (broadcasts, _) = broadcast::channel(BROADCAST_CAPACITY);
        let pending = SharedTable::default();
        tokio::spawn(route(inbound, Arc::clone(&pending), broadcasts.clone()));
        Self {
            outbound,
            pending,
            broadcasts,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.broadcasts.subscribe()
    }

    /// Sends `envelope` and waits for its terminal response.
    #[instrument(name = "message_client.send", skip_all, fields(kind = %envelope.kind), err)]
    pub async fn send(&self, envelope: Envelope) -> Result<Option<Value>, EnvelopeError> {
        let (tx, rx) = oneshot::channel();
        let (id, _guard) = self.transmit(envelope, Pending::Request(tx)).await?;
        let response = tokio::time::timeout(self.config.request_timeout, rx)
            .await
            .map_err(|_| EnvelopeError::Timeout(id))?
            .map_err(|_| EnvelopeError::HostUnavailable)?;
        into_payload(response)
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        kind: &str,
        payload: impl Serialize,
    ) -> Result<T, EnvelopeError> {
        let payload = serde_json::to_value(payload)?;
        let payload = if payload.is_null() { None } else { Some(payload) };
        let response = self.send(Envelope::request(kind, payload)).await?;
        Ok(serde_json::from_value(response.unwrap_or(Value::Null))?)
    }

    /// Like [`MessageClient::send`], handing every progress envelope to
    /// `on_progress` until the `terminal_kind` envelope or an error arrives.
    /// The timeout applies to each gap between envelopes.
    #[instrument(name = "message_client.stream", skip_all, fields(kind = %envelope.kind), err)]
    pub async fn stream<F>(
        &self,
        envelope: Envelope,
        terminal_kind: &str,
        mut on_progress: F,
    ) -> Result<Option<Value>, EnvelopeError>
    where
        F: FnMut(Envelope) + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, _guard) = self.transmit(envelope, Pending::Stream(tx)).await?;
        loop {
            let next = tokio::time::timeout(self.config.request_timeout, rx.recv())
                .await
                .map_err(|_| EnvelopeError::Timeout(id.clone()))?
                .ok_or(EnvelopeError::HostUnavailable)?;
            if next.is_terminal() || next.kind == terminal_kind {
                return into_payload(next);
            }
            on_progress(next);
        }
    }

    async fn transmit(
        &self,
        mut envelope: Envelope,
        pending: Pending,
    ) -> Result<(String, PendingGuard), EnvelopeError> {
        if envelope.id.is_empty() {
            envelope.id = new_id();
        }
        if envelope.tracing.is_empty() {
            envelope.tracing = crate::tracing::extract_tracing_data();
        }
        let id = envelope.id.clone();
        {
            let mut table = lock(&self.pending);
            if table.entries.contains_key(&id) {
                return Err(EnvelopeError::DuplicateId(id));
            }
            table.entries.insert(id.clone(), pending);
        }
        let guard = PendingGuard {
            id: id.clone(),
            table: Arc::clone(&self.pending),
        };
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| EnvelopeError::HostUnavailable)?;
        Ok((id, guard))
    }
}

fn into_payload(envelope: Envelope) -> Result<Option<Value>, EnvelopeError> {
    match envelope.success {
        Some(false) => Err(EnvelopeError::Remote(
            envelope
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string()),
        )),
        _ => Ok(envelope.payload),
    }
}

async fn route(
    mut inbound: mpsc::Receiver<Envelope>,
    table: SharedTable,
    broadcasts: broadcast::Sender<Envelope>,
) {
    while let Some(envelope) = inbound.recv().await {
        let mut pending = lock(&table);
        match pending.entries.get(&envelope.id) {
            Some(Pending::Request(_)) if envelope.is_terminal() => {
                if let Some(Pending::Request(tx)) = pending.remove(&envelope.id) {
                    let _ = tx.send(envelope);
                }
            }
            Some(Pending::Request(_)) => {
                tracing::debug!(id = %envelope.id, "ignoring progress for plain request");
            }
            Some(Pending::Stream(tx)) => {
                let tx = tx.clone();
                if envelope.is_terminal() {
                    pending.remove(&envelope.id);
                }
                let _ = tx.send(envelope);
            }
            None if pending.retired_ids.contains(&envelope.id) => {
                tracing::debug!(id = %envelope.id, "discarding late envelope");
            }
            None => {
                let _ = broadcasts.send(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_ids_are_bounded() {
        let mut table = PendingTable::default();
        for n in 0..(RETIRED_CAPACITY + 10) {
            let (tx, _rx) = oneshot::channel();
            table.entries.insert(n.to_string(), Pending::Request(tx));
            assert!(table.remove(&n.to_string()).is_some());
        }
        assert_eq!(table.retired.len(), RETIRED_CAPACITY);
        assert!(!table.retired_ids.contains("0"));
        assert!(table.retired_ids.contains(&(RETIRED_CAPACITY + 9).to_string()));
        assert!(table.remove("0").is_none());
    }
}
