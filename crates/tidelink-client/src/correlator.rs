//! Pending-request correlation.
//!
//! Commands go out, responses come back on a paired channel; the
//! correlator matches them up. The map key is `(response BST ID, command
//! ID)` packed into 64 bits with the high bits held in reserve, so a later
//! revision can scope keys by device serial without changing the map.
//!
//! Any thread may register (command issuers); the session's receive task
//! correlates, sweeps timeouts, and clears on shutdown. The map sits
//! behind a mutex, and completions always fire with the lock released:
//! entry removal under the lock is the exactly-once point, whichever of
//! response, timeout, or cancellation gets there first wins, and the
//! losers find the map empty.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use tidelink_proto::{bem, BemResponse};
use tokio::sync::oneshot;

use crate::error::{CancelReason, ClientError};

/// Completion side of one pending request.
pub type Responder = oneshot::Sender<Result<BemResponse, ClientError>>;

/// Correlation key: response BST ID and command ID packed into the low 16
/// bits of a 64-bit value. High bits reserved for future scoping by
/// channel or device serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey(u64);

impl PendingKey {
    /// Key for a response channel and command ID.
    #[must_use]
    pub fn new(response_bst_id: u8, bem_id: u8) -> Self {
        Self((u64::from(response_bst_id) << 8) | u64::from(bem_id))
    }

    /// Key the response to a command sent on `command_bst_id` will match.
    #[must_use]
    pub fn for_command(command_bst_id: u8, bem_id: u8) -> Self {
        Self::new(bem::response_id_for(command_bst_id), bem_id)
    }
}

#[derive(Debug)]
struct PendingRequest {
    sent_at: Instant,
    timeout: Duration,
    #[allow(dead_code)] // reserved for device-side echo diagnostics
    sequence_id: u8,
    responder: Responder,
}

#[derive(Debug, Default)]
struct Inner {
    pending: HashMap<PendingKey, PendingRequest>,
    next_sequence: u8,
}

/// Thread-safe map of in-flight commands.
#[derive(Debug, Default)]
pub struct Correlator {
    inner: Mutex<Inner>,
}

impl Correlator {
    /// Empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command about to be written, reserving a sequence ID for
    /// device-side logging. Correlation itself is by key alone; firmware
    /// may omit or alter the echoed sequence.
    ///
    /// At most one request may be outstanding per key: an earlier entry
    /// with the same key is displaced and fails with
    /// `Canceled(DuplicateRequest)`.
    pub fn register(
        &self,
        command_bst_id: u8,
        bem_id: u8,
        timeout: Duration,
        responder: Responder,
    ) -> u8 {
        let key = PendingKey::for_command(command_bst_id, bem_id);
        let (sequence_id, displaced) = {
            let mut inner = self.lock();
            let sequence_id = inner.next_sequence;
            inner.next_sequence = inner.next_sequence.wrapping_add(1);
            let displaced = inner.pending.insert(
                key,
                PendingRequest { sent_at: Instant::now(), timeout, sequence_id, responder },
            );
            (sequence_id, displaced)
        };

        if let Some(old) = displaced {
            tracing::warn!(?key, "pending request displaced by duplicate");
            let _ = old.responder.send(Err(ClientError::Canceled(CancelReason::DuplicateRequest)));
        }
        sequence_id
    }

    /// Match a decoded response against the pending map. `Some` hands back
    /// the responder (the entry is already gone); `None` means the
    /// response is unsolicited.
    pub fn correlate(&self, response: &BemResponse) -> Option<Responder> {
        let key = PendingKey::new(response.bst_id, response.header.bem_id());
        self.lock().pending.remove(&key).map(|p| p.responder)
    }

    /// Remove a pending entry and fail it with `err`. Returns whether an
    /// entry existed. Used when the command write itself fails.
    pub fn fail(&self, command_bst_id: u8, bem_id: u8, err: ClientError) -> bool {
        let key = PendingKey::for_command(command_bst_id, bem_id);
        let removed = self.lock().pending.remove(&key);
        match removed {
            Some(p) => {
                let _ = p.responder.send(Err(err));
                true
            },
            None => false,
        }
    }

    /// Expire every entry whose timeout has elapsed at `now`. Callbacks
    /// fire after the lock is released.
    pub fn process_timeouts(&self, now: Instant) {
        let expired: Vec<PendingRequest> = {
            let mut inner = self.lock();
            let keys: Vec<PendingKey> = inner
                .pending
                .iter()
                .filter(|(_, p)| now.duration_since(p.sent_at) >= p.timeout)
                .map(|(k, _)| *k)
                .collect();
            keys.iter().filter_map(|k| inner.pending.remove(k)).collect()
        };

        for request in expired {
            let _ = request
                .responder
                .send(Err(ClientError::Timeout { elapsed: request.timeout }));
        }
    }

    /// Remove every entry and fail it with `Canceled(reason)`.
    pub fn clear_all(&self, reason: CancelReason) {
        let drained: Vec<PendingRequest> = {
            let mut inner = self.lock();
            inner.pending.drain().map(|(_, p)| p).collect()
        };
        for request in drained {
            let _ = request.responder.send(Err(ClientError::Canceled(reason)));
        }
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// A poisoned map would only mean a panic mid-insert on another
    /// thread; the data itself is always consistent, so keep going.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.clear_all(CancelReason::SessionClosed);
    }
}

#[cfg(test)]
mod tests {
    use tidelink_proto::BemResponseHeader;

    use super::*;

    fn response(bst_id: u8, bem_id: u8) -> BemResponse {
        let header = BemResponseHeader::new(bem_id, 0, 0x000E, 42, 0);
        BemResponse::decode(bst_id, header.to_bytes().to_vec().into()).unwrap()
    }

    #[test]
    fn correlates_by_paired_response_id() {
        let correlator = Correlator::new();
        let (tx, mut rx) = oneshot::channel();
        correlator.register(0xA1, 0x11, Duration::from_secs(5), tx);
        assert_eq!(correlator.pending_len(), 1);

        // The paired channel matches, another one does not.
        assert!(correlator.correlate(&response(0xA2, 0x11)).is_none());
        let responder = correlator.correlate(&response(0xA0, 0x11)).unwrap();
        assert_eq!(correlator.pending_len(), 0);

        let reply = response(0xA0, 0x11);
        responder.send(Ok(reply.clone())).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Ok(reply));
    }

    #[test]
    fn sequence_ids_increment_and_wrap() {
        let correlator = Correlator::new();
        let mut last = None;
        for i in 0..300u32 {
            let (tx, _rx) = oneshot::channel();
            let seq = correlator.register(0xA1, (i % 200) as u8, Duration::from_secs(5), tx);
            if let Some(prev) = last {
                assert_eq!(seq, u8::wrapping_add(prev, 1));
            }
            last = Some(seq);
        }
    }

    #[test]
    fn duplicate_key_displaces_earlier_entry() {
        let correlator = Correlator::new();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();

        correlator.register(0xA1, 0x11, Duration::from_secs(5), tx1);
        correlator.register(0xA1, 0x11, Duration::from_secs(5), tx2);

        assert_eq!(correlator.pending_len(), 1);
        assert_eq!(
            rx1.try_recv().unwrap(),
            Err(ClientError::Canceled(CancelReason::DuplicateRequest))
        );
        // The second registration is the live one.
        assert!(rx2.try_recv().is_err());
        assert!(correlator.correlate(&response(0xA0, 0x11)).is_some());
    }

    #[test]
    fn timeouts_fire_exactly_once() {
        let correlator = Correlator::new();
        let (tx, mut rx) = oneshot::channel();
        correlator.register(0xA1, 0x11, Duration::from_millis(100), tx);

        let registered = Instant::now();
        correlator.process_timeouts(registered + Duration::from_millis(50));
        assert_eq!(correlator.pending_len(), 1);

        correlator.process_timeouts(registered + Duration::from_millis(150));
        assert_eq!(correlator.pending_len(), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(ClientError::Timeout { elapsed: Duration::from_millis(100) })
        );

        // A later sweep has nothing left to fire.
        correlator.process_timeouts(registered + Duration::from_secs(10));
    }

    #[test]
    fn late_response_after_timeout_is_unsolicited() {
        let correlator = Correlator::new();
        let (tx, _rx) = oneshot::channel();
        correlator.register(0xA1, 0x11, Duration::from_millis(10), tx);
        correlator.process_timeouts(Instant::now() + Duration::from_secs(1));

        assert!(correlator.correlate(&response(0xA0, 0x11)).is_none());
    }

    #[test]
    fn clear_all_cancels_everything() {
        let correlator = Correlator::new();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        correlator.register(0xA1, 0x11, Duration::from_secs(5), tx1);
        correlator.register(0xA1, 0x12, Duration::from_secs(5), tx2);

        correlator.clear_all(CancelReason::SessionClosed);
        assert_eq!(correlator.pending_len(), 0);
        assert_eq!(
            rx1.try_recv().unwrap(),
            Err(ClientError::Canceled(CancelReason::SessionClosed))
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            Err(ClientError::Canceled(CancelReason::SessionClosed))
        );
    }

    #[test]
    fn unknown_command_channel_defaults_to_primary_pair() {
        assert_eq!(PendingKey::for_command(0x77, 0x11), PendingKey::new(0xA0, 0x11));
    }

    mod properties {
        use std::collections::HashSet;

        use proptest::prelude::*;

        use super::*;

        proptest! {
            // The map never holds more than one entry per correlation key,
            // however registrations arrive.
            #[test]
            fn at_most_one_entry_per_key(
                commands in prop::collection::vec((any::<u8>(), any::<u8>()), 1..64)
            ) {
                let correlator = Correlator::new();
                for (command_bst_id, bem_id) in &commands {
                    let (tx, _rx) = oneshot::channel();
                    correlator.register(*command_bst_id, *bem_id, Duration::from_secs(5), tx);
                }

                let distinct: HashSet<PendingKey> = commands
                    .iter()
                    .map(|(c, b)| PendingKey::for_command(*c, *b))
                    .collect();
                prop_assert_eq!(correlator.pending_len(), distinct.len());
            }
        }
    }
}
