use std::sync::mpsc::{SyncSender, TrySendError};

use betterhist_engine::TapEvent;

/// Non-blocking copy of the byte streams for the recorder.
///
/// The pumps must never wait on the recorder, so every offer is a `try_send`.
/// Chunks that do not fit are dropped and counted; the next event that gets
/// through is preceded by a `Gap` carrying the dropped byte count.
pub struct Tap {
    tx: Option<SyncSender<TapEvent>>,
    dropped: u64,
    warned: bool,
}

impl Tap {
    pub fn new(tx: SyncSender<TapEvent>) -> Self {
        Self {
            tx: Some(tx),
            dropped: 0,
            warned: false,
        }
    }

    /// A tap that discards everything; used when the session is not recorded.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: 0,
            warned: false,
        }
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped
    }

    pub fn offer(&mut self, event: TapEvent) {
        if self.tx.is_none() {
            return;
        }

        if self.dropped > 0 {
            let gap = TapEvent::Gap {
                dropped_bytes: self.dropped,
            };
            if self.try_send(gap).is_some() {
                self.count_dropped(&event);
                return;
            }
            tracing::debug!(dropped_bytes = self.dropped, "reported tap gap");
            self.dropped = 0;
            self.warned = false;
        }

        if let Some(event) = self.try_send(event) {
            self.count_dropped(&event);
        }
    }

    /// Hands the event back when it was not delivered.
    fn try_send(&mut self, event: TapEvent) -> Option<TapEvent> {
        let Some(tx) = &self.tx else {
            return Some(event);
        };

        match tx.try_send(event) {
            Ok(()) => None,
            Err(TrySendError::Full(event)) => Some(event),
            Err(TrySendError::Disconnected(event)) => {
                tracing::warn!("recorder is gone; recording disabled for the rest of the session");
                self.tx = None;
                Some(event)
            }
        }
    }

    fn count_dropped(&mut self, event: &TapEvent) {
        if self.tx.is_none() {
            return;
        }
        let bytes = match event {
            TapEvent::Output(bytes) | TapEvent::Input(bytes) => bytes.len() as u64,
            _ => 0,
        };
        self.dropped += bytes;
        if !self.warned {
            tracing::warn!("tap channel full; dropping chunks until the recorder catches up");
            self.warned = true;
        }
    }
}
