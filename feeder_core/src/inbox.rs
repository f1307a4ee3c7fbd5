//! Hand-off of trigger requests from transport threads to the control loop.
//!
//! Transports (stdin reader, network handler, ...) own a `TriggerSender`
//! and never touch controller state. The controller drains its
//! `TriggerInbox` at the start of every tick, so admission decisions and
//! all mutation happen on the loop thread.
use crossbeam_channel as xch;

use crate::error::FeederError;
use crate::request::FeedRequest;
use crate::status::Admission;

/// Result of a trigger as seen by the transport.
pub type TriggerOutcome = Result<Admission, FeederError>;

/// A queued request plus an optional way to report the outcome.
#[derive(Debug)]
pub struct TriggerEnvelope {
    pub request: FeedRequest,
    reply: Option<xch::Sender<TriggerOutcome>>,
}

impl TriggerEnvelope {
    /// Deliver the outcome; a requester that stopped waiting is ignored.
    pub fn reply(self, outcome: TriggerOutcome) {
        if let Some(tx) = self.reply
            && tx.send(outcome).is_err()
        {
            tracing::debug!("trigger requester went away before the reply");
        }
    }
}

/// Create a bounded trigger channel.
pub fn trigger_channel(capacity: usize) -> (TriggerSender, TriggerInbox) {
    let (tx, rx) = xch::bounded(capacity.max(1));
    (TriggerSender { tx }, TriggerInbox { rx })
}

#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: xch::Sender<TriggerEnvelope>,
}

impl TriggerSender {
    /// Fire-and-forget submit. Fails when the inbox is full or closed.
    pub fn send(&self, request: FeedRequest) -> Result<(), FeederError> {
        self.push(TriggerEnvelope {
            request,
            reply: None,
        })
    }

    /// Submit and get a receiver for the outcome, delivered on the next tick.
    pub fn request(&self, request: FeedRequest) -> Result<xch::Receiver<TriggerOutcome>, FeederError> {
        let (tx, rx) = xch::bounded(1);
        self.push(TriggerEnvelope {
            request,
            reply: Some(tx),
        })?;
        Ok(rx)
    }

    fn push(&self, envelope: TriggerEnvelope) -> Result<(), FeederError> {
        self.tx.try_send(envelope).map_err(|e| match e {
            xch::TrySendError::Full(_) => FeederError::Io("trigger inbox full".into()),
            xch::TrySendError::Disconnected(_) => {
                FeederError::Io("feed controller is gone".into())
            }
        })
    }
}

#[derive(Debug)]
pub struct TriggerInbox {
    rx: xch::Receiver<TriggerEnvelope>,
}

impl TriggerInbox {
    /// Everything queued right now, without blocking.
    pub fn drain(&self) -> Vec<TriggerEnvelope> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
