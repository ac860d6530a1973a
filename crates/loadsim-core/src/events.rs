//! Observable engine events, intended for a rendering layer. Engine
//! correctness never depends on a subscriber being attached.

use crossbeam_channel::Sender;

use crate::topology::{ClientId, ServerId};
use crate::workload::RequestId;

/// A state transition worth surfacing to a host UI.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum SimEvent {
    /// A client handed a request to the load balancer.
    RequestSent { client: ClientId, request: RequestId },
    /// A server pulled an item from its backlog into processing.
    ItemDispatched { server: ServerId, item: RequestId },
    /// The in-flight item finished.
    ItemCompleted { item: RequestId },
    /// An item exceeded its deadline and was discarded.
    ItemTimedOut { item: RequestId },
}

/// Fan-out point for [`SimEvent`]s. Holds at most one subscriber; a
/// disconnected subscriber is dropped on the next emit.
#[derive(Debug, Default)]
pub struct EventSink {
    subscriber: Option<Sender<SimEvent>>,
}

impl EventSink {
    /// Attaches a subscriber, replacing any previous one.
    pub fn attach(&mut self, sender: Sender<SimEvent>) {
        self.subscriber = Some(sender);
    }

    pub(crate) fn emit(&mut self, event: SimEvent) {
        if let Some(subscriber) = &self.subscriber {
            if subscriber.send(event).is_err() {
                self.subscriber = None;
            }
        }
    }
}
