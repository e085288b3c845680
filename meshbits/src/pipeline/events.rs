use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};

use crate::entities::LayerSnapshot;
use crate::pipeline::{MeshState, OptimizationReport};
use crate::strategy::OptimizeOutcome;
use crate::util::lock;

/// Notification of a state transition of a mesh, or of one of its layers.
#[derive(Clone, Debug)]
pub struct MeshMessage {
    pub state: MeshState,
    pub payload: EventPayload,
}

/// Data attached to a [`MeshMessage`]
#[derive(Clone, Debug)]
pub enum EventPayload {
    None,
    /// A layer changed, the snapshot is its state right after the change
    Layer {
        index: usize,
        snapshot: Arc<LayerSnapshot>,
    },
    LayerOptimized {
        index: usize,
        outcome: OptimizeOutcome,
    },
    Optimization(Arc<OptimizationReport>),
    Failure {
        reason: String,
    },
    /// The operation was cancelled and the mesh is back in its previous stable state
    Cancelled,
}

/// Callback registered on an [`EventBus`]
pub type EventCallback = Box<dyn Fn(&MeshMessage) + Send + Sync>;

/// Publish/subscribe registry delivering every [`MeshMessage`] to all subscribers, in registration order.
///
/// Callbacks run on the thread publishing the message (usually a worker of the pool)
/// and must not subscribe to the same bus.
#[derive(Default)]
pub struct EventBus {
    callbacks: Mutex<Vec<EventCallback>>,
    senders: Mutex<Vec<Sender<MeshMessage>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&MeshMessage) + Send + Sync + 'static) {
        lock(&self.callbacks).push(Box::new(callback));
    }

    /// Subscribes through a channel, messages can be received on any thread
    pub fn subscribe_channel(&self) -> Receiver<MeshMessage> {
        let (tx, rx) = channel();
        lock(&self.senders).push(tx);
        rx
    }

    pub fn publish(&self, message: MeshMessage) {
        {
            let callbacks = lock(&self.callbacks);
            for callback in callbacks.iter() {
                callback(&message);
            }
        }
        // receivers that were dropped are unsubscribed
        lock(&self.senders).retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn n_subscribers(&self) -> usize {
        lock(&self.callbacks).len() + lock(&self.senders).len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("n_subscribers", &self.n_subscribers())
            .finish()
    }
}
