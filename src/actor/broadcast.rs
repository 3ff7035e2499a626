use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

use crate::common::config::Config;
use crate::model::session::SessionKind;

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    ConfigChanged {
        #[serde(skip)]
        config: Box<Config>,
    },
    PermissionChanged {
        granted: bool,
    },
    SessionOpened {
        kind: SessionKind,
        item_count: usize,
    },
    SessionClosed {
        kind: SessionKind,
        committed: bool,
    },
}

type Subscriber = Arc<dyn Fn(&BroadcastEvent) + Send + Sync>;

/// A typed observer list owned by the composition root.
#[derive(Clone, Default)]
pub struct Broadcaster {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl Broadcaster {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&self, subscriber: impl Fn(&BroadcastEvent) + Send + Sync + 'static) {
        self.subscribers.write().push(Arc::new(subscriber));
    }

    /// Calls every subscriber in subscription order. Subscribers may publish
    /// or subscribe from inside the callback.
    pub fn publish(&self, event: BroadcastEvent) {
        let subscribers = self.subscribers.read().clone();
        trace!(?event, count = subscribers.len(), "broadcast");
        for subscriber in subscribers {
            subscriber(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize { self.subscribers.read().len() }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster").field("subscribers", &self.subscriber_count()).finish()
    }
}
