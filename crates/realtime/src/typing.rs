//! Ephemeral typing presence with server-owned expiry timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_database::Thread;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::ServerEvent;
use crate::router::RoomRouter;

/// Tracks who is typing in which thread and clears stale signals on its
/// own: every active signal arms (or re-arms) an expiry timer, and when
/// the timer fires without a refresh the signaler broadcasts the implicit
/// "stopped typing" itself. Nothing here is persisted; state dies with
/// the process, which is fine for an advisory signal.
#[derive(Clone)]
pub struct TypingSignaler {
    router: Arc<RoomRouter>,
    ttl: Duration,
    timers: Arc<Mutex<HashMap<(i64, String), JoinHandle<()>>>>,
}

impl TypingSignaler {
    pub fn new(router: Arc<RoomRouter>, ttl: Duration) -> Self {
        Self {
            router,
            ttl,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a typing signal. One live signal per (thread, actor): a new
    /// signal replaces the pending timer rather than queueing behind it.
    /// An explicit stop cancels the timer and broadcasts immediately.
    pub fn set_typing(&self, thread: &Thread, actor_id: &str, is_active: bool) {
        let key = (thread.id, actor_id.to_string());

        if !is_active {
            if let Some(handle) = self.timers.lock().expect("typing timers poisoned").remove(&key)
            {
                handle.abort();
            }
            self.broadcast(thread.id, &thread.public_id, actor_id, false);
            return;
        }

        self.broadcast(thread.id, &thread.public_id, actor_id, true);

        let router = self.router.clone();
        let timers = self.timers.clone();
        let ttl = self.ttl;
        let timer_key = key.clone();
        let thread_id = thread.id;
        let thread_public_id = thread.public_id.clone();
        let actor = actor_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            // Remove our own entry first so a signal racing the expiry
            // sees a clean slate; a stray trailing stop is harmless.
            timers.lock().expect("typing timers poisoned").remove(&timer_key);
            debug!(thread_id, actor = %actor, "typing signal expired");
            let event = ServerEvent::Typing {
                thread_id: thread_public_id,
                actor: actor.clone(),
                is_active: false,
            };
            router.broadcast(thread_id, &event, Some(&actor));
        });

        if let Some(previous) = self
            .timers
            .lock()
            .expect("typing timers poisoned")
            .insert(key, handle)
        {
            previous.abort();
        }
    }

    fn broadcast(&self, thread_id: i64, thread_public_id: &str, actor_id: &str, is_active: bool) {
        let event = ServerEvent::Typing {
            thread_id: thread_public_id.to_string(),
            actor: actor_id.to_string(),
            is_active,
        };
        self.router.broadcast(thread_id, &event, Some(actor_id));
    }

    #[cfg(test)]
    fn pending_timers(&self) -> usize {
        self.timers.lock().unwrap().len()
    }
}
