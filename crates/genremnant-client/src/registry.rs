use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

use genremnant_types::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Reactions,
    Comments,
    Posts,
}

impl Topic {
    /// Topic an event is delivered under, if it concerns a post.
    pub fn of(event: &ServerEvent) -> Option<(Topic, Uuid)> {
        match event {
            ServerEvent::ReactionUpdate(u) => Some((Topic::Reactions, u.post_id)),
            ServerEvent::CommentUpdate(u) => Some((Topic::Comments, u.post_id)),
            ServerEvent::PostUpdate(u) => Some((Topic::Posts, u.post_id)),
            ServerEvent::Connected { .. } | ServerEvent::Pong { .. } => None,
        }
    }
}

pub type Callback = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Callbacks keyed by topic and post, invoked in registration order.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<(Topic, Uuid), Vec<Callback>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic, post_id: Uuid, callback: Callback) {
        self.lock().entry((topic, post_id)).or_default().push(callback);
    }

    /// Remove the first registration of exactly this callback.
    pub fn unsubscribe(&self, topic: Topic, post_id: Uuid, callback: &Callback) -> bool {
        let mut map = self.lock();
        let Some(callbacks) = map.get_mut(&(topic, post_id)) else {
            return false;
        };
        let Some(index) = callbacks.iter().position(|cb| Arc::ptr_eq(cb, callback)) else {
            return false;
        };
        callbacks.remove(index);
        if callbacks.is_empty() {
            map.remove(&(topic, post_id));
        }
        true
    }

    /// Invoke every callback registered for the event's post. Returns how many ran.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let Some(key) = Topic::of(event) else {
            return 0;
        };
        // Callbacks may (un)subscribe, so run them outside the lock
        let callbacks = match self.lock().get(&key) {
            Some(callbacks) => callbacks.clone(),
            None => return 0,
        };
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self, topic: Topic, post_id: Uuid) -> usize {
        self.lock().get(&(topic, post_id)).map_or(0, Vec::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(Topic, Uuid), Vec<Callback>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
