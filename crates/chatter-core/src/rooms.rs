//! Named rooms, each backed by its own [`Hub`].
//!
//! Rooms are created lazily when a subscriber first asks for them. Publishing
//! to a room nobody has opened yet is not an error; there is simply nobody to
//! deliver to.

use crate::hub::{Hub, Registration, SkipReport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the room that always exists.
pub const DEFAULT_ROOM: &str = "lobby";

/// Maximum room name length.
pub const MAX_ROOM_NAME_LENGTH: usize = 64;

/// A room name.
pub type RoomName = String;

/// Validate a room name.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Room name cannot be empty");
    }
    if name.len() > MAX_ROOM_NAME_LENGTH {
        return Err("Room name too long");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("Room name contains invalid characters");
    }
    Ok(())
}

/// Room errors.
#[derive(Debug, Error)]
pub enum RoomsError {
    /// Invalid room name.
    #[error("Invalid room name: {0}")]
    InvalidRoom(&'static str),

    /// Maximum number of rooms reached.
    #[error("Maximum rooms reached")]
    MaxRoomsReached,
}

/// Room registry configuration.
#[derive(Debug, Clone)]
pub struct RoomsConfig {
    /// Maximum number of rooms, the default room included.
    pub max_rooms: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self { max_rooms: 1_000 }
    }
}

/// Registry of rooms.
pub struct Rooms {
    hubs: DashMap<RoomName, Arc<Hub>>,
    lobby: Arc<Hub>,
    // Rooms created, default room included. Reserved before insertion so the
    // limit holds under concurrent creation.
    room_count: AtomicUsize,
    config: RoomsConfig,
}

impl Rooms {
    /// Create a registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RoomsConfig::default())
    }

    /// Create a registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RoomsConfig) -> Self {
        info!("Creating rooms with config: {:?}", config);
        let lobby = Arc::new(Hub::with_name(DEFAULT_ROOM));
        let hubs = DashMap::new();
        hubs.insert(DEFAULT_ROOM.to_string(), Arc::clone(&lobby));
        Self {
            hubs,
            lobby,
            room_count: AtomicUsize::new(1),
            config,
        }
    }

    /// The hub of the default room.
    #[must_use]
    pub fn lobby(&self) -> Arc<Hub> {
        Arc::clone(&self.lobby)
    }

    /// Get a room's hub, creating the room if needed.
    ///
    /// The room survives [`prune`](Self::prune) for as long as the returned
    /// handle is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the room limit is reached.
    pub fn hub(&self, name: &str) -> Result<Arc<Hub>, RoomsError> {
        validate_room_name(name).map_err(RoomsError::InvalidRoom)?;

        if let Some(hub) = self.hubs.get(name) {
            return Ok(Arc::clone(&hub));
        }

        self.with_entry(name, Arc::clone)
    }

    /// Register a listener in a room, creating the room if needed.
    ///
    /// Lookup and registration happen under the room's map entry, so a
    /// concurrent [`prune`](Self::prune) never sees the room empty in between.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the room limit is reached.
    pub fn subscribe(&self, name: &str) -> Result<Registration, RoomsError> {
        validate_room_name(name).map_err(RoomsError::InvalidRoom)?;
        self.with_entry(name, Hub::subscribe)
    }

    fn with_entry<T>(&self, name: &str, f: impl FnOnce(&Arc<Hub>) -> T) -> Result<T, RoomsError> {
        let hub = match self.hubs.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                self.reserve_room()?;
                debug!(room = %name, "Creating new room");
                entry.insert(Arc::new(Hub::with_name(name)))
            }
        };
        Ok(f(hub.value()))
    }

    fn reserve_room(&self) -> Result<(), RoomsError> {
        let max = self.config.max_rooms;
        self.room_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .map(|_| ())
            .map_err(|_| RoomsError::MaxRoomsReached)
    }

    /// Get a room's hub if the room exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Hub>> {
        self.hubs.get(name).map(|hub| Arc::clone(&hub))
    }

    /// Publish text to a room.
    ///
    /// # Errors
    ///
    /// Returns an error if the room name is invalid.
    pub fn publish(&self, name: &str, text: &str) -> Result<SkipReport, RoomsError> {
        validate_room_name(name).map_err(RoomsError::InvalidRoom)?;

        match self.get(name) {
            Some(hub) => Ok(hub.send(text)),
            None => {
                debug!(room = %name, "Publish to room without listeners");
                Ok(SkipReport::new())
            }
        }
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.hubs.contains_key(name)
    }

    /// Drop every room without listeners, except the default room.
    ///
    /// A room whose hub is still held outside the registry is kept, even
    /// while it has no listeners.
    ///
    /// Returns the number of rooms removed.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        self.hubs.retain(|name, hub| {
            let keep = name == DEFAULT_ROOM || !hub.is_empty() || Arc::strong_count(hub) > 1;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            self.room_count.fetch_sub(removed, Ordering::AcqRel);
            debug!(removed, "Pruned empty rooms");
        }
        removed
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RoomsStats {
        RoomsStats {
            room_count: self.hubs.len(),
            listener_count: self.hubs.iter().map(|e| e.value().len()).sum(),
        }
    }
}

impl Default for Rooms {
    fn default() -> Self {
        Self::new()
    }
}

/// Room registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomsStats {
    /// Number of rooms.
    pub room_count: usize,
    /// Listeners across all rooms.
    pub listener_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_validation() {
        assert!(validate_room_name("lobby").is_ok());
        assert!(validate_room_name("rust-users_2").is_ok());
        assert!(validate_room_name("").is_err());
        assert!(validate_room_name("no spaces").is_err());
        assert!(validate_room_name("../etc").is_err());

        let long_name = "a".repeat(MAX_ROOM_NAME_LENGTH + 1);
        assert!(validate_room_name(&long_name).is_err());
    }

    #[test]
    fn test_default_room_exists() {
        let rooms = Rooms::new();
        assert!(rooms.contains(DEFAULT_ROOM));
        assert_eq!(rooms.lobby().name(), DEFAULT_ROOM);
        assert!(Arc::ptr_eq(&rooms.lobby(), &rooms.hub(DEFAULT_ROOM).unwrap()));
    }

    #[test]
    fn test_rooms_are_independent() {
        let rooms = Rooms::new();
        let rust = rooms.hub("rust").unwrap();
        let go = rooms.hub("go").unwrap();

        let mut a = rust.add_listener();
        let mut b = go.add_listener();

        assert!(rooms.publish("rust", "borrowck").unwrap().is_empty());

        assert_eq!(a.try_recv().unwrap().text(), "borrowck");
        assert_eq!(a.try_recv().ok(), None);
        assert!(b.try_recv().is_err());
    }

    #[test]
    fn test_publish_to_unknown_room() {
        let rooms = Rooms::new();
        assert!(rooms.publish("nobody-here", "hello").unwrap().is_empty());
        assert!(!rooms.contains("nobody-here"));
        assert!(matches!(
            rooms.publish("bad room", "hello"),
            Err(RoomsError::InvalidRoom(_))
        ));
    }

    #[test]
    fn test_max_rooms() {
        let rooms = Rooms::with_config(RoomsConfig { max_rooms: 2 });
        assert!(rooms.hub("one").is_ok());
        assert!(matches!(rooms.hub("two"), Err(RoomsError::MaxRoomsReached)));
        // Existing rooms are still reachable at the limit
        assert!(rooms.hub("one").is_ok());
    }

    #[test]
    fn test_prune_frees_room_slots() {
        let rooms = Rooms::with_config(RoomsConfig { max_rooms: 2 });
        drop(rooms.hub("one").unwrap());
        assert!(matches!(rooms.hub("two"), Err(RoomsError::MaxRoomsReached)));

        assert_eq!(rooms.prune(), 1);
        assert!(rooms.hub("two").is_ok());
    }

    #[test]
    fn test_concurrent_creation_respects_limit() {
        let rooms = Rooms::with_config(RoomsConfig { max_rooms: 8 });
        let created = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for t in 0..8 {
                let rooms = &rooms;
                let created = &created;
                s.spawn(move || {
                    for i in 0..16 {
                        if rooms.hub(&format!("room-{t}-{i}")).is_ok() {
                            created.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        // The default room takes one slot
        assert_eq!(created.load(Ordering::Relaxed), 7);
        assert_eq!(rooms.stats().room_count, 8);
    }

    #[test]
    fn test_prune_and_stats() {
        let rooms = Rooms::new();
        let busy = rooms.hub("busy").unwrap();
        drop(rooms.hub("idle").unwrap());
        let _listener = busy.add_listener();

        let stats = rooms.stats();
        assert_eq!(stats.room_count, 3);
        assert_eq!(stats.listener_count, 1);

        assert_eq!(rooms.prune(), 1);
        assert!(rooms.contains(DEFAULT_ROOM));
        assert!(rooms.contains("busy"));
        assert!(!rooms.contains("idle"));
    }

    #[test]
    fn test_prune_keeps_rooms_still_held() {
        let rooms = Rooms::new();
        let hub = rooms.hub("rust").unwrap();

        // Nobody listens yet, but the handle is alive
        assert_eq!(rooms.prune(), 0);

        let mut listener = hub.add_listener();
        assert!(rooms.publish("rust", "hello").unwrap().is_empty());
        assert_eq!(listener.try_recv().unwrap().text(), "hello");
        assert!(Arc::ptr_eq(&hub, &rooms.get("rust").unwrap()));
    }

    #[test]
    fn test_subscribe_registers_in_room() {
        let rooms = Rooms::new();
        let mut registration = rooms.subscribe("rust").unwrap();
        assert_eq!(registration.hub().name(), "rust");

        assert_eq!(rooms.prune(), 0);
        assert!(rooms.publish("rust", "hello").unwrap().is_empty());
        assert_eq!(
            registration.listener_mut().try_recv().unwrap().text(),
            "hello"
        );

        drop(registration);
        assert_eq!(rooms.prune(), 1);
        assert!(!rooms.contains("rust"));
    }

    #[test]
    fn test_subscribe_rejects_invalid_and_over_limit() {
        let rooms = Rooms::with_config(RoomsConfig { max_rooms: 1 });
        assert!(matches!(
            rooms.subscribe("bad room"),
            Err(RoomsError::InvalidRoom(_))
        ));
        assert!(matches!(
            rooms.subscribe("rust"),
            Err(RoomsError::MaxRoomsReached)
        ));
        assert!(rooms.subscribe(DEFAULT_ROOM).is_ok());
    }
}
