//! Registry-wide configuration.

/// Knobs shared by every room the registry spawns.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each room's command queue. Callers wait when full.
    pub command_channel_size: usize,

    /// Capacity of each subscriber's outbound event queue. A full queue
    /// drops events for that subscriber only; it resyncs later.
    pub subscriber_queue_size: usize,

    /// Events kept in each room's in-memory log.
    pub event_log_capacity: usize,

    /// Length of generated room codes.
    pub room_code_len: usize,

    /// How many codes to try before giving up on a create.
    pub max_id_attempts: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 64,
            subscriber_queue_size: 256,
            event_log_capacity: 512,
            room_code_len: 6,
            max_id_attempts: 8,
        }
    }
}
