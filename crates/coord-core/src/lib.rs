//! Shared vocabulary for the coordinator realtime client: branded IDs,
//! event-type names, wire frames, and the client error taxonomy.

pub mod errors;
pub mod events;
pub mod frames;
pub mod ids;
