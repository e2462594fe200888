//! Fader channel routing
//!
//! The path from decoded fader readings to applied session volume:
//! registry (channel → session set), latest-wins update queue, dispatch
//! worker and the volume applier.

pub mod applier;
pub mod channel;
pub mod dispatcher;
pub mod queue;
pub mod registry;

pub use applier::{ApplyOutcome, VolumeApplier};
pub use channel::{ChannelId, ChannelSlot, ChannelState};
pub use dispatcher::Dispatcher;
pub use queue::{PendingUpdate, UpdateQueue};
pub use registry::ChannelRegistry;
