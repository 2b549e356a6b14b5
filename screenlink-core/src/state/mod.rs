//! State shared between the frame producer, the command dispatcher and
//! the auto-accept loop.
//!
//! Each structure has a single owner lock; readers always get a whole
//! snapshot, never individual fields. Locks are held only for the copy,
//! never across I/O or an `.await`.

mod monitor;
mod transform;

pub use monitor::{
    ActiveMonitor, DEFAULT_MONITOR_INDEX, MonitorSnapshot, MonitorState, SwitchRequest,
    next_secondary_index,
};
pub use transform::SharedTransform;
