//! Host storage inventory.
//!
//! - `ImportPoller` - Waits until an imported volume is listed
//! - `StorageInfo` - One backend from `pvesm status`

mod inventory;
mod poller;

pub use inventory::{StorageInfo, parse_storage_status, parse_volume_list, volume_matches};
pub use poller::ImportPoller;
