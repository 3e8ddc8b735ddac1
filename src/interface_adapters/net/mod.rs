// Network adapter modules split by the surface socket vs plain HTTP reads.

pub mod client;
pub mod internal;

pub use client::{fleet_update_serializer, ws_handler};
pub use internal::{fleet_snapshot_handler, link_status_handler, sim_drop_handler};
