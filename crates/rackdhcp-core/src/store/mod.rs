// ── Data store ──
//
// In-memory inventory with per-type reactive collections, consistent
// snapshots for synthesis, and the domain-event bus.

mod collection;
mod data_store;
mod inventory;
mod snapshot;

pub use data_store::DataStore;
pub use inventory::Inventory;
pub use snapshot::Snapshot;
