//! External collaborators reached through narrow trait boundaries
//! (`spec.md` §6): the asset store, the KVDB, and the `wdb_update` socket
//! client. Each trait ships with an in-process implementation so the core
//! pipeline is fully testable without real sockets or on-disk state.

pub mod codec;
pub mod kvdb;
pub mod store;
pub mod wdb;

pub use kvdb::{Kvdb, KvdbError, KvdbHandle, MemoryKvdb};
pub use store::{AssetStore, FileAssetStore, StoreError};
pub use wdb::{UnixSocketWdbClient, WdbClient, WdbError};
