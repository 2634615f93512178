//! kenni-bridge-server: native adapter for the Kenni federation bridge
//!
//! Concrete platform implementations (reqwest, moka, system clock, process
//! environment), the SQLite account store, and the RPC handlers served by
//! the hyper entrypoint in `main.rs`.

pub mod platform;
pub mod rpc;
pub mod store;
