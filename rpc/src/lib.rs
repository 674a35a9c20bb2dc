//! Host-facing JSON-RPC surface of the F3 sidecar.
//!
//! The host node queries finality state through these endpoints while the
//! engine runs. Every method is a thin wrapper over
//! [`f3_sidecar_core::QueryFacade`]; method names follow the host's
//! `Filecoin.` namespace.
//!
//! | Method | Result |
//! |--------|--------|
//! | `Filecoin.F3GetCertificate` | certificate for an instance |
//! | `Filecoin.F3GetLatestCertificate` | most recent certificate |
//! | `Filecoin.F3GetF3PowerTable` | power table at a tipset key (base64) |
//! | `Filecoin.F3GetF3PowerTableByInstance` | power table of an instance |
//! | `Filecoin.F3IsRunning` | whether the engine is active |
//! | `Filecoin.F3GetProgress` | current instance, round and phase |
//! | `Filecoin.F3GetManifest` | manifest, initial power table backfilled |

pub mod f3_rpc;
pub mod server;

pub use {
    f3_rpc::{rpc_f3::F3, F3Impl},
    server::{start_rpc_server, RpcServerError},
};
