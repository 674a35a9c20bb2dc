//! F3 query endpoints.
//!
//! Lookup failures reported by the engine are returned as server errors
//! carrying the engine's message; nothing is retried here.

use {
    f3_sidecar_core::{FinalityEngine, QueryFacade},
    f3_sidecar_types::{FinalityCertificate, InstanceProgress, Manifest, PowerEntries, TipSetKey},
    jsonrpc_core::{Error, ErrorCode, Result},
    jsonrpc_derive::rpc,
};

/// JSON-RPC code for failures reported by the engine.
pub const ENGINE_ERROR_CODE: i64 = -32000;

fn engine_error(err: anyhow::Error) -> Error {
    Error {
        code: ErrorCode::ServerError(ENGINE_ERROR_CODE),
        message: format!("{err:#}"),
        data: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition (generates the JSON-RPC dispatch table via `jsonrpc-derive`)
// ────────────────────────────────────────────────────────────────────────────

pub mod rpc_f3 {
    use super::*;

    #[rpc(server)]
    pub trait F3 {
        /// Returns the finality certificate of a consensus instance.
        #[rpc(name = "Filecoin.F3GetCertificate")]
        fn get_certificate(&self, instance: u64) -> Result<FinalityCertificate>;

        /// Returns the most recent finality certificate.
        #[rpc(name = "Filecoin.F3GetLatestCertificate")]
        fn get_latest_certificate(&self) -> Result<FinalityCertificate>;

        /// Returns the power table at the given tipset.
        #[rpc(name = "Filecoin.F3GetF3PowerTable")]
        fn get_power_table(&self, tsk: TipSetKey) -> Result<PowerEntries>;

        /// Returns the power table a consensus instance ran with.
        #[rpc(name = "Filecoin.F3GetF3PowerTableByInstance")]
        fn get_power_table_by_instance(&self, instance: u64) -> Result<PowerEntries>;

        #[rpc(name = "Filecoin.F3IsRunning")]
        fn is_running(&self) -> Result<bool>;

        #[rpc(name = "Filecoin.F3GetProgress")]
        fn get_progress(&self) -> Result<InstanceProgress>;

        /// Returns the manifest. An undefined initial power table is filled
        /// in from the genesis certificate when that is available.
        #[rpc(name = "Filecoin.F3GetManifest")]
        fn get_manifest(&self) -> Result<Manifest>;
    }

    // ────────────────────────────────────────────────────────────────────
    // Implementation
    // ────────────────────────────────────────────────────────────────────

    pub struct F3Impl<E: ?Sized> {
        facade: QueryFacade<E>,
    }

    impl<E: FinalityEngine + ?Sized> F3Impl<E> {
        pub fn new(facade: QueryFacade<E>) -> Self {
            Self { facade }
        }
    }

    impl<E: FinalityEngine + ?Sized + 'static> F3 for F3Impl<E> {
        fn get_certificate(&self, instance: u64) -> Result<FinalityCertificate> {
            self.facade.certificate(instance).map_err(engine_error)
        }

        fn get_latest_certificate(&self) -> Result<FinalityCertificate> {
            self.facade.latest_certificate().map_err(engine_error)
        }

        fn get_power_table(&self, tsk: TipSetKey) -> Result<PowerEntries> {
            self.facade.power_table(&tsk).map_err(engine_error)
        }

        fn get_power_table_by_instance(&self, instance: u64) -> Result<PowerEntries> {
            self.facade
                .power_table_by_instance(instance)
                .map_err(engine_error)
        }

        fn is_running(&self) -> Result<bool> {
            Ok(self.facade.is_running())
        }

        fn get_progress(&self) -> Result<InstanceProgress> {
            Ok(self.facade.progress())
        }

        fn get_manifest(&self) -> Result<Manifest> {
            Ok(self.facade.manifest())
        }
    }
}

pub use rpc_f3::F3Impl;

#[cfg(test)]
mod tests {
    use {
        super::{rpc_f3::F3, *},
        f3_sidecar_core::test_utils::{certificate, sample_manifest, sample_power_table, FakeEngine},
        jsonrpc_core::IoHandler,
        serde_json::{json, Value},
        std::sync::Arc,
    };

    fn io_handler(engine: FakeEngine) -> IoHandler {
        let mut io = IoHandler::new();
        io.extend_with(F3Impl::new(QueryFacade::new(Arc::new(engine))).to_delegate());
        io
    }

    fn call(io: &IoHandler, method: &str, params: Value) -> Value {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = io
            .handle_request_sync(&request.to_string())
            .expect("a response for a call with an id");
        serde_json::from_str(&response).unwrap()
    }

    #[test]
    fn test_get_certificate() {
        let io = io_handler(FakeEngine::new().with_certificate(certificate(3, "bafythree")));
        let response = call(&io, "Filecoin.F3GetCertificate", json!([3]));
        assert_eq!(response["result"]["GPBFTInstance"], 3);
        assert_eq!(response["result"]["ECChain"][0]["PowerTable"]["/"], "bafythree");
    }

    #[test]
    fn test_unknown_certificate_is_a_server_error() {
        let io = io_handler(FakeEngine::new());
        let response = call(&io, "Filecoin.F3GetCertificate", json!([9]));
        assert_eq!(response["error"]["code"], ENGINE_ERROR_CODE);
        assert_eq!(
            response["error"]["message"],
            "certificate for instance 9 not found"
        );

        let response = call(&io, "Filecoin.F3GetLatestCertificate", json!([]));
        assert_eq!(response["error"]["message"], "no certificates yet");
    }

    #[test]
    fn test_get_latest_certificate() {
        let io = io_handler(
            FakeEngine::new()
                .with_certificate(certificate(0, "bafygenesis"))
                .with_certificate(certificate(5, "bafyfive")),
        );
        let response = call(&io, "Filecoin.F3GetLatestCertificate", json!([]));
        assert_eq!(response["result"]["GPBFTInstance"], 5);
    }

    #[test]
    fn test_power_tables() {
        let key = TipSetKey::new(vec![1u8, 2, 3]);
        let io = io_handler(
            FakeEngine::new()
                .with_power_table(key, sample_power_table())
                .with_instance_power_table(2, sample_power_table()),
        );
        let expected = serde_json::to_value(sample_power_table()).unwrap();

        let response = call(&io, "Filecoin.F3GetF3PowerTable", json!(["AQID"]));
        assert_eq!(response["result"], expected);

        let response = call(&io, "Filecoin.F3GetF3PowerTableByInstance", json!([2]));
        assert_eq!(response["result"], expected);

        let response = call(&io, "Filecoin.F3GetF3PowerTableByInstance", json!([4]));
        assert_eq!(response["error"]["message"], "no power table for instance 4");
    }

    #[test]
    fn test_status_endpoints() {
        let io = io_handler(FakeEngine::new());
        assert_eq!(call(&io, "Filecoin.F3IsRunning", json!([]))["result"], false);
        let progress = call(&io, "Filecoin.F3GetProgress", json!([]));
        assert_eq!(progress["result"], json!({"ID": 0, "Round": 0, "Phase": 0}));
    }

    #[test]
    fn test_manifest_is_backfilled() {
        let io = io_handler(
            FakeEngine::new()
                .with_manifest(sample_manifest())
                .with_certificate(certificate(0, "bafygenesis")),
        );
        let response = call(&io, "Filecoin.F3GetManifest", json!([]));
        assert_eq!(response["result"]["InitialPowerTable"]["/"], "bafygenesis");
        assert_eq!(response["result"]["NetworkName"], "calibrationnet");
    }

    #[test]
    fn test_manifest_without_genesis() {
        let io = io_handler(FakeEngine::new().with_manifest(sample_manifest()));
        let response = call(&io, "Filecoin.F3GetManifest", json!([]));
        assert!(response["error"].is_null());
        assert!(response["result"]["InitialPowerTable"].is_null());
    }
}
