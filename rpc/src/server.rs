//! HTTP transport for the F3 endpoints.

use {
    crate::f3_rpc::{rpc_f3::F3, F3Impl},
    f3_sidecar_core::{FinalityEngine, QueryFacade},
    jsonrpc_core::IoHandler,
    jsonrpc_http_server::{Server, ServerBuilder},
    log::*,
    std::{io, net::ToSocketAddrs},
    thiserror::Error,
};

const RPC_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("invalid rpc endpoint: {0}")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Serve the F3 endpoints over HTTP at `endpoint` (`host:port`).
///
/// The returned server keeps running until it is closed or dropped.
pub fn start_rpc_server<E>(
    endpoint: &str,
    facade: QueryFacade<E>,
) -> Result<Server, RpcServerError>
where
    E: FinalityEngine + ?Sized + 'static,
{
    let addr = endpoint
        .to_socket_addrs()
        .map_err(|_| RpcServerError::InvalidEndpoint(endpoint.to_string()))?
        .next()
        .ok_or_else(|| RpcServerError::InvalidEndpoint(endpoint.to_string()))?;

    let mut io = IoHandler::new();
    io.extend_with(F3Impl::new(facade).to_delegate());

    let server = ServerBuilder::new(io)
        .threads(RPC_THREADS)
        .start_http(&addr)?;
    info!("F3 rpc server listening on {}", server.address());
    Ok(server)
}
