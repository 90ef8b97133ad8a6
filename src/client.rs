//! One-shot client: one connection, one request, one response.

use std::time::Duration;

use log::debug;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::protocol::{DEFAULT_MAX_MESSAGE_BYTES, Request, Response, read_message, write_message};

/// Send `request` to the server at `addr` and wait for its response.
///
/// The whole exchange, connect included, must finish within `deadline`.
/// A server that closes the connection without answering yields
/// [`Error::Truncated`].
pub async fn submit<A: ToSocketAddrs>(
    addr: A,
    request: &Request,
    deadline: Duration,
) -> Result<Response> {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await?;
        debug!("connected to {}", stream.peer_addr()?);
        write_message(&mut stream, request).await?;
        read_message::<Response, _>(&mut stream, DEFAULT_MAX_MESSAGE_BYTES).await
    };
    timeout(deadline, exchange)
        .await
        .map_err(|_| Error::Timeout {
            operation: "clustering request",
            timeout: deadline,
        })?
}
