//! Request and response messages exchanged over one connection.
//!
//! Every message is a single JSON value followed by a newline. Field names are
//! PascalCase so that peers written against the same wire format interoperate.

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on the size of one encoded message.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 << 20;

/// Dataset and parameters of one clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    pub data: Vec<Vec<f64>>,
    pub k: u32,
    pub max_iterations: u32,
}

/// Centroids and the cluster label of every point of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub centroids: Vec<Vec<f64>>,
    pub assignments: Vec<u32>,
}

/// Read exactly one message.
///
/// Bytes are buffered until they form a complete JSON value. Bytes received
/// after the value are dropped, each side sends a single message per direction.
pub async fn read_message<T, R>(reader: &mut R, limit: usize) -> Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK_SIZE.min(limit));
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return match parse(&buf)? {
                Some(message) => Ok(message),
                None => Err(Error::Truncated {
                    received: buf.len(),
                }),
            };
        }
        if buf.len() + read > limit {
            return Err(Error::MessageTooLarge { limit });
        }
        buf.extend_from_slice(&chunk[..read]);
        // a top-level object can only end on a closing brace
        if chunk[..read].contains(&b'}') {
            if let Some(message) = parse(&buf)? {
                debug!("decoded message of {} bytes", buf.len());
                return Ok(message);
            }
        }
    }
}

/// `Ok(None)` when the buffer holds only a prefix of a value.
fn parse<T: DeserializeOwned>(buf: &[u8]) -> Result<Option<T>> {
    let mut stream = serde_json::Deserializer::from_slice(buf).into_iter::<T>();
    match stream.next() {
        Some(Ok(message)) => Ok(Some(message)),
        Some(Err(err)) if err.is_eof() => Ok(None),
        Some(Err(err)) => Err(err.into()),
        None => Ok(None),
    }
}

/// Write one message followed by a newline and flush it.
pub async fn write_message<T, W>(writer: &mut W, message: &T) -> Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    debug!("encoded message of {} bytes", bytes.len());
    Ok(())
}
