//! Frame Codec
//!
//! Each frame is a 4-byte big-endian length followed by a JSON-encoded
//! `Packet`.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::ConnError;
use crate::protocol::Packet;

/// Length prefix size in bytes
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound on a single frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Read one frame and decode it.
///
/// A clean end of stream before the length prefix is reported as
/// `ConnError::Closed`.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Packet, ConnError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(ConnError::Closed),
        Err(e) => return Err(e.into()),
    };

    if len > max_frame_size {
        return Err(ConnError::FrameTooLarge {
            size: len,
            limit: max_frame_size,
        });
    }

    let mut buf = BytesMut::zeroed(len);
    reader.read_exact(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}

/// Encode a packet and write it as one frame
pub async fn write_frame<W>(writer: &mut W, packet: &Packet) -> Result<(), ConnError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(packet)?;
    let len = u32::try_from(body.len()).map_err(|_| ConnError::FrameTooLarge {
        size: body.len(),
        limit: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.put_u32(len);
    frame.put_slice(&body);

    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
