//! Length-prefixed JSON framing
//!
//! Each frame is a 4-byte little-endian body length followed by the JSON
//! body.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds limit")]
    TooLarge { len: usize },

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one frame. Returns `None` on a clean end of stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(serde_json::from_slice(&body)?))
}

pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge { len: body.len() });
    }
    let len = (body.len() as u32).to_le_bytes();

    writer.write_all(&len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}
