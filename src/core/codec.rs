//! Length prefixed frames: three ascii bytes holding the content length, right aligned and padded
//! with spaces, followed by exactly that many content bytes. There is no terminator on the wire.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::utils::constants::{FRAME_HEADER_LEN, MAX_FRAME_LEN};
use crate::utils::errors::FrameError;

pub fn encode_frame(content: &str) -> Result<Vec<u8>, FrameError> {
    let len = content.len();
    if len > MAX_FRAME_LEN {
        return Err(FrameError::FrameTooLarge { len });
    }
    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + len);
    buf.extend_from_slice(format!("{:>3}", len).as_bytes());
    buf.extend_from_slice(content.as_bytes());
    Ok(buf)
}

pub fn decode_header(header: &[u8; FRAME_HEADER_LEN]) -> Result<usize, FrameError> {
    let text = std::str::from_utf8(header)
        .map_err(|_| FrameError::Protocol(format!("non ascii length header {:?}", header)))?;
    let digits = text.trim_start_matches(' ');
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FrameError::Protocol(format!(
            "malformed length header {:?}",
            text
        )));
    }
    digits
        .parse()
        .map_err(|_| FrameError::Protocol(format!("malformed length header {:?}", text)))
}

/// Writes one frame and flushes it. The whole frame goes out in a single `write_all`.
pub async fn write_frame<W>(stream: &mut W, content: &str) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(content)?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    trace!("wrote frame of {} bytes", content.len());
    Ok(())
}

/// Reads exactly one frame. End of stream anywhere inside the frame, header included, is
/// `ConnectionClosed`.
pub async fn read_frame<R>(stream: &mut R) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let len = decode_header(&header)?;

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    trace!("read frame of {} bytes", len);

    String::from_utf8(body).map_err(|_| FrameError::Protocol("frame is not valid utf-8".into()))
}
