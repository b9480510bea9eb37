//! Length-prefixed framing over any async byte stream.
//!
//! Every frame on the wire is:
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ length: u32 (BE)     │ payload: `length` bytes  │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The framing layer is content-agnostic. It only guarantees message
//! boundaries: a reader never sees half a frame, and a writer emits the
//! prefix and the payload with a single `write_all`.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default upper bound for a single frame's payload (16 MiB).
///
/// Package uploads travel inside frames, so this is deliberately larger
/// than any command object.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Reads one frame from `reader`.
///
/// Returns:
/// - `Ok(Some(payload))` for a complete frame,
/// - `Ok(None)` on a clean end-of-stream at a frame boundary.
///
/// # Errors
/// - [`TransportError::FrameTooLarge`] if the length prefix exceeds `max_len`
/// - [`TransportError::ReceiveFailed`] on I/O errors, including EOF in the
///   middle of a frame
pub async fn read_frame<R>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader
            .read(&mut header[filled..])
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "eof inside length prefix",
            )));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(TransportError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    Ok(Some(payload))
}

/// Writes `payload` as one frame and flushes the writer.
///
/// # Errors
/// - [`TransportError::FrameTooLarge`] if the payload exceeds `max_len`
///   (nothing is written in that case)
/// - [`TransportError::SendFailed`] on I/O errors
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
    max_len: usize,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let max = max_len.min(u32::MAX as usize);
    if payload.len() > max {
        return Err(TransportError::FrameTooLarge {
            len: payload.len(),
            max,
        });
    }
    let len = payload.len() as u32;

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(payload);

    writer
        .write_all(&buf)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_single_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"hello", DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();

        let frame = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn test_prefix_is_big_endian_u32() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"abc", DEFAULT_MAX_FRAME_LEN)
            .await
            .unwrap();
        drop(a);

        let mut raw = Vec::new();
        b.read_to_end(&mut raw).await.unwrap();
        assert_eq!(raw, [0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn test_frames_split_across_small_writes_are_reassembled() {
        // A duplex buffer of 2 bytes forces the payload to arrive in
        // several chunks; the reader must still return one frame.
        let (mut a, mut b) = tokio::io::duplex(2);
        let writer = tokio::spawn(async move {
            write_frame(&mut a, b"first", DEFAULT_MAX_FRAME_LEN)
                .await
                .unwrap();
            write_frame(&mut a, b"second", DEFAULT_MAX_FRAME_LEN)
                .await
                .unwrap();
        });

        let one = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        let two = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        writer.await.unwrap();

        assert_eq!(one.as_deref(), Some(&b"first"[..]));
        assert_eq!(two.as_deref(), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_valid_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"", DEFAULT_MAX_FRAME_LEN).await.unwrap();
        let frame = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(frame, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let frame = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_eof_inside_prefix_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0]).await.unwrap();
        drop(a);
        let result = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));
    }

    #[tokio::test]
    async fn test_eof_inside_payload_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0, 0, 10, b'x', b'y']).await.unwrap();
        drop(a);
        let result = read_frame(&mut b, DEFAULT_MAX_FRAME_LEN).await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));
    }

    #[tokio::test]
    async fn test_oversized_prefix_is_rejected_without_reading_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        let result = read_frame(&mut b, 1024).await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { max: 1024, .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_write_is_rejected() {
        let (mut a, _b) = tokio::io::duplex(64);
        let result = write_frame(&mut a, &[0u8; 16], 8).await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge { len: 16, max: 8 })
        ));
    }
}
