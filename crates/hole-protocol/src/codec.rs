use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{HoleMessage, MAX_MESSAGE_SIZE};

/// Codec for encoding/decoding Hole protocol messages.
pub struct HoleCodec;

impl HoleCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &HoleMessage) -> ProtocolResult<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(4 + 1 + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(HoleMessage, usize)> {
        if data.len() < 5 {
            return Err(ProtocolError::FramingError("too short".into()));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        Self::check_len(len)?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_tagged(data[4], &data[5..total])?;
        Ok((msg, total))
    }

    /// Write one framed message to an async stream.
    pub async fn write<W>(writer: &mut W, msg: &HoleMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one framed message from an async stream.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly before a new frame.
    pub async fn read<R>(reader: &mut R) -> ProtocolResult<Option<HoleMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::check_len(len)?;
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::ConnectionClosed
            } else {
                e.into()
            }
        })?;
        Self::decode_tagged(body[0], &body[1..]).map(Some)
    }

    fn check_len(len: usize) -> ProtocolResult<()> {
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(())
    }

    fn decode_tagged(tag: u8, payload: &[u8]) -> ProtocolResult<HoleMessage> {
        let msg: HoleMessage = bincode::deserialize(payload)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }
}
