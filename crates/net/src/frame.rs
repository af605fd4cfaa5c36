//! Block framing
//!
//! Wire format: a packet travels as one or more 256-byte blocks, each
//! `[length][payload]`. A nonzero length marks the last block of a packet
//! and gives its payload size. A zero length marks a full continuation
//! block carrying 255 payload bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::Packet;

/// Size of one block on the wire, length byte included
pub const BLOCK_SIZE: usize = 256;

/// Payload bytes per block
pub const MAX_BLOCK_PAYLOAD: usize = BLOCK_SIZE - 1;

/// Bytes requested from the socket per read
pub const READ_CHUNK: usize = 512;

/// Frame a flat payload into blocks
pub fn encode_blocks(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / MAX_BLOCK_PAYLOAD + 1);
    let mut chunks = payload.chunks(MAX_BLOCK_PAYLOAD).peekable();

    while let Some(chunk) = chunks.next() {
        let len = if chunks.peek().is_some() {
            0
        } else {
            chunk.len() as u8
        };
        out.push(len);
        out.extend_from_slice(chunk);
    }

    out
}

/// Receive buffer that reassembles packets from arbitrary read sizes.
///
/// Consumed packets are evicted from the front of the buffer as soon as
/// they are handed out, so `buffered()` is always exactly the unconsumed
/// tail of the stream.
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buf: Vec<u8>,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(BLOCK_SIZE),
        }
    }

    /// Append bytes read from the socket
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes not yet consumed
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Drop everything and release the allocation
    pub fn clear(&mut self) {
        self.buf = Vec::new();
    }

    /// Offset one past the last byte of the first complete packet
    fn packet_end(&self) -> Option<usize> {
        let mut pos = 0;
        while pos < self.buf.len() {
            let len = self.buf[pos] as usize;
            if len != 0 {
                let end = pos + 1 + len;
                return (end <= self.buf.len()).then_some(end);
            }
            pos += BLOCK_SIZE;
        }
        None
    }

    /// Next reassembled payload with the length bytes stripped, if a whole
    /// packet is buffered
    pub fn next_payload(&mut self) -> Option<Vec<u8>> {
        let end = self.packet_end()?;

        let mut payload = Vec::with_capacity(end);
        let mut pos = 0;
        while pos < end {
            let len = self.buf[pos] as usize;
            if len != 0 {
                payload.extend_from_slice(&self.buf[pos + 1..pos + 1 + len]);
                break;
            }
            payload.extend_from_slice(&self.buf[pos + 1..pos + BLOCK_SIZE]);
            pos += BLOCK_SIZE;
        }

        self.buf.drain(..end);
        Some(payload)
    }

    /// Next complete packet, if any
    pub fn next_packet(&mut self) -> Option<Packet> {
        let payload = self.next_payload()?;
        let packet = Packet::parse(&payload)?;
        trace!(kind = %(packet.kind as char), fields = ?packet.text_fields(), "<-");
        Some(packet)
    }
}

/// Read from a stream until one whole packet is available
pub async fn read_packet<R: AsyncRead + Unpin>(
    reader: &mut R,
    decoder: &mut PacketDecoder,
) -> Result<Packet> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        if let Some(packet) = decoder.next_packet() {
            return Ok(packet);
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        decoder.extend(&chunk[..n]);
    }
}

/// Write already-framed bytes to a stream
pub async fn write_blocks<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Frame and write one packet
pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &Packet) -> Result<()> {
    trace!(kind = %(packet.kind as char), fields = ?packet.text_fields(), "->");
    write_blocks(writer, &packet.encode()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn long_packet() -> Packet {
        Packet::open(&"x".repeat(600))
    }

    #[test]
    fn test_short_packet_single_block() {
        let bytes = Packet::ping("42").encode();
        assert_eq!(bytes, b"\x04l42\x00".to_vec());
    }

    #[test]
    fn test_long_packet_blocks() {
        // 1 type byte + 600 text + NUL = 602 payload bytes
        let bytes = long_packet().encode();
        assert_eq!(bytes.len(), 602 + 3);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[BLOCK_SIZE], 0);
        assert_eq!(bytes[2 * BLOCK_SIZE], (602 - 2 * MAX_BLOCK_PAYLOAD) as u8);
    }

    #[test]
    fn test_exact_block_boundary() {
        // 1 + 253 + NUL = 255 payload bytes fits one terminal block
        let bytes = Packet::open(&"y".repeat(253)).encode();
        assert_eq!(bytes.len(), BLOCK_SIZE);
        assert_eq!(bytes[0], 255);

        let mut decoder = PacketDecoder::new();
        decoder.extend(&bytes);
        let packet = decoder.next_packet().unwrap();
        assert_eq!(packet.fields[0].len(), 253);
    }

    #[test]
    fn test_roundtrip_short_and_long() {
        for packet in [
            Packet::login("alice", "al", "1", "pw"),
            Packet::command("w", "", None),
            long_packet(),
            Packet::open(&"z".repeat(MAX_BLOCK_PAYLOAD * 2 - 2)),
        ] {
            let mut decoder = PacketDecoder::new();
            decoder.extend(&packet.encode());
            assert_eq!(decoder.next_packet(), Some(packet));
            assert!(decoder.buffered().is_empty());
        }
    }

    #[test]
    fn test_partial_reads_one_byte_at_a_time() {
        let packet = long_packet();
        let bytes = packet.encode();
        let mut decoder = PacketDecoder::new();
        let mut decoded = Vec::new();

        for byte in &bytes {
            decoder.extend(std::slice::from_ref(byte));
            while let Some(p) = decoder.next_packet() {
                decoded.push(p);
            }
        }

        assert_eq!(decoded, vec![packet]);
    }

    #[test]
    fn test_incomplete_packet_waits() {
        let bytes = Packet::open("hello").encode();
        let mut decoder = PacketDecoder::new();
        decoder.extend(&bytes[..bytes.len() - 1]);
        assert!(decoder.next_packet().is_none());
        assert_eq!(decoder.buffered().len(), bytes.len() - 1);

        decoder.extend(&bytes[bytes.len() - 1..]);
        assert!(decoder.next_packet().is_some());
    }

    #[test]
    fn test_compaction_leaves_exact_tail() {
        let packets = [
            Packet::open("first"),
            long_packet(),
            Packet::ping("3"),
        ];
        let stream: Vec<u8> = packets.iter().flat_map(|p| p.encode()).collect();
        let trailing = &Packet::open("partial").encode()[..3];

        let mut decoder = PacketDecoder::new();
        decoder.extend(&stream);
        decoder.extend(trailing);

        let mut consumed = 0;
        for packet in &packets {
            assert_eq!(decoder.next_packet().as_ref(), Some(packet));
            consumed += packet.encode().len();
            let mut rest = stream[consumed..].to_vec();
            rest.extend_from_slice(trailing);
            assert_eq!(decoder.buffered(), rest.as_slice());
        }
        assert!(decoder.next_packet().is_none());
    }

    #[test]
    fn test_clear_drops_buffer() {
        let mut decoder = PacketDecoder::new();
        decoder.extend(&Packet::open("x").encode());
        decoder.clear();
        assert!(decoder.next_packet().is_none());
    }

    #[tokio::test]
    async fn test_stream_roundtrip() {
        let mut buf = Vec::new();
        write_packet(&mut buf, &Packet::ping("42")).await.unwrap();
        write_packet(&mut buf, &long_packet()).await.unwrap();

        let mut cursor = Cursor::new(buf);
        let mut decoder = PacketDecoder::new();
        let first = read_packet(&mut cursor, &mut decoder).await.unwrap();
        let second = read_packet(&mut cursor, &mut decoder).await.unwrap();
        assert_eq!(first, Packet::ping("42"));
        assert_eq!(second, long_packet());

        let result = read_packet(&mut cursor, &mut decoder).await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
