//! Fixed-size binary codec for [`BarPacket`].
//!
//! The wire format is 48 bytes, little-endian, no padding and no length
//! prefix. The size itself is the frame:
//!
//! ```text
//! ┌───────────┬────────┬────────┬────────┬────────┬───────────┐
//! │ timestamp │  open  │ close  │  high  │  low   │  volume   │
//! │ i64       │ f64    │ f64    │ f64    │ f64    │ i64       │
//! │ 0..8      │ 8..16  │ 16..24 │ 24..32 │ 32..40 │ 40..48    │
//! └───────────┴────────┴────────┴────────┴────────┴───────────┘
//! ```
//!
//! Floats travel as their raw IEEE-754 bit pattern, so non-finite values are
//! never rejected and always round-trip bit-for-bit. A receiver has to stay
//! frame-aligned from connection start; there is no resynchronisation.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{KiwiError, Result};
use crate::types::BarPacket;

/// Encoded size of one [`BarPacket`].
pub const BAR_PACKET_SIZE: usize = 48;

/// One encoded frame.
pub type Frame = [u8; BAR_PACKET_SIZE];

#[inline]
fn word(buf: &Frame, at: usize) -> [u8; 8] {
    let mut w = [0u8; 8];
    w.copy_from_slice(&buf[at..at + 8]);
    w
}

impl BarPacket {
    /// Encode into a 48-byte little-endian frame.
    pub fn encode(&self) -> Frame {
        let mut buf = [0u8; BAR_PACKET_SIZE];
        buf[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8..16].copy_from_slice(&self.open.to_bits().to_le_bytes());
        buf[16..24].copy_from_slice(&self.close.to_bits().to_le_bytes());
        buf[24..32].copy_from_slice(&self.high.to_bits().to_le_bytes());
        buf[32..40].copy_from_slice(&self.low.to_bits().to_le_bytes());
        buf[40..48].copy_from_slice(&self.volume.to_le_bytes());
        buf
    }

    /// Decode a complete frame.
    pub fn decode(buf: &Frame) -> Self {
        Self {
            timestamp: i64::from_le_bytes(word(buf, 0)),
            open: f64::from_bits(u64::from_le_bytes(word(buf, 8))),
            close: f64::from_bits(u64::from_le_bytes(word(buf, 16))),
            high: f64::from_bits(u64::from_le_bytes(word(buf, 24))),
            low: f64::from_bits(u64::from_le_bytes(word(buf, 32))),
            volume: i64::from_le_bytes(word(buf, 40)),
        }
    }

    /// Decode from a slice that must be exactly one frame long.
    pub fn decode_slice(bytes: &[u8]) -> Result<Self> {
        let frame: &Frame = bytes.try_into().map_err(|_| KiwiError::FrameSize {
            expected: BAR_PACKET_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::decode(frame))
    }
}

/// Write one packet as a single full 48-byte write.
pub async fn write_packet<W>(writer: &mut W, packet: &BarPacket) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&packet.encode()).await
}

/// Read the next packet from a frame-aligned stream.
///
/// Partial reads are accumulated until a whole frame is buffered. Returns
/// `Ok(None)` when the peer closes exactly on a frame boundary, and
/// [`KiwiError::FrameRead`] when it closes mid-frame or the read fails.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<BarPacket>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; BAR_PACKET_SIZE];
    let mut filled = 0;

    while filled < BAR_PACKET_SIZE {
        let n = reader.read(&mut buf[filled..]).await.map_err(KiwiError::FrameRead)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(KiwiError::FrameRead(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {filled} of {BAR_PACKET_SIZE} frame bytes"),
            )));
        }
        filled += n;
    }

    Ok(Some(BarPacket::decode(&buf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BarPacket {
        BarPacket::new(1_700_000_000, 100.0, 101.0, 102.0, 99.0, 500)
    }

    #[test]
    fn encode_is_little_endian_in_field_order() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), BAR_PACKET_SIZE);
        assert_eq!(&bytes[0..8], &1_700_000_000i64.to_le_bytes());
        assert_eq!(&bytes[8..16], &100.0f64.to_le_bytes());
        assert_eq!(&bytes[16..24], &101.0f64.to_le_bytes());
        assert_eq!(&bytes[24..32], &102.0f64.to_le_bytes());
        assert_eq!(&bytes[32..40], &99.0f64.to_le_bytes());
        assert_eq!(&bytes[40..48], &500i64.to_le_bytes());
    }

    #[test]
    fn round_trip_edge_values() {
        let cases = [
            BarPacket::default(),
            BarPacket::new(-1, -0.0, -1.5, -2.5, -3.5, -42),
            BarPacket::new(i64::MAX, f64::MAX, f64::MIN, f64::MIN_POSITIVE, f64::EPSILON, i64::MIN),
            BarPacket::new(0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -f64::NAN, 0),
            BarPacket::new(3, f64::from_bits(0x7ff8_dead_beef_0001), 5e-324, 0.0, 1.0, 1),
        ];

        for packet in cases {
            let decoded = BarPacket::decode(&packet.encode());
            assert_eq!(decoded, packet);
            assert_eq!(decoded.open.to_bits(), packet.open.to_bits());
            assert_eq!(decoded.low.to_bits(), packet.low.to_bits());
        }
    }

    #[test]
    fn decode_slice_requires_exact_length() {
        let bytes = sample().encode();
        assert_eq!(BarPacket::decode_slice(&bytes).unwrap(), sample());

        let short = BarPacket::decode_slice(&bytes[..47]).unwrap_err();
        assert!(matches!(short, KiwiError::FrameSize { expected: 48, actual: 47 }));

        let mut long = bytes.to_vec();
        long.push(0);
        let long = BarPacket::decode_slice(&long).unwrap_err();
        assert!(matches!(long, KiwiError::FrameSize { expected: 48, actual: 49 }));
    }

    #[tokio::test]
    async fn read_accumulates_partial_reads() {
        let first = sample();
        let second = BarPacket::new(2, 101.0, 102.5, 103.0, 100.5, 600);
        let a = first.encode();
        let b = second.encode();

        // Split the two frames at awkward boundaries.
        let mut reader = chunked(&[&a[..5], &a[5..40], &a[40..], &b[..1], &b[1..]]);

        assert_eq!(read_packet(&mut reader).await.unwrap(), Some(first));
        assert_eq!(read_packet(&mut reader).await.unwrap(), Some(second));
        assert_eq!(read_packet(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn eof_inside_frame_is_an_error() {
        let bytes = sample().encode();
        let mut reader = chunked(&[&bytes[..20]]);

        let err = read_packet(&mut reader).await.unwrap_err();
        match err {
            KiwiError::FrameRead(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn write_then_read_over_duplex() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let packet = sample();

        write_packet(&mut tx, &packet).await.unwrap();
        drop(tx);

        assert_eq!(read_packet(&mut rx).await.unwrap(), Some(packet));
        assert_eq!(read_packet(&mut rx).await.unwrap(), None);
    }

    /// Reader that hands out the given chunks one `read` call at a time.
    fn chunked(chunks: &[&[u8]]) -> ChunkedReader {
        ChunkedReader { chunks: chunks.iter().map(|c| c.to_vec()).rev().collect() }
    }

    struct ChunkedReader {
        chunks: Vec<Vec<u8>>,
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            if let Some(mut chunk) = self.chunks.pop() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.chunks.push(chunk.split_off(n));
                }
            }
            std::task::Poll::Ready(Ok(()))
        }
    }
}
