// ABOUTME: Frame-level I/O for SMPP sessions over a split TCP stream
// ABOUTME: Buffers reads until a whole PDU is available and serializes whole frames on write

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::pdu::{CodecError, Header, Pdu, MAX_PDU_SIZE};

/// What the reader produced for one frame.
///
/// A body that fails to parse for a known command is recoverable: the
/// session answers it with `generic_nack` and keeps reading. Header-level
/// failures surface as errors and end the session.
#[derive(Debug)]
pub(crate) enum Inbound {
    Frame(Pdu),
    /// Frame consumed, body unusable; carries the sequence to nack.
    Malformed { sequence_number: u32 },
    /// Peer closed the stream between frames.
    Eof,
}

/// Read side: accumulates stream data and yields one PDU at a time. Data
/// past the current frame stays buffered for the next call.
pub(crate) struct FrameReader {
    stream: OwnedReadHalf,
    buffer: BytesMut,
}

impl FrameReader {
    pub fn new(stream: OwnedReadHalf) -> FrameReader {
        FrameReader {
            stream,
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Wait for and return the next frame.
    pub async fn read(&mut self) -> Result<Inbound, CodecError> {
        loop {
            if let Some(inbound) = self.parse()? {
                return Ok(inbound);
            }

            // `0` means the remote closed the stream. That is a clean
            // shutdown only if it did not happen mid-frame.
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if self.buffer.is_empty() {
                    return Ok(Inbound::Eof);
                }
                return Err(CodecError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed the connection mid-frame",
                )));
            }
        }
    }

    /// Try to cut one complete frame out of the buffer. `Ok(None)` means
    /// more data is needed.
    fn parse(&mut self) -> Result<Option<Inbound>, CodecError> {
        if self.buffer.len() < Header::SIZE {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);
        if declared < Header::SIZE as u32 {
            return Err(CodecError::FrameTooShort(declared));
        }
        if declared > MAX_PDU_SIZE {
            return Err(CodecError::FrameTooLong(declared));
        }
        if self.buffer.len() < declared as usize {
            return Ok(None);
        }

        let frame = self.buffer.split_to(declared as usize);
        match Pdu::decode(&frame) {
            Ok(pdu) => Ok(Some(Inbound::Frame(pdu))),
            Err(err @ (CodecError::Malformed { .. } | CodecError::Tlv(_))) => {
                let sequence_number =
                    u32::from_be_bytes([frame[12], frame[13], frame[14], frame[15]]);
                tracing::warn!(sequence_number, error = %err, "discarding malformed body");
                Ok(Some(Inbound::Malformed { sequence_number }))
            }
            Err(fatal) => Err(fatal),
        }
    }
}

/// Write side: one whole frame per call, flushed through a buffered writer
/// so a PDU never hits the socket in pieces.
pub(crate) struct FrameWriter {
    stream: BufWriter<OwnedWriteHalf>,
}

impl FrameWriter {
    pub fn new(stream: OwnedWriteHalf) -> FrameWriter {
        FrameWriter {
            stream: BufWriter::new(stream),
        }
    }

    pub async fn write(&mut self, pdu: &Pdu) -> io::Result<()> {
        self.stream.write_all(&pdu.to_bytes()).await?;
        self.stream.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
