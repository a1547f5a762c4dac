//! Packet/frame pump shared by decoding sources.
//!
//! Buffered frames are drained before another packet is sent, and the
//! decoder is flushed with end-of-stream once packets run out, so frames
//! held back for reordering are still returned.

use anyhow::Result;

/// Send/receive side of a codec.
pub(crate) trait PacketDecoder {
    type Packet;
    type Output;

    /// A decoded frame, if one is ready.
    fn receive(&mut self) -> Option<Self::Output>;

    fn send(&mut self, packet: &Self::Packet) -> Result<()>;

    /// Signal end of input; the decoder releases what it still holds.
    fn end_of_stream(&mut self) -> Result<()>;
}

/// Per-stream pump state.
#[derive(Debug, Default)]
pub(crate) struct Pump {
    eof_sent: bool,
}

impl Pump {
    /// Next decoded frame, or `None` once the decoder is flushed and empty.
    pub(crate) fn next<D, F>(
        &mut self,
        decoder: &mut D,
        mut next_packet: F,
    ) -> Result<Option<D::Output>>
    where
        D: PacketDecoder,
        F: FnMut() -> Option<D::Packet>,
    {
        loop {
            if let Some(frame) = decoder.receive() {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match next_packet() {
                Some(packet) => decoder.send(&packet)?,
                None => {
                    decoder.end_of_stream()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
