//! # Responder Module
//!
//! Answers frames arriving on a link the way a simple KISS peer would.
//!
//! Behavior per received frame kind:
//! - `Ping`: reply `Ack`
//! - `SetParam`: store the value in the parameter table, reply `Ack`
//! - `RequestParam` without a value: reply with the stored value, or `Nack`
//!   if the ID is unknown
//! - `Command`: reply `Ack`
//! - `TxDelay` / `Speed`: record on the link, no reply. A supported speed
//!   also retunes the transport
//! - data, `Ack`, `Nack` and unknown headers: logged only
//!
//! Every reply waits `tx_delay × 10 ms` first.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SUPPORTED_BAUD_RATES;
use crate::error::{KissError, Result};
use crate::kiss::protocol::{le_u16, FrameKind};
use crate::kiss::Link;
use crate::transport::Transport;

/// Frame handler with an in-memory parameter table
#[derive(Debug)]
pub struct Responder {
    params: HashMap<u16, Vec<u8>>,
    payload: Vec<u8>,
    value: Vec<u8>,
    max_attempts: u32,
    frames: u64,
}

fn reply_delay(tx_delay: u8) {
    if tx_delay > 0 {
        thread::sleep(Duration::from_millis(u64::from(tx_delay) * 10));
    }
}

impl Responder {
    /// Create a responder for a link with the given buffer capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Link buffer size; bounds every payload the link can carry
    /// * `max_attempts` - Transport reads per `poll`
    pub fn new(capacity: usize, max_attempts: u32) -> Self {
        Self {
            params: HashMap::new(),
            payload: vec![0u8; capacity],
            value: vec![0u8; capacity],
            max_attempts,
            frames: 0,
        }
    }

    /// Receive at most one frame from `link` and answer it
    ///
    /// # Returns
    ///
    /// * `Result<Option<FrameKind>>` - Kind of the handled frame, or `None`
    ///   if nothing arrived within the attempt budget
    ///
    /// # Errors
    ///
    /// Propagates reception, decode and send errors from the link
    pub fn poll<T: Transport>(&mut self, link: &mut Link<'_, T>) -> Result<Option<FrameKind>> {
        let decoded = match link.receive_and_decode(&mut self.payload, self.max_attempts) {
            Ok(decoded) => decoded,
            Err(KissError::NoDataReceived(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.frames += 1;

        let kind = decoded.kind();
        let payload = &self.payload[..decoded.len];

        match kind {
            FrameKind::Ping => {
                debug!("ping received");
                reply_delay(link.tx_delay());
                link.send_ack()?;
            }
            FrameKind::SetParam => {
                let param = link.extract_param(&mut self.value)?;
                info!(id = param.id, len = param.len, "parameter stored");
                self.params.insert(param.id, self.value[..param.len].to_vec());
                reply_delay(link.tx_delay());
                link.send_ack()?;
            }
            FrameKind::RequestParam => {
                let param = link.extract_param(&mut self.value)?;
                if param.len > 0 {
                    debug!(id = param.id, len = param.len, "parameter reply received");
                } else {
                    reply_delay(link.tx_delay());
                    match self.params.get(&param.id) {
                        Some(value) => link.reply_param(param.id, value)?,
                        None => {
                            warn!(id = param.id, "request for unknown parameter");
                            link.send_nack()?;
                        }
                    }
                }
            }
            FrameKind::Command => {
                let code = le_u16(payload).ok_or(KissError::InvalidFrame("command frame without a code"))?;
                info!(code, "command received");
                reply_delay(link.tx_delay());
                link.send_ack()?;
            }
            FrameKind::TxDelay => {
                link.apply_control(&decoded, payload)?;
            }
            FrameKind::Speed => {
                link.apply_control(&decoded, payload)?;
                match link.speed() {
                    Some(baud_rate) if SUPPORTED_BAUD_RATES.contains(&baud_rate) => {
                        link.transport_mut().set_baud_rate(baud_rate)?;
                    }
                    Some(baud_rate) => warn!(baud_rate, "unsupported speed announced, line speed unchanged"),
                    None => {}
                }
            }
            FrameKind::Data(port) => {
                debug!(port, len = payload.len(), "data frame received");
            }
            FrameKind::Ack | FrameKind::Nack => {
                debug!(?kind, "control frame received");
            }
            FrameKind::Unknown(header) => {
                warn!(header, "frame with unknown header ignored");
            }
        }

        Ok(Some(kind))
    }

    /// Stored value of a parameter
    pub fn param(&self, id: u16) -> Option<&[u8]> {
        self.params.get(&id).map(Vec::as_slice)
    }

    /// Frames received and handled so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiss::protocol::{le_u32, ControlFrame};
    use crate::kiss::LinkOptions;
    use crate::transport::{LoopbackTransport, MockTransport};

    const OPTS: LinkOptions = LinkOptions {
        tx_delay: 0,
        padding: 2,
        crc32: true,
    };

    fn endpoints<'a>(
        a_buf: &'a mut [u8],
        b_buf: &'a mut [u8],
    ) -> (Link<'a, LoopbackTransport>, Link<'a, LoopbackTransport>) {
        let (a_end, b_end) = LoopbackTransport::pair();
        (
            Link::new(a_buf, a_end, OPTS).unwrap(),
            Link::new(b_buf, b_end, OPTS).unwrap(),
        )
    }

    #[test]
    fn test_nothing_to_handle() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (_peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        assert_eq!(responder.poll(&mut link).unwrap(), None);
        assert_eq!(responder.frames(), 0);
    }

    #[test]
    fn test_ping_answered_with_ack() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        peer.send_ping().unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Ping));

        let mut out = [0u8; 8];
        peer.receive_and_decode(&mut out, 3).unwrap();
        assert_eq!(peer.last_control(), ControlFrame::Ack);
    }

    #[test]
    fn test_set_then_request_param() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);
        let mut out = [0u8; 16];

        peer.set_param(9, &0xC0DB_0001u32.to_le_bytes()).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::SetParam));
        assert_eq!(responder.param(9), Some(&[0x01, 0x00, 0xDB, 0xC0][..]));
        peer.receive_and_decode(&mut out, 3).unwrap();
        assert_eq!(peer.last_control(), ControlFrame::Ack);

        peer.request_param(9).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::RequestParam));

        peer.receive_frame(3).unwrap();
        let mut value = [0u8; 8];
        let param = peer.extract_param(&mut value).unwrap();
        assert_eq!(param.id, 9);
        assert_eq!(le_u32(&value[..param.len]), Some(0xC0DB_0001));
        assert_eq!(responder.frames(), 2);
    }

    #[test]
    fn test_unknown_param_answered_with_nack() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        peer.request_param(42).unwrap();
        responder.poll(&mut link).unwrap();

        let mut out = [0u8; 8];
        peer.receive_and_decode(&mut out, 3).unwrap();
        assert_eq!(peer.last_control(), ControlFrame::Nack);
    }

    #[test]
    fn test_link_control_recorded() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        peer.set_speed(57_600).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Speed));
        assert_eq!(link.speed(), Some(57_600));

        peer.set_tx_delay(3).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::TxDelay));
        assert_eq!(link.tx_delay(), 3);

        // Control frames get no reply
        assert_eq!(peer.transport().pending().unwrap(), 0);
    }

    #[test]
    fn test_back_to_back_frames_all_handled() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        // Both frames land in the responder's first read
        peer.set_speed(57_600).unwrap();
        peer.set_tx_delay(3).unwrap();

        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Speed));
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::TxDelay));
        assert_eq!(link.speed(), Some(57_600));
        assert_eq!(link.tx_delay(), 3);
        assert_eq!(responder.poll(&mut link).unwrap(), None);
        assert_eq!(responder.frames(), 2);
    }

    /// Raw bytes of a speed frame as a peer would send them
    fn speed_frame(baud_rate: u32) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let mut peer = Link::new(&mut buf, LoopbackTransport::new(), OPTS).unwrap();
        peer.set_speed(baud_rate).unwrap();
        peer.transport().take_sent().unwrap()
    }

    fn serving(frame: Vec<u8>) -> MockTransport {
        let mut mock = MockTransport::new();
        mock.expect_readable().return_const(true);
        mock.expect_read().times(1).returning(move |buf: &mut [u8]| {
            buf[..frame.len()].copy_from_slice(&frame);
            Ok(frame.len())
        });
        mock
    }

    #[test]
    fn test_speed_change_retunes_transport() {
        let mut mock = serving(speed_frame(57_600));
        mock.expect_set_baud_rate()
            .with(mockall::predicate::eq(57_600))
            .times(1)
            .returning(|_| Ok(()));

        let mut buf = [0u8; 64];
        let mut link = Link::new(&mut buf, mock, OPTS).unwrap();
        let mut responder = Responder::new(64, 1);

        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Speed));
        assert_eq!(link.speed(), Some(57_600));
    }

    #[test]
    fn test_unsupported_speed_keeps_line_rate() {
        let mut mock = serving(speed_frame(420_000));
        mock.expect_set_baud_rate().never();

        let mut buf = [0u8; 64];
        let mut link = Link::new(&mut buf, mock, OPTS).unwrap();
        let mut responder = Responder::new(64, 1);

        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Speed));
        assert_eq!(link.speed(), Some(420_000));
    }

    #[test]
    fn test_retune_failure_propagates() {
        let mut mock = serving(speed_frame(9_600));
        mock.expect_set_baud_rate()
            .times(1)
            .returning(|_| Err(KissError::Serial("port gone".to_string())));

        let mut buf = [0u8; 64];
        let mut link = Link::new(&mut buf, mock, OPTS).unwrap();
        let mut responder = Responder::new(64, 1);

        assert!(matches!(responder.poll(&mut link), Err(KissError::Serial(_))));
    }

    #[test]
    fn test_command_and_data() {
        let (mut a_buf, mut b_buf) = ([0u8; 64], [0u8; 64]);
        let (mut peer, mut link) = endpoints(&mut a_buf, &mut b_buf);
        let mut responder = Responder::new(64, 3);

        peer.send_command(10).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Command));
        let mut out = [0u8; 8];
        peer.receive_and_decode(&mut out, 3).unwrap();
        assert_eq!(peer.last_control(), ControlFrame::Ack);

        peer.encode_and_send(b"hello", 0x03).unwrap();
        assert_eq!(responder.poll(&mut link).unwrap(), Some(FrameKind::Data(3)));
    }

    #[test]
    fn test_corrupted_frame_reported() {
        let transport = LoopbackTransport::new();
        // Valid framing, CRC bytes do not match
        transport.feed(&[0xC0, 0x80, 0x00, 0x00, 0x00, 0x00, 0xC0]).unwrap();
        let mut buf = [0u8; 32];
        let mut link = Link::new(&mut buf, transport, OPTS).unwrap();
        let mut responder = Responder::new(32, 3);

        assert!(matches!(
            responder.poll(&mut link),
            Err(KissError::Crc32Mismatch { .. })
        ));
        assert_eq!(responder.frames(), 0);
    }
}
