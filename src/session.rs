//! Session controller: one replay-and-recover run against the exchange.
//!
//! A run sends a stream-all request, drains 16-byte records until the server
//! closes the stream, then asks for each missing sequence number one at a time.
//! Recovery is bounded by `max_recovery_passes`; anything still missing after
//! the last pass is reported in [`RunOutcome::missing`] rather than failing the
//! run.
//!
//! The ABX server closes the connection after a full replay, so the controller
//! opens a fresh connection through its [`Connector`] whenever the previous one
//! has been closed or left misaligned by a partial record.
use crate::assembler::ResultAssembler;
use crate::codec::{decode_packet, encode_request, resend_target, CallType, Packet, PACKET_LEN};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::tracker::SequenceTracker;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens transport streams to the exchange.
pub trait Connector {
    type Stream: Read + Write;

    /// Open a new stream. Failures map to [`ClientError::Connection`].
    fn connect(&mut self) -> Result<Self::Stream>;

    /// Human-readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// TCP transport with optional socket-level timeouts.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: String,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint(),
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
        }
    }

    fn open(&self) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(timeout) => {
                let mut last_err = None;
                let mut connected = None;
                for addr in self.endpoint.to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(s) => {
                            connected = Some(s);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match connected {
                    Some(s) => s,
                    None => {
                        return Err(last_err.unwrap_or_else(|| {
                            io::Error::new(ErrorKind::NotFound, "address resolved to nothing")
                        }));
                    }
                }
            }
            None => TcpStream::connect(&self.endpoint)?,
        };
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self) -> Result<TcpStream> {
        self.open().map_err(|source| ClientError::Connection {
            addr: self.endpoint.clone(),
            source,
        })
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Packets ascending by sequence number, one per sequence.
    pub packets: Vec<Packet>,
    /// Sequence numbers still missing after the last recovery pass, as
    /// ascending inclusive ranges.
    pub missing: Vec<RangeInclusive<i32>>,
    /// Recovery passes executed.
    pub passes: u32,
    /// Resend requests written to the transport.
    pub recovery_requests: usize,
}

impl RunOutcome {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Number of sequence numbers still missing.
    pub fn missing_count(&self) -> u64 {
        self.missing
            .iter()
            .map(|r| (i64::from(*r.end()) - i64::from(*r.start()) + 1) as u64)
            .sum()
    }
}

/// How a record read ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Full,
    /// Stream closed after this many bytes of the record.
    Closed(usize),
    /// Socket read timeout after this many bytes of the record.
    TimedOut(usize),
}

impl Fill {
    fn filled(self) -> usize {
        match self {
            Fill::Full => PACKET_LEN,
            Fill::Closed(n) | Fill::TimedOut(n) => n,
        }
    }
}

/// Read up to one record, looping over short reads.
fn fill_record<R: Read>(r: &mut R, buf: &mut [u8; PACKET_LEN]) -> io::Result<Fill> {
    let mut filled = 0;
    while filled < PACKET_LEN {
        match r.read(&mut buf[filled..]) {
            Ok(0) => return Ok(Fill::Closed(filled)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(Fill::TimedOut(filled));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(Fill::Full)
}

fn send<W: Write>(w: &mut W, call_type: CallType, sequence: u8) -> io::Result<()> {
    w.write_all(&encode_request(call_type, sequence))?;
    w.flush()
}

/// Owns the transport and the packet collection for one run.
pub struct Session<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    max_recovery_passes: u32,
    tracker: SequenceTracker,
    assembler: ResultAssembler,
    recovery_requests: usize,
}

impl Session<TcpConnector> {
    /// Session over TCP to the endpoint in `config`.
    pub fn tcp(config: &Config) -> Self {
        Self::new(TcpConnector::new(config), config)
    }
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, config: &Config) -> Self {
        let tracker = match config.first_sequence {
            Some(first) => SequenceTracker::with_first(first),
            None => SequenceTracker::new(),
        };
        Self {
            connector,
            stream: None,
            max_recovery_passes: config.max_recovery_passes,
            tracker,
            assembler: ResultAssembler::new(),
            recovery_requests: 0,
        }
    }

    /// Run the session to completion.
    ///
    /// Fails on connection errors and on transport I/O errors other than the
    /// stream closing or a read timing out.
    pub fn run(mut self) -> Result<RunOutcome> {
        let endpoint = self.connector.endpoint();
        self.stream = Some(self.connector.connect()?);
        info!(%endpoint, "connected");

        self.stream_all()?;
        let passes = self.recover()?;

        let missing: Vec<RangeInclusive<i32>> = self.tracker.missing().ranges().collect();
        if !missing.is_empty() {
            warn!(
                count = self.tracker.missing().len(),
                ranges = missing.len(),
                first = ?missing.first(),
                passes,
                "sequences still missing after recovery"
            );
        }
        self.stream = None;
        info!(
            packets = self.assembler.len(),
            passes,
            recovery_requests = self.recovery_requests,
            "session done"
        );
        Ok(RunOutcome {
            packets: self.assembler.into_ordered(),
            missing,
            passes,
            recovery_requests: self.recovery_requests,
        })
    }

    /// Existing stream, or a new connection if the last one was closed.
    fn take_stream(&mut self) -> Result<C::Stream> {
        match self.stream.take() {
            Some(stream) => Ok(stream),
            None => {
                debug!(endpoint = %self.connector.endpoint(), "opening new connection");
                self.connector.connect()
            }
        }
    }

    fn accept(&mut self, packet: Packet) {
        let sequence = packet.sequence;
        self.tracker.record_seen(sequence);
        if !self.assembler.insert(packet) {
            debug!(sequence, "duplicate packet dropped");
        }
    }

    fn stream_all(&mut self) -> Result<()> {
        let mut stream = self.take_stream()?;
        send(&mut stream, CallType::StreamAll, 0)?;

        let mut buf = [0u8; PACKET_LEN];
        let mut received = 0usize;
        let fill = loop {
            let fill = fill_record(&mut stream, &mut buf)?;
            match decode_packet(&buf[..fill.filled()]) {
                Ok(packet) => {
                    received += 1;
                    self.accept(packet);
                }
                Err(ClientError::MalformedPacket { len }) => {
                    if len > 0 {
                        warn!(len, "partial record at end of replay discarded");
                    }
                    break fill;
                }
                Err(e) => return Err(e),
            }
        };
        // a clean timeout leaves the stream aligned on a record boundary
        if fill == Fill::TimedOut(0) {
            self.stream = Some(stream);
        }
        info!(
            received,
            unique = self.tracker.len(),
            missing = self.tracker.missing().len(),
            "replay drained"
        );
        Ok(())
    }

    /// Bounded recovery loop; returns the number of passes executed.
    fn recover(&mut self) -> Result<u32> {
        let mut passes = 0;
        while passes < self.max_recovery_passes {
            let missing = self.tracker.missing();
            if missing.is_empty() {
                break;
            }
            let targets: Vec<u8> = missing.within(0..=255).filter_map(resend_target).collect();
            let unaddressable = missing.len() - targets.len() as u64;
            if unaddressable > 0 && passes == 0 {
                warn!(unaddressable, "sequences outside 0..=255 cannot be re-requested");
            }
            if targets.is_empty() {
                break;
            }
            passes += 1;
            info!(pass = passes, requests = targets.len(), "recovery pass");
            for sequence in targets {
                self.recover_one(sequence)?;
            }
        }
        Ok(passes)
    }

    fn recover_one(&mut self, sequence: u8) -> Result<()> {
        let mut stream = self.take_stream()?;
        debug!(sequence, "requesting resend");
        send(&mut stream, CallType::ResendBySequence, sequence)?;
        self.recovery_requests += 1;

        let mut buf = [0u8; PACKET_LEN];
        let fill = fill_record(&mut stream, &mut buf)?;
        match decode_packet(&buf[..fill.filled()]) {
            Ok(packet) => {
                if packet.sequence != i32::from(sequence) {
                    warn!(
                        requested = sequence,
                        got = packet.sequence,
                        "resend returned another sequence"
                    );
                }
                self.accept(packet);
                self.stream = Some(stream);
            }
            Err(ClientError::MalformedPacket { len }) => {
                warn!(sequence, len, ?fill, "resend failed; sequence still missing");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}
