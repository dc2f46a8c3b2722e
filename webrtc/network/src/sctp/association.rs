//! SCTP association state machine
//!
//! An association runs the RFC 4960 four-way handshake over a datagram
//! [`Conn`] (normally a DTLS record layer) and then multiplexes reliable,
//! message-preserving [`Stream`]s over it.
//!
//! Two worker threads serve each association: the read loop parses inbound
//! packets under the association lock, and the timer worker drives T3-rtx
//! retransmission and heartbeats. The client runs the T1-init timer in the
//! thread that called [`Association::client`]. Packets produced under the
//! lock are written only after it is released, and in the order they were
//! produced.
//!
//! Outbound DATA waits in a pending queue until the peer's advertised
//! receive window has room for it; TSNs are assigned as chunks leave that
//! queue.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use logging::Logger;
use serde::Deserialize;

use super::chunk::{DataChunk, InitChunk, SackChunk, SctpChunk};
use super::error_cause::{ErrorCause, ErrorCauseCode};
use super::packet::SctpPacket;
use super::param::{Param, ParamType};
use super::payload_queue::PayloadQueue;
use super::sna::{sna32_gt, sna32_lt};
use super::stream::Stream;
use super::timer::RtoManager;
use crate::conn::Conn;
use crate::error::{NetworkError, Result};

/// Receive buffer for one inbound packet
const RECEIVE_MTU: usize = 8192;

/// Upper bound for a user message, whatever the configuration says.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Timer worker wake-up when nothing is scheduled.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// SCTP association states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    /// Initial state, no association
    Closed,
    /// INIT sent, waiting for INIT-ACK
    CookieWait,
    /// COOKIE-ECHO sent, waiting for COOKIE-ACK
    CookieEchoed,
    /// Association established
    Established,
    /// Shutdown initiated
    ShutdownPending,
    /// Shutdown sent
    ShutdownSent,
    /// Shutdown received
    ShutdownReceived,
    /// Shutdown acknowledged
    ShutdownAckSent,
}

/// Configuration for SCTP association
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Local SCTP port
    pub local_port: u16,
    /// Remote SCTP port
    pub remote_port: u16,
    /// Maximum number of outbound streams
    pub max_outbound_streams: u16,
    /// Maximum number of inbound streams
    pub max_inbound_streams: u16,
    /// Receiver window size
    pub recv_window: u32,
    /// Largest message a stream accepts for sending
    pub max_message_size: usize,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
    /// INIT / COOKIE-ECHO retransmissions before the handshake fails
    pub max_init_retransmits: u32,
    /// Consecutive T3-rtx expiries without progress before the peer is
    /// declared unreachable
    pub max_retransmits: u32,
    /// Idle time before a HEARTBEAT is sent; 0 disables heartbeats
    pub heartbeat_interval_ms: u64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            local_port: 5000,
            remote_port: 5000,
            max_outbound_streams: 65535,
            max_inbound_streams: 65535,
            recv_window: 131072, // 128KB
            max_message_size: MAX_MESSAGE_SIZE,
            rto_initial_ms: 3000,
            rto_min_ms: 1000,
            rto_max_ms: 60000,
            max_init_retransmits: 8,
            max_retransmits: 10,
            heartbeat_interval_ms: 30000,
        }
    }
}

impl AssociationConfig {
    /// Rejects configurations the association cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_outbound_streams == 0 || self.max_inbound_streams == 0 {
            return Err(NetworkError::Config(
                "stream counts must be positive".to_string(),
            ));
        }
        if self.recv_window < super::chunk::MIN_ADVERTISED_WINDOW {
            return Err(NetworkError::Config(format!(
                "recv_window {} below {}",
                self.recv_window,
                super::chunk::MIN_ADVERTISED_WINDOW
            )));
        }
        if self.rto_min_ms == 0
            || self.rto_min_ms > self.rto_initial_ms
            || self.rto_initial_ms > self.rto_max_ms
        {
            return Err(NetworkError::Config(
                "RTO values must satisfy 0 < min <= initial <= max".to_string(),
            ));
        }
        Ok(())
    }

    fn rto_initial(&self) -> Duration {
        Duration::from_millis(self.rto_initial_ms)
    }

    fn rto_max(&self) -> Duration {
        Duration::from_millis(self.rto_max_ms)
    }
}

/// Mutable association state, guarded by `AssociationInner::core`.
struct Core {
    state: AssociationState,
    my_verification_tag: u32,
    peer_verification_tag: u32,
    my_next_tsn: u32,
    /// Highest outbound TSN acknowledged cumulatively by the peer
    cumulative_tsn_ack_point: u32,
    /// Highest inbound TSN delivered in sequence
    peer_last_tsn: u32,
    /// Cookie handed out in our INIT-ACK (server side)
    my_cookie: Option<Vec<u8>>,
    /// INIT or COOKIE-ECHO packet awaiting its answer (client side)
    t1_packet: Option<Vec<u8>>,
    /// Out-of-order inbound DATA
    payload_queue: PayloadQueue,
    /// Sent but not cumulatively acknowledged DATA
    inflight_queue: PayloadQueue,
    /// Written DATA not yet given a TSN, held back by the peer's window
    pending_queue: VecDeque<DataChunk>,
    /// Peer receive window left after what is in flight
    peer_rwnd: u32,
    /// T3-rtx expiries since the peer last showed progress
    error_count: u32,
    streams: HashMap<u16, Arc<Stream>>,
    accept_tx: Option<Sender<Arc<Stream>>>,
    rto: RtoManager,
    last_sent: Instant,
    close_reason: Option<String>,
}

pub(crate) struct AssociationInner {
    conn: Arc<dyn Conn>,
    config: AssociationConfig,
    is_client: bool,
    core: Mutex<Core>,
    /// Signalled on every state change and whenever DATA goes in flight.
    changed: Condvar,
    /// Taken before `core` is released and held while packets are written.
    send_order: Mutex<()>,
    accept_rx: Mutex<Receiver<Arc<Stream>>>,
    logger: Logger,
}

/// Represents an SCTP association (connection)
pub struct Association {
    inner: Arc<AssociationInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Association {
    /// Active open: sends INIT and blocks until the handshake completes.
    ///
    /// # Errors
    ///
    /// `HandshakeFailed` if the peer aborts, answers with an invalid
    /// INIT-ACK, or stays silent through every T1 retransmission.
    pub fn client(conn: Arc<dyn Conn>, config: AssociationConfig, logger: Logger) -> Result<Self> {
        let association = Self::start(conn, config, logger, true)?;
        match association.inner.client_handshake() {
            Ok(()) => Ok(association),
            Err(e) => {
                let _ = association.close();
                Err(e)
            }
        }
    }

    /// Passive open: blocks until a peer completes the handshake or the
    /// transport closes.
    pub fn server(conn: Arc<dyn Conn>, config: AssociationConfig, logger: Logger) -> Result<Self> {
        let association = Self::start(conn, config, logger, false)?;
        match association.inner.server_handshake() {
            Ok(()) => Ok(association),
            Err(e) => {
                let _ = association.close();
                Err(e)
            }
        }
    }

    fn start(
        conn: Arc<dyn Conn>,
        config: AssociationConfig,
        logger: Logger,
        is_client: bool,
    ) -> Result<Self> {
        config.validate()?;

        let (accept_tx, accept_rx) = mpsc::channel();
        let my_next_tsn: u32 = rand::random();
        let core = Core {
            state: AssociationState::Closed,
            my_verification_tag: nonzero_random(),
            peer_verification_tag: 0,
            my_next_tsn,
            cumulative_tsn_ack_point: my_next_tsn.wrapping_sub(1),
            peer_last_tsn: 0,
            my_cookie: None,
            t1_packet: None,
            payload_queue: PayloadQueue::new(),
            inflight_queue: PayloadQueue::new(),
            pending_queue: VecDeque::new(),
            peer_rwnd: 0,
            error_count: 0,
            streams: HashMap::new(),
            accept_tx: Some(accept_tx),
            rto: RtoManager::new(
                config.rto_initial(),
                Duration::from_millis(config.rto_min_ms),
                config.rto_max(),
            ),
            last_sent: Instant::now(),
            close_reason: None,
        };

        let inner = Arc::new(AssociationInner {
            conn,
            config,
            is_client,
            core: Mutex::new(core),
            changed: Condvar::new(),
            send_order: Mutex::new(()),
            accept_rx: Mutex::new(accept_rx),
            logger,
        });

        let reader = {
            let inner = Arc::clone(&inner);
            thread::Builder::new()
                .name("sctp-read".to_string())
                .spawn(move || inner.read_loop())?
        };
        let association = Self {
            inner: Arc::clone(&inner),
            workers: Mutex::new(vec![reader]),
        };

        let timer = thread::Builder::new()
            .name("sctp-timer".to_string())
            .spawn(move || inner.timer_loop());
        match timer {
            Ok(handle) => {
                association
                    .workers
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(handle);
                Ok(association)
            }
            Err(e) => {
                let _ = association.close();
                Err(e.into())
            }
        }
    }

    pub fn state(&self) -> AssociationState {
        self.inner.lock().state
    }

    /// Opens an outbound stream.
    ///
    /// # Errors
    ///
    /// `StreamExists` if a stream with this identifier is open,
    /// `AssociationClosed` after close.
    pub fn open_stream(&self, stream_id: u16, default_ppi: u32) -> Result<Arc<Stream>> {
        let mut core = self.inner.lock();
        if core.state == AssociationState::Closed {
            return Err(NetworkError::AssociationClosed);
        }
        if core
            .streams
            .get(&stream_id)
            .is_some_and(|s| !s.is_closed())
        {
            return Err(NetworkError::StreamExists(stream_id));
        }

        let stream = Arc::new(self.inner.new_stream(stream_id, default_ppi));
        core.streams.insert(stream_id, Arc::clone(&stream));
        self.inner
            .logger
            .debug(&format!("opened stream {}", stream_id));
        Ok(stream)
    }

    /// Blocks until the peer starts sending on a stream we have not opened.
    pub fn accept_stream(&self) -> Result<Arc<Stream>> {
        self.inner
            .accept_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recv()
            .map_err(|_| NetworkError::AssociationClosed)
    }

    /// Aborts the association, closes the transport and waits for the
    /// workers to exit. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut core = self.inner.lock();
        let abort = (core.state == AssociationState::Established).then(|| {
            self.inner.packet(
                &core,
                SctpChunk::Abort {
                    tcb_reflected: false,
                    causes: vec![ErrorCause::user_initiated_abort("association closed")],
                },
            )
        });
        self.inner
            .shutdown_locked(&mut core, "closed locally".to_string());
        let _ = self.inner.send_all(core, abort.into_iter().collect());

        let result = self.inner.conn.close();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() != current && worker.join().is_err() {
                self.inner.logger.error("sctp worker panicked");
            }
        }
        result
    }
}

impl Drop for Association {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn random_state_cookie() -> Vec<u8> {
    rand::random::<[u8; 32]>().to_vec()
}

fn nonzero_random() -> u32 {
    loop {
        let value: u32 = rand::random();
        if value != 0 {
            return value;
        }
    }
}

impl AssociationInner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn max_message_size(&self) -> usize {
        self.config.max_message_size.min(MAX_MESSAGE_SIZE)
    }

    fn new_stream(self: &Arc<Self>, stream_id: u16, default_ppi: u32) -> Stream {
        Stream::new(
            stream_id,
            default_ppi,
            Arc::downgrade(self),
            self.logger.clone(),
        )
    }

    /// Marshals `chunk` in a packet addressed with the peer's tag.
    fn packet(&self, core: &Core, chunk: SctpChunk) -> Vec<u8> {
        self.packet_with_tag(core.peer_verification_tag, chunk)
    }

    fn packet_with_tag(&self, verification_tag: u32, chunk: SctpChunk) -> Vec<u8> {
        let mut packet = SctpPacket::new(
            self.config.local_port,
            self.config.remote_port,
            verification_tag,
        );
        packet.add_chunk(chunk);
        packet.to_bytes()
    }

    /// Releases `core` and writes `packets`. The send lock is taken first,
    /// so packets built under the core lock reach the transport in the
    /// order they were built.
    fn send_all(&self, core: MutexGuard<'_, Core>, packets: Vec<Vec<u8>>) -> Result<()> {
        if packets.is_empty() {
            return Ok(());
        }
        let _order = self.send_order.lock().unwrap_or_else(|e| e.into_inner());
        drop(core);
        for bytes in packets {
            self.conn.send(&bytes)?;
        }
        Ok(())
    }

    fn send_or_warn(&self, core: MutexGuard<'_, Core>, packets: Vec<Vec<u8>>) {
        if let Err(e) = self.send_all(core, packets) {
            self.logger.warn(&format!("sctp send failed: {}", e));
        }
    }

    fn set_state(&self, core: &mut Core, state: AssociationState) {
        if core.state != state {
            self.logger
                .debug(&format!("state {:?} -> {:?}", core.state, state));
            core.state = state;
            self.changed.notify_all();
        }
    }

    /// Moves to Closed and releases every blocked caller.
    fn shutdown_locked(&self, core: &mut Core, reason: String) {
        if core.close_reason.is_some() {
            return;
        }
        self.logger.debug(&format!("association closing: {}", reason));
        core.close_reason = Some(reason);
        self.set_state(core, AssociationState::Closed);
        core.accept_tx = None;
        core.t1_packet = None;
        core.pending_queue.clear();
        for stream in core.streams.values() {
            stream.mark_closed();
        }
        self.changed.notify_all();
    }

    fn handshake_error(core: &Core) -> NetworkError {
        NetworkError::HandshakeFailed(
            core.close_reason
                .clone()
                .unwrap_or_else(|| "association closed".to_string()),
        )
    }

    /// Sends INIT, then retransmits INIT or COOKIE-ECHO on T1 expiry until
    /// the association is established.
    fn client_handshake(&self) -> Result<()> {
        let mut core = self.lock();

        let mut init = InitChunk::new(core.my_verification_tag, core.my_next_tsn);
        init.a_rwnd = self.config.recv_window;
        init.num_outbound_streams = self.config.max_outbound_streams;
        init.num_inbound_streams = self.config.max_inbound_streams;
        init.params.push(Param::ForwardTsnSupported);
        let bytes = self.packet_with_tag(0, SctpChunk::Init(init));
        core.t1_packet = Some(bytes.clone());
        self.set_state(&mut core, AssociationState::CookieWait);
        self.send_all(core, vec![bytes])?;

        let mut rto = self.config.rto_initial();
        let mut retransmits = 0u32;
        let mut deadline = Instant::now() + rto;
        let mut core = self.lock();
        let mut phase = core.state;

        loop {
            match core.state {
                AssociationState::Established => return Ok(()),
                AssociationState::Closed => return Err(Self::handshake_error(&core)),
                state if state != phase => {
                    // COOKIE-ECHO went out; T1 restarts for it
                    phase = state;
                    rto = self.config.rto_initial();
                    retransmits = 0;
                    deadline = Instant::now() + rto;
                }
                _ => {}
            }

            let now = Instant::now();
            if now < deadline {
                core = self
                    .changed
                    .wait_timeout(core, deadline - now)
                    .unwrap_or_else(|e| e.into_inner())
                    .0;
                continue;
            }

            if retransmits >= self.config.max_init_retransmits {
                let reason = format!(
                    "no answer to {:?} after {} retransmissions",
                    phase, retransmits
                );
                self.shutdown_locked(&mut core, reason);
                return Err(Self::handshake_error(&core));
            }

            retransmits += 1;
            rto = (rto * 2).min(self.config.rto_max());
            deadline = now + rto;
            let Some(bytes) = core.t1_packet.clone() else {
                continue;
            };
            self.logger.debug(&format!(
                "T1 expired in {:?}, retransmission {}",
                phase, retransmits
            ));
            self.send_or_warn(core, vec![bytes]);
            core = self.lock();
        }
    }

    fn server_handshake(&self) -> Result<()> {
        let mut core = self.lock();
        loop {
            match core.state {
                AssociationState::Established => return Ok(()),
                AssociationState::Closed if core.close_reason.is_some() => {
                    return Err(Self::handshake_error(&core));
                }
                _ => {
                    core = self
                        .changed
                        .wait(core)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }

    fn read_loop(self: &Arc<Self>) {
        let mut buf = vec![0u8; RECEIVE_MTU];
        loop {
            match self.conn.recv(&mut buf) {
                Ok(n) => self.handle_inbound(&buf[..n]),
                Err(e @ (NetworkError::Timeout | NetworkError::ShortBuffer { .. })) => {
                    self.logger.warn(&format!("sctp read: {}", e));
                }
                Err(e) => {
                    if e.is_closed() {
                        self.logger.debug("transport closed, stopping read loop");
                    } else {
                        self.logger.error(&format!("sctp read loop failed: {}", e));
                    }
                    let mut core = self.lock();
                    self.shutdown_locked(&mut core, format!("transport: {}", e));
                    return;
                }
            }
        }
    }

    fn handle_inbound(self: &Arc<Self>, raw: &[u8]) {
        let packet = match SctpPacket::from_bytes(raw) {
            Ok(packet) => packet,
            Err(e) => {
                self.logger
                    .warn(&format!("dropping malformed SCTP packet: {}", e));
                return;
            }
        };

        let mut core = self.lock();
        if let Err(e) = self.check_packet(&core, &packet) {
            self.logger.warn(&format!("dropping SCTP packet: {}", e));
            return;
        }

        let mut outbound = Vec::new();
        let mut data_received = false;
        for chunk in packet.chunks {
            if core.close_reason.is_some() {
                break;
            }
            self.logger.trace(&format!("received {}", chunk.chunk_type()));
            match chunk {
                SctpChunk::Init(init) => self.handle_init(&mut core, init, &mut outbound),
                SctpChunk::InitAck(init_ack) => {
                    self.handle_init_ack(&mut core, init_ack, &mut outbound)
                }
                SctpChunk::CookieEcho(cookie) => {
                    self.handle_cookie_echo(&mut core, &cookie, &mut outbound)
                }
                SctpChunk::CookieAck => {
                    if core.state == AssociationState::CookieEchoed {
                        core.t1_packet = None;
                        self.set_state(&mut core, AssociationState::Established);
                    }
                }
                SctpChunk::Data(data) => {
                    data_received = true;
                    self.handle_data(&mut core, data);
                }
                SctpChunk::Sack(sack) => self.handle_sack(&mut core, sack, &mut outbound),
                SctpChunk::Heartbeat { info } => {
                    outbound.push(self.packet(&core, SctpChunk::HeartbeatAck { info }));
                }
                SctpChunk::HeartbeatAck { .. } => core.error_count = 0,
                SctpChunk::Abort { causes, .. } => {
                    let reason = describe_causes(&causes);
                    self.logger
                        .warn(&format!("association aborted by peer: {}", reason));
                    self.shutdown_locked(&mut core, format!("aborted by peer: {}", reason));
                    break;
                }
                SctpChunk::Error { causes } => {
                    self.logger
                        .warn(&format!("peer reported: {}", describe_causes(&causes)));
                }
                chunk @ (SctpChunk::Shutdown { .. }
                | SctpChunk::ShutdownAck
                | SctpChunk::ShutdownComplete { .. }
                | SctpChunk::Cwr { .. }) => {
                    self.logger
                        .debug(&format!("ignoring {}", chunk.chunk_type()));
                }
            }
        }

        if data_received && core.state == AssociationState::Established {
            let sack = self.create_sack(&mut core);
            outbound.push(self.packet(&core, SctpChunk::Sack(sack)));
        }
        if !outbound.is_empty() {
            core.last_sent = Instant::now();
        }
        self.send_or_warn(core, outbound);
    }

    /// INIT travels alone with tag 0; everything else carries our tag.
    fn check_packet(&self, core: &Core, packet: &SctpPacket) -> Result<()> {
        let has_init = packet
            .chunks
            .iter()
            .any(|c| matches!(c, SctpChunk::Init(_) | SctpChunk::InitAck(_)));
        if has_init && packet.chunks.len() > 1 {
            return Err(NetworkError::Protocol(
                "INIT or INIT-ACK bundled with other chunks".to_string(),
            ));
        }

        if let Some(SctpChunk::Init(_)) = packet.chunks.first() {
            if packet.verification_tag != 0 {
                return Err(NetworkError::Protocol(format!(
                    "INIT with verification tag {:#x}",
                    packet.verification_tag
                )));
            }
            return Ok(());
        }

        let reflected_abort = matches!(
            packet.chunks.first(),
            Some(SctpChunk::Abort {
                tcb_reflected: true,
                ..
            })
        );
        let expected = if reflected_abort {
            core.peer_verification_tag
        } else {
            core.my_verification_tag
        };
        if packet.verification_tag != expected {
            return Err(NetworkError::Protocol(format!(
                "verification tag {:#x}, expected {:#x}",
                packet.verification_tag, expected
            )));
        }
        Ok(())
    }

    fn handle_init(&self, core: &mut Core, init: InitChunk, outbound: &mut Vec<Vec<u8>>) {
        if core.state == AssociationState::Established {
            self.logger.warn("INIT while established, aborting");
            outbound.push(self.packet_with_tag(
                init.initiate_tag,
                SctpChunk::Abort {
                    tcb_reflected: false,
                    causes: vec![ErrorCause::protocol_violation("INIT while established")],
                },
            ));
            self.shutdown_locked(core, "INIT received while established".to_string());
            return;
        }
        if self.is_client || core.state != AssociationState::Closed {
            self.logger
                .debug(&format!("ignoring INIT in {:?}", core.state));
            return;
        }
        if let Err(e) = init.check() {
            self.logger.warn(&format!("invalid INIT: {}", e));
            outbound.push(self.packet_with_tag(
                init.initiate_tag,
                SctpChunk::Abort {
                    tcb_reflected: false,
                    causes: vec![ErrorCause::new(
                        ErrorCauseCode::InvalidMandatoryParameter,
                        Vec::new(),
                    )],
                },
            ));
            return;
        }

        core.peer_verification_tag = init.initiate_tag;
        core.peer_last_tsn = init.initial_tsn.wrapping_sub(1);
        core.peer_rwnd = init.a_rwnd;

        // A retransmitted INIT gets the same cookie back.
        let cookie = core
            .my_cookie
            .get_or_insert_with(random_state_cookie)
            .clone();

        let mut init_ack = InitChunk::new(core.my_verification_tag, core.my_next_tsn);
        init_ack.a_rwnd = self.config.recv_window;
        init_ack.num_outbound_streams = init
            .num_inbound_streams
            .min(self.config.max_outbound_streams);
        init_ack.num_inbound_streams = init
            .num_outbound_streams
            .min(self.config.max_inbound_streams);
        init_ack.params.push(Param::StateCookie(cookie));
        init_ack.params.push(Param::ForwardTsnSupported);

        outbound.push(self.packet(core, SctpChunk::InitAck(init_ack)));
    }

    fn handle_init_ack(&self, core: &mut Core, init_ack: InitChunk, outbound: &mut Vec<Vec<u8>>) {
        if core.state != AssociationState::CookieWait {
            self.logger
                .debug(&format!("ignoring INIT-ACK in {:?}", core.state));
            return;
        }
        if let Err(e) = init_ack.check() {
            self.shutdown_locked(core, format!("invalid INIT-ACK: {}", e));
            return;
        }

        core.peer_verification_tag = init_ack.initiate_tag;
        core.peer_last_tsn = init_ack.initial_tsn.wrapping_sub(1);
        core.peer_rwnd = init_ack.a_rwnd;

        let Some(cookie) = init_ack.state_cookie().map(<[u8]>::to_vec) else {
            outbound.push(self.packet(
                core,
                SctpChunk::Abort {
                    tcb_reflected: false,
                    causes: vec![ErrorCause::missing_mandatory_parameter(&[
                        ParamType::StateCookie.to_u16(),
                    ])],
                },
            ));
            self.shutdown_locked(core, "INIT-ACK without state cookie".to_string());
            return;
        };

        let bytes = self.packet(core, SctpChunk::CookieEcho(cookie));
        core.t1_packet = Some(bytes.clone());
        outbound.push(bytes);
        self.set_state(core, AssociationState::CookieEchoed);
    }

    fn handle_cookie_echo(&self, core: &mut Core, cookie: &[u8], outbound: &mut Vec<Vec<u8>>) {
        if core.my_cookie.as_deref() != Some(cookie) {
            self.logger.warn("COOKIE-ECHO with unknown cookie");
            return;
        }
        match core.state {
            AssociationState::Closed => {
                self.set_state(core, AssociationState::Established);
            }
            // our COOKIE-ACK was lost
            AssociationState::Established => {}
            state => {
                self.logger
                    .debug(&format!("ignoring COOKIE-ECHO in {:?}", state));
                return;
            }
        }
        outbound.push(self.packet(core, SctpChunk::CookieAck));
    }

    fn handle_data(self: &Arc<Self>, core: &mut Core, chunk: DataChunk) {
        if core.state != AssociationState::Established {
            return;
        }

        let cumulative = core.peer_last_tsn;
        if !core.payload_queue.push(chunk, cumulative) {
            self.logger.trace("duplicate DATA");
            return;
        }

        while let Some(chunk) = core.payload_queue.pop(core.peer_last_tsn.wrapping_add(1)) {
            core.peer_last_tsn = chunk.tsn;
            self.deliver(core, chunk);
        }
    }

    /// Hands an in-sequence chunk to its stream, creating it for the peer
    /// if needed.
    fn deliver(self: &Arc<Self>, core: &mut Core, chunk: DataChunk) {
        let stream_id = chunk.stream_id;
        let stream = match core.streams.get(&stream_id) {
            Some(stream) => Arc::clone(stream),
            None => {
                let stream = Arc::new(self.new_stream(stream_id, chunk.ppid));
                core.streams.insert(stream_id, Arc::clone(&stream));
                self.logger
                    .debug(&format!("peer opened stream {}", stream_id));
                if let Some(tx) = &core.accept_tx {
                    let _ = tx.send(Arc::clone(&stream));
                }
                stream
            }
        };
        stream.handle_data(chunk);
    }

    fn create_sack(&self, core: &mut Core) -> SackChunk {
        let buffered = core.payload_queue.n_bytes()
            + core
                .streams
                .values()
                .map(|s| s.buffered_bytes())
                .sum::<usize>();
        let a_rwnd = (self.config.recv_window as usize).saturating_sub(buffered) as u32;

        let mut sack = SackChunk::new(core.peer_last_tsn, a_rwnd);
        sack.gap_ack_blocks = core.payload_queue.get_gap_ack_blocks(core.peer_last_tsn);
        sack.duplicate_tsns = core.payload_queue.pop_duplicates();
        sack
    }

    fn handle_sack(&self, core: &mut Core, sack: SackChunk, outbound: &mut Vec<Vec<u8>>) {
        if core.state != AssociationState::Established {
            return;
        }
        let highest_sent = core.my_next_tsn.wrapping_sub(1);
        if sna32_gt(sack.cumulative_tsn, highest_sent) {
            self.logger.warn(&format!(
                "dropping SACK for TSN {} beyond highest sent {}",
                sack.cumulative_tsn, highest_sent
            ));
            return;
        }
        if sna32_lt(sack.cumulative_tsn, core.cumulative_tsn_ack_point) {
            self.logger.trace(&format!(
                "stale SACK {} below ack point {}",
                sack.cumulative_tsn, core.cumulative_tsn_ack_point
            ));
            return;
        }

        let now = Instant::now();
        if sack.cumulative_tsn != core.cumulative_tsn_ack_point {
            core.error_count = 0;
        }
        while core.cumulative_tsn_ack_point != sack.cumulative_tsn {
            let tsn = core.cumulative_tsn_ack_point.wrapping_add(1);
            core.cumulative_tsn_ack_point = tsn;
            let Some(chunk) = core.inflight_queue.pop(tsn) else {
                self.logger
                    .warn(&format!("acknowledged TSN {} was not in flight", tsn));
                continue;
            };
            // Karn: only first transmissions yield RTT samples
            if chunk.transmit_count == 1
                && let Some(sent_at) = chunk.sent_at
            {
                core.rto.set_new_rtt(now.duration_since(sent_at));
            }
        }

        let in_flight = u32::try_from(core.inflight_queue.n_bytes()).unwrap_or(u32::MAX);
        core.peer_rwnd = sack.a_rwnd.saturating_sub(in_flight);

        let mut prev_end: u16 = 0;
        for block in &sack.gap_ack_blocks {
            for offset in prev_end.wrapping_add(1)..block.start {
                let tsn = sack.cumulative_tsn.wrapping_add(u32::from(offset));
                if let Some(chunk) = core.inflight_queue.get_mut(tsn) {
                    chunk.transmit_count += 1;
                    chunk.sent_at = Some(now);
                    let chunk = chunk.clone();
                    self.logger
                        .trace(&format!("retransmitting TSN {} reported missing", tsn));
                    outbound.push(self.packet(core, SctpChunk::Data(chunk)));
                }
            }
            prev_end = block.end;
        }

        let released = self.flush_pending(core, now);
        outbound.extend(released);
        self.changed.notify_all();
    }

    /// Queues `chunks` behind earlier writes and transmits what the peer's
    /// receive window admits. The rest leaves as SACKs reopen the window.
    ///
    /// Packets reach the transport in TSN order even with concurrent
    /// writers, and the fragments of one call are never interleaved with
    /// another's.
    pub(crate) fn send_payload(&self, chunks: Vec<DataChunk>) -> Result<()> {
        let mut core = self.lock();
        if core.state != AssociationState::Established {
            return Err(NetworkError::AssociationClosed);
        }
        core.pending_queue.extend(chunks);
        let packets = self.flush_pending(&mut core, Instant::now());
        self.send_all(core, packets)
    }

    /// Moves pending chunks in flight while the window has room. With
    /// nothing outstanding one chunk always goes, so a peer advertising a
    /// zero window still hears from us.
    fn flush_pending(&self, core: &mut Core, now: Instant) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        while let Some(front) = core.pending_queue.front() {
            let len = u32::try_from(front.data.len()).unwrap_or(u32::MAX);
            if len > core.peer_rwnd && !core.inflight_queue.is_empty() {
                self.logger.trace(&format!(
                    "peer window {} full, {} chunks pending",
                    core.peer_rwnd,
                    core.pending_queue.len()
                ));
                break;
            }
            let Some(mut chunk) = core.pending_queue.pop_front() else {
                break;
            };
            chunk.tsn = core.my_next_tsn;
            core.my_next_tsn = core.my_next_tsn.wrapping_add(1);
            chunk.transmit_count = 1;
            chunk.sent_at = Some(now);
            core.peer_rwnd = core.peer_rwnd.saturating_sub(len);

            packets.push(self.packet(core, SctpChunk::Data(chunk.clone())));
            let ack_point = core.cumulative_tsn_ack_point;
            core.inflight_queue.push(chunk, ack_point);
        }
        if !packets.is_empty() {
            core.last_sent = now;
            self.changed.notify_all();
        }
        packets
    }

    /// T3-rtx and heartbeat driver.
    fn timer_loop(&self) {
        let heartbeat_interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        let mut core = self.lock();

        loop {
            if core.state == AssociationState::Closed && core.close_reason.is_some() {
                return;
            }

            let now = Instant::now();
            let mut wake = now + IDLE_TICK;
            let mut outbound = Vec::new();

            if core.state == AssociationState::Established {
                let rto = core.rto.rto();
                let expiry = core
                    .inflight_queue
                    .iter()
                    .next()
                    .map(|c| (c.tsn, c.sent_at.unwrap_or(now) + rto));

                if let Some((tsn, expiry)) = expiry {
                    if now >= expiry {
                        core.error_count += 1;
                        if core.error_count > self.config.max_retransmits {
                            let reason = format!(
                                "peer unreachable: TSN {} unacknowledged after {} retransmissions",
                                tsn, self.config.max_retransmits
                            );
                            self.logger.warn(&reason);
                            self.shutdown_locked(&mut core, reason);
                            continue;
                        }
                        let backed_off = core.rto.backoff();
                        self.logger.debug(&format!(
                            "T3-rtx expired, retransmitting TSN {}, RTO now {:?}",
                            tsn, backed_off
                        ));
                        if let Some(chunk) = core.inflight_queue.get_mut(tsn) {
                            chunk.transmit_count += 1;
                            chunk.sent_at = Some(now);
                            let chunk = chunk.clone();
                            outbound.push(self.packet(&core, SctpChunk::Data(chunk)));
                        }
                    } else {
                        wake = wake.min(expiry);
                    }
                }

                if !heartbeat_interval.is_zero() {
                    let due = core.last_sent + heartbeat_interval;
                    if now >= due {
                        let info = rand::random::<[u8; 8]>().to_vec();
                        outbound.push(self.packet(&core, SctpChunk::Heartbeat { info }));
                    } else {
                        wake = wake.min(due);
                    }
                }
            }

            if !outbound.is_empty() {
                core.last_sent = now;
                self.send_or_warn(core, outbound);
                core = self.lock();
                continue;
            }

            core = self
                .changed
                .wait_timeout(core, wake.saturating_duration_since(now))
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}

fn describe_causes(causes: &[ErrorCause]) -> String {
    if causes.is_empty() {
        return "no cause given".to_string();
    }
    causes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{PipeConn, pipe};
    use crate::sctp::chunk::ppid;

    /// An association forced into Established over a pipe nobody answers,
    /// with `peer_rwnd` as the peer's window.
    fn established(peer_rwnd: u32) -> (Association, PipeConn) {
        let (local, peer) = pipe();
        let config = AssociationConfig {
            heartbeat_interval_ms: 0,
            ..AssociationConfig::default()
        };
        let association = Association::start(Arc::new(local), config, Logger::discard(), true)
            .expect("start association");
        {
            let mut core = association.inner.lock();
            core.state = AssociationState::Established;
            core.peer_rwnd = peer_rwnd;
        }
        (association, peer)
    }

    fn chunks(count: u16, len: usize) -> Vec<DataChunk> {
        (0..count)
            .map(|ssn| DataChunk::new(0, 0, ssn, ppid::BINARY, vec![0; len]))
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AssociationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_init_retransmits, 8);
        assert_eq!(config.max_retransmits, 10);
        assert_eq!(config.rto_initial(), Duration::from_secs(3));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let small_window = AssociationConfig {
            recv_window: 100,
            ..AssociationConfig::default()
        };
        assert!(matches!(small_window.validate(), Err(NetworkError::Config(_))));

        let inverted_rto = AssociationConfig {
            rto_min_ms: 5000,
            ..AssociationConfig::default()
        };
        assert!(matches!(inverted_rto.validate(), Err(NetworkError::Config(_))));
    }

    #[test]
    fn test_sack_beyond_highest_sent_is_dropped() {
        let (association, _peer) = established(u32::MAX);
        let inner = &association.inner;
        inner.send_payload(chunks(3, 100)).unwrap();

        let mut core = inner.lock();
        let before = core.cumulative_tsn_ack_point;
        let first = before.wrapping_add(1);
        let mut outbound = Vec::new();

        inner.handle_sack(&mut core, SackChunk::new(first.wrapping_add(5), 100_000), &mut outbound);
        assert_eq!(core.cumulative_tsn_ack_point, before);
        assert_eq!(core.inflight_queue.len(), 3);

        inner.handle_sack(&mut core, SackChunk::new(first.wrapping_add(1), 100_000), &mut outbound);
        assert_eq!(core.cumulative_tsn_ack_point, first.wrapping_add(1));
        assert_eq!(core.inflight_queue.len(), 1);

        inner.handle_sack(&mut core, SackChunk::new(first.wrapping_add(2), 100_000), &mut outbound);
        assert_eq!(core.cumulative_tsn_ack_point, first.wrapping_add(2));
        assert!(core.inflight_queue.is_empty());
        assert!(outbound.is_empty());
        drop(core);
    }

    #[test]
    fn test_peer_window_limits_data_in_flight() {
        let (association, _peer) = established(250);
        let inner = &association.inner;
        inner.send_payload(chunks(3, 100)).unwrap();

        let mut core = inner.lock();
        assert_eq!(core.inflight_queue.len(), 2);
        assert_eq!(core.pending_queue.len(), 1);
        assert_eq!(core.peer_rwnd, 50);

        let first = core.cumulative_tsn_ack_point.wrapping_add(1);
        let mut outbound = Vec::new();
        inner.handle_sack(&mut core, SackChunk::new(first, 1000), &mut outbound);
        assert_eq!(outbound.len(), 1);
        assert!(core.pending_queue.is_empty());
        assert_eq!(core.inflight_queue.len(), 2);
        assert_eq!(core.peer_rwnd, 800);
        let tsns: Vec<u32> = core.inflight_queue.iter().map(|c| c.tsn).collect();
        assert_eq!(tsns, vec![first.wrapping_add(1), first.wrapping_add(2)]);
        drop(core);
    }

    #[test]
    fn test_zero_window_still_sends_one_chunk() {
        let (association, _peer) = established(0);
        let inner = &association.inner;
        inner.send_payload(chunks(2, 100)).unwrap();

        let mut core = inner.lock();
        assert_eq!(core.inflight_queue.len(), 1);
        assert_eq!(core.pending_queue.len(), 1);

        let first = core.cumulative_tsn_ack_point.wrapping_add(1);
        let mut outbound = Vec::new();
        inner.handle_sack(&mut core, SackChunk::new(first, 0), &mut outbound);
        assert_eq!(outbound.len(), 1);
        assert_eq!(core.inflight_queue.len(), 1);
        assert!(core.pending_queue.is_empty());
        drop(core);
    }

    #[test]
    fn test_init_ack_sets_peer_window() {
        let (association, _peer) = established(0);
        let inner = &association.inner;
        let mut core = inner.lock();
        core.state = AssociationState::CookieWait;

        let mut init_ack = InitChunk::new(0x1234, 77);
        init_ack.a_rwnd = 4000;
        init_ack.params.push(Param::StateCookie(vec![1; 8]));
        let mut outbound = Vec::new();
        inner.handle_init_ack(&mut core, init_ack, &mut outbound);

        assert_eq!(core.peer_rwnd, 4000);
        assert_eq!(core.peer_verification_tag, 0x1234);
        assert_eq!(core.state, AssociationState::CookieEchoed);
        assert_eq!(outbound.len(), 1);
        drop(core);
    }
}
