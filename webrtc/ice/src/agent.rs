//! ICE agent implementation.
//!
//! The agent gathers its candidates when it is created, then runs
//! connectivity checks against the remote candidates once `dial` or
//! `accept` supplies the peer's credentials. Every state change (candidate
//! lists, pairs, the selected pair, the connection state) happens on one
//! worker thread that executes queued tasks, so no lock is held across
//! socket I/O. Each local candidate has its own reader thread; STUN packets
//! are handed to the worker and everything else is queued for the
//! [`IceConn`].

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use logging::Logger;
use network::Buffer;
use rand::Rng;
use rand::distr::Alphanumeric;
use stun::{Message, MessageBuilder, MessageType};

use crate::candidate::Candidate;
use crate::candidate_pair::CandidatePair;
use crate::config::AgentConfig;
use crate::conn::IceConn;
use crate::connection_state::{ConnectionState, GatheringState};
use crate::errors::{IceError, Result};
use crate::gather::{self, LocalCandidate};

/// Worker wake-up period; check and keepalive intervals are measured on it.
const TICK: Duration = Duration::from_millis(50);

/// Reader threads poll the closed flag at this period.
const READ_POLL: Duration = Duration::from_millis(100);

const RECEIVE_MTU: usize = 8192;

const UFRAG_LEN: usize = 16;
const PWD_LEN: usize = 32;

type Task = Box<dyn FnOnce(&mut AgentState) + Send>;
type StateHandler = Box<dyn Fn(ConnectionState) + Send>;

/// Where application bytes go once a pair is selected.
#[derive(Clone)]
pub(crate) struct SelectedPath {
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) local: SocketAddr,
    pub(crate) remote: SocketAddr,
}

/// State read outside the worker: by `Agent` callers, reader threads and
/// the `IceConn`.
pub(crate) struct Shared {
    selected: Mutex<Option<SelectedPath>>,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    incoming: Buffer,
    last_data: Mutex<Option<Instant>>,
    last_sent: Mutex<Instant>,
    closed: AtomicBool,
    logger: Logger,
}

impl Shared {
    fn new(logger: Logger) -> Self {
        Self {
            selected: Mutex::new(None),
            state: Mutex::new(ConnectionState::New),
            state_changed: Condvar::new(),
            incoming: Buffer::new(),
            last_data: Mutex::new(None),
            last_sent: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            logger,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Marks the agent closed and releases blocked readers and waiters.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.incoming.close();
        let _guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.state_changed.notify_all();
    }

    pub(crate) fn selected(&self) -> Option<SelectedPath> {
        self.selected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_selected(&self, path: Option<SelectedPath>) {
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = path;
    }

    pub(crate) fn incoming(&self) -> &Buffer {
        &self.incoming
    }

    /// Sends application bytes on the selected pair.
    pub(crate) fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(IceError::Closed);
        }
        let path = self.selected().ok_or(IceError::NoValidPair)?;
        let n = path.socket.send_to(buf, path.remote)?;
        self.touch_sent();
        Ok(n)
    }

    fn touch_sent(&self) {
        *self.last_sent.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn last_sent(&self) -> Instant {
        *self.last_sent.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn last_data(&self) -> Option<Instant> {
        *self.last_data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(&self, data: &[u8]) {
        *self.last_data.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        if let Err(e) = self.incoming.write(data) {
            self.logger
                .warn(&format!("Dropping {} byte datagram: {}", data.len(), e));
        }
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        self.state_changed.notify_all();
    }

    /// Blocks until a pair is selected, the agent closes or `timeout` passes.
    fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_closed() || *state == ConnectionState::Closed {
                return Err(IceError::Closed);
            }
            if state.is_connected() {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(IceError::Timeout);
            }
            state = self
                .state_changed
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}

/// ICE Agent that gathers candidates, checks pairs and keeps the selected
/// pair alive.
pub struct Agent {
    shared: Arc<Shared>,
    tasks: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    local_candidates: Vec<Candidate>,
    local_ufrag: String,
    local_pwd: String,
    connect_timeout: Duration,
    logger: Logger,
}

impl Agent {
    /// Gathers candidates and starts the reader and worker threads.
    ///
    /// # Errors
    /// `Config` or `Url` for a bad configuration, `PortExhausted` when the
    /// port range is full, `NoCandidates` when nothing could be bound.
    pub fn new(config: AgentConfig, logger: Logger) -> Result<Self> {
        let urls = config.validate()?;

        logger.debug(&format!("Gathering state {}", GatheringState::Gathering));
        let gathered = gather::gather_candidates(&config, &urls, &logger)?;
        logger.info(&format!(
            "Gathering {}: {} local candidates",
            GatheringState::Complete,
            gathered.len()
        ));

        let local_ufrag = random_string(UFRAG_LEN);
        let local_pwd = random_string(PWD_LEN);
        let shared = Arc::new(Shared::new(logger.clone()));
        let (tx, rx) = mpsc::channel::<Task>();

        let agent = Self {
            shared: Arc::clone(&shared),
            tasks: Mutex::new(Some(tx.clone())),
            workers: Mutex::new(Vec::new()),
            local_candidates: gathered.iter().map(|l| l.candidate.clone()).collect(),
            local_ufrag: local_ufrag.clone(),
            local_pwd: local_pwd.clone(),
            connect_timeout: config.connect_timeout(),
            logger: logger.clone(),
        };

        let mut workers = Vec::new();
        for (index, local) in gathered.iter().enumerate() {
            local.socket.set_read_timeout(Some(READ_POLL))?;
            let socket = Arc::clone(&local.socket);
            let tasks = tx.clone();
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("ice-read-{}", index))
                .spawn(move || read_loop(index, socket, tasks, worker_shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shared.close();
                    return Err(e.into());
                }
            }
        }
        drop(tx);

        let state = AgentState {
            shared: Arc::clone(&shared),
            config,
            local_ufrag,
            local_pwd,
            remote_ufrag: String::new(),
            remote_pwd: String::new(),
            started: false,
            is_controlling: false,
            tie_breaker: rand::random::<u64>(),
            local: gathered,
            remote: Vec::new(),
            pairs: Vec::new(),
            selected: None,
            nominating: None,
            pending: HashMap::new(),
            connection_state: ConnectionState::New,
            state_since: Instant::now(),
            last_check: None,
            on_state_change: None,
            logger,
        };
        match thread::Builder::new()
            .name("ice-agent".to_string())
            .spawn(move || worker_loop(state, rx))
        {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                shared.close();
                return Err(e.into());
            }
        }

        *agent.workers.lock().unwrap_or_else(|e| e.into_inner()) = workers;
        Ok(agent)
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        match self.tasks.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(tx) => tx.send(task).map_err(|_| IceError::Closed),
            None => Err(IceError::Closed),
        }
    }

    /// Runs `f` on the worker and waits for its result. Must not be called
    /// from a state change handler.
    fn run<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut AgentState) -> R + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.enqueue(Box::new(move |state: &mut AgentState| {
            let _ = tx.send(f(state));
        }))?;
        rx.recv().map_err(|_| IceError::Closed)
    }

    pub fn get_local_candidates(&self) -> Vec<Candidate> {
        self.local_candidates.clone()
    }

    /// Local `(ufrag, pwd)` to hand to the peer.
    pub fn get_local_user_credentials(&self) -> (String, String) {
        (self.local_ufrag.clone(), self.local_pwd.clone())
    }

    pub fn get_remote_candidates(&self) -> Result<Vec<Candidate>> {
        self.run(|state| state.remote.clone())
    }

    pub fn gathering_state(&self) -> GatheringState {
        GatheringState::Complete
    }

    /// Adds a remote candidate and pairs it with every local candidate of
    /// the same address family.
    pub fn add_remote_candidate(&self, candidate: Candidate) -> Result<()> {
        self.run(move |state| state.add_remote(candidate))
    }

    /// Starts checks as the controlling agent and waits for a selected pair.
    pub fn dial(&self, remote_ufrag: &str, remote_pwd: &str) -> Result<IceConn> {
        self.connect(true, remote_ufrag, remote_pwd)
    }

    /// Starts checks as the controlled agent and waits for a selected pair.
    pub fn accept(&self, remote_ufrag: &str, remote_pwd: &str) -> Result<IceConn> {
        self.connect(false, remote_ufrag, remote_pwd)
    }

    fn connect(&self, is_controlling: bool, remote_ufrag: &str, remote_pwd: &str) -> Result<IceConn> {
        let ufrag = remote_ufrag.to_string();
        let pwd = remote_pwd.to_string();
        self.run(move |state| state.start(is_controlling, ufrag, pwd))??;

        match self.shared.wait_connected(self.connect_timeout) {
            Ok(()) => Ok(IceConn::new(Arc::clone(&self.shared))),
            Err(IceError::Timeout) => {
                self.logger.warn("No candidate pair selected before the connect timeout");
                let _ = self.run(|state| state.set_state(ConnectionState::Failed));
                Err(IceError::Timeout)
            }
            Err(e) => Err(e),
        }
    }

    /// The selected pair, else the highest-priority valid pair.
    pub fn selected_pair(&self) -> Result<Option<CandidatePair>> {
        self.run(|state| state.best_pair())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.connection_state()
    }

    /// Registers `handler` for every connection state transition. It runs
    /// on the agent worker and must not call back into the agent.
    pub fn on_connection_state_change<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(ConnectionState) + Send + 'static,
    {
        self.run(move |state| state.on_state_change = Some(Box::new(handler)))
    }

    /// Stops checks, closes every socket reader and releases blocked
    /// callers. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.shared.close();
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).take();

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
        Ok(())
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("ufrag", &self.local_ufrag)
            .field("local_candidates", &self.local_candidates)
            .field("connection_state", &self.connection_state())
            .finish()
    }
}

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn read_loop(index: usize, socket: Arc<UdpSocket>, tasks: Sender<Task>, shared: Arc<Shared>) {
    let mut buf = vec![0u8; RECEIVE_MTU];
    while !shared.is_closed() {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => {
                if !shared.is_closed() {
                    shared
                        .logger
                        .error(&format!("Candidate {} read failed: {}", index, e));
                }
                break;
            }
        };
        if n == 0 {
            continue;
        }

        let data = &buf[..n];
        if stun::is_stun_message(data) {
            let data = data.to_vec();
            let task: Task =
                Box::new(move |state: &mut AgentState| state.handle_stun(index, from, &data));
            if tasks.send(task).is_err() {
                break;
            }
        } else {
            shared.deliver(data);
        }
    }
}

/// Worker loop: executes queued tasks and drives timers between them.
fn worker_loop(mut state: AgentState, tasks: Receiver<Task>) {
    loop {
        match tasks.recv_timeout(TICK) {
            Ok(task) => task(&mut state),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if state.shared.is_closed() {
            break;
        }
        state.tick(Instant::now());
    }

    state.shared.set_selected(None);
    state.set_state(ConnectionState::Closed);
    state.logger.debug("Agent worker stopped");
}

struct PairEntry {
    pair: CandidatePair,
    local: usize,
    remote: usize,
}

/// An outstanding Binding request.
struct Transaction {
    pair: usize,
    nominate: bool,
    sent: Instant,
}

/// State owned by the worker thread.
struct AgentState {
    shared: Arc<Shared>,
    config: AgentConfig,
    local_ufrag: String,
    local_pwd: String,
    remote_ufrag: String,
    remote_pwd: String,
    started: bool,
    is_controlling: bool,
    tie_breaker: u64,
    local: Vec<LocalCandidate>,
    remote: Vec<Candidate>,
    pairs: Vec<PairEntry>,
    selected: Option<usize>,
    /// Pair carrying our outstanding USE-CANDIDATE check
    nominating: Option<usize>,
    pending: HashMap<[u8; 12], Transaction>,
    connection_state: ConnectionState,
    state_since: Instant,
    last_check: Option<Instant>,
    on_state_change: Option<StateHandler>,
    logger: Logger,
}

impl AgentState {
    fn start(&mut self, is_controlling: bool, remote_ufrag: String, remote_pwd: String) -> Result<()> {
        if self.started {
            return Err(IceError::AlreadyStarted);
        }
        if remote_ufrag.is_empty() || remote_pwd.is_empty() {
            return Err(IceError::MissingCredentials);
        }

        self.started = true;
        self.is_controlling = is_controlling;
        self.remote_ufrag = remote_ufrag;
        self.remote_pwd = remote_pwd;
        for entry in &mut self.pairs {
            entry.pair.set_role(is_controlling);
        }
        self.logger.info(&format!(
            "Starting checks as {} on {} pairs",
            if is_controlling { "controlling" } else { "controlled" },
            self.pairs.len()
        ));
        self.set_state(ConnectionState::Checking);
        Ok(())
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.connection_state == state || self.connection_state == ConnectionState::Closed {
            return;
        }
        self.logger.debug(&format!(
            "Connection state {} -> {}",
            self.connection_state, state
        ));
        self.connection_state = state;
        self.state_since = Instant::now();
        self.shared.publish_state(state);
        if let Some(handler) = &self.on_state_change {
            handler(state);
        }
    }

    fn add_remote(&mut self, candidate: Candidate) {
        if self.remote.iter().any(|c| c.address == candidate.address) {
            self.logger
                .debug(&format!("Ignoring duplicate remote {}", candidate));
            return;
        }

        let remote = self.remote.len();
        for (local, lc) in self.local.iter().enumerate() {
            if !lc.candidate.same_family(&candidate) {
                continue;
            }
            self.pairs.push(PairEntry {
                pair: CandidatePair::new(
                    lc.candidate.clone(),
                    candidate.clone(),
                    self.is_controlling,
                ),
                local,
                remote,
            });
        }
        self.logger.debug(&format!("Added remote {}", candidate));
        self.remote.push(candidate);
    }

    /// Pair with fresh candidate timestamps.
    fn snapshot(&self, index: usize) -> CandidatePair {
        let entry = &self.pairs[index];
        let mut pair = entry.pair.clone();
        pair.local = self.local[entry.local].candidate.clone();
        pair.remote = self.remote[entry.remote].clone();
        pair
    }

    fn best_valid(&self) -> Option<usize> {
        self.pairs
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.pair.valid)
            .max_by_key(|(_, entry)| entry.pair.priority)
            .map(|(index, _)| index)
    }

    fn best_pair(&self) -> Option<CandidatePair> {
        self.selected
            .or_else(|| self.best_valid())
            .map(|index| self.snapshot(index))
    }

    fn find_pair(&self, local: usize, remote: usize) -> Option<usize> {
        self.pairs
            .iter()
            .position(|entry| entry.local == local && entry.remote == remote)
    }

    fn tick(&mut self, now: Instant) {
        if !self.started || self.connection_state == ConnectionState::Closed {
            return;
        }

        let timeout = self.config.connection_timeout();
        self.pending
            .retain(|_, txn| now.duration_since(txn.sent) < timeout);

        if let Some(index) = self.selected {
            let remote = self.pairs[index].remote;
            let last_seen = [self.remote[remote].last_received, self.shared.last_data()]
                .into_iter()
                .flatten()
                .max();
            let stale = last_seen.is_none_or(|seen| now.duration_since(seen) > timeout);
            if !stale {
                let keepalive = self.config.keepalive_interval().min(timeout / 2);
                if now.duration_since(self.shared.last_sent()) >= keepalive {
                    self.send_keepalive(index, now);
                }
                return;
            }
            self.demote(index);
        }

        if self.connection_state == ConnectionState::Disconnected
            && now.duration_since(self.state_since) > timeout
        {
            self.set_state(ConnectionState::Failed);
        }

        let due = self
            .last_check
            .is_none_or(|last| now.duration_since(last) >= self.config.check_interval());
        if due {
            self.last_check = Some(now);
            self.check_round(now);
        }
    }

    fn check_round(&mut self, now: Instant) {
        if self.is_controlling
            && let Some(best) = self.best_valid()
        {
            self.nominate(best, now);
            return;
        }
        for index in 0..self.pairs.len() {
            self.send_check(index, false, now);
        }
    }

    fn nominate(&mut self, index: usize, now: Instant) {
        self.logger
            .debug(&format!("Nominating {}", self.pairs[index].pair));
        self.nominating = Some(index);
        self.send_check(index, true, now);
    }

    fn send_check(&mut self, index: usize, nominate: bool, now: Instant) {
        let (local, remote) = (self.pairs[index].local, self.pairs[index].remote);
        let mut builder = MessageBuilder::new(MessageType::Request)
            .random_transaction_id()
            .username(&format!("{}:{}", self.remote_ufrag, self.local_ufrag))
            .priority(self.local[local].candidate.priority);
        builder = if self.is_controlling {
            builder.ice_controlling(self.tie_breaker)
        } else {
            builder.ice_controlled(self.tie_breaker)
        };
        if nominate {
            builder = builder.use_candidate();
        }

        let request = match builder
            .message_integrity(self.remote_pwd.as_bytes())
            .fingerprint()
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                self.logger.error(&format!("Failed to build check: {}", e));
                return;
            }
        };

        self.pending.insert(
            request.transaction_id(),
            Transaction {
                pair: index,
                nominate,
                sent: now,
            },
        );
        let destination = self.remote[remote].address;
        self.send_from(local, &request, destination, now);
    }

    fn send_keepalive(&mut self, index: usize, now: Instant) {
        let indication = match MessageBuilder::new(MessageType::Indication)
            .random_transaction_id()
            .fingerprint()
            .build()
        {
            Ok(indication) => indication,
            Err(e) => {
                self.logger.error(&format!("Failed to build keepalive: {}", e));
                return;
            }
        };
        let (local, remote) = (self.pairs[index].local, self.pairs[index].remote);
        self.logger
            .trace(&format!("Keepalive to {}", self.remote[remote].address));
        let destination = self.remote[remote].address;
        self.send_from(local, &indication, destination, now);
        self.shared.touch_sent();
    }

    fn send_from(&mut self, local: usize, message: &Message, destination: SocketAddr, now: Instant) {
        let lc = &mut self.local[local];
        match lc.socket.send_to(&message.encode(), destination) {
            Ok(_) => lc.candidate.last_sent = Some(now),
            Err(e) => self.logger.warn(&format!(
                "Send from {} to {} failed: {}",
                lc.candidate.address, destination, e
            )),
        }
    }

    fn handle_stun(&mut self, local: usize, from: SocketAddr, data: &[u8]) {
        if !self.started {
            self.logger.trace("Dropping STUN packet before checks started");
            return;
        }
        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                self.logger
                    .warn(&format!("Undecodable STUN packet from {}: {}", from, e));
                return;
            }
        };
        if let Err(e) = message.verify_fingerprint() {
            self.logger
                .warn(&format!("Dropping STUN packet from {}: {}", from, e));
            return;
        }
        let Some(remote) = self.remote.iter().position(|c| c.address == from) else {
            self.logger
                .trace(&format!("Dropping STUN packet from unknown remote {}", from));
            return;
        };

        let now = Instant::now();
        match message.message_type() {
            MessageType::Request => self.handle_request(local, remote, &message, now),
            MessageType::Response | MessageType::ErrorResponse => {
                self.handle_response(local, remote, &message, now)
            }
            MessageType::Indication => self.remote[remote].last_received = Some(now),
        }
    }

    fn handle_request(&mut self, local: usize, remote: usize, request: &Message, now: Instant) {
        let from = self.remote[remote].address;
        let expected = format!("{}:{}", self.local_ufrag, self.remote_ufrag);
        if request.username().as_deref() != Some(expected.as_str()) {
            self.logger
                .warn(&format!("Dropping check from {}: username mismatch", from));
            return;
        }
        if let Err(e) = request.verify_message_integrity(self.local_pwd.as_bytes()) {
            self.logger
                .warn(&format!("Dropping check from {}: {}", from, e));
            return;
        }
        if self.is_controlling && request.ice_controlling().is_some() {
            self.logger
                .debug(&format!("Role conflict: {} is also controlling", from));
            return;
        }
        if !self.is_controlling && request.ice_controlled().is_some() {
            self.logger
                .debug(&format!("Role conflict: {} is also controlled", from));
            return;
        }

        self.remote[remote].last_received = Some(now);
        let Some(index) = self.find_pair(local, remote) else {
            return;
        };
        self.pairs[index].pair.valid = true;

        if !self.is_controlling && request.use_candidate() {
            self.select(index);
        }

        match MessageBuilder::new(MessageType::Response)
            .transaction_id(request.transaction_id())
            .xor_mapped_address(from)
            .message_integrity(self.local_pwd.as_bytes())
            .fingerprint()
            .build()
        {
            Ok(response) => self.send_from(local, &response, from, now),
            Err(e) => self.logger.error(&format!("Failed to build response: {}", e)),
        }

        if self.is_controlling
            && self.selected.is_none()
            && self.nominating.is_none()
            && let Some(best) = self.best_valid()
        {
            self.nominate(best, now);
        }
    }

    fn handle_response(&mut self, local: usize, remote: usize, response: &Message, now: Instant) {
        let Some(txn) = self.pending.remove(&response.transaction_id()) else {
            self.logger.trace("Dropping response to an unknown transaction");
            return;
        };
        let entry = &self.pairs[txn.pair];
        if entry.local != local || entry.remote != remote {
            self.logger.debug("Dropping response from an unexpected address");
            return;
        }
        if let Err(e) = response.verify_message_integrity(self.remote_pwd.as_bytes()) {
            self.logger.warn(&format!("Dropping response: {}", e));
            return;
        }

        self.remote[remote].last_received = Some(now);
        if txn.nominate && self.nominating == Some(txn.pair) {
            self.nominating = None;
        }
        if response.message_type() == MessageType::ErrorResponse {
            self.logger
                .debug(&format!("Check failed on {}", self.pairs[txn.pair].pair));
            return;
        }

        self.pairs[txn.pair].pair.valid = true;
        if !self.is_controlling {
            return;
        }
        if txn.nominate {
            self.select(txn.pair);
        } else if self.selected.is_none()
            && self.nominating.is_none()
            && let Some(best) = self.best_valid()
        {
            self.nominate(best, now);
        }
    }

    fn select(&mut self, index: usize) {
        if self.selected == Some(index) {
            return;
        }
        if let Some(previous) = self.selected.take() {
            self.pairs[previous].pair.nominated = false;
        }

        let entry = &mut self.pairs[index];
        entry.pair.valid = true;
        entry.pair.nominated = true;
        self.selected = Some(index);
        self.nominating = None;

        let local = &self.local[entry.local];
        self.shared.set_selected(Some(SelectedPath {
            socket: Arc::clone(&local.socket),
            local: local.candidate.address,
            remote: self.remote[entry.remote].address,
        }));
        self.logger
            .info(&format!("Selected pair {}", self.pairs[index].pair));
        self.set_state(ConnectionState::Connected);
    }

    /// Drops a silent selected pair and resumes checks.
    fn demote(&mut self, index: usize) {
        self.logger.warn(&format!(
            "No traffic on {} for {:?}, resuming checks",
            self.pairs[index].pair,
            self.config.connection_timeout()
        ));
        self.pairs[index].pair.nominated = false;
        self.pairs[index].pair.valid = false;
        self.selected = None;
        self.last_check = None;
        self.shared.set_selected(None);
        self.set_state(ConnectionState::Disconnected);
    }
}
