// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! I/O thread for the TCP transport.
//!
//! One dedicated thread owns every socket and runs a mio poll loop; the rest
//! of the crate talks to it through a command channel woken by a mio
//! [`Waker`]. Inbound frames and connection lifecycle changes are delivered
//! synchronously to a [`FrameSink`] on the loop thread, so the sink must not
//! block.
//!
//! ```text
//! +------------------------------------------------------------+
//! |                        IoThread                            |
//! |  +------------------------------------------------------+  |
//! |  |                    mio::Poll                         |  |
//! |  |  - TCP listener (server endpoints)                   |  |
//! |  |  - active TCP stream (read/write frames)             |  |
//! |  |  - Waker (command channel)                           |  |
//! |  +------------------------------------------------------+  |
//! |            |                 |                  |          |
//! |            v                 v                  v          |
//! |       accept/refuse     read frames        flush queue     |
//! |            |                 |                             |
//! |            +--------> FrameSink callbacks                  |
//! +------------------------------------------------------------+
//! ```
//!
//! An LLRP endpoint speaks to exactly one peer at a time. A client endpoint
//! holds one outbound connection; a server endpoint accepts the first client
//! and refuses later ones by queueing a rejection notice obtained from the
//! sink, then closing once it has flushed.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::transport::framer::StreamFramer;
use crate::transport::metrics::TransportMetrics;

/// Token for the TCP listener.
const LISTENER_TOKEN: Token = Token(0);

/// Token for the waker (command channel).
const WAKER_TOKEN: Token = Token(1);

/// Starting token for connections.
const CONNECTION_TOKEN_START: usize = 2;

/// Poll timeout; bounds shutdown latency.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum events to process per poll.
const MAX_EVENTS: usize = 128;

/// Read buffer size for draining a readable socket.
const READ_BUF_SIZE: usize = 16384;

/// Callbacks invoked on the I/O thread.
///
/// Implementations must be fast and non-blocking; the poll loop is stalled
/// while a callback runs.
pub trait FrameSink: Send + Sync + 'static {
    /// A complete frame arrived on the active connection.
    fn frame_received(&self, frame: Vec<u8>);

    /// The outbound connection finished the TCP handshake.
    fn connected(&self) {}

    /// The active connection closed; `reason` is `None` for a local close.
    fn connection_closed(&self, reason: Option<String>);

    /// A transport-level failure that did not close the connection.
    fn transport_error(&self, error: Error);

    /// A connection was accepted. `accepted` is true when it became the
    /// active connection. The returned frame (if any) is queued on it; a
    /// refused connection is closed once the frame has flushed.
    fn connection_notice(&self, accepted: bool) -> Option<Vec<u8>>;
}

/// Frame-level send interface, implemented by [`IoSender`].
///
/// Kept as a trait so message-level code can be exercised without sockets.
pub trait Transmit: Send + Sync {
    fn transmit(&self, frame: Vec<u8>) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Commands sent to the I/O thread.
#[derive(Debug)]
pub enum IoCommand {
    /// Open the outbound connection.
    Connect { addr: SocketAddr },

    /// Queue a frame on the active connection.
    Send { payload: Vec<u8> },

    /// Close the active connection.
    Close,

    /// Shut the I/O thread down.
    Shutdown,
}

/// Cloneable handle for submitting commands to the I/O thread.
#[derive(Clone)]
pub struct IoSender {
    cmd_tx: Sender<IoCommand>,
    waker: Arc<Waker>,
}

impl IoSender {
    fn command(&self, cmd: IoCommand) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| Error::NotConnected)?;
        self.waker.wake()?;
        Ok(())
    }

    pub fn connect(&self, addr: SocketAddr) -> Result<()> {
        self.command(IoCommand::Connect { addr })
    }

    pub fn send(&self, payload: Vec<u8>) -> Result<()> {
        self.command(IoCommand::Send { payload })
    }

    pub fn close(&self) -> Result<()> {
        self.command(IoCommand::Close)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.command(IoCommand::Shutdown)
    }
}

impl Transmit for IoSender {
    fn transmit(&self, frame: Vec<u8>) -> Result<()> {
        self.send(frame)
    }

    fn close(&self) -> Result<()> {
        IoSender::close(self)
    }
}

/// Handle owning the spawned thread; shuts it down on drop.
pub struct IoThreadHandle {
    sender: IoSender,
    thread_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl IoThreadHandle {
    pub fn sender(&self) -> &IoSender {
        &self.sender
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        if self.thread_handle.is_none() {
            return Ok(());
        }
        let _ = self.sender.shutdown();
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| Error::Io(io::Error::other("I/O thread panicked")))?;
        }
        Ok(())
    }
}

impl Drop for IoThreadHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Connecting,
    Connected,
}

/// Per-connection state.
struct IoConnection {
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: ConnState,
    framer: StreamFramer,
    send_queue: Vec<u8>,
    send_offset: usize,
    /// Refused extra connection: close once the rejection notice flushed.
    close_after_flush: bool,
    /// Whether WRITABLE is currently part of the registered interest.
    write_interest: bool,
}

/// I/O thread state and runner.
pub struct IoThread {
    poll: Poll,
    listener: Option<TcpListener>,
    connections: HashMap<Token, IoConnection>,
    /// The one connection the endpoint is speaking on.
    primary: Option<Token>,
    next_token: usize,
    cmd_rx: Receiver<IoCommand>,
    metrics: Arc<TransportMetrics>,
    running: Arc<AtomicBool>,
    nodelay: bool,
    max_message_size: usize,
}

impl IoThread {
    /// Create the thread state without spawning.
    ///
    /// Binding happens here so a server endpoint knows its local address
    /// (and port-zero assignment) before the loop starts. The returned
    /// [`IoSender`] is valid immediately; commands queue until the loop
    /// runs.
    pub fn new(
        listen: Option<SocketAddr>,
        config: &EndpointConfig,
        metrics: Arc<TransportMetrics>,
    ) -> Result<(Self, IoSender, Option<SocketAddr>)> {
        let poll = Poll::new()?;

        let mut local_addr = None;
        let listener = match listen {
            Some(addr) => {
                let mut listener = TcpListener::bind(addr)?;
                local_addr = Some(listener.local_addr()?);
                poll.registry()
                    .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;
                Some(listener)
            }
            None => None,
        };

        let (cmd_tx, cmd_rx) = channel();
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);
        let running = Arc::new(AtomicBool::new(true));

        let io_thread = Self {
            poll,
            listener,
            connections: HashMap::new(),
            primary: None,
            next_token: CONNECTION_TOKEN_START,
            cmd_rx,
            metrics,
            running: running.clone(),
            nodelay: config.nodelay,
            max_message_size: config.max_message_size,
        };

        let sender = IoSender { cmd_tx, waker };
        Ok((io_thread, sender, local_addr))
    }

    /// Spawn the poll loop on its own thread.
    pub fn spawn(self, sender: IoSender, sink: Arc<dyn FrameSink>) -> Result<IoThreadHandle> {
        let running = self.running.clone();
        let thread_handle = thread::Builder::new()
            .name("llrp-io".to_string())
            .spawn(move || {
                self.run(sink);
            })
            .map_err(Error::Io)?;

        Ok(IoThreadHandle {
            sender,
            thread_handle: Some(thread_handle),
            running,
        })
    }

    /// Run the event loop until shutdown.
    pub fn run(mut self, sink: Arc<dyn FrameSink>) {
        let mut events = Events::with_capacity(MAX_EVENTS);

        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_TIMEOUT)) {
                if e.kind() != io::ErrorKind::Interrupted {
                    sink.transport_error(Error::Io(e));
                }
                continue;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.handle_accept(sink.as_ref()),
                    WAKER_TOKEN => self.handle_commands(sink.as_ref()),
                    token => {
                        if event.is_readable() {
                            self.handle_readable(token, sink.as_ref());
                        }
                        if event.is_writable() {
                            self.handle_writable(token, sink.as_ref());
                        }
                    }
                }
            }
        }

        // Drain remaining connections on shutdown.
        let primary = self.primary.take();
        for (token, mut conn) in self.connections.drain() {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            if Some(token) == primary {
                self.metrics.record_connection_closed();
                sink.connection_closed(None);
            }
        }
        self.running.store(false, Ordering::Relaxed);
    }

    fn handle_accept(&mut self, sink: &dyn FrameSink) {
        loop {
            let accept_result = match &self.listener {
                Some(l) => l.accept(),
                None => return,
            };
            match accept_result {
                Ok((mut stream, remote_addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    let _ = stream.set_nodelay(self.nodelay);
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        sink.transport_error(Error::Io(e));
                        continue;
                    }

                    let accepted = self.primary.is_none();
                    let conn = IoConnection {
                        stream,
                        remote_addr,
                        state: ConnState::Connected,
                        framer: StreamFramer::new(self.max_message_size),
                        send_queue: Vec::new(),
                        send_offset: 0,
                        close_after_flush: !accepted,
                        write_interest: false,
                    };
                    self.connections.insert(token, conn);

                    if accepted {
                        self.primary = Some(token);
                        self.metrics.record_connection_established();
                        debug!("accepted connection from {}", remote_addr);
                    } else {
                        self.metrics.record_connection_refused();
                        warn!("refusing extra connection from {}", remote_addr);
                    }

                    match sink.connection_notice(accepted) {
                        Some(frame) => {
                            self.metrics.record_message_sent(frame.len());
                            self.queue_frame(token, frame, sink);
                        }
                        // Nothing to say to a refused peer: drop it now.
                        None if !accepted => self.close_connection(token, None, sink),
                        None => {}
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    sink.transport_error(Error::Io(e));
                    break;
                }
            }
        }
    }

    fn handle_commands(&mut self, sink: &dyn FrameSink) {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(IoCommand::Connect { addr }) => self.handle_connect(addr, sink),
                Ok(IoCommand::Send { payload }) => match self.primary {
                    Some(token) => {
                        self.metrics.record_message_sent(payload.len());
                        self.queue_frame(token, payload, sink);
                    }
                    None => sink.transport_error(Error::NotConnected),
                },
                Ok(IoCommand::Close) => {
                    if let Some(token) = self.primary {
                        self.close_connection(token, None, sink);
                    }
                }
                Ok(IoCommand::Shutdown) => {
                    self.running.store(false, Ordering::Relaxed);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    fn handle_connect(&mut self, addr: SocketAddr, sink: &dyn FrameSink) {
        if self.primary.is_some() {
            warn!("connect command ignored: connection already active");
            return;
        }
        match TcpStream::connect(addr) {
            Ok(mut stream) => {
                let token = Token(self.next_token);
                self.next_token += 1;

                let _ = stream.set_nodelay(self.nodelay);
                // WRITABLE is needed to learn when the connect completes.
                if let Err(e) = self.poll.registry().register(
                    &mut stream,
                    token,
                    Interest::READABLE | Interest::WRITABLE,
                ) {
                    self.metrics.record_connection_failed();
                    sink.connection_closed(Some(format!("failed to register connection: {}", e)));
                    return;
                }

                let conn = IoConnection {
                    stream,
                    remote_addr: addr,
                    state: ConnState::Connecting,
                    framer: StreamFramer::new(self.max_message_size),
                    send_queue: Vec::new(),
                    send_offset: 0,
                    close_after_flush: false,
                    write_interest: true,
                };
                self.connections.insert(token, conn);
                self.primary = Some(token);
            }
            Err(e) => {
                self.metrics.record_connection_failed();
                sink.connection_closed(Some(format!("connect failed: {}", e)));
            }
        }
    }

    fn queue_frame(&mut self, token: Token, frame: Vec<u8>, sink: &dyn FrameSink) {
        if let Some(conn) = self.connections.get_mut(&token) {
            conn.send_queue.extend_from_slice(&frame);
            if conn.state == ConnState::Connected {
                self.try_flush(token, sink);
            }
        }
    }

    fn handle_readable(&mut self, token: Token, sink: &dyn FrameSink) {
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };

        let mut buf = [0u8; READ_BUF_SIZE];
        let mut frames = Vec::new();
        let mut close_reason: Option<Option<String>> = None;

        loop {
            match conn.stream.read(&mut buf) {
                Ok(0) => {
                    close_reason = Some(Some("connection closed by peer".to_string()));
                    break;
                }
                Ok(n) => {
                    if let Err(e) = conn.framer.feed(&buf[..n], &mut frames) {
                        self.metrics.record_recv_error();
                        let reason = e.to_string();
                        sink.transport_error(e);
                        close_reason = Some(Some(reason));
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.metrics.record_recv_error();
                    close_reason = Some(Some(format!("read error: {}", e)));
                    break;
                }
            }
        }

        let is_primary = self.primary == Some(token);
        for frame in frames {
            if is_primary {
                self.metrics.record_message_received(frame.len());
                sink.frame_received(frame);
            }
            // Frames from a refused extra connection are discarded.
        }

        if let Some(reason) = close_reason {
            self.close_connection(token, reason, sink);
        }
    }

    fn handle_writable(&mut self, token: Token, sink: &dyn FrameSink) {
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };

        if conn.state == ConnState::Connecting {
            match conn.stream.take_error() {
                Ok(Some(e)) => {
                    self.metrics.record_connection_failed();
                    self.close_connection(token, Some(format!("connect failed: {}", e)), sink);
                    return;
                }
                Ok(None) => {
                    conn.state = ConnState::Connected;
                    self.metrics.record_connection_established();
                    debug!("connected to {}", conn.remote_addr);
                    sink.connected();
                }
                Err(e) => {
                    self.metrics.record_connection_failed();
                    self.close_connection(token, Some(format!("connect error: {}", e)), sink);
                    return;
                }
            }
        }

        self.try_flush(token, sink);
    }

    /// Flush the send queue as far as the socket accepts, switching WRITABLE
    /// interest on while data remains and off once the queue drains.
    fn try_flush(&mut self, token: Token, sink: &dyn FrameSink) {
        let conn = match self.connections.get_mut(&token) {
            Some(c) => c,
            None => return,
        };

        while conn.send_offset < conn.send_queue.len() {
            match conn.stream.write(&conn.send_queue[conn.send_offset..]) {
                Ok(0) => {
                    self.metrics.record_send_error();
                    self.close_connection(token, Some("write returned 0".to_string()), sink);
                    return;
                }
                Ok(n) => {
                    conn.send_offset += n;
                    self.metrics.record_bytes_sent(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.metrics.record_send_blocked();
                    self.set_write_interest(token, true);
                    return;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.metrics.record_send_error();
                    self.close_connection(token, Some(format!("write error: {}", e)), sink);
                    return;
                }
            }
        }

        conn.send_queue.clear();
        conn.send_offset = 0;
        if conn.close_after_flush {
            self.close_connection(token, None, sink);
            return;
        }
        self.set_write_interest(token, false);
    }

    fn set_write_interest(&mut self, token: Token, on: bool) {
        if let Some(conn) = self.connections.get_mut(&token) {
            if conn.write_interest == on {
                return;
            }
            let interest = if on {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            if self
                .poll
                .registry()
                .reregister(&mut conn.stream, token, interest)
                .is_ok()
            {
                conn.write_interest = on;
            }
        }
    }

    fn close_connection(&mut self, token: Token, reason: Option<String>, sink: &dyn FrameSink) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            if self.primary == Some(token) {
                self.primary = None;
                self.metrics.record_connection_closed();
                debug!(
                    "connection to {} closed{}",
                    conn.remote_addr,
                    reason.as_deref().map(|r| format!(": {}", r)).unwrap_or_default()
                );
                sink.connection_closed(reason);
            } else {
                debug!("extra connection from {} dropped", conn.remote_addr);
            }
        }
    }
}
