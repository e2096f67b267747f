//! Session lifecycle and the public transport API.
//!
//! A [`Session`] is one 1:1 link between a render peer (server) and a
//! display peer (client). Creating it performs the connection and the
//! HELLO handshake; afterwards two background tasks own the socket and
//! every method here talks to them through single-slot cells, so a slow
//! network never blocks the render loop.
//!
//! All methods take `&self`; wrap the session in an `Arc` to drive it
//! from several tasks. After [`close`](Session::close) every call fails
//! with [`VizError::ConnectionClosed`].

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::codec::VizCodec;
use crate::config::SessionConfig;
use crate::error::{ErrorKind, VizError};
use crate::flags::FrameFlags;
use crate::message::MessageKind;
use crate::network::io as transport;
use crate::network::shared::{OutboundCamera, OutboundFrame, Role, Shared};
use crate::packet::Message;
use crate::protocol::camera::CameraState;
use crate::protocol::handshake::{self, Hello, HelloAck, PROTOCOL_VERSION, Resize, SetFrame};
use crate::protocol::range::{DataBounds, RangeQuery};
use crate::protocol::state::RenderState;
use crate::stream::stats::Statistics;
use crate::stream::store::{FrameBufferStore, WriteMode};
use crate::stream::types::{PixelBuffer, PixelFormat, frame_len};

// ── Constants ────────────────────────────────────────────────────

/// Pause between refused connection attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// How long `close` waits for GOODBYE to be flushed.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Steps on the longest axis of a range derived from data bounds.
const DERIVED_RANGE_DIVISIONS: u32 = 256;

// ── SessionListener ──────────────────────────────────────────────

/// A bound, listening server socket waiting for its one client.
///
/// [`Session::server_init`] is `bind` + `accept`; the split exists so
/// callers can learn the actual port when binding port 0.
pub struct SessionListener {
    listener: TcpListener,
    config: SessionConfig,
}

impl SessionListener {
    pub async fn bind(config: SessionConfig) -> Result<Self, VizError> {
        config.validate()?;
        let endpoint = config.endpoint();
        let addr = tokio::net::lookup_host(&endpoint)
            .await
            .map_err(|e| VizError::ConnectionFailed(format!("{endpoint}: {e}")))?
            .next()
            .ok_or_else(|| VizError::ConnectionFailed(format!("{endpoint}: no address")))?;

        let socket = new_socket(addr)?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| VizError::ConnectionFailed(format!("SO_REUSEADDR: {e}")))?;
        tune_buffers(&socket, config.buffer_size);
        socket
            .bind(addr)
            .map_err(|e| VizError::ConnectionFailed(format!("bind {addr}: {e}")))?;
        let listener = socket
            .listen(1)
            .map_err(|e| VizError::ConnectionFailed(format!("listen {addr}: {e}")))?;

        info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, VizError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for a client until the configured timeout, then negotiate.
    pub async fn accept(self) -> Result<Session, VizError> {
        let timeout = self.config.timeout();
        let deadline = Instant::now() + timeout;

        let (stream, peer) = tokio::time::timeout_at(deadline, self.listener.accept())
            .await
            .map_err(|_| VizError::Timeout(timeout))?
            .map_err(|e| VizError::ConnectionFailed(format!("accept: {e}")))?;
        info!("client connected from {peer}");
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, VizCodec::new());
        let terms = tokio::time::timeout_at(deadline, server_handshake(&mut framed, &self.config))
            .await
            .map_err(|_| VizError::Timeout(timeout))??;

        Session::start(Role::Server, framed, peer, terms, &self.config)
    }
}

// ── Session ──────────────────────────────────────────────────────

pub struct Session {
    shared: Arc<Shared>,
    peer: SocketAddr,
    local: SocketAddr,
    timeout: Duration,
    buffer_size: u32,
    camera: Mutex<CameraState>,
    /// Report attached to the next outgoing frame.
    local_state: Mutex<RenderState>,
    inbound_rx: tokio::sync::Mutex<tokio::sync::watch::Receiver<Option<Arc<PixelBuffer>>>>,
    closed: AtomicBool,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    // ── Lifecycle ────────────────────────────────────────────────

    /// Bind `address:port`, wait for a client and negotiate.
    ///
    /// `ConnectionFailed` if the address cannot be bound, `Timeout` if no
    /// client completes the handshake in time.
    pub async fn server_init(config: SessionConfig) -> Result<Self, VizError> {
        SessionListener::bind(config).await?.accept().await
    }

    /// Connect to a server, retrying refused attempts until the timeout.
    ///
    /// `Unreachable` if the name does not resolve or no route exists,
    /// `Timeout` if the server never answers in time.
    pub async fn client_init(config: SessionConfig) -> Result<Self, VizError> {
        config.validate()?;
        let timeout = config.timeout();
        let deadline = Instant::now() + timeout;
        let endpoint = config.endpoint();

        let addrs: Vec<SocketAddr> =
            match tokio::time::timeout_at(deadline, tokio::net::lookup_host(&endpoint)).await {
                Err(_) => return Err(VizError::Timeout(timeout)),
                Ok(Err(e)) => return Err(VizError::Unreachable(format!("{endpoint}: {e}"))),
                Ok(Ok(addrs)) => addrs.collect(),
            };
        if addrs.is_empty() {
            return Err(VizError::Unreachable(format!("{endpoint}: no address")));
        }

        let stream = connect_with_retry(&addrs, config.buffer_size, deadline, timeout).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        info!("connected to {peer}");

        let mut framed = Framed::new(stream, VizCodec::new());
        let terms = tokio::time::timeout_at(deadline, client_handshake(&mut framed, &config))
            .await
            .map_err(|_| VizError::Timeout(timeout))??;

        Self::start(Role::Client, framed, peer, terms, &config)
    }

    fn start(
        role: Role,
        framed: Framed<TcpStream, VizCodec>,
        peer: SocketAddr,
        terms: HelloAck,
        config: &SessionConfig,
    ) -> Result<Self, VizError> {
        let compression = terms.compression.then_some(config.compression_level);
        let (shared, endpoints) = Shared::new(
            role,
            terms.width,
            terms.height,
            terms.format,
            compression,
            config.timestep(),
        )?;
        let shared = Arc::new(shared);
        let local = framed.get_ref().local_addr()?;

        let (sink, stream) = framed.split();
        let writer = tokio::spawn(transport::run_writer(
            Arc::clone(&shared),
            sink,
            endpoints.control_rx,
            endpoints.camera_rx,
            endpoints.pixel_rx,
        ));
        let reader = tokio::spawn(transport::run_reader(Arc::clone(&shared), stream));

        info!(
            ?role,
            "session up: {}x{} {:?}, buffer {} B, compression {}",
            terms.width,
            terms.height,
            terms.format,
            terms.buffer_size,
            if compression.is_some() { "on" } else { "off" },
        );

        Ok(Self {
            shared,
            peer,
            local,
            timeout: config.timeout(),
            buffer_size: terms.buffer_size,
            camera: Mutex::new(CameraState::default()),
            local_state: Mutex::new(RenderState::default()),
            inbound_rx: tokio::sync::Mutex::new(endpoints.inbound_rx),
            closed: AtomicBool::new(false),
            writer: Mutex::new(Some(writer)),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Release the link: send GOODBYE (best effort), stop and join both
    /// transport tasks. Safe to call concurrently with in-flight calls,
    /// which then fail. Idempotent.
    pub async fn close(&self) -> Result<(), VizError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.shared.is_alive() {
            let _ = self
                .shared
                .control_tx
                .try_send(Message::empty(MessageKind::Goodbye));
        }

        let writer = lock(&self.writer).take();
        if let Some(mut handle) = writer {
            if tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err() {
                debug!("writer did not drain in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }
        self.shared.cancel.cancel();
        let reader = lock(&self.reader).take();
        if let Some(handle) = reader {
            let _ = handle.await;
        }

        info!("session with {} closed", self.peer);
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.shared.is_alive()
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Negotiated socket buffer size.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── Pixels ───────────────────────────────────────────────────

    /// Copy `src` into the frame store as the next generation.
    pub fn set_pixels(&self, src: &PixelBuffer, mode: WriteMode) -> Result<u64, VizError> {
        self.ensure_open()?;
        self.shared.store.set_pixels(src, mode)
    }

    /// Copy the current frame into `dest`.
    pub fn get_pixels(&self, dest: &mut PixelBuffer) -> Result<(), VizError> {
        self.ensure_open()?;
        self.shared.store.get_pixels(dest)
    }

    pub fn store(&self) -> &FrameBufferStore {
        &self.shared.store
    }

    /// Attach `state` to subsequent outgoing frames.
    pub fn set_render_state(&self, state: RenderState) {
        *lock(&self.local_state) = state;
    }

    /// Queue the current stored frame for sending and return its generation.
    ///
    /// The outbound slot holds one frame: if the writer has not sent the
    /// previous one yet, it is replaced. Sending happens on the writer
    /// task, paced by the timestep.
    pub fn send_pixels_data(&self) -> Result<u64, VizError> {
        let result = self.ensure_open().and_then(|()| {
            let buffer = self.shared.store.snapshot();
            let generation = buffer.generation();
            if generation == 0 {
                return Err(VizError::ProtocolViolation("no frame stored yet"));
            }
            let state = *lock(&self.local_state);
            let stale = self
                .shared
                .pixel_tx
                .send_replace(Some(OutboundFrame { buffer, state }));
            if let Some(stale) = stale.filter(|s| s.buffer.generation() != generation) {
                self.shared.note_superseded(&stale);
            }
            Ok(generation)
        });
        self.track(result)
    }

    /// Wait up to the session timeout for a newer complete frame of the
    /// negotiated size, install it in the frame store and return it.
    ///
    /// On error the store keeps showing the previous frame.
    pub async fn recv_pixels_data(&self) -> Result<Arc<PixelBuffer>, VizError> {
        self.ensure_open()?;
        let result = self.next_inbound_frame().await;
        self.track(result)
    }

    async fn next_inbound_frame(&self) -> Result<Arc<PixelBuffer>, VizError> {
        let mut rx = self.inbound_rx.lock().await;
        let deadline = Instant::now() + self.timeout;
        loop {
            tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => return Err(self.closed_error()),
                changed = tokio::time::timeout_at(deadline, rx.changed()) => match changed {
                    Err(_) => return Err(VizError::Timeout(self.timeout)),
                    Ok(Err(_)) => return Err(VizError::ChannelClosed),
                    Ok(Ok(())) => {}
                },
            }

            let latest = rx.borrow_and_update().clone();
            let Some(frame) = latest else {
                continue;
            };
            if frame.dimensions() != self.shared.resolution() {
                self.shared.stats.record_dropped();
                continue;
            }
            if self.shared.store.install(Arc::clone(&frame))? {
                self.shared.stats.tick_remote();
                return Ok(frame);
            }
            self.shared.stats.record_dropped();
        }
    }

    // ── Camera ───────────────────────────────────────────────────

    /// Replace the local camera. Rejected as a whole if any field is invalid.
    pub fn set_camera(&self, camera: CameraState) -> Result<(), VizError> {
        self.ensure_open()?;
        camera.validate()?;
        *lock(&self.camera) = camera;
        Ok(())
    }

    pub fn get_camera(&self) -> CameraState {
        *lock(&self.camera)
    }

    /// Queue the local camera for sending. Only the latest queued camera
    /// is ever sent.
    pub fn send_cam_data(&self) -> Result<(), VizError> {
        let result = self.ensure_open().map(|()| {
            let camera = *lock(&self.camera);
            self.shared.camera_tx.send_replace(Some(OutboundCamera {
                camera,
                flags: FrameFlags::empty(),
            }));
        });
        self.track(result)
    }

    /// Wait up to the session timeout for a camera from the peer and make
    /// it the local camera. Returns whether it differs from the previous one.
    pub async fn recv_cam_data(&self) -> Result<bool, VizError> {
        self.ensure_open()?;
        let result = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(self.closed_error()),
            camera = self.shared.inbound_camera.take_timeout(self.timeout) => {
                camera.ok_or(VizError::Timeout(self.timeout))
            }
        };
        let result = result.map(|camera| self.adopt_camera(camera));
        self.track(result)
    }

    /// Non-blocking [`recv_cam_data`](Self::recv_cam_data): `Ok(false)` when
    /// nothing new arrived.
    pub fn poll_cam_data(&self) -> Result<bool, VizError> {
        self.ensure_open()?;
        Ok(self
            .shared
            .inbound_camera
            .try_take()
            .is_some_and(|camera| self.adopt_camera(camera)))
    }

    fn adopt_camera(&self, camera: CameraState) -> bool {
        let mut current = lock(&self.camera);
        let changed = *current != camera;
        *current = camera;
        changed
    }

    // ── Resolution & scene ───────────────────────────────────────

    /// Change the stream resolution on both peers.
    ///
    /// A control slot is reserved first, so the RESIZE is queued the moment
    /// the local store switches size and leaves ahead of any frame of the
    /// new size. If both peers resize at once the server's request wins.
    pub async fn set_resolution(&self, width: u32, height: u32) -> Result<(), VizError> {
        self.ensure_open()?;
        frame_len(width, height, self.shared.format)?;
        if (width, height) == self.shared.resolution() {
            return Ok(());
        }

        let msg = Message::new(
            MessageKind::Resize,
            FrameFlags::empty(),
            handshake::encode(&Resize { width, height })?,
        )?;
        let permit = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(self.closed_error()),
            permit = self.shared.control_tx.reserve() => permit.map_err(|_| VizError::ChannelClosed),
        };
        let result = permit.and_then(|permit| {
            self.shared.apply_resolution(width, height)?;
            self.shared.pending_resize.store(true, Ordering::SeqCst);
            permit.send(msg);
            info!("resolution set to {width}x{height}");
            Ok(())
        });
        self.track(result)
    }

    pub fn width(&self) -> u32 {
        self.shared.resolution().0
    }

    pub fn height(&self) -> u32 {
        self.shared.resolution().1
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.shared.resolution()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.shared.format
    }

    /// Whether a resolution change sent by this peer awaits acknowledgement.
    pub fn resize_pending(&self) -> bool {
        self.shared.pending_resize.load(Ordering::SeqCst)
    }

    /// Select the scene frame (simulation timestep index) on both peers.
    pub async fn set_frame(&self, frame: i32) -> Result<(), VizError> {
        self.ensure_open()?;
        self.shared.scene_frame.store(frame, Ordering::SeqCst);
        let msg = Message::new(
            MessageKind::SetFrame,
            FrameFlags::empty(),
            handshake::encode(&SetFrame { frame })?,
        )?;
        let result = self.send_control(msg).await;
        self.track(result)
    }

    pub fn scene_frame(&self) -> i32 {
        self.shared.scene_frame.load(Ordering::SeqCst)
    }

    // ── Range ────────────────────────────────────────────────────

    /// Validate, store and forward a range query. An invalid query leaves
    /// the previous one in place.
    pub async fn set_range(&self, query: RangeQuery) -> Result<(), VizError> {
        self.ensure_open()?;
        query.validate()?;
        *lock(&self.shared.range) = Some(query);
        let msg = Message::new(
            MessageKind::Range,
            FrameFlags::empty(),
            handshake::encode(&query)?,
        )?;
        let result = self.send_control(msg).await;
        self.track(result)
    }

    /// The configured range, or one covering the discovered data bounds.
    pub fn get_range(&self) -> Option<RangeQuery> {
        let configured = *lock(&self.shared.range);
        configured.or_else(|| {
            let bounds = self.data_bounds();
            (!bounds.is_empty()).then(|| bounds.to_query(DERIVED_RANGE_DIVISIONS))
        })
    }

    /// The range last set by either peer, without bounds fallback.
    pub fn configured_range(&self) -> Option<RangeQuery> {
        *lock(&self.shared.range)
    }

    /// Data extent: the renderer's own report on the server, the last
    /// STATE received on the client.
    pub fn data_bounds(&self) -> DataBounds {
        match self.shared.role {
            Role::Server => lock(&self.local_state).bounds,
            Role::Client => lock(&self.shared.remote_state).bounds,
        }
    }

    /// Last STATE report received from the peer.
    pub fn remote_state(&self) -> RenderState {
        *lock(&self.shared.remote_state)
    }

    // ── Render data ──────────────────────────────────────────────

    /// Forward an opaque settings blob to the peer.
    pub async fn send_render_data(&self, data: impl Into<Bytes>) -> Result<(), VizError> {
        self.ensure_open()?;
        let msg = Message::new(MessageKind::RenderData, FrameFlags::empty(), data)?;
        let result = self.send_control(msg).await;
        self.track(result)
    }

    /// Take the latest blob received since the last call.
    pub fn recv_render_data(&self) -> Option<Bytes> {
        lock(&self.shared.render_data).take()
    }

    // ── Statistics & control ─────────────────────────────────────

    /// Minimum interval between pixel sends. `Duration::ZERO` disables pacing.
    pub fn set_timestep(&self, timestep: Duration) -> Result<(), VizError> {
        self.ensure_open()?;
        self.shared
            .timestep_ms
            .store(timestep.as_millis() as u64, Ordering::Relaxed);
        Ok(())
    }

    pub fn timestep(&self) -> Duration {
        self.shared.timestep()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.shared.stats
    }

    pub fn current_samples(&self) -> u32 {
        self.shared.stats.samples()
    }

    pub fn remote_fps(&self) -> f32 {
        self.shared.stats.remote_fps()
    }

    pub fn local_fps(&self) -> f32 {
        self.shared.stats.local_fps()
    }

    /// Sticky kind of the last failed operation, cleared by the next
    /// successful transfer or by [`reset`](Self::reset).
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.shared.last_error()
    }

    /// [`last_error`](Self::last_error) as a status code: `0` or negative.
    pub fn com_error(&self) -> i32 {
        self.last_error().map_or(0, ErrorKind::code)
    }

    /// Clear statistics and the sticky error, drop any pending inbound
    /// frame and restart accumulation. The connection stays up.
    ///
    /// On the client the current camera is re-sent flagged RESET so the
    /// render peer starts over.
    pub fn reset(&self) -> Result<(), VizError> {
        self.ensure_open()?;
        self.shared.stats.clear();
        self.shared.clear_error();
        self.shared.inbound_tx.send_replace(None);
        self.shared.reset_requested.store(true, Ordering::SeqCst);
        if self.shared.role == Role::Client {
            let camera = *lock(&self.camera);
            self.shared.camera_tx.send_replace(Some(OutboundCamera {
                camera,
                flags: FrameFlags::RESET,
            }));
        }
        debug!("session reset");
        Ok(())
    }

    /// Whether a reset was requested (locally or by the peer) since the
    /// last call.
    pub fn take_reset_request(&self) -> bool {
        self.shared.reset_requested.swap(false, Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<(), VizError> {
        if self.closed.load(Ordering::SeqCst) || !self.shared.is_alive() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn closed_error(&self) -> VizError {
        if self.closed.load(Ordering::SeqCst) {
            VizError::ConnectionClosed
        } else {
            VizError::PeerDisconnected
        }
    }

    async fn send_control(&self, msg: Message) -> Result<(), VizError> {
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(self.closed_error()),
            sent = self.shared.control_tx.send(msg) => Ok(sent?),
        }
    }

    /// Update the sticky error from the outcome of a transfer.
    fn track<T>(&self, result: Result<T, VizError>) -> Result<T, VizError> {
        match &result {
            Ok(_) => self.shared.clear_error(),
            Err(e) => self.shared.record_error(e),
        }
        result
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
        for slot in [&self.writer, &self.reader] {
            if let Some(handle) = lock(slot).take() {
                handle.abort();
            }
        }
    }
}

// ── Connection helpers ───────────────────────────────────────────

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_socket(addr: SocketAddr) -> Result<TcpSocket, VizError> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    };
    socket.map_err(|e| VizError::ConnectionFailed(format!("socket: {e}")))
}

fn tune_buffers(socket: &TcpSocket, size: u32) {
    if let Err(e) = socket.set_send_buffer_size(size) {
        warn!("SO_SNDBUF {size}: {e}");
    }
    if let Err(e) = socket.set_recv_buffer_size(size) {
        warn!("SO_RCVBUF {size}: {e}");
    }
}

async fn connect_with_retry(
    addrs: &[SocketAddr],
    buffer_size: u32,
    deadline: Instant,
    timeout: Duration,
) -> Result<TcpStream, VizError> {
    let mut attempt = 0u32;
    loop {
        for &addr in addrs {
            attempt += 1;
            let socket = new_socket(addr)?;
            tune_buffers(&socket, buffer_size);
            match tokio::time::timeout_at(deadline, socket.connect(addr)).await {
                Err(_) => return Err(VizError::Timeout(timeout)),
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => match e.kind() {
                    io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut => {
                        debug!(attempt, "connect to {addr} failed: {e}; retrying");
                    }
                    io::ErrorKind::HostUnreachable
                    | io::ErrorKind::NetworkUnreachable
                    | io::ErrorKind::AddrNotAvailable => {
                        return Err(VizError::Unreachable(format!("{addr}: {e}")));
                    }
                    _ => return Err(VizError::ConnectionFailed(format!("{addr}: {e}"))),
                },
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(VizError::Timeout(timeout));
        }
        tokio::time::sleep_until((now + RETRY_INTERVAL).min(deadline)).await;
    }
}

fn local_hello(config: &SessionConfig) -> Hello {
    Hello {
        version: PROTOCOL_VERSION,
        width: config.width,
        height: config.height,
        format: config.pixel_format,
        buffer_size: config.buffer_size,
        compression: config.compression,
    }
}

async fn client_handshake(
    framed: &mut Framed<TcpStream, VizCodec>,
    config: &SessionConfig,
) -> Result<HelloAck, VizError> {
    let hello = local_hello(config);
    framed
        .send(Message::new(
            MessageKind::Hello,
            FrameFlags::empty(),
            handshake::encode(&hello)?,
        )?)
        .await?;

    let reply = framed.next().await.ok_or(VizError::PeerDisconnected)??;
    match reply.kind() {
        MessageKind::HelloAck => {
            let ack: HelloAck = handshake::decode(reply.payload())?;
            if ack.version != PROTOCOL_VERSION {
                return Err(VizError::UnsupportedVersion(ack.version));
            }
            frame_len(ack.width, ack.height, ack.format)?;
            Ok(ack)
        }
        MessageKind::Goodbye => Err(VizError::PeerDisconnected),
        _ => Err(VizError::ProtocolViolation("expected HELLO_ACK")),
    }
}

async fn server_handshake(
    framed: &mut Framed<TcpStream, VizCodec>,
    config: &SessionConfig,
) -> Result<HelloAck, VizError> {
    let offer = framed.next().await.ok_or(VizError::PeerDisconnected)??;
    if offer.kind() != MessageKind::Hello {
        return Err(VizError::ProtocolViolation("expected HELLO"));
    }
    let offer: Hello = handshake::decode(offer.payload())?;

    let ack = match HelloAck::negotiate(&offer, &local_hello(config)) {
        Ok(ack) => ack,
        Err(e) => {
            warn!("rejecting client: {e}");
            let _ = framed.send(Message::empty(MessageKind::Goodbye)).await;
            return Err(e);
        }
    };
    framed
        .send(Message::new(
            MessageKind::HelloAck,
            FrameFlags::empty(),
            handshake::encode(&ack)?,
        )?)
        .await?;
    Ok(ack)
}
