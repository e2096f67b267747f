//! Integration tests: handshake, frame and camera exchange, control
//! messages and failure modes over a real TCP connection on localhost.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use vizstream_core::protocol::{Hello, PROTOCOL_VERSION, Resize, handshake};
use vizstream_core::{
    CameraState, ErrorKind, FrameFlags, FrameOutcome, HostMirror, Message, MessageKind,
    PixelBuffer, PixelFormat, RangeQuery, RenderService, RenderServiceConfig, Role, Session,
    SessionConfig, SessionListener, TestPatternBackend, ViewerLoop, VizCodec, VizError,
    WriteMode,
};

// ── Helpers ──────────────────────────────────────────────────────

fn config(width: u32, height: u32) -> SessionConfig {
    SessionConfig::new("127.0.0.1", 0)
        .with_timeout(Duration::from_secs(5))
        .with_resolution(width, height)
}

/// Bind the server on an OS-assigned port and connect a client to it.
async fn connect_pair(server: SessionConfig, mut client: SessionConfig) -> (Session, Session) {
    let listener = SessionListener::bind(server).await.unwrap();
    client.port = listener.local_addr().unwrap().port();

    let accept = tokio::spawn(listener.accept());
    let client = Session::client_init(client).await.unwrap();
    let server = accept.await.unwrap().unwrap();
    (server, client)
}

async fn pair(width: u32, height: u32) -> (Session, Session) {
    connect_pair(config(width, height), config(width, height)).await
}

fn filled(width: u32, height: u32, byte: u8) -> PixelBuffer {
    let mut buf = PixelBuffer::new(width, height, PixelFormat::Rgba8).unwrap();
    buf.data_mut().fill(byte);
    buf
}

/// A bare framed connection that has sent HELLO for `width × height`.
async fn raw_client(port: u16, width: u32, height: u32) -> Framed<TcpStream, VizCodec> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut framed = Framed::new(stream, VizCodec::new());
    let hello = Hello {
        version: PROTOCOL_VERSION,
        width,
        height,
        format: PixelFormat::Rgba8,
        buffer_size: 1 << 16,
        compression: false,
    };
    let payload = handshake::encode(&hello).unwrap();
    let message = Message::new(MessageKind::Hello, FrameFlags::empty(), payload).unwrap();
    framed.send(message).await.unwrap();
    framed
}

fn resize_message(width: u32, height: u32) -> Message {
    let payload = handshake::encode(&Resize { width, height }).unwrap();
    Message::new(MessageKind::Resize, FrameFlags::empty(), payload).unwrap()
}

/// Poll `cond` until it holds or two seconds pass.
async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

// ── Connection lifecycle ─────────────────────────────────────────

#[tokio::test]
async fn handshake_adopts_client_viewport() {
    let (server, client) = connect_pair(config(1280, 720), config(800, 600)).await;

    assert_eq!(server.role(), Role::Server);
    assert_eq!(client.role(), Role::Client);
    assert_eq!(server.resolution(), (800, 600));
    assert_eq!(client.resolution(), (800, 600));
    assert_eq!(server.store().dimensions(), (800, 600));
    assert!(server.is_alive() && client.is_alive());
    assert_eq!(server.com_error(), 0);
}

#[tokio::test]
async fn accept_times_out_without_client() {
    let listener = SessionListener::bind(config(64, 64).with_timeout(Duration::from_millis(200)))
        .await
        .unwrap();
    let started = Instant::now();
    let result = listener.accept().await;
    assert!(matches!(result, Err(VizError::Timeout(_))));
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn connect_to_closed_port_times_out() {
    let port = {
        let scratch = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        scratch.local_addr().unwrap().port()
    };
    let mut cfg = config(64, 64).with_timeout(Duration::from_millis(300));
    cfg.port = port;

    let result = Session::client_init(cfg).await;
    let err = result.err().unwrap();
    assert!(matches!(err, VizError::Timeout(_)), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn unresolvable_host_is_unreachable() {
    let cfg = SessionConfig::new("no-such-host.invalid", 7000).with_timeout(Duration::from_secs(2));
    let err = Session::client_init(cfg).await.err().unwrap();
    assert!(
        matches!(err, VizError::Unreachable(_) | VizError::Timeout(_)),
        "got {err:?}"
    );
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let (server, client) = pair(64, 64).await;

    client.close().await.unwrap();
    client.close().await.unwrap();
    assert!(!client.is_alive());
    assert!(matches!(client.send_cam_data(), Err(VizError::ConnectionClosed)));
    assert!(matches!(
        client.set_timestep(Duration::from_millis(10)),
        Err(VizError::ConnectionClosed)
    ));
    assert!(matches!(
        client.recv_pixels_data().await,
        Err(VizError::ConnectionClosed)
    ));

    // the server learns about it from GOODBYE
    let err = server.recv_pixels_data().await.err().unwrap();
    assert!(matches!(err, VizError::PeerDisconnected), "got {err:?}");
    assert!(!server.is_alive());
    assert_eq!(server.last_error(), Some(ErrorKind::Connection));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn close_interrupts_pending_receive() {
    let (_server, client) = pair(32, 32).await;
    let client = Arc::new(client);

    let pending = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.recv_pixels_data().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!pending.is_finished());

    client.close().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("receive still blocked after close")
        .unwrap();
    assert!(matches!(result, Err(VizError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_viewport_is_refused() {
    let listener = SessionListener::bind(config(64, 64)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(listener.accept());

    let mut raw = raw_client(port, 100_000, 100_000).await;
    let result = accept.await.unwrap();
    assert!(matches!(result, Err(VizError::InvalidResolution { .. })));

    let reply = raw.next().await.unwrap().unwrap();
    assert_eq!(reply.kind(), MessageKind::Goodbye);
}

#[tokio::test]
async fn oversized_peer_resize_is_dropped() {
    let listener = SessionListener::bind(config(64, 64)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(listener.accept());

    let mut raw = raw_client(port, 64, 48).await;
    let ack = raw.next().await.unwrap().unwrap();
    assert_eq!(ack.kind(), MessageKind::HelloAck);
    let server = accept.await.unwrap().unwrap();

    raw.send(resize_message(100_000, 100_000)).await.unwrap();
    assert!(eventually(|| server.last_error() == Some(ErrorKind::InvalidResolution)).await);
    assert!(server.is_alive());
    assert_eq!(server.resolution(), (64, 48));

    // the session keeps working
    raw.send(resize_message(32, 16)).await.unwrap();
    assert!(eventually(|| server.resolution() == (32, 16)).await);
    let ack = raw.next().await.unwrap().unwrap();
    assert_eq!(ack.kind(), MessageKind::ResizeAck);
}

// ── Pixels ───────────────────────────────────────────────────────

#[tokio::test]
async fn resize_then_stream_800x600() {
    let (server, client) = pair(320, 240).await;

    server.set_resolution(800, 600).await.unwrap();
    assert!(eventually(|| client.resolution() == (800, 600)).await);
    assert!(eventually(|| !server.resize_pending()).await);

    let frame = filled(800, 600, 0x5a);
    let generation = server.set_pixels(&frame, WriteMode::Swap).unwrap();
    assert_eq!(server.send_pixels_data().unwrap(), generation);

    let received = client.recv_pixels_data().await.unwrap();
    assert_eq!(received.dimensions(), (800, 600));
    assert_eq!(received.generation(), generation);
    assert!(received.data().iter().all(|&b| b == 0x5a));

    let mut copy = PixelBuffer::new(1, 1, PixelFormat::Rgba8).unwrap();
    client.get_pixels(&mut copy).unwrap();
    assert_eq!(copy.data(), frame.data());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resize_precedes_first_frame_of_new_size() {
    let (server, client) = pair(64, 64).await;

    server.set_resolution(48, 32).await.unwrap();
    server.set_pixels(&filled(48, 32, 7), WriteMode::Swap).unwrap();
    server.send_pixels_data().unwrap();

    let frame = client.recv_pixels_data().await.unwrap();
    assert_eq!(frame.dimensions(), (48, 32));
    assert_eq!(client.resolution(), (48, 32));
    assert_eq!(client.statistics().snapshot().frames_dropped, 0);
}

#[tokio::test]
async fn invalid_resolution_rejected() {
    let (server, _client) = pair(64, 64).await;
    assert!(matches!(
        server.set_resolution(0, 600).await,
        Err(VizError::InvalidResolution { .. })
    ));
    // an RGBA8 frame this size does not fit in one PIXELS message
    assert!(matches!(
        server.set_resolution(16_400, 16_400).await,
        Err(VizError::InvalidResolution { .. })
    ));
    assert_eq!(server.resolution(), (64, 64));
    assert!(server.is_alive());
}

#[tokio::test]
async fn generations_strictly_increase() {
    let (server, client) = pair(32, 32).await;

    let mut last = 0;
    for i in 0..5u8 {
        server.set_pixels(&filled(32, 32, i), WriteMode::Swap).unwrap();
        server.send_pixels_data().unwrap();
        let frame = client.recv_pixels_data().await.unwrap();
        assert!(frame.generation() > last);
        assert_eq!(frame.data()[0], i);
        last = frame.generation();
    }
    assert_eq!(client.statistics().snapshot().frames_received, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_outpacing_consumer_drops_oldest() {
    const FRAMES: u8 = 200;
    let (server, client) = pair(256, 256).await;
    let client = Arc::new(client);
    let newest = Arc::new(AtomicU64::new(u64::MAX));

    let consumer = tokio::spawn({
        let client = Arc::clone(&client);
        let newest = Arc::clone(&newest);
        async move {
            let mut seen = Vec::new();
            loop {
                match client.recv_pixels_data().await {
                    Ok(frame) => seen.push(frame.generation()),
                    Err(VizError::Timeout(_)) => break,
                    Err(e) => panic!("receive failed: {e}"),
                }
                if seen.last() == Some(&newest.load(Ordering::SeqCst)) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            seen
        }
    });

    let mut last = 0;
    for i in 0..FRAMES {
        last = server.set_pixels(&filled(256, 256, i), WriteMode::Swap).unwrap();
        server.send_pixels_data().unwrap();
        tokio::task::yield_now().await;
    }
    newest.store(last, Ordering::SeqCst);

    let seen = consumer.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "out of order: {seen:?}");
    assert_eq!(seen.last(), Some(&last));
    assert!(seen.len() < FRAMES as usize);

    let dropped = server.statistics().snapshot().frames_dropped
        + client.statistics().snapshot().frames_dropped;
    assert!(dropped > 0);
}

#[tokio::test]
async fn timestep_spaces_pixel_sends() {
    let (server, client) = pair(16, 16).await;
    server.set_timestep(Duration::from_millis(100)).unwrap();

    let started = Instant::now();
    server.set_pixels(&filled(16, 16, 1), WriteMode::Swap).unwrap();
    server.send_pixels_data().unwrap();
    client.recv_pixels_data().await.unwrap();

    server.set_pixels(&filled(16, 16, 2), WriteMode::Swap).unwrap();
    server.send_pixels_data().unwrap();
    let second = client.recv_pixels_data().await.unwrap();
    assert_eq!(second.data()[0], 2);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn compressed_frames_arrive_intact() {
    let (server, client) = connect_pair(
        config(64, 48).with_compression(Some(3)),
        config(64, 48).with_compression(Some(3)),
    )
    .await;

    let mut frame = PixelBuffer::new(64, 48, PixelFormat::Rgba8).unwrap();
    for (i, b) in frame.data_mut().iter_mut().enumerate() {
        *b = (i % 7) as u8;
    }
    server.set_pixels(&frame, WriteMode::Blocking).unwrap();
    server.send_pixels_data().unwrap();

    let received = client.recv_pixels_data().await.unwrap();
    assert_eq!(received.data(), frame.data());
}

#[tokio::test]
async fn recv_without_frames_times_out() {
    let (_server, client) =
        connect_pair(config(16, 16), config(16, 16).with_timeout(Duration::from_millis(150))).await;

    let err = client.recv_pixels_data().await.err().unwrap();
    assert!(matches!(err, VizError::Timeout(_)));
    assert_eq!(client.com_error(), ErrorKind::Timeout.code());
    assert!(client.is_alive());
}

// ── Camera ───────────────────────────────────────────────────────

#[tokio::test]
async fn camera_reaches_server() {
    let (server, client) = pair(64, 64).await;

    let camera = CameraState::default().with_position([0.0, 0.0, 5.0]);
    client.set_camera(camera).unwrap();
    client.send_cam_data().unwrap();

    assert!(server.recv_cam_data().await.unwrap());
    assert_eq!(server.get_camera().position(), [0.0, 0.0, 5.0]);
    assert_eq!(server.get_camera(), camera);
}

#[tokio::test]
async fn only_latest_camera_is_observed() {
    let (server, client) = pair(64, 64).await;

    for z in 1..=20 {
        client
            .set_camera(CameraState::default().with_position([0.0, 0.0, z as f32]))
            .unwrap();
        client.send_cam_data().unwrap();
    }

    assert!(
        eventually(|| {
            server.poll_cam_data().unwrap();
            server.get_camera().position()[2] == 20.0
        })
        .await
    );
}

#[tokio::test]
async fn invalid_camera_rejected() {
    let (_server, client) = pair(64, 64).await;
    let mut camera = CameraState::default();
    camera.lens = 0.0;
    assert!(matches!(
        client.set_camera(camera),
        Err(VizError::InvalidCamera(_))
    ));
    assert_eq!(client.get_camera(), CameraState::default());
}

// ── Control ──────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_range_keeps_previous() {
    let (server, client) = pair(64, 64).await;

    let good = RangeQuery::new([0.0; 3], [1.0; 3], 0.1);
    client.set_range(good).await.unwrap();

    let bad = RangeQuery::new([2.0, 0.0, 0.0], [1.0; 3], 0.1);
    assert!(matches!(
        client.set_range(bad).await,
        Err(VizError::InvalidRange(_))
    ));
    assert_eq!(client.get_range(), Some(good));
    assert!(eventually(|| server.configured_range() == Some(good)).await);
}

#[tokio::test]
async fn scene_frame_and_render_data_forwarded() {
    let (server, client) = pair(64, 64).await;

    client.set_frame(7).await.unwrap();
    client.send_render_data(&b"tint"[..]).await.unwrap();

    assert!(eventually(|| server.scene_frame() == 7).await);
    let mut blob = None;
    assert!(
        eventually(|| {
            blob = blob.take().or_else(|| server.recv_render_data());
            blob.is_some()
        })
        .await
    );
    assert_eq!(blob.unwrap().as_ref(), b"tint");
    assert!(server.recv_render_data().is_none());
}

#[tokio::test]
async fn reset_reaches_render_peer() {
    let (server, client) = pair(64, 64).await;

    client.reset().unwrap();
    assert!(eventually(|| server.take_reset_request()).await);
    assert!(!server.take_reset_request());
    assert_eq!(client.com_error(), 0);
}

// ── Frame loops ──────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn render_and_viewer_loops_end_to_end() {
    let (server, client) = pair(96, 64).await;
    let server = Arc::new(server);
    let client = Arc::new(client);

    let mut service = RenderService::new(
        Arc::clone(&server),
        TestPatternBackend::new(16),
        RenderServiceConfig {
            target_fps: 120,
            ..RenderServiceConfig::default()
        },
    )
    .unwrap();
    let stop = service.stop_handle();
    let render = tokio::spawn(async move { service.run().await });

    let mut viewer = ViewerLoop::new(Arc::clone(&client), HostMirror::new());
    viewer
        .submit_camera(CameraState::default().with_position([0.0, 0.0, 5.0]))
        .unwrap();

    let mut presented = 0;
    for _ in 0..50 {
        if let FrameOutcome::Presented { .. } = viewer.run_frame().await.unwrap() {
            presented += 1;
        }
        if presented >= 5 {
            break;
        }
    }
    assert!(presented >= 5);
    assert_eq!(viewer.gpu().frame().unwrap().dimensions(), (96, 64));
    assert!(viewer.gpu().draws() >= 5);
    assert_eq!(server.get_camera().position(), [0.0, 0.0, 5.0]);
    assert!(client.current_samples() > 0);
    assert!(client.data_bounds().upper[0] > client.data_bounds().lower[0]);

    stop.store(false, Ordering::SeqCst);
    render.await.unwrap().unwrap();

    client.close().await.unwrap();
    server.close().await.unwrap();
}
