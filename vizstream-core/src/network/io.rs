//! Reader and writer tasks.
//!
//! ```text
//!            control mpsc ──┐
//!  camera slot (watch) ─────┼──▶ writer ──▶ Framed sink ──▶ TCP
//!   pixel slot (watch) ─────┘      ▲ paced by timestep
//!
//!  TCP ──▶ Framed stream ──▶ reader ──▶ camera cell / inbound pixel slot /
//!                                       range / state / render data
//! ```
//!
//! The writer polls its inputs in priority order: cancellation, control,
//! camera, pixels. Control and camera traffic therefore never queue behind
//! a frame, and a RESIZE always leaves before the first frame of the new
//! size.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::codec::VizCodec;
use crate::error::VizError;
use crate::flags::FrameFlags;
use crate::message::MessageKind;
use crate::network::shared::{OutboundCamera, OutboundFrame, Role, Shared};
use crate::packet::Message;
use crate::protocol::camera::CameraState;
use crate::protocol::handshake::{self, Resize, SetFrame};
use crate::protocol::pixels::{decode_pixels, encode_pixels};
use crate::protocol::range::RangeQuery;
use crate::protocol::state::RenderState;
use crate::stream::types::frame_len;

pub(crate) type FramedSink = SplitSink<Framed<TcpStream, VizCodec>, Message>;
pub(crate) type FramedStream = SplitStream<Framed<TcpStream, VizCodec>>;

// ── Writer ───────────────────────────────────────────────────────

pub(crate) async fn run_writer(
    shared: Arc<Shared>,
    mut sink: FramedSink,
    mut control_rx: mpsc::Receiver<Message>,
    mut camera_rx: watch::Receiver<Option<OutboundCamera>>,
    mut pixel_rx: watch::Receiver<Option<OutboundFrame>>,
) {
    let mut next_pixel_at = Instant::now();

    loop {
        let pixels_allowed = Instant::now() >= next_pixel_at;

        let result = tokio::select! {
            biased;

            _ = shared.cancel.cancelled() => break,

            msg = control_rx.recv() => match msg {
                Some(msg) if msg.kind() == MessageKind::Goodbye => {
                    if let Err(e) = sink.send(msg).await {
                        debug!("goodbye not delivered: {e}");
                    }
                    break;
                }
                Some(msg) => send_control(&shared, &mut sink, msg).await,
                None => break,
            },

            changed = camera_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let pending = *camera_rx.borrow_and_update();
                match pending {
                    Some(out) => send_camera(&shared, &mut sink, out).await,
                    None => Ok(()),
                }
            }

            changed = pixel_rx.changed(), if pixels_allowed => {
                if changed.is_err() {
                    break;
                }
                let pending = pixel_rx.borrow_and_update().clone();
                match pending {
                    Some(frame) => {
                        next_pixel_at = Instant::now() + shared.timestep();
                        send_frame(&shared, &mut sink, frame).await
                    }
                    None => Ok(()),
                }
            }

            _ = tokio::time::sleep_until(next_pixel_at), if !pixels_allowed => Ok(()),
        };

        if let Err(e) = result {
            if fatal_on_send(&e) {
                shared.fail(&e);
                break;
            }
            warn!("send failed: {e}");
            shared.record_error(&e);
        }
    }

    let _ = sink.close().await;
    trace!("writer stopped");
}

/// Whether a send-side error ends the session. An oversized payload is
/// refused before any byte reaches the socket, so the stream stays in sync
/// and only that message is lost.
fn fatal_on_send(e: &VizError) -> bool {
    e.is_fatal() && !matches!(e, VizError::FrameTooLarge { .. })
}

async fn send_control(shared: &Shared, sink: &mut FramedSink, msg: Message) -> Result<(), VizError> {
    let len = msg.encoded_len();
    trace!(kind = %msg.kind(), len, "send");
    sink.send(msg).await?;
    shared.stats.record_sent(len);
    Ok(())
}

async fn send_camera(
    shared: &Shared,
    sink: &mut FramedSink,
    out: OutboundCamera,
) -> Result<(), VizError> {
    let msg = Message::new(MessageKind::Camera, out.flags, out.camera.encode().to_vec())?;
    send_control(shared, sink, msg).await
}

/// PIXELS followed by STATE. Frames that are stale or no longer match the
/// negotiated resolution are dropped here.
async fn send_frame(
    shared: &Shared,
    sink: &mut FramedSink,
    frame: OutboundFrame,
) -> Result<(), VizError> {
    let generation = frame.buffer.generation();
    if generation <= shared.last_sent_generation.load(Ordering::SeqCst) {
        return Ok(());
    }
    if frame.buffer.dimensions() != shared.resolution() {
        debug!(generation, "dropping frame of superseded size");
        shared.stats.record_dropped();
        return Ok(());
    }

    let (flags, payload) = encode_pixels(&frame.buffer, shared.compression)?;
    let pixels = Message::new(MessageKind::Pixels, flags, payload)
        .inspect_err(|_| shared.stats.record_dropped())?;
    let pixels_len = pixels.encoded_len();
    let state = Message::new(MessageKind::State, FrameFlags::empty(), frame.state.to_bytes()?)?;
    let state_len = state.encoded_len();

    sink.feed(pixels).await?;
    sink.send(state).await?;

    shared.last_sent_generation.store(generation, Ordering::SeqCst);
    shared.stats.record_frame_sent(pixels_len);
    shared.stats.record_sent(state_len);
    trace!(generation, bytes = pixels_len, "frame sent");
    Ok(())
}

// ── Reader ───────────────────────────────────────────────────────

pub(crate) async fn run_reader(shared: Arc<Shared>, mut stream: FramedStream) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                shared.fail(&e);
                break;
            }
            None => {
                shared.fail(&VizError::PeerDisconnected);
                break;
            }
        };

        shared.stats.record_received(message.encoded_len());
        let kind = message.kind();
        if let Err(e) = dispatch(&shared, message).await {
            if e.is_fatal() {
                shared.fail(&e);
                break;
            }
            warn!("dropping {kind} message: {e}");
            shared.record_error(&e);
        }
    }
    trace!("reader stopped");
}

async fn dispatch(shared: &Shared, message: Message) -> Result<(), VizError> {
    let flags = message.flags();
    match message.kind() {
        MessageKind::Camera => {
            let camera = CameraState::decode(message.payload())?;
            shared.inbound_camera.publish(camera);
            if flags.contains(FrameFlags::RESET) {
                debug!("peer requested reset");
                shared.reset_requested.store(true, Ordering::SeqCst);
            }
        }

        MessageKind::Pixels => accept_frame(shared, flags, message.payload())?,

        MessageKind::State => {
            let state = RenderState::from_bytes(message.payload())?;
            *shared
                .remote_state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
            shared.stats.set_samples(state.samples);
        }

        MessageKind::Resize => {
            let req: Resize = handshake::decode(message.payload())?;
            frame_len(req.width, req.height, shared.format)?;
            if shared.role == Role::Server && shared.pending_resize.load(Ordering::SeqCst) {
                debug!(
                    width = req.width,
                    height = req.height,
                    "ignoring peer resize, local resize pending"
                );
                return Ok(());
            }
            shared.apply_resolution(req.width, req.height)?;
            shared.pending_resize.store(false, Ordering::SeqCst);
            info!("peer resized stream to {}x{}", req.width, req.height);
            let ack = Message::new(
                MessageKind::ResizeAck,
                FrameFlags::empty(),
                handshake::encode(&req)?,
            )?;
            shared.control_tx.send(ack).await?;
        }

        MessageKind::ResizeAck => {
            let ack: Resize = handshake::decode(message.payload())?;
            if (ack.width, ack.height) == shared.resolution() {
                shared.pending_resize.store(false, Ordering::SeqCst);
                debug!("resize to {}x{} acknowledged", ack.width, ack.height);
            }
        }

        MessageKind::Range => {
            let query: RangeQuery = handshake::decode(message.payload())?;
            query.validate()?;
            *shared
                .range
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(query);
        }

        MessageKind::SetFrame => {
            let frame: SetFrame = handshake::decode(message.payload())?;
            shared.scene_frame.store(frame.frame, Ordering::SeqCst);
        }

        MessageKind::RenderData => {
            *shared
                .render_data
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(message.into_payload());
        }

        MessageKind::Goodbye => return Err(VizError::PeerDisconnected),

        MessageKind::Hello | MessageKind::HelloAck => {
            return Err(VizError::ProtocolViolation("handshake message after negotiation"));
        }
    }
    Ok(())
}

/// Publish a received frame to the inbound slot if it has the current
/// size and is newer than anything already accepted.
fn accept_frame(shared: &Shared, flags: FrameFlags, payload: &[u8]) -> Result<(), VizError> {
    let frame = decode_pixels(flags, payload)?;
    let generation = frame.generation();

    if frame.dimensions() != shared.resolution() {
        debug!(generation, "dropping frame of superseded size");
        shared.stats.record_dropped();
        return Ok(());
    }
    let installed = shared.store.generation();
    if generation <= installed {
        debug!(generation, installed, "dropping out-of-order frame");
        shared.stats.record_dropped();
        return Ok(());
    }

    let frame = Arc::new(frame);
    shared.inbound_tx.send_if_modified(|slot| {
        match slot.as_ref().map(|f| f.generation()) {
            Some(pending) if pending >= generation => false,
            pending => {
                // superseded before anyone received it
                if pending.is_some_and(|g| g > installed) {
                    shared.stats.record_dropped();
                }
                *slot = Some(Arc::clone(&frame));
                true
            }
        }
    });
    Ok(())
}
