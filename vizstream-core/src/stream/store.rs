//! Double-buffered frame store.
//!
//! ```text
//!             set_pixels(Swap)                    snapshot() / get_pixels()
//!  producer ──▶ [ back ] ──swap──▶ [ front: Arc<PixelBuffer> ] ──▶ readers
//!                  ▲                     │
//!                  └──── recycled ◀──────┘ (when no reader holds it)
//! ```
//!
//! The front lock is held only for a pointer swap or a copy into caller
//! storage, never across network or GPU work: readers that need the
//! frame for longer take a [`snapshot`](FrameBufferStore::snapshot).

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::VizError;
use crate::stream::types::{PixelBuffer, PixelFormat};

/// How [`FrameBufferStore::set_pixels`] publishes a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Wait for in-progress reads, then write the front buffer in place.
    Blocking,
    /// Fill the back buffer, then swap it in atomically.
    #[default]
    Swap,
}

/// Current frame plus one recycled spare.
#[derive(Debug)]
pub struct FrameBufferStore {
    front: RwLock<Arc<PixelBuffer>>,
    spare: Mutex<Option<PixelBuffer>>,
}

impl FrameBufferStore {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, VizError> {
        Ok(Self {
            front: RwLock::new(Arc::new(PixelBuffer::new(width, height, format)?)),
            spare: Mutex::new(None),
        })
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Shared handle to the current frame. Never observes a half-written buffer.
    pub fn snapshot(&self) -> Arc<PixelBuffer> {
        Arc::clone(&self.front.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Copy the current frame into `dest`, reallocating it if its shape differs.
    pub fn get_pixels(&self, dest: &mut PixelBuffer) -> Result<(), VizError> {
        let front = self.front.read().unwrap_or_else(PoisonError::into_inner);
        if dest.dimensions() != front.dimensions() || dest.format() != front.format() {
            dest.reallocate(front.width(), front.height(), front.format())?;
        }
        dest.copy_from(&front)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.front
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dimensions()
    }

    pub fn format(&self) -> PixelFormat {
        self.front
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .format()
    }

    /// Generation of the current frame.
    pub fn generation(&self) -> u64 {
        self.front
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation()
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Replace the current frame with the contents of `src` and stamp the
    /// next generation. Returns that generation.
    ///
    /// `src` must match the store's resolution and format.
    pub fn set_pixels(&self, src: &PixelBuffer, mode: WriteMode) -> Result<u64, VizError> {
        self.check_shape(src)?;
        match mode {
            WriteMode::Blocking => {
                let mut front = self.front.write().unwrap_or_else(PoisonError::into_inner);
                let generation = front.generation() + 1;
                let buf = Arc::make_mut(&mut *front);
                buf.copy_from(src)?;
                buf.set_generation(generation);
                Ok(generation)
            }
            WriteMode::Swap => {
                let mut back = self.take_spare(src)?;
                back.copy_from(src)?;
                let mut front = self.front.write().unwrap_or_else(PoisonError::into_inner);
                let generation = front.generation() + 1;
                back.set_generation(generation);
                let old = std::mem::replace(&mut *front, Arc::new(back));
                drop(front);
                self.recycle(old);
                Ok(generation)
            }
        }
    }

    /// Make a decoded frame the current frame without copying, keeping its
    /// generation. Frames not newer than the current one are refused and
    /// `false` is returned.
    pub fn install(&self, buffer: Arc<PixelBuffer>) -> Result<bool, VizError> {
        self.check_shape(&buffer)?;
        let mut front = self.front.write().unwrap_or_else(PoisonError::into_inner);
        if buffer.generation() <= front.generation() {
            return Ok(false);
        }
        let old = std::mem::replace(&mut *front, buffer);
        drop(front);
        self.recycle(old);
        Ok(true)
    }

    /// Reallocate for a new resolution. Contents are zeroed; the generation
    /// counter carries over.
    pub fn resize(&self, width: u32, height: u32, format: PixelFormat) -> Result<(), VizError> {
        let mut fresh = PixelBuffer::new(width, height, format)?;
        let mut front = self.front.write().unwrap_or_else(PoisonError::into_inner);
        fresh.set_generation(front.generation());
        *front = Arc::new(fresh);
        drop(front);
        *self.spare.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn check_shape(&self, buf: &PixelBuffer) -> Result<(), VizError> {
        let front = self.front.read().unwrap_or_else(PoisonError::into_inner);
        if buf.dimensions() != front.dimensions() || buf.format() != front.format() {
            return Err(VizError::InvalidResolution {
                width: buf.width(),
                height: buf.height(),
            });
        }
        Ok(())
    }

    fn take_spare(&self, like: &PixelBuffer) -> Result<PixelBuffer, VizError> {
        let spare = self
            .spare
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match spare {
            Some(buf) if buf.dimensions() == like.dimensions() && buf.format() == like.format() => {
                Ok(buf)
            }
            _ => PixelBuffer::new(like.width(), like.height(), like.format()),
        }
    }

    fn recycle(&self, old: Arc<PixelBuffer>) {
        // Still referenced by a snapshot: let the reader drop it.
        if let Ok(buf) = Arc::try_unwrap(old) {
            *self.spare.lock().unwrap_or_else(PoisonError::into_inner) = Some(buf);
        }
    }
}
