//! Presentable images and presentation.
//!
//! The window layer owns the surface and its swap chain. A scene is bound to
//! the resulting [`SwapchainImages`] and records one swap-chain command buffer
//! per image. Acquisition and presentation go through a [`Presenter`], which
//! serializes access to the presentation queue through the lock of its
//! [`PresentQueue`] so several scenes can share one queue.
//!
//! # Example
//!
//! ```ignore
//! let queue = PresentQueue::new(graphics_queue);
//! let presenter = Presenter::new(backend.clone(), queue.clone());
//!
//! loop {
//!     let index = match presenter.acquire(image_available) {
//!         Ok(index) => index,
//!         Err(SceneError::SurfaceOutdated) => {
//!             scene.resize(window.swapchain_images())?;
//!             continue;
//!         }
//!         Err(e) => return Err(e),
//!     };
//!     scene.frame(graphics_queue, compute_queue, index, Some(image_available), &streams, &edges)?;
//!     scene.present(&presenter, index)?;
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuImage, GpuQueue, GpuSemaphore};
use crate::error::SceneError;
use crate::types::{Extent2d, TextureFormat};

/// The ordered set of presentable images a scene renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainImages {
    images: Vec<GpuImage>,
    format: TextureFormat,
    extent: Extent2d,
}

impl SwapchainImages {
    /// Create an image set. Every image shares `format` and `extent`.
    pub fn new(images: Vec<GpuImage>, format: TextureFormat, extent: Extent2d) -> Self {
        Self {
            images,
            format,
            extent,
        }
    }

    /// The images, in presentation index order.
    pub fn images(&self) -> &[GpuImage] {
        &self.images
    }

    /// Image at `index`.
    pub fn image(&self, index: usize) -> Option<GpuImage> {
        self.images.get(index).copied()
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true if the set holds no image.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Image format.
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Image extent.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }
}

/// A presentation-capable queue and the lock that guards presenting on it.
#[derive(Debug, Clone)]
pub struct PresentQueue {
    /// The queue.
    pub queue: GpuQueue,
    /// Held around present calls and the idle wait that follows them.
    pub lock: Arc<Mutex<()>>,
}

impl PresentQueue {
    /// Pair a queue with a fresh lock.
    pub fn new(queue: GpuQueue) -> Self {
        Self::with_lock(queue, Arc::new(Mutex::new(())))
    }

    /// Pair a queue with an existing lock shared with other users of the queue.
    pub fn with_lock(queue: GpuQueue, lock: Arc<Mutex<()>>) -> Self {
        Self { queue, lock }
    }
}

/// Acquires presentable images and presents them.
pub struct Presenter {
    backend: Arc<dyn GpuBackend>,
    queue: PresentQueue,
    wait_idle_after_present: bool,
}

impl Presenter {
    /// Create a presenter that waits for the queue to go idle after each present.
    pub fn new(backend: Arc<dyn GpuBackend>, queue: PresentQueue) -> Self {
        Self {
            backend,
            queue,
            wait_idle_after_present: true,
        }
    }

    /// Enable or disable the queue idle wait after each present.
    ///
    /// Streams are re-submitted every frame without per-frame fences; with the
    /// wait disabled the caller must pace frames itself.
    pub fn with_wait_idle_after_present(mut self, wait: bool) -> Self {
        self.wait_idle_after_present = wait;
        self
    }

    /// Whether presents are followed by a queue idle wait.
    pub fn waits_idle_after_present(&self) -> bool {
        self.wait_idle_after_present
    }

    /// The presentation queue.
    pub fn queue(&self) -> &PresentQueue {
        &self.queue
    }

    /// Acquire the next presentable image, signaling `signal` once it is ready.
    ///
    /// A stale surface is reported as [`SceneError::SurfaceOutdated`]; the
    /// caller answers it with a resize.
    pub fn acquire(&self, signal: GpuSemaphore) -> Result<u32, SceneError> {
        match self.backend.acquire_next_image(signal) {
            Err(SceneError::SurfaceOutdated) => {
                log::debug!("Surface outdated on acquire");
                Err(SceneError::SurfaceOutdated)
            }
            other => other,
        }
    }

    /// Present `image_index` once `wait` is signaled.
    pub fn present(&self, image_index: u32, wait: GpuSemaphore) -> Result<(), SceneError> {
        crate::profile_scope!("present");

        let _guard = self.queue.lock.lock();
        self.backend.present(self.queue.queue, image_index, wait)?;
        if self.wait_idle_after_present {
            self.backend.queue_wait_idle(self.queue.queue)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("backend", &self.backend.name())
            .field("queue", &self.queue.queue)
            .field("wait_idle_after_present", &self.wait_idle_after_present)
            .finish()
    }
}

static_assertions::assert_impl_all!(Presenter: Send, Sync);
static_assertions::assert_impl_all!(PresentQueue: Send, Sync);
