//! Lifetime accounting for GPU objects owned by the engine.
//!
//! Every program, framebuffer, texture and buffer the engine creates is
//! wrapped in a guard that records its creation and release in a shared
//! [`ResourceCounters`] table. Dropping the guard releases the object exactly
//! once, so disposing a component twice is impossible and leaked objects
//! show up as a non-zero [`ResourceCounters::live`] count.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Kinds of GPU objects tracked by [`ResourceCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuObject {
    /// A linked render pipeline (one per shader program).
    Program,
    /// An offscreen color + depth target pair.
    FrameBuffer,
    /// A texture allocation.
    Texture,
    /// A vertex or uniform buffer.
    Buffer,
}

impl GpuObject {
    const ALL: [Self; 4] =
        [Self::Program, Self::FrameBuffer, Self::Texture, Self::Buffer];

    const fn index(self) -> usize {
        match self {
            Self::Program => 0,
            Self::FrameBuffer => 1,
            Self::Texture => 2,
            Self::Buffer => 3,
        }
    }
}

impl fmt::Display for GpuObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Program => "program",
            Self::FrameBuffer => "framebuffer",
            Self::Texture => "texture",
            Self::Buffer => "buffer",
        };
        f.write_str(name)
    }
}

/// Created/released tallies per [`GpuObject`] kind.
#[derive(Debug, Default)]
pub struct ResourceCounters {
    created: [AtomicUsize; 4],
    released: [AtomicUsize; 4],
}

impl ResourceCounters {
    /// Number of objects of `kind` created so far.
    #[must_use]
    pub fn created(&self, kind: GpuObject) -> usize {
        self.created[kind.index()].load(Ordering::Relaxed)
    }

    /// Number of objects of `kind` released so far.
    #[must_use]
    pub fn released(&self, kind: GpuObject) -> usize {
        self.released[kind.index()].load(Ordering::Relaxed)
    }

    /// Objects of `kind` that are currently alive.
    #[must_use]
    pub fn live(&self, kind: GpuObject) -> usize {
        self.created(kind).saturating_sub(self.released(kind))
    }

    /// Total live objects across all kinds.
    #[must_use]
    pub fn total_live(&self) -> usize {
        GpuObject::ALL.iter().map(|&kind| self.live(kind)).sum()
    }

    fn record_created(&self, kind: GpuObject) {
        let _ = self.created[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_released(&self, kind: GpuObject) {
        let _ = self.released[kind.index()].fetch_add(1, Ordering::Relaxed);
    }
}

/// Records one live object of a kind; releasing happens on drop.
pub(crate) struct ObjectGuard {
    kind: GpuObject,
    counters: Arc<ResourceCounters>,
}

impl ObjectGuard {
    pub(crate) fn new(counters: &Arc<ResourceCounters>, kind: GpuObject) -> Self {
        counters.record_created(kind);
        Self {
            kind,
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for ObjectGuard {
    fn drop(&mut self) {
        self.counters.record_released(self.kind);
    }
}

impl fmt::Debug for ObjectGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectGuard({})", self.kind)
    }
}

/// A wgpu object whose release is counted.
pub(crate) trait GpuResource {
    const KIND: GpuObject;

    /// Free backing memory eagerly, if the object supports it.
    fn release(&self) {}
}

impl GpuResource for wgpu::Texture {
    const KIND: GpuObject = GpuObject::Texture;

    fn release(&self) {
        self.destroy();
    }
}

impl GpuResource for wgpu::Buffer {
    const KIND: GpuObject = GpuObject::Buffer;

    fn release(&self) {
        self.destroy();
    }
}

impl GpuResource for wgpu::RenderPipeline {
    const KIND: GpuObject = GpuObject::Program;
}

/// Owning wrapper that counts a wgpu object and frees it when dropped.
pub(crate) struct Tracked<T: GpuResource> {
    inner: T,
    _guard: ObjectGuard,
}

impl<T: GpuResource> Tracked<T> {
    pub(crate) fn new(inner: T, counters: &Arc<ResourceCounters>) -> Self {
        Self {
            inner,
            _guard: ObjectGuard::new(counters, T::KIND),
        }
    }
}

impl<T: GpuResource> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: GpuResource> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_counts_creation_and_release_once() {
        let counters = Arc::new(ResourceCounters::default());
        let guard = ObjectGuard::new(&counters, GpuObject::FrameBuffer);
        assert_eq!(counters.created(GpuObject::FrameBuffer), 1);
        assert_eq!(counters.live(GpuObject::FrameBuffer), 1);
        drop(guard);
        assert_eq!(counters.released(GpuObject::FrameBuffer), 1);
        assert_eq!(counters.live(GpuObject::FrameBuffer), 0);
        assert_eq!(counters.total_live(), 0);
    }

    #[test]
    fn kinds_are_counted_independently() {
        let counters = Arc::new(ResourceCounters::default());
        let _a = ObjectGuard::new(&counters, GpuObject::Texture);
        let _b = ObjectGuard::new(&counters, GpuObject::Texture);
        let c = ObjectGuard::new(&counters, GpuObject::Program);
        drop(c);
        assert_eq!(counters.live(GpuObject::Texture), 2);
        assert_eq!(counters.live(GpuObject::Program), 0);
        assert_eq!(counters.created(GpuObject::Buffer), 0);
        assert_eq!(counters.total_live(), 2);
    }
}
