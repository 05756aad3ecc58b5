//! The device handle every resource is created against.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::descriptors::{DescriptorAllocator, DescriptorHeapKind, DescriptorSlot};
use crate::error::{GpuError, Result};
use crate::native::{DeviceLimits, NativeDevice, SoftwareDevice, SoftwareDeviceConfig};
use crate::reference_tracking::{Lease, ReferenceTracker};

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct DeviceShared {
    id: u64,
    native: Arc<dyn NativeDevice>,
    tracker: ReferenceTracker,
    shader_visible: DescriptorAllocator,
    non_shader_visible: DescriptorAllocator,
    allocated_textures: AtomicUsize,
}

impl DeviceShared {
    pub(crate) fn native(&self) -> &dyn NativeDevice {
        self.native.as_ref()
    }

    pub(crate) fn rent(&self, heap: DescriptorHeapKind) -> Result<DescriptorSlot> {
        match heap {
            DescriptorHeapKind::ShaderVisible => self.shader_visible.rent(),
            DescriptorHeapKind::NonShaderVisible => self.non_shader_visible.rent(),
        }
    }

    pub(crate) fn give_back(&self, slot: DescriptorSlot) {
        match slot.heap {
            DescriptorHeapKind::ShaderVisible => self.shader_visible.give_back(slot),
            DescriptorHeapKind::NonShaderVisible => self.non_shader_visible.give_back(slot),
        }
    }

    pub(crate) fn texture_allocated(&self) {
        self.allocated_textures.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn texture_released(&self) {
        self.allocated_textures.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A graphics device shared by every resource created on it.
///
/// Cloning is cheap and yields a handle to the same device. Disposal is
/// explicit: once [`dispose`](GraphicsDevice::dispose) has been called no
/// new work can start, while resources already created keep the native
/// device alive until they are torn down.
#[derive(Clone)]
pub struct GraphicsDevice {
    shared: Arc<DeviceShared>,
}

impl GraphicsDevice {
    pub fn new(native: Arc<dyn NativeDevice>) -> Self {
        let id = NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed);
        let adapter = native.adapter();
        let capacity = adapter.limits.descriptor_heap_capacity;
        debug!(
            id,
            name = %adapter.name,
            unified_memory = adapter.unified_memory,
            "graphics device created"
        );
        let name = adapter.name.clone();
        Self {
            shared: Arc::new(DeviceShared {
                id,
                native,
                tracker: ReferenceTracker::new("GraphicsDevice", move || {
                    debug!(id, %name, "graphics device released");
                }),
                shader_visible: DescriptorAllocator::new(
                    DescriptorHeapKind::ShaderVisible,
                    capacity,
                ),
                non_shader_visible: DescriptorAllocator::new(
                    DescriptorHeapKind::NonShaderVisible,
                    capacity,
                ),
                allocated_textures: AtomicUsize::new(0),
            }),
        }
    }

    /// A device backed by an in-process [`SoftwareDevice`].
    pub fn software(config: SoftwareDeviceConfig) -> Self {
        Self::new(Arc::new(SoftwareDevice::new(config)))
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.native.adapter().name
    }

    pub fn native(&self) -> &Arc<dyn NativeDevice> {
        &self.shared.native
    }

    pub fn is_unified_memory(&self) -> bool {
        self.shared.native.adapter().unified_memory
    }

    /// Whether CPU copies can map device memory directly.
    pub fn is_cache_coherent_uma(&self) -> bool {
        let adapter = self.shared.native.adapter();
        adapter.unified_memory && adapter.cache_coherent
    }

    pub fn limits(&self) -> DeviceLimits {
        self.shared.native.adapter().limits
    }

    pub fn supports_double_precision(&self) -> bool {
        self.shared.native.supports_double_precision()
    }

    /// Textures created on this device and not yet torn down.
    pub fn allocated_textures(&self) -> usize {
        self.shared.allocated_textures.load(Ordering::Acquire)
    }

    pub fn descriptors_in_use(&self, heap: DescriptorHeapKind) -> u32 {
        match heap {
            DescriptorHeapKind::ShaderVisible => self.shared.shader_visible.in_use(),
            DescriptorHeapKind::NonShaderVisible => self.shared.non_shader_visible.in_use(),
        }
    }

    pub fn is_device_lost(&self) -> bool {
        self.shared.native.removed_reason().is_some()
    }

    /// Lease the device for one operation, failing fast if it has been
    /// disposed or lost.
    pub fn lease(&self) -> Result<Lease<'_>> {
        let lease = self.shared.tracker.lease()?;
        if let Some(reason) = self.shared.native.removed_reason() {
            error!(device = self.shared.id, %reason, "device lost");
            return Err(GpuError::DeviceLost {
                device: self.shared.id,
                reason,
            });
        }
        Ok(lease)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.tracker.is_disposed()
    }

    pub fn dispose(&self) {
        self.shared.tracker.dispose();
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared> {
        &self.shared
    }

    pub(crate) fn ensure_same(&self, other: &GraphicsDevice) -> Result<()> {
        if Arc::ptr_eq(&self.shared, &other.shared) {
            Ok(())
        } else {
            Err(GpuError::DeviceMismatch {
                expected: self.id(),
                found: other.id(),
            })
        }
    }
}

impl PartialEq for GraphicsDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for GraphicsDevice {}

impl fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("id", &self.shared.id)
            .field("name", &self.name())
            .field("tracker", &self.shared.tracker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_fails_after_dispose() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        assert!(device.lease().is_ok());
        device.dispose();
        device.dispose();
        assert!(matches!(
            device.lease(),
            Err(GpuError::ObjectDisposed { object: "GraphicsDevice" })
        ));
    }

    #[test]
    fn lease_reports_device_loss() {
        let native = Arc::new(SoftwareDevice::new(SoftwareDeviceConfig::unified()));
        let device = GraphicsDevice::new(native.clone());
        assert!(!device.is_device_lost());
        native.remove_device("driver reset");
        assert!(device.is_device_lost());
        assert_eq!(
            device.lease().unwrap_err(),
            GpuError::DeviceLost {
                device: device.id(),
                reason: "driver reset".to_string()
            }
        );
    }

    #[test]
    fn devices_have_distinct_ids() {
        let a = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let b = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        assert_ne!(a.id(), b.id());
        assert_eq!(a, a.clone());
        assert!(a.ensure_same(&b).is_err());
    }
}
