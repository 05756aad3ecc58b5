//! Shared allocation, view and teardown logic behind every typed resource.

use std::fmt;

use tracing::{debug, error};

use crate::descriptors::{DescriptorHeapKind, DescriptorSlot};
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::native::{HeapType, NativeHandle, ResourceDesc, ViewKind};
use crate::reference_tracking::{Lease, ReferenceTracker};
use crate::state::{CommandListType, ResourceState};

/// What a resource is for. Decides its heap, resting state and views.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Constant,
    ReadOnly,
    ReadWrite,
    Upload,
    ReadBack,
}

impl ResourceKind {
    pub fn heap(self) -> HeapType {
        match self {
            Self::Constant | Self::ReadOnly | Self::ReadWrite => HeapType::Default,
            Self::Upload => HeapType::Upload,
            Self::ReadBack => HeapType::ReadBack,
        }
    }

    pub fn initial_state(self) -> ResourceState {
        match self {
            Self::Constant | Self::ReadOnly => ResourceState::Common,
            Self::ReadWrite => ResourceState::UnorderedAccess,
            Self::Upload => ResourceState::GenericRead,
            Self::ReadBack => ResourceState::CopyDest,
        }
    }

    /// Upload and read-back memory never changes state.
    pub fn is_transfer(self) -> bool {
        matches!(self, Self::Upload | Self::ReadBack)
    }

    fn views(self) -> &'static [(ViewKind, DescriptorHeapKind)] {
        match self {
            Self::Constant => &[(ViewKind::ConstantBuffer, DescriptorHeapKind::ShaderVisible)],
            Self::ReadOnly => &[(ViewKind::ShaderResource, DescriptorHeapKind::ShaderVisible)],
            Self::ReadWrite => &[
                (ViewKind::UnorderedAccess, DescriptorHeapKind::ShaderVisible),
                (ViewKind::UnorderedAccess, DescriptorHeapKind::NonShaderVisible),
            ],
            Self::Upload | Self::ReadBack => &[],
        }
    }
}

/// Leases on a resource and on its device, held for one operation.
pub(crate) struct ResourceLease<'a> {
    _resource: Lease<'a>,
    _device: Lease<'a>,
}

/// A native allocation plus everything needed to tear it down once.
pub(crate) struct ResourceCore {
    device: GraphicsDevice,
    handle: NativeHandle,
    kind: ResourceKind,
    desc: ResourceDesc,
    size_in_bytes: u64,
    state: ResourceState,
    list_type: CommandListType,
    descriptors: Vec<DescriptorSlot>,
    tracker: ReferenceTracker,
}

impl ResourceCore {
    /// Allocate `desc` on `device`. The caller has already validated sizes
    /// and holds a device lease.
    pub(crate) fn new(
        device: &GraphicsDevice,
        object: &'static str,
        kind: ResourceKind,
        desc: ResourceDesc,
        size_in_bytes: u64,
    ) -> Result<Self> {
        let shared = device.shared();
        let native = shared.native();
        let desc = ResourceDesc {
            heap: kind.heap(),
            initial_state: kind.initial_state(),
            ..desc
        }
        .with_unordered_access(kind == ResourceKind::ReadWrite);

        let handle = native.create_resource(&desc)?;

        let mut descriptors = Vec::with_capacity(kind.views().len());
        let views = kind.views().iter().try_for_each(|&(view, heap)| {
            let slot = shared.rent(heap)?;
            descriptors.push(slot);
            native.create_view(handle, view, slot)
        });
        if let Err(err) = views {
            error!(?handle, %err, "creating resource views failed");
            for slot in descriptors.drain(..) {
                shared.give_back(slot);
            }
            native.destroy_resource(handle);
            return Err(err);
        }

        let counts_as_texture = desc.dimension.is_texture();
        if counts_as_texture {
            shared.texture_allocated();
        }

        let teardown = {
            let shared = shared.clone();
            let descriptors = descriptors.clone();
            move || {
                shared.native().destroy_resource(handle);
                for slot in descriptors {
                    shared.give_back(slot);
                }
                if counts_as_texture {
                    shared.texture_released();
                }
                debug!(?handle, object, "resource released");
            }
        };

        let state = kind.initial_state();
        debug!(?handle, object, ?kind, size_in_bytes, "resource created");
        Ok(Self {
            device: device.clone(),
            handle,
            kind,
            desc,
            size_in_bytes,
            state,
            list_type: if kind.is_transfer() {
                CommandListType::Copy
            } else {
                CommandListType::for_state(state)
            },
            descriptors,
            tracker: ReferenceTracker::new(object, teardown),
        })
    }

    /// Lease the device first so device loss is reported before anything
    /// about the resource itself.
    pub(crate) fn lease(&self) -> Result<ResourceLease<'_>> {
        let device = self.device.lease()?;
        let resource = self.tracker.lease()?;
        Ok(ResourceLease {
            _resource: resource,
            _device: device,
        })
    }

    pub(crate) fn device(&self) -> &GraphicsDevice {
        &self.device
    }

    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub(crate) fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub(crate) fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub(crate) fn size_in_bytes(&self) -> u64 {
        self.size_in_bytes
    }

    pub(crate) fn state(&self) -> ResourceState {
        self.state
    }

    pub(crate) fn list_type(&self) -> CommandListType {
        self.list_type
    }

    pub(crate) fn descriptors(&self) -> &[DescriptorSlot] {
        &self.descriptors
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.tracker.is_disposed()
    }

    pub(crate) fn dispose(&self) {
        self.tracker.dispose();
    }
}

impl Drop for ResourceCore {
    fn drop(&mut self) {
        self.tracker.dispose();
    }
}

impl fmt::Debug for ResourceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCore")
            .field("device", &self.device.id())
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .field("size_in_bytes", &self.size_in_bytes)
            .field("tracker", &self.tracker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_pick_heap_state_and_views() {
        assert_eq!(ResourceKind::Constant.heap(), HeapType::Default);
        assert_eq!(ResourceKind::ReadBack.initial_state(), ResourceState::CopyDest);
        assert_eq!(ResourceKind::Upload.initial_state(), ResourceState::GenericRead);
        assert_eq!(ResourceKind::ReadWrite.views().len(), 2);
        assert!(ResourceKind::Upload.views().is_empty());
        assert!(ResourceKind::ReadBack.is_transfer());
        assert!(!ResourceKind::ReadOnly.is_transfer());
    }
}
