//! Coarse resource states and the queue kind they imply.

/// The state a resource rests in between operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Default state; implicitly promoted to copy source/destination on a
    /// copy queue.
    Common,
    CopySource,
    CopyDest,
    /// Read-write resources live here and must be transitioned explicitly.
    UnorderedAccess,
    /// Fixed state of upload-heap memory.
    GenericRead,
}

/// Which kind of command list a copy involving a resource must use.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandListType {
    Copy,
    Compute,
}

impl CommandListType {
    /// A copy queue cannot see `UnorderedAccess`, so anything not resting in
    /// `Common` goes through the compute queue.
    pub fn for_state(state: ResourceState) -> Self {
        match state {
            ResourceState::Common => Self::Copy,
            _ => Self::Compute,
        }
    }

    /// The list type able to service both sides of a copy.
    pub fn combine(self, other: Self) -> Self {
        if self == Self::Compute || other == Self::Compute {
            Self::Compute
        } else {
            Self::Copy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_common_uses_the_copy_queue() {
        assert_eq!(CommandListType::for_state(ResourceState::Common), CommandListType::Copy);
        assert_eq!(
            CommandListType::for_state(ResourceState::UnorderedAccess),
            CommandListType::Compute
        );
        assert_eq!(
            CommandListType::for_state(ResourceState::CopyDest),
            CommandListType::Compute
        );
    }

    #[test]
    fn compute_wins_when_combined() {
        use CommandListType::*;
        assert_eq!(Copy.combine(Copy), Copy);
        assert_eq!(Copy.combine(Compute), Compute);
        assert_eq!(Compute.combine(Copy), Compute);
    }
}
