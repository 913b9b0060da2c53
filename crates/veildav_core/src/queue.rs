//! Bounded batch of local mutation intents.

use crate::error::{CoreError, CoreResult};
use crate::types::{ETag, LocalId};

/// Fixed cost charged for operations that carry no component.
const SMALL_OPERATION_BYTES: usize = 64;

/// One staged local mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperation<C> {
    /// Store a component received from the server (not dirty).
    Add {
        /// The component.
        component: C,
        /// Its server ETag.
        etag: Option<ETag>,
    },
    /// Replace a component with the server's version; clears the dirty and
    /// deleted flags.
    Update {
        /// Target.
        id: LocalId,
        /// New content.
        component: C,
        /// New server ETag.
        etag: Option<ETag>,
    },
    /// Remove a component.
    Remove {
        /// Target.
        id: LocalId,
    },
    /// Give a new local component its UID.
    AssignUid {
        /// Target.
        id: LocalId,
        /// The UID.
        uid: String,
    },
    /// The server confirmed the component.
    ClearDirty {
        /// Target.
        id: LocalId,
        /// ETag reported by the server, if any.
        etag: Option<ETag>,
    },
    /// Forget the UID so the component is pushed as new next pass.
    MarkForRetry {
        /// Target.
        id: LocalId,
    },
}

impl<C> PendingOperation<C> {
    /// Local id targeted by the operation; `None` for additions.
    pub fn target(&self) -> Option<LocalId> {
        match self {
            PendingOperation::Add { .. } => None,
            PendingOperation::Update { id, .. }
            | PendingOperation::Remove { id }
            | PendingOperation::AssignUid { id, .. }
            | PendingOperation::ClearDirty { id, .. }
            | PendingOperation::MarkForRetry { id } => Some(*id),
        }
    }
}

/// Bounds of a [`PendingOperationQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimits {
    /// Maximum number of queued operations.
    pub max_operations: usize,
    /// Maximum number of queued bytes.
    pub max_bytes: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_operations: 100,
            max_bytes: 512 * 1024,
        }
    }
}

impl QueueLimits {
    /// Creates limits.
    #[must_use]
    pub const fn new(max_operations: usize, max_bytes: usize) -> Self {
        Self {
            max_operations,
            max_bytes,
        }
    }
}

/// An ordered batch of local mutations, applied as one unit.
///
/// Staging past either bound fails with [`CoreError::QueueFull`], except that
/// an empty queue always accepts one operation so that a single oversized
/// component can still be stored.
#[derive(Debug)]
pub struct PendingOperationQueue<C> {
    operations: Vec<PendingOperation<C>>,
    bytes: usize,
    limits: QueueLimits,
}

impl<C> PendingOperationQueue<C> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            operations: Vec::new(),
            bytes: 0,
            limits,
        }
    }

    /// Stages an operation weighing `bytes`.
    pub fn push(&mut self, operation: PendingOperation<C>, bytes: usize) -> CoreResult<()> {
        let bytes = bytes.max(SMALL_OPERATION_BYTES);
        if !self.operations.is_empty()
            && (self.operations.len() + 1 > self.limits.max_operations
                || self.bytes + bytes > self.limits.max_bytes)
        {
            return Err(CoreError::QueueFull {
                operations: self.operations.len(),
                bytes: self.bytes,
            });
        }

        self.operations.push(operation);
        self.bytes += bytes;
        Ok(())
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of queued bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Returns true if either bound is reached.
    pub fn is_full(&self) -> bool {
        self.operations.len() >= self.limits.max_operations || self.bytes >= self.limits.max_bytes
    }

    /// The configured bounds.
    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Iterates over queued operations in order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation<C>> {
        self.operations.iter()
    }

    /// Removes and returns every queued operation.
    pub fn take(&mut self) -> Vec<PendingOperation<C>> {
        self.bytes = 0;
        std::mem::take(&mut self.operations)
    }

    /// Drops every queued operation.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remove(id: u64) -> PendingOperation<()> {
        PendingOperation::Remove {
            id: LocalId::new(id),
        }
    }

    #[test]
    fn count_bound() {
        let mut queue = PendingOperationQueue::new(QueueLimits::new(2, 1 << 20));
        queue.push(remove(1), 0).unwrap();
        queue.push(remove(2), 0).unwrap();
        assert!(queue.is_full());
        assert!(matches!(
            queue.push(remove(3), 0),
            Err(CoreError::QueueFull { operations: 2, .. })
        ));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn byte_bound_admits_one_oversized_operation() {
        let mut queue = PendingOperationQueue::new(QueueLimits::new(10, 1000));
        queue.push(remove(1), 5000).unwrap();
        assert!(queue.is_full());
        assert!(queue.push(remove(2), 10).is_err());
    }

    #[test]
    fn small_operations_have_a_floor() {
        let mut queue = PendingOperationQueue::new(QueueLimits::default());
        queue.push(remove(1), 0).unwrap();
        assert_eq!(queue.bytes(), SMALL_OPERATION_BYTES);
    }

    #[test]
    fn take_clears() {
        let mut queue = PendingOperationQueue::new(QueueLimits::default());
        queue.push(remove(1), 10).unwrap();
        queue.push(remove(2), 10).unwrap();

        let taken = queue.take();
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].target(), Some(LocalId::new(1)));
        assert!(queue.is_empty());
        assert_eq!(queue.bytes(), 0);
    }
}
