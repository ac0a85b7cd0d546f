//! Shared property buffer.
//!
//! A fixed-offset record of a node's numeric properties plus its parent id,
//! written by the proxy thread and read by the render worker. Each write
//! marks its slot dirty; the reader collects only the slots changed since
//! its last read, so a slot the authority is animating is only overwritten
//! when the proxy actually writes it again.
//!
//! Single writer, single reader. Last writer wins per slot; a reader may
//! observe a write one frame late.

use lumen_core::{NodeId, NodeProps, Prop};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const PARENT_SLOT: usize = Prop::COUNT;
const SLOT_COUNT: usize = Prop::COUNT + 1;

/// Slots changed since the previous [`SharedPropertyBuffer::take_changes`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferChanges {
    /// Changed property slots and their latest values
    pub props: Vec<(usize, f64)>,
    /// New parent, when the parent slot changed
    pub parent: Option<Option<NodeId>>,
}

impl BufferChanges {
    pub fn is_empty(&self) -> bool {
        self.props.is_empty() && self.parent.is_none()
    }
}

/// Lock-free property mirror shared between a proxy and the worker.
pub struct SharedPropertyBuffer {
    slots: [AtomicU64; SLOT_COUNT],
    dirty: AtomicU64,
    version: AtomicU64,
}

impl SharedPropertyBuffer {
    /// Create a buffer holding `props`, with nothing marked dirty.
    pub fn new(props: &NodeProps) -> Self {
        let slots = std::array::from_fn(|slot| {
            let value = Prop::from_slot(slot).map_or(0.0, |p| props.get(p));
            AtomicU64::new(value.to_bits())
        });
        Self {
            slots,
            dirty: AtomicU64::new(0),
            version: AtomicU64::new(0),
        }
    }

    /// Write a property, fanning out composites.
    pub fn write(&self, prop: Prop, value: f64) {
        let mut mask = 0u64;
        for field in prop.expand() {
            let slot = field.slot();
            self.slots[slot].store(value.to_bits(), Ordering::Relaxed);
            mask |= 1 << slot;
        }
        self.publish(mask);
    }

    pub fn write_parent(&self, parent: Option<NodeId>) {
        let raw = parent.map_or(0, NodeId::raw);
        self.slots[PARENT_SLOT].store(raw, Ordering::Relaxed);
        self.publish(1 << PARENT_SLOT);
    }

    fn publish(&self, mask: u64) {
        self.dirty.fetch_or(mask, Ordering::Release);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn read(&self, prop: Prop) -> f64 {
        f64::from_bits(self.slots[prop.slot()].load(Ordering::Relaxed))
    }

    pub fn parent(&self) -> Option<NodeId> {
        NodeId::from_raw(self.slots[PARENT_SLOT].load(Ordering::Relaxed))
    }

    /// Number of writes published so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Whether any slot changed since the last `take_changes`.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire) != 0
    }

    /// Collect and clear the slots written since the last call.
    pub fn take_changes(&self) -> BufferChanges {
        let mask = self.dirty.swap(0, Ordering::AcqRel);
        let mut changes = BufferChanges::default();
        if mask == 0 {
            return changes;
        }
        for slot in 0..Prop::COUNT {
            if mask & (1 << slot) != 0 {
                let value = f64::from_bits(self.slots[slot].load(Ordering::Relaxed));
                changes.props.push((slot, value));
            }
        }
        if mask & (1 << PARENT_SLOT) != 0 {
            changes.parent = Some(self.parent());
        }
        changes
    }
}

impl fmt::Debug for SharedPropertyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPropertyBuffer")
            .field("version", &self.version())
            .field("parent", &self.parent())
            .field("dirty", &format_args!("{:#x}", self.dirty.load(Ordering::Relaxed)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_buffer_is_clean() {
        let props = NodeProps::new().with(Prop::X, 12.0);
        let buffer = SharedPropertyBuffer::new(&props);
        assert_eq!(buffer.read(Prop::X), 12.0);
        assert_eq!(buffer.read(Prop::Alpha), 1.0);
        assert_eq!(buffer.parent(), None);
        assert!(!buffer.is_dirty());
        assert!(buffer.take_changes().is_empty());
    }

    #[test]
    fn test_changes_are_taken_once() {
        let buffer = SharedPropertyBuffer::new(&NodeProps::new());
        buffer.write(Prop::X, 5.0);
        buffer.write(Prop::X, 7.0);
        buffer.write_parent(Some(NodeId::new(9)));
        assert_eq!(buffer.version(), 3);

        let changes = buffer.take_changes();
        assert_eq!(changes.props, vec![(Prop::X.slot(), 7.0)]);
        assert_eq!(changes.parent, Some(Some(NodeId::new(9))));
        assert!(buffer.take_changes().is_empty());
    }

    #[test]
    fn test_composite_write_marks_every_field() {
        let buffer = SharedPropertyBuffer::new(&NodeProps::new());
        buffer.write(Prop::Mount, 0.5);
        let slots: Vec<usize> = buffer.take_changes().props.iter().map(|(s, _)| *s).collect();
        assert_eq!(slots, vec![Prop::Mount.slot(), Prop::MountX.slot(), Prop::MountY.slot()]);
    }

    #[test]
    fn test_clearing_parent() {
        let buffer = SharedPropertyBuffer::new(&NodeProps::new());
        buffer.write_parent(Some(NodeId::new(2)));
        buffer.take_changes();
        buffer.write_parent(None);
        assert_eq!(buffer.take_changes().parent, Some(None));
    }

    #[test]
    fn test_cross_thread_last_write_wins() {
        let buffer = Arc::new(SharedPropertyBuffer::new(&NodeProps::new()));
        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for i in 0..1000 {
                    buffer.write(Prop::Y, f64::from(i));
                }
            })
        };
        writer.join().unwrap();
        let changes = buffer.take_changes();
        assert_eq!(changes.props, vec![(Prop::Y.slot(), 999.0)]);
    }
}
