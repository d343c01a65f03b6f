use crate::{
    inst::{PhysReg, Tag},
    queue::Queue,
};

#[derive(Debug, Clone)]
pub struct RobEntry {
    pub tag: Tag,
    /// Destination reclaimed at commit. `None` for stores and zero
    /// destinations.
    pub dst: Option<PhysReg>,
    pub ready: bool,
}

/// In-order retirement FIFO. Entries enter at Dispatch in program order and
/// leave at Commit from the head only.
#[derive(Debug, Clone, Default)]
pub struct ReorderBuffer {
    entries: Queue<RobEntry>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: Tag, dst: Option<PhysReg>) {
        debug_assert!(
            self.entries.iter().all(|e| e.tag < tag),
            "ROB insertion out of program order"
        );

        self.entries.push(RobEntry {
            tag,
            dst,
            ready: false,
        });
    }

    /// Marks a written-back instruction complete. Matching is on the fetch
    /// index handle: an in-flight destination belongs to exactly one entry,
    /// so this subsumes a destination-tag match and also covers stores.
    pub fn mark_ready(&mut self, tag: Tag) {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.tag == tag)
            .expect("no entry found in ROB");

        entry.ready = true;
    }

    /// Pops the head entry if it has completed. Commit is strictly
    /// in-order; a non-ready head blocks everything behind it.
    pub fn pop_ready(&mut self) -> Option<RobEntry> {
        if self.entries.front().map(|e| e.ready).unwrap_or(false) {
            self.entries.pop()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RobEntry> {
        self.entries.iter()
    }
}
