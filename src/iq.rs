use crate::{
    inst::{Kind, PhysReg, Renamed, RenamedSrc, Tag},
    regs::RegFile,
};

#[derive(Debug, Copy, Clone)]
struct SrcState {
    reg: Option<PhysReg>,
    ready: bool,
}

impl SrcState {
    fn new(src: RenamedSrc, pre_ready: bool, force_ready: bool, regs: &RegFile) -> Self {
        match src {
            // Immediates never wait.
            RenamedSrc::Imm(_) => Self {
                reg: None,
                ready: true,
            },
            // A value that was ready when Rename resolved the mapping stays
            // architecturally ready even if the register has since been
            // re-allocated.
            RenamedSrc::Reg(reg) => Self {
                reg: Some(reg),
                ready: force_ready || pre_ready || regs.is_ready(reg),
            },
        }
    }

    fn wake(&mut self, tag: PhysReg) {
        if self.reg == Some(tag) {
            self.ready = true;
        }
    }
}

#[derive(Debug, Clone)]
pub struct IqEntry {
    pub tag: Tag,
    /// Wakeup tag broadcast when this entry issues. `None` for stores and
    /// zero destinations.
    pub dst: Option<PhysReg>,
    src1: SrcState,
    src2: SrcState,
    age: u64,
}

impl IqEntry {
    fn eligible(&self) -> bool {
        self.src1.ready && self.src2.ready
    }
}

/// Pool of dispatched but not yet issued instructions. Entries are kept in
/// insertion order, so a front-to-back scan is an oldest-first scan.
#[derive(Debug, Clone, Default)]
pub struct IssueQueue {
    entries: Vec<IqEntry>,
    next_age: u64,
}

impl IssueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the entry for a newly dispatched instruction, sampling source
    /// readiness from the ready table. Stores leave the wakeup fabric to
    /// the memory system and enter with both sources ready.
    pub fn insert(&mut self, tag: Tag, kind: Kind, renamed: &Renamed, regs: &RegFile) {
        let all_ready = kind == Kind::S;

        self.entries.push(IqEntry {
            tag,
            dst: renamed.dst,
            src1: SrcState::new(renamed.srcs[0], renamed.ready_at_rename[0], all_ready, regs),
            src2: SrcState::new(renamed.srcs[1], renamed.ready_at_rename[1], all_ready, regs),
            age: self.next_age,
        });
        self.next_age += 1;
    }

    /// Removes and returns up to `width` eligible entries, oldest first.
    /// A single age-ordered pass: entries woken later this cycle are not
    /// reconsidered.
    pub fn select(&mut self, width: usize) -> Vec<IqEntry> {
        let mut picked = Vec::new();
        let mut rest = Vec::with_capacity(self.entries.len());

        for entry in self.entries.drain(..) {
            if picked.len() < width && entry.eligible() {
                picked.push(entry);
            } else {
                rest.push(entry);
            }
        }

        debug_assert!(picked.windows(2).all(|w| w[0].age < w[1].age));
        self.entries = rest;
        picked
    }

    /// Broadcasts the cycle's wakeup tags to every waiting entry.
    pub fn wakeup(&mut self, tags: &[PhysReg]) {
        for entry in &mut self.entries {
            for &tag in tags {
                entry.src1.wake(tag);
                entry.src2.wake(tag);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IqEntry> {
        self.entries.iter()
    }
}
