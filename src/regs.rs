use crate::{
    inst::{ArchReg, PhysReg, ARCH_REG_COUNT},
    queue::Queue,
    trace::MachineConfig,
};

/// Rename state: map table, ready table, and free list.
///
/// See https://docs.boom-core.org/en/latest/sections/rename-stage.html#the-free-list
/// for the general scheme. This machine reclaims an instruction's own
/// destination when it commits, so the initial identity mappings a0..a31
/// never pass through the free list.
#[derive(Debug, Clone)]
pub struct RegFile {
    map: Vec<PhysReg>,
    ready: Vec<bool>,
    free: Queue<PhysReg>,
}

impl RegFile {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            // Identity mapping a -> p at reset.
            map: (0..ARCH_REG_COUNT).map(PhysReg::from).collect(),
            ready: vec![true; config.phys_regs],
            free: (ARCH_REG_COUNT..config.phys_regs)
                .map(PhysReg::from)
                .collect(),
        }
    }

    /// Current mapping for a source operand.
    pub fn lookup(&self, reg: ArchReg) -> PhysReg {
        self.map[reg.index()]
    }

    /// Allocates a destination for `reg` from the free-list head, marks it
    /// pending, and points the map table at it. `None` when the free list
    /// is exhausted; the caller turns that into a rename stall.
    pub fn allocate(&mut self, reg: ArchReg) -> Option<PhysReg> {
        debug_assert!(!reg.is_zero(), "allocation for the zero register");

        let slot = self.free.pop()?;
        self.ready[slot.index()] = false;
        self.map[reg.index()] = slot;
        Some(slot)
    }

    /// Returns a committed destination to the free-list tail.
    pub fn reclaim(&mut self, reg: PhysReg) {
        debug_assert!(!self.free.iter().any(|&p| p == reg), "{reg:?} freed twice");
        self.ready[reg.index()] = true;
        self.free.push(reg);
    }

    pub fn mark_ready(&mut self, reg: PhysReg) {
        self.ready[reg.index()] = true;
    }

    pub fn is_ready(&self, reg: PhysReg) -> bool {
        self.ready[reg.index()]
    }

    pub fn free_regs(&self) -> usize {
        self.free.len()
    }

    pub fn free_list(&self) -> impl Iterator<Item = PhysReg> + '_ {
        self.free.iter().copied()
    }

    pub fn map_image(&self) -> impl Iterator<Item = PhysReg> + '_ {
        self.map.iter().copied()
    }

    /// The zero register must stay identity-mapped and ready forever.
    pub fn zero_reg_pinned(&self) -> bool {
        self.map[0].is_zero() && self.ready[0]
    }
}
