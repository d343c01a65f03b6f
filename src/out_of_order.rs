use crate::{
    inst::{Inst, PhysReg, Renamed, RenamedSrc, SrcOperand, Tag},
    iq::IssueQueue,
    queue::Queue,
    regs::RegFile,
    rob::ReorderBuffer,
    trace::{MachineConfig, Trace},
};
use log::trace;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub cycles: u64,
    pub retired: u64,
    pub rename_stalls: u64,
}

#[derive(Debug, Clone)]
pub struct SimResult {
    /// Instruction records in fetch order, with every stage stamped.
    pub insts: Vec<Inst>,
    pub stats: Stats,
}

/// W-slot stage latch holding instruction handles. A non-empty slot is the
/// stall signal: upstream stages do not overwrite occupied slots.
#[derive(Debug, Clone)]
struct Latch(Vec<Option<Tag>>);

impl Latch {
    fn new(width: usize) -> Self {
        Self(vec![None; width])
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    fn slot(&self, i: usize) -> Option<Tag> {
        self.0[i]
    }

    fn set(&mut self, i: usize, tag: Tag) {
        debug_assert!(self.0[i].is_none(), "overwrote an occupied latch slot");
        self.0[i] = Some(tag);
    }

    fn take_slot(&mut self, i: usize) -> Option<Tag> {
        self.0[i].take()
    }

    fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.0.iter().flatten().copied()
    }
}

/// The seven-stage engine. One call to `tick` advances the machine one
/// cycle, running the stages back-to-front so each stage consumes what its
/// upstream neighbour produced last cycle.
#[derive(Debug, Clone)]
pub struct OutOfOrder {
    config: MachineConfig,
    /// Instruction memory: the engine owns every record, everything else
    /// refers to them by `Tag`.
    insts: Vec<Inst>,
    regs: RegFile,
    iq: IssueQueue,
    rob: ReorderBuffer,
    wbq: Queue<Tag>,
    f: Latch,
    dc: Latch,
    r: Latch,
    fetch_offset: usize,
    /// Destinations drained by this cycle's Writeback, handed to the issue
    /// queue's post-select wakeup pass.
    wakeups: Vec<PhysReg>,
    completed: usize,
    cycle: u32,
    stats: Stats,
}

impl OutOfOrder {
    pub fn new(trace: Trace) -> Self {
        let config = trace.config;

        Self {
            regs: RegFile::new(&config),
            iq: IssueQueue::new(),
            rob: ReorderBuffer::new(),
            wbq: Queue::new(),
            f: Latch::new(config.width),
            dc: Latch::new(config.width),
            r: Latch::new(config.width),
            insts: trace.insts,
            fetch_offset: 0,
            wakeups: Vec::new(),
            completed: 0,
            cycle: 0,
            stats: Stats::default(),
            config,
        }
    }

    /// Runs until every instruction has committed.
    pub fn run(mut self) -> SimResult {
        let total = self.insts.len();

        while self.completed < total {
            self.tick();

            debug_assert!(
                self.stats.cycles < 16 * total as u64 + 64,
                "pipeline deadlock detected"
            );
        }

        SimResult {
            insts: self.insts,
            stats: self.stats,
        }
    }

    fn tick(&mut self) {
        let cycle = self.cycle;

        self.stage_commit(cycle);
        self.stage_writeback(cycle);
        self.stage_issue(cycle);
        self.stage_dispatch(cycle);
        self.stage_rename(cycle);
        self.stage_decode(cycle);
        self.stage_fetch(cycle);

        self.cycle += 1;
        self.stats.cycles += 1;

        #[cfg(debug_assertions)]
        self.check_invariants();
    }

    // Retire ready entries strictly from the ROB head, reclaiming each
    // committed destination onto the free-list tail.
    fn stage_commit(&mut self, cycle: u32) {
        for _ in 0..self.config.width {
            let entry = match self.rob.pop_ready() {
                Some(entry) => entry,
                None => break,
            };

            self.insts[entry.tag.index()].timing.commit = Some(cycle);
            if let Some(dst) = entry.dst {
                self.regs.reclaim(dst);
            }

            self.completed += 1;
            self.stats.retired += 1;
            trace!("cycle {cycle}: commit {:?}", entry.tag);
        }
    }

    // Drain the writeback queue, completing ROB entries and publishing
    // produced values in the ready table.
    fn stage_writeback(&mut self, cycle: u32) {
        for _ in 0..self.config.width {
            let tag = match self.wbq.pop() {
                Some(tag) => tag,
                None => break,
            };

            self.insts[tag.index()].timing.writeback = Some(cycle);
            self.rob.mark_ready(tag);

            if let Some(dst) = self.insts[tag.index()].phys_dst() {
                self.regs.mark_ready(dst);
                // Reaches waiting consumers in this cycle's wakeup pass.
                self.wakeups.push(dst);
            }
        }
    }

    // Select up to W eligible entries oldest-first, then broadcast the
    // cycle's wakeup tags. Wakeup runs after select, so a woken entry
    // issues no earlier than the next cycle.
    fn stage_issue(&mut self, cycle: u32) {
        let selected = self.iq.select(self.config.width);
        let mut tags = std::mem::take(&mut self.wakeups);

        for entry in &selected {
            self.insts[entry.tag.index()].timing.issue = Some(cycle);
            self.wbq.push(entry.tag);
            trace!("cycle {cycle}: issue {:?}", entry.tag);

            if let Some(dst) = entry.dst {
                tags.push(dst);
            }
        }

        self.iq.wakeup(&tags);
    }

    // Move the renamed prefix of the R latch into the issue queue and the
    // ROB, in program order. A slot still held by a rename stall fences
    // its younger siblings.
    fn stage_dispatch(&mut self, cycle: u32) {
        for i in 0..self.config.width {
            let tag = match self.r.slot(i) {
                Some(tag) => tag,
                None => continue,
            };
            let renamed = match self.insts[tag.index()].renamed {
                Some(renamed) => renamed,
                None => break,
            };

            let kind = self.insts[tag.index()].kind;
            self.iq.insert(tag, kind, &renamed, &self.regs);
            self.rob.push(tag, renamed.dst);
            self.insts[tag.index()].timing.dispatch = Some(cycle);
            self.r.take_slot(i);
        }
    }

    // Rename slots in the R latch left-to-right. Slots held over by an
    // earlier stall are retried before a new decoded bundle is admitted.
    fn stage_rename(&mut self, cycle: u32) {
        if self.r.is_empty() {
            if self.dc.is_empty() {
                return;
            }
            for i in 0..self.config.width {
                if let Some(tag) = self.dc.take_slot(i) {
                    self.r.set(i, tag);
                }
            }
        }

        for i in 0..self.config.width {
            let tag = match self.r.slot(i) {
                Some(tag) => tag,
                None => continue,
            };
            if self.insts[tag.index()].is_renamed() {
                continue; // renamed last cycle, still waiting on dispatch
            }

            if !self.try_rename(tag, cycle) {
                // Free list exhausted: hold this slot and everything
                // younger until commit reclaims a register.
                self.stats.rename_stalls += 1;
                trace!("cycle {cycle}: rename stall on {tag:?}");
                break;
            }
        }
    }

    /// Resolves sources through the map table, then allocates a
    /// destination for producing kinds. False means a rename stall; the
    /// map table is untouched in that case and the slot retries later.
    fn try_rename(&mut self, tag: Tag, cycle: u32) -> bool {
        let (dst_arch, raw_srcs) = {
            let inst = &self.insts[tag.index()];
            (inst.dst, inst.srcs)
        };

        // Sources read the mapping from before this instruction's own
        // destination update.
        let srcs = raw_srcs.map(|src| match src {
            SrcOperand::Reg(reg) => RenamedSrc::Reg(self.regs.lookup(reg)),
            SrcOperand::Imm(imm) => RenamedSrc::Imm(imm),
        });
        let ready_at_rename = srcs.map(|src| match src {
            RenamedSrc::Reg(reg) => self.regs.is_ready(reg),
            RenamedSrc::Imm(_) => true,
        });

        let dst = match dst_arch {
            Some(reg) if !reg.is_zero() => match self.regs.allocate(reg) {
                Some(slot) => Some(slot),
                None => return false,
            },
            // Stores and zero destinations allocate nothing.
            _ => None,
        };

        let inst = &mut self.insts[tag.index()];
        inst.renamed = Some(Renamed {
            dst,
            srcs,
            ready_at_rename,
        });
        inst.timing.rename = Some(cycle);
        true
    }

    // One-cycle pass-through kept for timing fidelity.
    fn stage_decode(&mut self, cycle: u32) {
        if !self.dc.is_empty() || self.f.is_empty() {
            return;
        }

        for i in 0..self.config.width {
            if let Some(tag) = self.f.take_slot(i) {
                self.insts[tag.index()].timing.decode = Some(cycle);
                self.dc.set(i, tag);
            }
        }
    }

    // Pull up to W consecutive records from the trace. Once the trace is
    // exhausted this only produces empties.
    fn stage_fetch(&mut self, cycle: u32) {
        if !self.f.is_empty() {
            return;
        }

        for i in 0..self.config.width {
            if self.fetch_offset >= self.insts.len() {
                break;
            }

            let tag = Tag::from(self.fetch_offset);
            self.insts[self.fetch_offset].timing.fetch = Some(cycle);
            self.f.set(i, tag);
            self.fetch_offset += 1;
            trace!("cycle {cycle}: fetch {tag:?}");
        }
    }

    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        use crate::inst::ARCH_REG_COUNT;
        use std::collections::HashSet;

        debug_assert!(self.regs.zero_reg_pinned(), "zero register unpinned");

        let mut free = HashSet::new();
        debug_assert!(
            self.regs.free_list().all(|p| free.insert(p)),
            "duplicate physical register in free list"
        );

        // No physical register may leak: each one is free, mapped, held by
        // an in-flight ROB entry, or one of the never-reclaimed identity
        // registers.
        let mut live = free;
        live.extend(self.regs.map_image());
        live.extend(self.rob.iter().filter_map(|e| e.dst));
        live.extend((0..ARCH_REG_COUNT).map(PhysReg::from));
        debug_assert!(
            (0..self.config.phys_regs).all(|p| live.contains(&PhysReg::from(p))),
            "physical register leaked"
        );

        // A handle lives in at most one latch or queue at a time.
        let mut seen = HashSet::new();
        let in_flight = self
            .f
            .tags()
            .chain(self.dc.tags())
            .chain(self.r.tags())
            .chain(self.iq.iter().map(|e| e.tag))
            .chain(self.wbq.iter().copied());
        debug_assert!(
            in_flight.into_iter().all(|t| seen.insert(t)),
            "instruction handle duplicated across pipeline structures"
        );
    }
}
