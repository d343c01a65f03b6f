use std::{fmt, str::FromStr};
use strum::{self, EnumIter, EnumString};

/// Number of programmer-visible register names.
pub const ARCH_REG_COUNT: usize = 32;

// Instruction classes of the trace format. Single-letter names match the
// on-disk records, so strum can parse them directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumString, EnumIter)]
pub enum Kind {
    R,
    I,
    L,
    S,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ArchReg(u8);

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct PhysReg(u16);

/// Handle for an instruction record: its fetch index. Latches and queues
/// carry tags; the record itself stays in the engine's instruction memory.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u32);

/// A source operand slot as it appears in the trace.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SrcOperand {
    Reg(ArchReg),
    Imm(i32),
}

/// A source operand after Rename resolved it through the map table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RenamedSrc {
    Reg(PhysReg),
    Imm(i32),
}

/// Register fields written by the Rename stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Renamed {
    /// Allocated destination. `None` for stores and zero destinations.
    pub dst: Option<PhysReg>,
    pub srcs: [RenamedSrc; 2],
    /// Source readiness observed while the mapping was resolved. A source
    /// register can be reclaimed and re-allocated between Rename and
    /// Dispatch once its producer commits; the value seen here is the
    /// architecturally correct one.
    pub ready_at_rename: [bool; 2],
}

/// Completion cycle per stage, unset until the stage retires the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timing {
    pub fetch: Option<u32>,
    pub decode: Option<u32>,
    pub rename: Option<u32>,
    pub dispatch: Option<u32>,
    pub issue: Option<u32>,
    pub writeback: Option<u32>,
    pub commit: Option<u32>,
}

/// One trace record. Lives in the engine's instruction memory for the whole
/// simulation; every pipeline structure refers to it by `Tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inst {
    pub kind: Kind,
    pub dst: Option<ArchReg>,
    pub srcs: [SrcOperand; 2],
    pub renamed: Option<Renamed>,
    pub timing: Timing,
}

impl Inst {
    /// Builds a record from the four raw trace fields, applying the
    /// per-kind operand-slot rules:
    ///
    /// | kind | op1     | op2       | op3       |
    /// |------|---------|-----------|-----------|
    /// | R    | dst     | src reg   | src reg   |
    /// | I    | dst     | src reg   | immediate |
    /// | L    | dst     | immediate | src reg   |
    /// | S    | src reg | immediate | src reg   |
    pub fn new(kind: Kind, op1: i32, op2: i32, op3: i32) -> Result<Self, String> {
        let reg = |op: i32| ArchReg::try_from(op).map(SrcOperand::Reg);

        let (dst, srcs) = match kind {
            Kind::R => (Some(ArchReg::try_from(op1)?), [reg(op2)?, reg(op3)?]),
            Kind::I => (
                Some(ArchReg::try_from(op1)?),
                [reg(op2)?, SrcOperand::Imm(op3)],
            ),
            Kind::L => (
                Some(ArchReg::try_from(op1)?),
                [SrcOperand::Imm(op2), reg(op3)?],
            ),
            Kind::S => (None, [reg(op1)?, reg(op3)?]),
        };

        Ok(Self {
            kind,
            dst,
            srcs,
            renamed: None,
            timing: Timing::default(),
        })
    }

    /// Whether Rename must allocate a physical destination. Stores have no
    /// destination and the zero register suppresses allocation.
    pub fn produces(&self) -> bool {
        self.dst.map(|d| !d.is_zero()).unwrap_or(false)
    }

    pub fn phys_dst(&self) -> Option<PhysReg> {
        self.renamed.as_ref().and_then(|r| r.dst)
    }

    pub fn is_renamed(&self) -> bool {
        self.renamed.is_some()
    }
}

impl FromStr for Inst {
    type Err = String;

    /// Parses a `K,op1,op2,op3` record line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s.split(',').map(|f| f.trim()).collect::<Vec<_>>();

        let nth = |n: usize| -> Result<&str, String> {
            fields
                .get(n)
                .copied()
                .filter(|f| !f.is_empty())
                .ok_or_else(|| format!("cannot fetch field {n}"))
        };
        let int = |n: usize| -> Result<i32, String> {
            nth(n)?
                .parse::<i32>()
                .map_err(|_| format!("invalid operand in field {n}"))
        };

        let kind_field = nth(0)?;
        let kind =
            Kind::from_str(kind_field).map_err(|_| format!("unknown kind: '{kind_field}'"))?;
        Inst::new(kind, int(1)?, int(2)?, int(3)?)
    }
}

impl ArchReg {
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<i32> for ArchReg {
    type Error = String;

    fn try_from(r: i32) -> Result<Self, Self::Error> {
        if (0..ARCH_REG_COUNT as i32).contains(&r) {
            Ok(ArchReg(r as u8))
        } else {
            Err(format!("register index out of range: {r}"))
        }
    }
}

impl PhysReg {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for PhysReg {
    fn from(p: usize) -> Self {
        Self(p.try_into().expect("phys reg index out of range"))
    }
}

impl From<usize> for Tag {
    fn from(t: usize) -> Self {
        Self(t.try_into().expect("fetch index out of range"))
    }
}

impl Tag {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ArchReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "a{}", self.0)
    }
}

impl fmt::Debug for PhysReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "p{}", self.0)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Tag({})", self.0)
    }
}
