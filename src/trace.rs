use crate::inst::{Inst, ARCH_REG_COUNT};
use log::warn;
use std::str::FromStr;

/// Machine parameters from the trace header. Immutable after parsing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    /// Physical register count P.
    pub phys_regs: usize,
    /// Issue width W.
    pub width: usize,
}

impl MachineConfig {
    pub fn new(phys_regs: usize, width: usize) -> Result<Self, String> {
        if width < 1 {
            return Err(format!("issue width must be at least 1, got {width}"));
        }
        if phys_regs <= ARCH_REG_COUNT {
            return Err(format!(
                "need more than {ARCH_REG_COUNT} physical registers, got {phys_regs}"
            ));
        }

        Ok(Self { phys_regs, width })
    }
}

#[derive(Debug, Clone)]
pub struct Trace {
    pub config: MachineConfig,
    pub insts: Vec<Inst>,
}

impl FromStr for Trace {
    type Err = String;

    /// Parses a whole trace file: a `P, W` header line followed by one
    /// `K,op1,op2,op3` record per line. Records that fail to parse are
    /// skipped with a warning so the surrounding instructions keep correct
    /// cycle accounting.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines.next().ok_or_else(|| "empty input".to_owned())?;
        let config = parse_header(header)?;

        let mut insts = Vec::new();
        for (i, line) in lines {
            // Line numbers start at 1
            match line.trim().parse::<Inst>() {
                Ok(inst) => insts.push(inst),
                Err(e) => warn!("skipping record on line {}: {e}", i + 1),
            }
        }

        Ok(Trace { config, insts })
    }
}

fn parse_header(line: &str) -> Result<MachineConfig, String> {
    let mut fields = line.split(',').map(|f| f.trim().parse::<usize>());

    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(p)), Some(Ok(w)), None) => MachineConfig::new(p, w),
        _ => Err(format!("malformed header: '{line}'")),
    }
}
