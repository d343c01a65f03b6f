//! Cycle-accurate simulator of the front-end and out-of-order back-end of
//! a RISC-style superscalar processor. Given a program trace and a machine
//! configuration, it advances a seven-stage pipeline one cycle at a time
//! and records, per instruction, the cycle at which each stage completed.

use out_of_order::{OutOfOrder, SimResult};
use trace::Trace;

pub mod inst;
pub mod iq;
pub mod out_of_order;
pub mod queue;
pub mod regs;
pub mod report;
pub mod rob;
pub mod trace;

/// Parses a trace (header plus records) and runs it to completion.
pub fn parse_and_sim(src: &str) -> Result<SimResult, String> {
    let trace = src.parse::<Trace>()?;
    Ok(OutOfOrder::new(trace).run())
}
