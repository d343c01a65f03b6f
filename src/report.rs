use crate::inst::{Inst, Timing};
use std::io::{self, Write};

/// Renders the per-instruction cycle table, one line per instruction in
/// fetch order: `idx: F, Dc, R, Di, IS, W, C`.
pub fn render(insts: &[Inst]) -> String {
    insts
        .iter()
        .enumerate()
        .map(|(idx, inst)| format!("{idx}: {}\n", row(&inst.timing)))
        .collect()
}

pub fn write_table<W: Write>(insts: &[Inst], out: &mut W) -> io::Result<()> {
    out.write_all(render(insts).as_bytes())
}

fn row(timing: &Timing) -> String {
    [
        timing.fetch,
        timing.decode,
        timing.rename,
        timing.dispatch,
        timing.issue,
        timing.writeback,
        timing.commit,
    ]
    .iter()
    .map(|cycle| match cycle {
        Some(c) => c.to_string(),
        None => "-".to_owned(),
    })
    .collect::<Vec<_>>()
    .join(", ")
}
