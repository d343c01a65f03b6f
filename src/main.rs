use dynsched::{out_of_order::OutOfOrder, report, trace::Trace};
use log::info;
use std::{env, fs, io, time::Instant};

fn main() {
    pretty_env_logger::init();

    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let start = Instant::now();

    let input = env::args().nth(1).unwrap_or_else(|| "test.in".to_owned());
    let output = env::args().nth(2).unwrap_or_else(|| "output.txt".to_owned());

    let contents =
        fs::read_to_string(&input).map_err(|e| format!("failed to open {input}: {e}"))?;
    let trace = contents.parse::<Trace>()?;

    info!(
        "machine: {} physical registers, issue width {}",
        trace.config.phys_regs, trace.config.width
    );
    info!("trace: {} instructions", trace.insts.len());

    let res = OutOfOrder::new(trace).run();

    let file = fs::File::create(&output).map_err(|e| format!("failed to create {output}: {e}"))?;
    let mut file = io::BufWriter::new(file);
    report::write_table(&res.insts, &mut file)
        .map_err(|e| format!("failed to write {output}: {e}"))?;

    println!("    SIMULATION COMPLETED");
    println!("    ====================");
    println!("    Instructions retired: {}", res.stats.retired);
    println!("            Cycles taken: {}", res.stats.cycles);
    println!("           Rename stalls: {}", res.stats.rename_stalls);
    println!(
        "  Instructions per clock: {:.2}",
        res.stats.retired as f32 / res.stats.cycles as f32
    );
    println!(
        "  Simulator time elapsed: {:.2}s",
        start.elapsed().as_secs_f32()
    );

    Ok(())
}
