use std::thread;

use clap::Parser;
use sniff_csv::{ChunkPlanner, Reader, ReaderBuilder};

#[derive(Parser, Debug)]
struct Args {
    /// Path to target CSV file
    path: String,

    /// Number of threads, defaults to the number of available cores
    #[arg(short, long)]
    threads: Option<usize>,

    /// Number of positions sampled to plan the chunks
    #[arg(long)]
    samples: Option<usize>,

    /// Print the chunks' offsets
    #[arg(long)]
    chunks: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();

    let threads = match args.threads {
        Some(threads) => threads.max(1),
        None => thread::available_parallelism()?.get(),
    };

    let scout = Reader::from_path(&args.path)?;

    let mut planner = ChunkPlanner::new();

    if let Some(samples) = args.samples {
        planner.samples(samples);
    }

    let offsets = planner.plan(&scout, threads)?;

    if args.chunks {
        for window in offsets.windows(2) {
            eprintln!("[{}, {})", window[0], window[1]);
        }
    }

    let data: &[u8] = scout.get_ref();

    let counts = thread::scope(|s| {
        let handles = offsets
            .windows(2)
            .map(|window| {
                let mut builder = ReaderBuilder::new();

                builder
                    .separator(scout.separator())
                    .quote_rule(scout.quote_rule())
                    .eol(scout.eol())
                    .begin_offset(window[0])
                    .end_offset(window[1]);

                s.spawn(move || -> sniff_csv::Result<u64> {
                    builder.from_bytes(data)?.count_records()
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(count) => count,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect::<sniff_csv::Result<Vec<u64>>>()
    })?;

    println!("{}", counts.iter().sum::<u64>());

    Ok(())
}
