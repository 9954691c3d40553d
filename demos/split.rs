use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use sniff_csv::{Reader, Writer};

#[derive(Parser, Debug)]
struct Args {
    /// Path to target CSV file
    path: String,

    /// Number of output files
    #[arg(short, long, default_value_t = 2)]
    parts: usize,

    /// Number of consecutive rows sent to the same output file
    #[arg(short, long, default_value_t = 1)]
    rows: usize,

    /// Directory where to write the output files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

// Rows are dealt to the outputs in turns of `rows` rows.
fn destination(index: usize, rows: usize, parts: usize) -> usize {
    (index / rows) % parts
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let parts = args.parts.max(1);
    let rows = args.rows.max(1);

    let mut reader = Reader::from_path(&args.path)?;

    let stem = PathBuf::from(&args.path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "part".to_string());

    let mut writers = (0..parts)
        .map(|i| -> anyhow::Result<Writer<File>> {
            let path = args.output.join(format!("{}.{}.csv", stem, i));

            Ok(Writer::new(File::create(path)?, reader.separator(), reader.eol()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut index: usize = 0;

    while let Some(record) = reader.read_record()? {
        let writer = &mut writers[destination(index, rows, parts)];
        writer.write_raw_record(&record)?;
        index += 1;
    }

    for writer in writers.iter_mut() {
        writer.flush()?;
    }

    eprintln!("{} rows split into {} files", index, parts);

    Ok(())
}
