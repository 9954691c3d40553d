use bstr::ByteSlice;
use clap::Parser;
use sniff_csv::{Eol, QuoteRule, ReaderBuilder};

#[derive(Parser, Debug)]
struct Args {
    /// Path to target CSV file
    path: String,

    /// Separator to use instead of detecting it
    #[arg(short, long)]
    sep: Option<char>,

    /// Quote rule to use instead of detecting it (doubled, escaped, verbatim or none)
    #[arg(short, long)]
    quote_rule: Option<QuoteRule>,

    /// Line ending to use instead of detecting it (lf, crlf, cr or lfcr)
    #[arg(short, long)]
    eol: Option<Eol>,

    /// Fail on records having less fields than detected instead of padding them
    #[arg(long)]
    no_fill: bool,

    /// Number of records to print
    #[arg(short, long, default_value_t = 5)]
    limit: usize,

    /// Log detection steps
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let mut builder = ReaderBuilder::new();
    builder.fill(!args.no_fill).verbose(args.verbose);

    if let Some(sep) = args.sep {
        builder.separator(u8::try_from(sep)?);
    }

    if let Some(quote_rule) = args.quote_rule {
        builder.quote_rule(quote_rule);
    }

    if let Some(eol) = args.eol {
        builder.eol(eol);
    }

    let mut reader = builder.from_path(&args.path)?;

    println!("{}", reader.dialect());
    println!(
        "window: [{}, {}) of {} bytes",
        reader.begin_offset(),
        reader.end_offset(),
        reader.buffer_len()
    );

    let mut i: usize = 0;

    while i < args.limit {
        match reader.read_record()? {
            None => break,
            Some(record) => {
                let fields = record
                    .unescaped_iter()
                    .map(|field| format!("{:?}", field.as_bstr()))
                    .collect::<Vec<_>>();

                println!("{}", fields.join(" | "));
            }
        }

        i += 1;
    }

    Ok(())
}
