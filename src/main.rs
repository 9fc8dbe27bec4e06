use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::exit;

use cfmwrap::export::{export, rows, Row, HEADERS};
use clap::Parser;
use log::{error, info};

/// Convert the output of a previous `cfm-predict` run into a spreadsheet.
#[derive(Parser)]
struct Cli {
    /// The output file written by `cfm-predict`.
    input: String,

    /// Where to write the `.xlsx` workbook. If absent, print the rows to
    /// stdout as tab-separated values instead.
    #[arg(short, long)]
    output: Option<String>,
}

fn print_row(w: &mut impl Write, row: Row) -> io::Result<()> {
    let r = row.result;
    let opt = |s: &Option<String>| s.clone().unwrap_or_default();
    write!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        r.id,
        opt(&r.smiles),
        opt(&r.inchikey),
        opt(&r.formula),
        opt(&r.parent_mass)
    )?;
    if let Some(f) = row.fragment {
        write!(
            w,
            "\t{}\t{}\t{}\t{}\t{}",
            f.energy_level, f.mz, f.intensity, f.fragment_id, f.annotation
        )?;
    }
    writeln!(w)
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let results = match File::open(&cli.input)
        .and_then(|f| cfmwrap::parse(BufReader::new(f)))
    {
        Ok(r) => r,
        Err(e) => {
            error!("failed to read {}: {e}", cli.input);
            exit(1);
        }
    };
    info!("parsed {} results from {}", results.len(), cli.input);

    if let Some(output) = cli.output {
        if let Err(e) = export(&results, &output) {
            error!("failed to write {output}: {e}");
            exit(1);
        }
        info!("wrote {output}");
        return;
    }

    let mut stdout = io::stdout().lock();
    let res = writeln!(stdout, "{}", HEADERS.join("\t"))
        .and_then(|_| rows(&results).try_for_each(|r| print_row(&mut stdout, r)));
    if let Err(e) = res {
        error!("failed to write output: {e}");
        exit(1);
    }
}
