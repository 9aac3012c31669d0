use std::fs;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use imx_nand_tools::{converter, fcb, Error, Mode};
use indicatif::{ProgressBar, ProgressStyle};

/// Converts a raw i.MX NAND dump into a linear memory image, optionally
/// correcting BCH ECC errors along the way.
#[derive(Debug, Parser)]
#[clap(name = "imx-nand-convert")]
#[clap(about = "Converts a raw NAND dump into a linear memory image")]
struct Cli {
    /// Path to the raw NAND dump.
    dump: String,

    /// Path to write the converted image to.
    output: String,

    /// Force the FCB offset instead of searching for it (decimal or 0x-hex).
    #[clap(short, long)]
    offset: Option<String>,

    /// Override the bad-block marker's logical byte offset.
    #[clap(short = 'b', long = "bad-block-offset")]
    bad_block_offset: Option<String>,

    /// Override the per-page user data size, in bytes.
    #[clap(short = 'p', long = "page-size")]
    page_size: Option<String>,

    /// Override the per-page metadata size, in bytes.
    #[clap(short = 'm', long = "metadata-size")]
    metadata_size: Option<String>,

    /// Override the total ECC size, in bits (divided by 26 to obtain `t`).
    #[clap(short = 'e', long = "ecc-size")]
    ecc_size: Option<String>,

    /// Extract only firmware 1 or 2 instead of converting the whole dump.
    #[clap(short = 'f', long = "firmware")]
    firmware: Option<u32>,

    /// Attempt BCH correction on every block.
    #[clap(short = 'c', long = "correct")]
    correct: bool,

    /// Raise log verbosity.
    #[clap(short, long)]
    verbose: bool,
}

fn parse_int(s: &str) -> Result<u32, Error> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|_| Error::GeometryInvalid(format!("not a valid integer: {s}")))
    } else {
        s.parse().map_err(|_| Error::GeometryInvalid(format!("not a valid integer: {s}")))
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    println!("{}", "imx-nand-convert".bold().cyan());
    let start = Instant::now();

    let dump = fs::read(&cli.dump)?;
    log::info!("read {} bytes from {}", dump.len(), cli.dump);

    let offset = match &cli.offset {
        Some(raw) => {
            let o = parse_int(raw)? as usize;
            log::debug!("forced FCB offset override: {o}");
            o
        }
        None => {
            let o = fcb::locate(&dump).ok_or(Error::FcbNotFound)?;
            log::info!("located FCB at offset {o}");
            o
        }
    };
    if offset + fcb::FCB_HEADER_LEN > dump.len() {
        return Err(Error::FcbTooShort);
    }
    let mut geo = fcb::Geometry::parse(&dump[offset..])?;

    if let Some(raw) = &cli.bad_block_offset {
        let v = parse_int(raw)?;
        log::debug!("override bb_marker = {v}");
        geo.set_bad_block_marker(v);
    }
    if let Some(raw) = &cli.page_size {
        let v = parse_int(raw)?;
        log::debug!("override page_data_size = {v}");
        geo.set_page_data_size(v);
    }
    if let Some(raw) = &cli.metadata_size {
        let v = parse_int(raw)?;
        log::debug!("override metadata_bytes = {v}");
        geo.set_metadata_bytes(v);
    }
    if let Some(raw) = &cli.ecc_size {
        let v = parse_int(raw)?;
        log::debug!("override ecc_size (bits) = {v}");
        geo.set_ecc_size_bits(v);
    }
    geo.validate()?;

    let mode = match cli.firmware {
        Some(id) => {
            log::debug!("firmware extraction requested: id={id}");
            Mode::Firmware(id)
        }
        None => Mode::Full,
    };

    let progress = if std::io::stderr().is_terminal() {
        let total_pages = match mode {
            Mode::Full => dump.len() / geo.total_page_size as usize,
            Mode::Firmware(1) => geo.pages_fw1 as usize,
            Mode::Firmware(_) => geo.pages_fw2 as usize,
        };
        if total_pages > 1 {
            let bar = ProgressBar::new(total_pages as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} pages")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(bar)
        } else {
            None
        }
    } else {
        None
    };

    let (output, stats) = converter::convert(&dump, &geo, mode, cli.correct, |done, _total| {
        if let Some(bar) = &progress {
            bar.set_position(done as u64);
        }
    })?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    fs::write(&cli.output, &output)?;

    let elapsed = start.elapsed();
    log::info!("wrote {} bytes to {} in {:.2?}", output.len(), cli.output, elapsed);

    if cli.correct {
        println!(
            "{} clean={} corrected={} uncorrectable={} fatal={}",
            "ecc stats".bold().yellow(),
            stats.clean,
            stats.corrected,
            stats.uncorrectable,
            stats.fatal
        );
        if stats.uncorrectable > 0 || stats.fatal > 0 {
            log::warn!(
                "{} uncorrectable and {} fatal blocks encountered",
                stats.uncorrectable,
                stats.fatal
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{}: {e}", "error".bold().red());
            ExitCode::FAILURE
        }
    }
}
