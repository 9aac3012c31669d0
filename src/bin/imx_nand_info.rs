use std::fs;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use imx_nand_tools::{fcb, Error};

/// Locates and prints the NAND geometry described by an i.MX Flash Control
/// Block.
#[derive(Debug, Parser)]
#[clap(name = "imx-nand-info")]
#[clap(about = "Reports the FCB geometry found in a raw NAND dump")]
struct Cli {
    /// Path to the raw NAND dump.
    dump: String,

    /// Force the FCB offset instead of searching for it (decimal or 0x-hex).
    #[clap(short, long)]
    offset: Option<String>,

    /// Raise log verbosity.
    #[clap(short, long)]
    verbose: bool,
}

fn parse_int(s: &str) -> Result<usize, Error> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|_| Error::GeometryInvalid(format!("not a valid offset: {s}")))
    } else {
        s.parse().map_err(|_| Error::GeometryInvalid(format!("not a valid offset: {s}")))
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    println!("{}", "imx-nand-info".bold().cyan());

    let dump = fs::read(&cli.dump)?;
    log::info!("read {} bytes from {}", dump.len(), cli.dump);

    let offset = match &cli.offset {
        Some(raw) => {
            let o = parse_int(raw)?;
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
    let geo = fcb::Geometry::parse(&dump[offset..])?;
    geo.validate()?;

    println!("{}", "geometry".bold().green());
    println!("  version                : {}", geo.version);
    println!("  page_data_size         : {}", geo.page_data_size);
    println!("  total_page_size        : {}", geo.total_page_size);
    println!("  sectors_per_block      : {}", geo.sectors_per_block);
    println!("  nb_nands               : {}", geo.nb_nands);
    println!("  ecc_block0_t           : {}", geo.ecc_block0_t);
    println!("  ecc_blockn_t           : {}", geo.ecc_blockn_t);
    println!("  ecc_block0_data_size   : {}", geo.ecc_block0_data_size);
    println!("  ecc_blockn_data_size   : {}", geo.ecc_blockn_data_size);
    println!("  metadata_bytes         : {}", geo.metadata_bytes);
    println!("  nb_ecc_blocks_per_page : {}", geo.nb_ecc_blocks_per_page);
    println!("  bch_type               : {}", geo.bch_type);
    println!("  fw1_start / pages_fw1  : {} / {}", geo.fw1_start, geo.pages_fw1);
    println!("  fw2_start / pages_fw2  : {} / {}", geo.fw2_start, geo.pages_fw2);
    println!("  bb_marker              : {}", geo.bb_marker);
    println!("  marker_raw_offset      : {}", geo.marker_raw_offset);
    println!("  output_page_size       : {}", geo.output_page_size());

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
