use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::path::{Path, PathBuf};

use minisys_asm::linker::INTERRUPT_FILES;
use minisys_asm::listing::render;
use minisys_asm::memory::RegionKind;
use minisys_asm::{Assembler, AssemblerConfig, Assets, LinkedImage, Linker, MemoryLayout};
use minisys_tools::{coe, hex, pack_words, serial, writers::HEX_START, OutputPaths, Summary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Minisys RV32I/M assembler and linker", long_about = None)]
struct Cli {
    /// Input assembly file
    #[arg(value_name = "ASMFILE")]
    in_file: PathBuf,
    /// Output directory (created if missing)
    #[arg(value_name = "OUTDIR")]
    out_dir: PathBuf,
    /// Assemble only the firmware and write bios_* outputs; the input file is ignored
    #[arg(short = 's', long)]
    firmware_only: bool,
    /// Also write a .hex file
    #[arg(long)]
    hex: bool,
    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    debug: bool,
    /// Print a listing of the assembled program
    #[arg(long)]
    listing: bool,
    /// Print a run summary
    #[arg(long, value_enum)]
    summary: Option<SummaryFormat>,
    /// Memory layout override (JSON)
    #[arg(long, value_name = "FILE")]
    layout: Option<PathBuf>,
    /// Directory holding the firmware and interrupt-handler sources
    #[arg(long, value_name = "DIR", default_value = "assets")]
    assets: PathBuf,
    /// Firmware source, overrides the one in --assets
    #[arg(long, value_name = "FILE")]
    firmware: Option<PathBuf>,
    /// Interrupt-handler sources, concatenated in order; overrides --assets
    #[arg(long, value_name = "FILE", num_args = 1..)]
    interrupt: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SummaryFormat { Text, Json }

fn load_assets(cli: &Cli) -> Assets {
    let firmware = cli
        .firmware
        .clone()
        .unwrap_or_else(|| cli.assets.join(minisys_asm::linker::FIRMWARE_FILE));
    let interrupt = if cli.interrupt.is_empty() {
        INTERRUPT_FILES.iter().map(|f| cli.assets.join(f)).collect()
    } else {
        cli.interrupt.clone()
    };
    Assets::load(Some(&firmware), &interrupt)
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!("wrote {}", path.display());
    Ok(())
}

fn write_outputs(image: &LinkedImage, program: &[u32], paths: &OutputPaths, with_hex: bool) -> Result<()> {
    let data = pack_words(&image.data);
    write(&paths.text_coe, &coe(program))?;
    write(&paths.data_coe, &coe(&data))?;
    write(&paths.serial, &serial(program, &data))?;
    if with_hex {
        write(&paths.hex, &hex(program, &data, HEX_START, 0))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let layout = match &cli.layout {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading layout {}", path.display()))?;
            MemoryLayout::from_json(&text)?
        }
        None => MemoryLayout::default(),
    };
    let config = AssemblerConfig::default();
    let linker = Linker::new(layout, config)?;
    let assets = load_assets(&cli);

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating output directory {}", cli.out_dir.display()))?;

    let (program, image, paths) = if cli.firmware_only {
        let source = assets
            .firmware
            .as_deref()
            .context("no firmware source; pass --firmware or --assets")?;
        let program = Assembler::new(config).assemble(source)?;
        let image = linker.link_firmware(&program)?;
        let words = image.memory.region_words(RegionKind::Firmware).to_vec();
        let paths = OutputPaths::firmware(&cli.out_dir);
        write_outputs(&image, &words, &paths, false)?;
        (program, image, paths)
    } else {
        let source = std::fs::read_to_string(&cli.in_file)
            .with_context(|| format!("reading {}", cli.in_file.display()))?;
        let program = Assembler::new(config).assemble(&source)?;
        let image = linker.link(&program, &assets)?;
        let paths = OutputPaths::for_input(&cli.in_file, &cli.out_dir);
        write_outputs(&image, image.memory.words(), &paths, cli.hex)?;
        (program, image, paths)
    };
    tracing::info!(text = %paths.text_coe.display(), "outputs written to {}", cli.out_dir.display());

    if cli.listing {
        print!("{}", render(&program));
    }
    match cli.summary {
        Some(SummaryFormat::Text) => println!("{}", Summary::new(&program, &image).to_text()),
        Some(SummaryFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(&Summary::new(&program, &image))?)
        }
        None => {}
    }

    Ok(())
}
