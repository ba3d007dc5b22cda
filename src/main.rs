use clap::Parser;
use std::process::exit;
use tracing::{error, info};

use r_dcpu16::core::config::Config;
use r_dcpu16::core::cpu::disassembler;
use r_dcpu16::core::emu::{EMU_BUILD_DATE_TIME, EMU_NAME, EMU_VERSION, Emulator};
use r_dcpu16::core::memory::ProgramImage;
use r_dcpu16::log::Logger;

#[derive(Parser)]
#[command(name = EMU_NAME, version = EMU_VERSION, about = "DCPU-16 emulator and disassembler")]
struct Args {
    /// Program image, a flat file of 16-bit words loaded at address 0
    program: String,

    /// Print a disassembly listing instead of executing
    #[arg(long)]
    disassemble: bool,

    /// Run under the interactive console monitor
    #[arg(long)]
    monitor: bool,

    /// Stop after this many steps (headless runs)
    #[arg(long)]
    max_steps: Option<u64>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<String>,
}

fn main() {
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => match Config::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path, e);
                exit(1);
            }
        },
        None => Config::default(),
    };

    let logger = Logger::new(config.log_level.as_str());

    info!(
        "Welcome to {} v{} compiled on {}",
        EMU_NAME, EMU_VERSION, EMU_BUILD_DATE_TIME
    );

    let image = match ProgramImage::load_from_file(args.program.as_str()) {
        Ok(image) => image,
        Err(e) => {
            error!("Error while loading program image {}: {}", args.program, e);
            exit(1);
        }
    };
    info!("Image MD5: {}", image.md5);

    if args.disassemble {
        for line in disassembler::disassemble_image(&image.words) {
            println!("{}", line.formatted);
        }
        return;
    }

    let mut emu = Emulator::new(&config, logger);
    emu.load_image(&image);

    if args.monitor {
        emu.emulate();
    } else {
        let max_steps = args.max_steps.or(config.max_steps).unwrap_or(u64::MAX);
        emu.run(max_steps);
    }
}
