use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;

use device::{Chip, Device};

mod app;
mod device;

/// Boots a simulated nRF52 through System OFF cycles and shows which
/// retained values survive.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The device image, kept between invocations
    #[arg(long, default_value = "ramret-sim.img")]
    image: PathBuf,

    /// The chip to simulate when creating a new image
    #[arg(long, value_enum, default_value_t = Chip::Nrf52840)]
    chip: Chip,

    /// How many times to boot and enter System OFF
    #[arg(long, default_value_t = 1)]
    boots: usize,

    /// Seed for the RAM content of unretained sections
    #[arg(long)]
    seed: Option<u64>,

    /// Start from a cold power-on instead of the saved image
    #[arg(long)]
    fresh: bool,

    /// Size of the no-init section in bytes
    #[arg(long, default_value_t = 256)]
    noinit_size: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };

    let mut device = if args.fresh || !args.image.exists() {
        log::info!("cold power-on of a new {:?}", args.chip);
        Device::cold(args.chip, &mut rng)
    } else {
        let device = Device::load(&args.image)?;
        if device.chip() != args.chip {
            log::warn!(
                "{} holds a {:?}, ignoring --chip {:?}",
                args.image.display(),
                device.chip(),
                args.chip
            );
        }
        device
    };

    for boot in 1..=args.boots {
        let uptime_ms = rng.i64(100..5000);
        log::info!("boot {boot}, running for {uptime_ms} ms");

        let report = app::boot(&mut device, args.noinit_size, uptime_ms)?;
        report.print(boot);

        device.system_off(&mut rng)?;
    }

    device.save(&args.image)?;
    println!(
        "{} {}",
        "saved".green(),
        args.image.display().to_string().bold()
    );

    Ok(())
}
