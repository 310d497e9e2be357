use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;

use geocluster::{
    cluster_network, stations_csv, ChargeNetwork, ClusterConfig, StationNetwork, Termination,
};

#[derive(Parser, Debug)]
#[command(name = "cluster")]
#[command(about = "Replace every tight group of charging stations with a single representative.", long_about = None)]
struct Cli {
    /// Path to the stations CSV (id,lat,lng)
    #[arg(short, long)]
    stations: String,

    /// Optional legs CSV (from,to). Legs are dropped by clustering.
    #[arg(short, long)]
    legs: Option<String>,

    /// Stations closer than this (km) are considered one cluster
    #[arg(short, long)]
    threshold_km: f64,

    /// How a tight group is represented: "collapse" (one station per group)
    /// or "freeze" (every station of the group is kept)
    #[arg(long, default_value = "collapse")]
    termination: Termination,

    /// Output CSV (id, lat, lng). If omitted, prints a summary to stdout.
    #[arg(short, long)]
    out: Option<String>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ClusterConfig::new(cli.threshold_km, cli.termination)?;

    let file = File::open(&cli.stations).with_context(|| format!("opening {}", &cli.stations))?;
    let mut network = ChargeNetwork::from_stations(
        stations_csv::read_stations(file).with_context(|| format!("reading {}", &cli.stations))?,
    );
    log::info!("loaded {} stations", network.len());

    if let Some(legs_path) = &cli.legs {
        let file = File::open(legs_path).with_context(|| format!("opening {}", legs_path))?;
        let legs = stations_csv::read_legs(file).with_context(|| format!("reading {}", legs_path))?;
        let skipped = legs.iter().filter(|&&(a, b)| !network.connect(a, b)).count();
        if skipped > 0 {
            log::warn!("skipped {} legs with unknown or identical endpoints", skipped);
        }
        log::info!("loaded {} legs", network.leg_count());
    }

    let report = cluster_network(&mut network, &config)?;

    if let Some(out_path) = cli.out {
        let file = File::create(&out_path).with_context(|| format!("creating CSV {}", &out_path))?;
        stations_csv::write_stations(file, &network.list_stations())?;
        println!(
            "Wrote {} representatives to {}",
            report.representatives, out_path
        );
    } else {
        println!("Stations: {}", report.input);
        println!("Representatives: {}", report.representatives);
        println!("Legs dropped: {}", report.legs_dropped);
        for station in network.list_stations() {
            println!("{}\t{:.6}\t{:.6}", station.id, station.lat, station.lon);
        }
    }

    Ok(())
}
