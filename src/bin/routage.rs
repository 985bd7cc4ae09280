//! Offline command-line entry point over `routage_core`. Reads the files
//! named on the command line, runs the requested routing mode, and prints
//! the report to stdout (or `--output`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;

use routage_core::config::Config;
use routage_core::engine::CancelToken;
use routage_core::grib::{ConstantWind, CurrentSample, GribEvaluator, GribSlice, GribSource, JsonFileGribSource, WindSample, Zone};
use routage_core::navmask::{ForbidPolygon, NavMask};
use routage_core::orchestrator::Orchestrator;
use routage_core::polar::{Matrix, PolarEvaluator};
use routage_core::serialize;

#[derive(Parser)]
#[command(name = "routage", about = "Offline weather-aware sailing route optimizer")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    polar: PathBuf,
    #[arg(long)]
    sail_polar: Option<PathBuf>,
    #[arg(long)]
    wave_polar: Option<PathBuf>,
    #[arg(long)]
    grib: Option<PathBuf>,
    #[arg(long)]
    sea: Option<PathBuf>,
    #[arg(long)]
    forbid: Vec<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, default_value = "json")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Route {
        #[arg(long, value_parser = parse_latlon)]
        from: (f64, f64),
        #[arg(long, value_parser = parse_latlon)]
        to: (f64, f64),
        #[arg(long, value_parser = parse_latlon)]
        waypoint: Vec<(f64, f64)>,
    },
    BestDeparture {
        #[arg(long, value_parser = parse_latlon)]
        from: (f64, f64),
        #[arg(long, value_parser = parse_latlon)]
        to: (f64, f64),
        #[arg(long)]
        t_begin: f64,
        #[arg(long)]
        t_end: f64,
        #[arg(long)]
        t_interval: f64,
    },
    Competitors {
        #[arg(long, value_parser = parse_latlon)]
        competitor: Vec<(f64, f64)>,
        #[arg(long, value_parser = parse_latlon)]
        to: (f64, f64),
    },
}

fn parse_latlon(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s.split_once(',').ok_or_else(|| "expected lat,lon".to_string())?;
    Ok((lat.trim().parse().map_err(|e| format!("{e}"))?, lon.trim().parse().map_err(|e| format!("{e}"))?))
}

fn load_zone(cli: &Cli, config: &Config) -> Result<Zone> {
    if let Some(path) = &cli.grib {
        let zone = JsonFileGribSource { path: path.clone() }.load().context("loading grib zone")?;
        return Ok(zone);
    }

    let twd = config.const_wind_twd.unwrap_or(0.0);
    let tws = config.const_wind_tws.unwrap_or(10.0);
    let current_d = config.const_current_d.unwrap_or(0.0);
    let current_s = config.const_current_s.unwrap_or(0.0);
    let constant = ConstantWind { twd, tws, current_d, current_s };
    let WindSample { u, v, gust, wave, .. } = constant.wind();
    let CurrentSample { u: cu, v: cv, .. } = constant.current();

    info!("no grib file supplied, falling back to constant wind twd={twd} tws={tws}");

    Ok(Zone {
        lat_min: -90.0,
        lat_max: 90.0,
        lon_left: -180.0,
        lon_right: 180.0,
        lat_step: 1.0,
        lon_step: 1.0,
        nb_lat: 181,
        nb_lon: 361,
        ante_meridian: false,
        time_stamp: vec![0.0, 24.0 * 30.0],
        slices: vec![
            GribSlice {
                u10: Some(vec![u as f32; 181 * 361]),
                v10: Some(vec![v as f32; 181 * 361]),
                gust: Some(vec![gust as f32; 181 * 361]),
                wave: Some(vec![wave as f32; 181 * 361]),
                current_u: Some(vec![cu as f32; 181 * 361]),
                current_v: Some(vec![cv as f32; 181 * 361]),
                ..Default::default()
            };
            2
        ],
        all_time_step_ok: true,
    })
}

/// Parses a forbidden-zone file: one `lat,lon` vertex per line.
fn load_forbid_polygon(path: &PathBuf) -> Result<ForbidPolygon> {
    let text = fs::read_to_string(path).context("reading forbid-zone file")?;
    let points = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| parse_latlon(l.trim()).map_err(|e| anyhow::anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;
    Ok(ForbidPolygon { points })
}

fn load_navmask(cli: &Cli, config: &Config) -> Result<NavMask> {
    if config.allways_sea {
        return Ok(NavMask::always_sea());
    }
    let forbid_zones = cli.forbid.iter().map(load_forbid_polygon).collect::<Result<Vec<_>>>()?;
    match &cli.sea {
        Some(path) => {
            let bytes = fs::read(path).context("reading sea raster")?;
            let raster = NavMask::parse_raster(&bytes)?;
            Ok(NavMask::from_raster(raster, forbid_zones)?)
        }
        None if !forbid_zones.is_empty() => {
            let all_sea = vec![1u8; routage_core::navmask::SIZE_T_IS_SEA];
            Ok(NavMask::from_raster(all_sea, forbid_zones)?)
        }
        None => Ok(NavMask::always_sea()),
    }
}

fn write_report(cli: &Cli, text: &str) -> Result<()> {
    match &cli.output {
        Some(path) => fs::write(path, text).context("writing output"),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.validate()?;

    let zone = load_zone(&cli, &config)?;
    let grib = GribEvaluator::new(&zone);

    let polar_text = fs::read_to_string(&cli.polar).context("reading polar file")?;
    let polar_matrix = Matrix::from_str(&polar_text)?;
    let sail_matrix = cli.sail_polar.as_ref().map(|p| fs::read_to_string(p).map(|t| Matrix::from_str(&t))).transpose()?.transpose()?;
    let wave_matrix = cli.wave_polar.as_ref().map(|p| fs::read_to_string(p).map(|t| Matrix::from_str(&t))).transpose()?.transpose()?;

    let mut polar_eval = PolarEvaluator::new(&polar_matrix);
    if let Some(ref m) = sail_matrix {
        polar_eval = polar_eval.with_sail_polar(m);
    }
    if let Some(ref m) = wave_matrix {
        polar_eval = polar_eval.with_wave_polar(m);
    }

    let nav = load_navmask(&cli, &config)?;
    let cancel = CancelToken::new();
    let mut orchestrator = Orchestrator::new(&config, &grib, &polar_eval, &nav, Utc::now());

    match cli.command {
        Command::Route { from, to, waypoint } => {
            let route = orchestrator
                .route_with_waypoints(from, &waypoint, to, config.start_time_in_hours, &cancel)
                .map_err(|_| anyhow::anyhow!("routing did not produce a result"))?;
            let text = match cli.format.as_str() {
                "csv" => {
                    let mut buf = Vec::new();
                    serialize::route_to_csv(&route, &mut buf)?;
                    String::from_utf8(buf)?
                }
                "gpx" => {
                    let mut buf = Vec::new();
                    serialize::route_to_gpx(&route, &mut buf)?;
                    String::from_utf8(buf)?
                }
                _ => serde_json::to_string_pretty(&serialize::route_to_json(&route, &polar_path_name(&cli), &grib_path_name(&cli)))?,
            };
            write_report(&cli, &text)?;
        }
        Command::BestDeparture { from, to, t_begin, t_end, t_interval } => {
            let report = orchestrator.best_departure(from, to, t_begin, t_end, t_interval, &cancel);
            let text = serde_json::to_string_pretty(&serialize::best_departure_to_json(&report))?;
            write_report(&cli, &text)?;
        }
        Command::Competitors { competitor, to } => {
            orchestrator.competitors_sweep(&competitor, to, config.start_time_in_hours, &cancel);
            let text = serde_json::to_string_pretty(&serialize::competitors_to_json(&orchestrator.history.routes))?;
            write_report(&cli, &text)?;
        }
    }

    Ok(())
}

fn polar_path_name(cli: &Cli) -> String {
    cli.polar.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}

fn grib_path_name(cli: &Cli) -> String {
    cli.grib.as_ref().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
}
