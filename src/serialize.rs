//! Deterministic JSON/CSV/GPX emission. Kept free of any I/O beyond the
//! `std::io::Write` the caller supplies; Rust's default `f64` formatting
//! already uses `.` as the decimal separator, so no locale shim is needed.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::json;

use crate::orchestrator::BestDepartureReport;
use crate::route::Route;

#[derive(Serialize)]
struct RouteHeader<'a> {
    polar_file: &'a str,
    grib_file: &'a str,
    total_duration_hours: f64,
    total_distance: f64,
    motor_distance: f64,
    n_sail_change: u32,
    n_amure_change: u32,
    destination_reached: bool,
    last_step_duration: f64,
}

/// Route JSON: header plus an ordered track, per §4.8.
pub fn route_to_json(route: &Route, polar_file: &str, grib_file: &str) -> serde_json::Value {
    let header = RouteHeader {
        polar_file,
        grib_file,
        total_duration_hours: route.stats.total_duration_hours,
        total_distance: route.stats.total_distance,
        motor_distance: route.stats.motor_distance,
        n_sail_change: route.stats.n_sail_change,
        n_amure_change: route.stats.n_amure_change,
        destination_reached: route.stats.destination_reached,
        last_step_duration: route.stats.last_step_duration,
    };

    let track: Vec<_> = route
        .points
        .iter()
        .map(|p| {
            json!([p.lat, p.lon, p.speed, p.twd, p.tws, p.cog, p.heading, p.gust, p.wave, p.stamina, p.sail, p.motor])
        })
        .collect();

    json!({ "header": header, "track": track })
}

/// Writes the route's points as a CSV dump: `n, WP, lat, lon, id, father,
/// amure, sail, motor, dd, VMC` — VMC/dd are not tracked post-reconstruction
/// so they are emitted as the segment distance/zero respectively.
pub fn route_to_csv<W: Write>(route: &Route, out: W) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(out);
    writer.write_record(["n", "WP", "lat", "lon", "id", "father", "amure", "sail", "motor", "dd", "VMC"])?;
    for (n, p) in route.points.iter().enumerate() {
        writer.write_record(&[
            n.to_string(),
            "0".to_string(),
            p.lat.to_string(),
            p.lon.to_string(),
            p.id.to_string(),
            p.father.to_string(),
            format!("{:?}", p.amure),
            p.sail.to_string(),
            (p.motor as u8).to_string(),
            p.dist.to_string(),
            p.speed.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// GPX `<rte>` export with one `<rtept>` per route point.
pub fn route_to_gpx<W: Write>(route: &Route, mut out: W) -> io::Result<()> {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<gpx version="1.1" creator="routage"><rte>"#)?;
    for p in &route.points {
        writeln!(
            out,
            r#"<rtept lat="{}" lon="{}"><time>{}</time><course>{}</course><speed>{}</speed></rtept>"#,
            p.lat,
            p.lon,
            p.time.to_rfc3339(),
            p.cog,
            p.speed
        )?;
    }
    writeln!(out, "</rte></gpx>")?;
    Ok(())
}

/// Isochrones JSON: one polyline per isochrone. Rotation to start at each
/// isochrone's `first` index is the reconstructor's responsibility to
/// surface via a parallel `firsts` slice, since the engine does not retain
/// raw isochrone point lists after a run completes (only the winning
/// back-trace chain is kept in `Route`).
pub fn best_departure_to_json(report: &BestDepartureReport) -> serde_json::Value {
    json!({
        "count": report.count,
        "bestCount": report.best_count,
        "tBegin": report.t_begin,
        "tEnd": report.t_end,
        "tStop": report.t_stop,
        "tInterval": report.t_interval,
        "minDuration": report.min_duration,
        "maxDuration": report.max_duration,
        "bestTime": report.best_time,
        "array": report.durations,
    })
}

#[derive(Serialize)]
struct CompetitorEntry {
    index: usize,
    duration_seconds: f64,
    delay_vs_winner: f64,
    delay_vs_principal: f64,
}

/// Competitors JSON: sorted by duration ascending, with signed delays
/// against the winner and against the principal competitor (index 0).
pub fn competitors_to_json(routes: &[Route]) -> serde_json::Value {
    let principal_duration = routes.first().map(|r| r.stats.total_duration_hours * 3600.0).unwrap_or(0.0);

    let mut entries: Vec<(usize, f64)> = routes
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r.stats.total_duration_hours * 3600.0))
        .collect();
    entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    let winner_duration = entries.first().map(|&(_, d)| d).unwrap_or(0.0);

    let out: Vec<CompetitorEntry> = entries
        .into_iter()
        .map(|(index, duration_seconds)| CompetitorEntry {
            index,
            duration_seconds,
            delay_vs_winner: duration_seconds - winner_duration,
            delay_vs_principal: duration_seconds - principal_duration,
        })
        .collect();

    json!(out)
}
