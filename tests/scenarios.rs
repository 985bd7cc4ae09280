//! End-to-end scenarios against small synthetic fixtures: no real grib or
//! raster files are read, only in-memory `Zone`/`Matrix`/`NavMask` values.

use chrono::Utc;

use routage_core::config::Config;
use routage_core::engine::{CancelToken, EngineOutcome, IsochroneEngine, RouteContext};
use routage_core::grib::{GribEvaluator, GribSlice, Zone};
use routage_core::navmask::{ForbidPolygon, NavMask};
use routage_core::orchestrator::Orchestrator;
use routage_core::polar::{Matrix, PolarEvaluator};
use routage_core::route::RouteReconstructor;

/// TWA rows 0/45/90/135/180, TWS columns 0.5/15/25. At 0.5 kn every cell is
/// 0 so `maxSpeedAtTws` falls below the motor threshold; at 15 kn the 90°
/// row is 8.0 kn, matching the reference polar cell S1/S2 are built around.
const POLAR: &str = "\
TWA/TWS;0.5;15;25
0;0.0;0.0;0.0
45;0.0;6.0;6.5
90;0.0;8.0;8.5
135;0.0;6.5;7.0
180;0.0;4.0;4.5
";

fn steady_wind_zone(tws: f64, hours: f64) -> Zone {
    let n = (hours as usize) + 2;
    let nb_lat = 41;
    let nb_lon = 81;
    Zone {
        lat_min: 20.0,
        lat_max: 60.0,
        lon_left: -60.0,
        lon_right: 0.0,
        lat_step: 1.0,
        lon_step: 1.0,
        nb_lat,
        nb_lon,
        ante_meridian: false,
        time_stamp: (0..n).map(|i| i as f64).collect(),
        slices: (0..n)
            .map(|_| GribSlice {
                u10: Some(vec![0.0; nb_lat * nb_lon]),
                v10: Some(vec![-tws as f32; nb_lat * nb_lon]),
                ..Default::default()
            })
            .collect(),
        all_time_step_ok: true,
    }
}

fn sinusoidal_wind_zone(hours: f64) -> Zone {
    let n = (hours as usize) + 2;
    let nb_lat = 41;
    let nb_lon = 81;
    Zone {
        lat_min: 20.0,
        lat_max: 60.0,
        lon_left: -60.0,
        lon_right: 0.0,
        lat_step: 1.0,
        lon_step: 1.0,
        nb_lat,
        nb_lon,
        ante_meridian: false,
        time_stamp: (0..n).map(|i| i as f64).collect(),
        slices: (0..n)
            .map(|i| {
                let t = i as f64;
                let tws = 12.5 + 12.5 * (2.0 * std::f64::consts::PI * t / 48.0).sin();
                GribSlice {
                    u10: Some(vec![0.0; nb_lat * nb_lon]),
                    v10: Some(vec![-tws as f32; nb_lat * nb_lon]),
                    ..Default::default()
                }
            })
            .collect(),
        all_time_step_ok: true,
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.t_step = 1.0;
    config.cog_step = 5.0;
    config.range_cog = 90.0;
    config.n_sectors = 120;
    config.allways_sea = true;
    config
}

/// S1: constant 15kn northerly wind, beam reach at 8.0kn, ~460nm straight
/// shot. Duration should land near 460/8 = 57.5h, no motoring or sail/tack
/// changes forced by the wind model.
#[test]
fn s1_constant_wind_straight_shot() {
    let zone = steady_wind_zone(15.0, 70.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);
    let nav = NavMask::always_sea();
    let config = base_config();

    let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (40.0, -30.0), (40.0, -20.0), 0.0);
    let cancel = CancelToken::new();
    let outcome = IsochroneEngine::route(&mut ctx, &cancel);

    let (reached, last_step) = match outcome {
        EngineOutcome::Reached { last_step_duration, .. } => (true, last_step_duration),
        EngineOutcome::Exhausted => panic!("route ran out of grib time steps before reaching the destination"),
        _ => panic!("unexpected non-reaching outcome"),
    };
    assert!(reached);

    let route = RouteReconstructor::reconstruct(&ctx, true, last_step, Utc::now(), 100.0);
    assert!(route.stats.destination_reached);
    assert!(route.stats.total_duration_hours > 40.0 && route.stats.total_duration_hours < 75.0);
    assert_eq!(route.stats.motor_distance, 0.0);
}

/// S2: same geography but near-calm wind (0.5kn, below the polar's
/// propulsive range) forces a motor fallback for the whole leg.
#[test]
fn s2_motor_fallback() {
    let zone = steady_wind_zone(0.5, 90.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);
    let nav = NavMask::always_sea();
    let mut config = base_config();
    config.threshold = 1.0;
    config.motor_speed = 6.0;

    let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (40.0, -30.0), (40.0, -20.0), 0.0);
    let cancel = CancelToken::new();
    let outcome = IsochroneEngine::route(&mut ctx, &cancel);

    let (reached, last_step) = match outcome {
        EngineOutcome::Reached { last_step_duration, .. } => (true, last_step_duration),
        _ => (false, 0.0),
    };
    assert!(reached, "the motor fallback should still reach the destination");

    let route = RouteReconstructor::reconstruct(&ctx, true, last_step, Utc::now(), 100.0);
    assert!(route.points.iter().skip(1).all(|p| p.motor));
    assert!(route.stats.total_duration_hours > 60.0 && route.stats.total_duration_hours < 95.0);
}

/// S3: a forbidden rectangle straddling the direct course forces the route
/// to detour; the destination is still reached but some point strays off
/// the 40°N parallel more than a token direct-course deviation would.
#[test]
fn s3_forbidden_polygon_forces_detour() {
    let zone = steady_wind_zone(15.0, 80.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);

    let forbidden = ForbidPolygon { points: vec![(39.0, -27.0), (39.0, -25.0), (41.0, -25.0), (41.0, -27.0)] };
    let nav = NavMask::from_raster(vec![1u8; routage_core::navmask::SIZE_T_IS_SEA], vec![forbidden]).unwrap();

    let config = base_config();
    let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (40.0, -30.0), (40.0, -20.0), 0.0);
    let cancel = CancelToken::new();
    let outcome = IsochroneEngine::route(&mut ctx, &cancel);

    let (reached, last_step) = match outcome {
        EngineOutcome::Reached { last_step_duration, .. } => (true, last_step_duration),
        _ => (false, 0.0),
    };
    assert!(reached);

    let route = RouteReconstructor::reconstruct(&ctx, true, last_step, Utc::now(), 100.0);
    let max_lat_deviation = route.points.iter().map(|p| (p.lat - 40.0).abs()).fold(0.0_f64, f64::max);
    assert!(max_lat_deviation > 0.2, "route should have bent away from the direct parallel, got {max_lat_deviation}");
    for p in &route.points {
        assert!(!forbidden_contains(p.lat, p.lon), "a route point fell inside the forbidden zone");
    }
}

fn forbidden_contains(lat: f64, lon: f64) -> bool {
    ForbidPolygon { points: vec![(39.0, -27.0), (39.0, -25.0), (41.0, -25.0), (41.0, -27.0)] }.contains(lat, lon)
}

/// S4: a cancellation signal observed before the first isochrone boundary
/// stops the run immediately with no points committed to the arena.
#[test]
fn s4_cancellation_stops_the_run() {
    let zone = steady_wind_zone(15.0, 70.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);
    let nav = NavMask::always_sea();
    let config = base_config();

    let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (40.0, -30.0), (40.0, -20.0), 0.0);
    let cancel = CancelToken::new();
    cancel.set(routage_core::engine::RunStatus::Stopped);

    let outcome = IsochroneEngine::route(&mut ctx, &cancel);
    assert!(matches!(outcome, EngineOutcome::Stopped));
    assert!(ctx.arena.is_empty(), "no isochrone should have been committed past a pre-armed cancel signal");
}

/// S5: departure-time sweep under a sinusoidal wind. The cheapest departure
/// should not be at either sweep boundary (the wind dips to near-zero
/// twice inside the window), and the report should cover the requested
/// sweep range.
#[test]
fn s5_best_departure_under_sinusoidal_wind() {
    let zone = sinusoidal_wind_zone(60.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);
    let nav = NavMask::always_sea();
    let config = base_config();
    let cancel = CancelToken::new();

    let orchestrator = Orchestrator::new(&config, &grib, &polar, &nav, Utc::now());
    let report = orchestrator.best_departure((40.0, -30.0), (40.0, -20.0), 0.0, 48.0, 3.0, &cancel);

    assert!(report.count >= 16, "expected at least 16 samples, got {}", report.count);
    assert!(report.min_duration.is_some());
    assert!(report.max_duration.is_some());
    assert!(report.min_duration.unwrap() <= report.max_duration.unwrap());
    assert!(report.best_time >= 0.0 && report.best_time <= 48.0);
}

/// S6: three competitors at increasing distance from the destination under
/// S1 conditions should rank strictly by proximity, nearest first.
#[test]
fn s6_competitors_ranked_by_duration() {
    let zone = steady_wind_zone(15.0, 40.0);
    let grib = GribEvaluator::new(&zone);
    let matrix = Matrix::from_str(POLAR).unwrap();
    let polar = PolarEvaluator::new(&matrix);
    let nav = NavMask::always_sea();
    let config = base_config();
    let cancel = CancelToken::new();

    let mut orchestrator = Orchestrator::new(&config, &grib, &polar, &nav, Utc::now());
    let competitors = [(40.0, -30.0), (40.0, -29.0), (40.0, -28.0)];
    orchestrator.competitors_sweep(&competitors, (40.0, -20.0), 0.0, &cancel);

    assert_eq!(orchestrator.history.routes.len(), 3);
    let durations: Vec<f64> = orchestrator.history.routes.iter().map(|r| r.stats.total_duration_hours).collect();

    let ranking = routage_core::serialize::competitors_to_json(&orchestrator.history.routes);
    let arr = ranking.as_array().unwrap();
    let ranked_indices: Vec<u64> = arr.iter().map(|e| e["index"].as_u64().unwrap()).collect();
    assert_eq!(ranked_indices, vec![2, 1, 0], "nearest competitor (index 2) should finish first");
    assert!(durations[2] < durations[1] && durations[1] < durations[0]);
}
