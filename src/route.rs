//! Back-trace from a terminal point through `father` links into an ordered
//! route, with per-step statistics and a stamina model.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::engine::{timestamp_to_datetime, RouteContext};
use crate::geometry;
use crate::point::{Amure, Pp};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SailPoint {
    pub lat: f64,
    pub lon: f64,
    pub id: i64,
    pub father: i64,
    pub time: DateTime<Utc>,
    pub cog: f64,
    pub heading: f64,
    pub dist: f64,
    pub speed: f64,
    pub twd: f64,
    pub tws: f64,
    pub gust: f64,
    pub wave: f64,
    pub stamina: f64,
    pub sail: u8,
    pub motor: bool,
    pub amure: Amure,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouteStats {
    pub total_distance: f64,
    pub motor_distance: f64,
    pub starboard_distance: f64,
    pub port_distance: f64,
    pub motor_duration_hours: f64,
    pub total_duration_hours: f64,
    pub max_tws: f64,
    pub max_gust: f64,
    pub max_wave: f64,
    pub max_sog: f64,
    pub avr_tws: f64,
    pub avr_gust: f64,
    pub avr_wave: f64,
    pub avr_sog: f64,
    pub n_sail_change: u32,
    pub n_amure_change: u32,
    pub destination_reached: bool,
    pub last_step_duration: f64,
    pub calculation_time_ms: u64,
    pub competitor_index: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub points: Vec<SailPoint>,
    pub stats: RouteStats,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoryRoutes {
    pub routes: Vec<Route>,
}

impl HistoryRoutes {
    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }
}

/// Builds the ordered route by walking `father` links backward from the
/// terminal point (destination if reached, else the `closest` point of the
/// last isochrone), then forward-computing per-step deltas and stamina.
pub struct RouteReconstructor;

impl RouteReconstructor {
    pub fn reconstruct(
        ctx: &RouteContext,
        reached: bool,
        last_step_duration: f64,
        data_origin: DateTime<Utc>,
        initial_stamina: f64,
    ) -> Route {
        let mut chain: Vec<Pp> = Vec::new();

        let mut cursor = if reached {
            ctx.p_dest
        } else {
            ctx.isoc_desc
                .last()
                .and_then(|d| ctx.isochrones.last().map(|m| ctx.arena[m[d.closest]]))
                .unwrap_or(ctx.p_or)
        };
        chain.push(cursor);

        loop {
            if cursor.father == crate::point::ID_START {
                chain.push(ctx.p_or);
                break;
            }
            cursor = ctx.point_by_id(cursor.father);
            chain.push(cursor);
        }
        chain.reverse();

        let mut points = Vec::with_capacity(chain.len());
        let mut stamina = initial_stamina;
        let mut stats = RouteStats::default();
        stats.destination_reached = reached;
        stats.last_step_duration = last_step_duration;

        let mut elapsed_hours = 0.0;

        for (i, p) in chain.iter().enumerate() {
            let dt = if i == chain.len() - 1 && reached { last_step_duration } else { ctx.config.t_step };
            if i > 0 {
                elapsed_hours += dt;
            }
            let t_hours = ctx.start_time_hours + elapsed_hours;
            let time = timestamp_to_datetime(data_origin, t_hours);

            let (dist, cog, speed, twd, tws, gust, wave) = if i == 0 {
                (0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
            } else {
                let prev = chain[i - 1];
                let od = geometry::ortho_dist(prev.lat, prev.lon, p.lat, p.lon);
                let cap = geometry::ortho_cap(prev.lat, prev.lon, p.lat, p.lon);
                let sog = if dt > 0.0 { od / dt } else { 0.0 };
                let wind = ctx.grib.wind(prev.lat, prev.lon, t_hours);

                let changed_sail = p.sail != prev.sail;
                let changed_amure = p.amure != prev.amure;
                if changed_sail {
                    stats.n_sail_change += 1;
                }
                if changed_amure {
                    stats.n_amure_change += 1;
                }
                if changed_sail || changed_amure {
                    stamina -= ctx.polar.point_loss(changed_sail, changed_amure, wind.tws);
                } else {
                    stamina += ctx.polar.recovery(dt, wind.tws);
                }
                stamina = stamina.clamp(0.0, 100.0);

                stats.total_distance += od;
                if p.motor {
                    stats.motor_distance += od;
                    stats.motor_duration_hours += dt;
                }
                match p.amure {
                    Amure::Starboard => stats.starboard_distance += od,
                    Amure::Port => stats.port_distance += od,
                }
                stats.total_duration_hours += dt;
                stats.max_tws = stats.max_tws.max(wind.tws);
                stats.max_gust = stats.max_gust.max(wind.gust);
                stats.max_wave = stats.max_wave.max(wind.wave);
                stats.max_sog = stats.max_sog.max(sog);

                (od, cap, sog, wind.twd, wind.tws, wind.gust, wind.wave)
            };

            points.push(SailPoint {
                lat: p.lat,
                lon: p.lon,
                id: p.id,
                father: p.father,
                time,
                cog,
                heading: cog,
                dist,
                speed,
                twd,
                tws,
                gust,
                wave,
                stamina,
                sail: p.sail,
                motor: p.motor,
                amure: p.amure,
            });
        }

        let n = points.len().max(1) as f64;
        stats.avr_tws = points.iter().map(|p| p.tws).sum::<f64>() / n;
        stats.avr_gust = points.iter().map(|p| p.gust).sum::<f64>() / n;
        stats.avr_wave = points.iter().map(|p| p.wave).sum::<f64>() / n;
        stats.avr_sog = points.iter().map(|p| p.speed).sum::<f64>() / n;

        Route { points, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{CancelToken, IsochroneEngine};
    use crate::grib::{GribEvaluator, GribSlice, Zone};
    use crate::navmask::NavMask;
    use crate::polar::{Matrix, PolarEvaluator};

    const POLAR: &str = "TWA/TWS;5;10;15;20\n0;0.0;0.0;0.0;0.0\n90;4.0;7.0;8.0;8.5\n180;2.0;4.0;5.0;5.5\n";

    #[test]
    fn reconstructs_a_route_with_monotonic_time() {
        let zone = Zone {
            lat_min: 0.0,
            lat_max: 60.0,
            lon_left: -60.0,
            lon_right: 0.0,
            lat_step: 1.0,
            lon_step: 1.0,
            nb_lat: 61,
            nb_lon: 61,
            ante_meridian: false,
            time_stamp: (0..24).map(|i| i as f64 * 3.0).collect(),
            slices: (0..24)
                .map(|_| GribSlice { u10: Some(vec![0.0; 61 * 61]), v10: Some(vec![-10.0; 61 * 61]), ..Default::default() })
                .collect(),
            all_time_step_ok: true,
        };
        let grib = GribEvaluator::new(&zone);
        let matrix = Matrix::from_str(POLAR).unwrap();
        let polar = PolarEvaluator::new(&matrix);
        let nav = NavMask::always_sea();
        let mut config = Config::default();
        config.n_sectors = 60;
        config.range_cog = 60.0;
        config.cog_step = 5.0;

        let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (10.0, -10.0), (10.5, -10.5), 0.0);
        let cancel = CancelToken::new();
        let outcome = IsochroneEngine::route(&mut ctx, &cancel);

        let (reached, last_step) = match outcome {
            crate::engine::EngineOutcome::Reached { last_step_duration, .. } => (true, last_step_duration),
            _ => (false, 0.0),
        };

        let route = RouteReconstructor::reconstruct(&ctx, reached, last_step, Utc::now(), 100.0);
        for w in route.points.windows(2) {
            assert!(w[1].time >= w[0].time);
        }
        assert!(route.stats.total_distance >= 0.0);
    }
}
