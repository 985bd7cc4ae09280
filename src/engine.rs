//! Forward isochrone expansion: the heart of the routing engine.
//!
//! One run expands a frontier of reachable points, isochrone by isochrone,
//! from an origin toward a destination, pruning each frontier down to one
//! representative point per angular sector around a (possibly drifting)
//! focal point. The engine core never spawns threads and never loops
//! indefinitely without checking the caller's cancel signal; see
//! [`CancelToken`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{Config, MAX_SIZE_ISOC};
use crate::error::{CapacityError, EngineError};
use crate::geometry;
use crate::grib::{GribEvaluator, WindSample};
use crate::navmask::NavMask;
use crate::point::{Amure, IsoDesc, Pp, ID_DEST, ID_START};
use crate::polar::PolarEvaluator;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Running = 0,
    Stopped = 1,
    Error = 2,
    NoSolution = 3,
    ExistSolution = 4,
}

impl RunStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunStatus::Stopped,
            2 => RunStatus::Error,
            3 => RunStatus::NoSolution,
            4 => RunStatus::ExistSolution,
            _ => RunStatus::Running,
        }
    }
}

/// The single atomic cross-thread contact surface between the orchestrator
/// and a running engine. The engine only reads it, at isochrone boundaries;
/// only the orchestrator (or its caller) writes it.
#[derive(Clone)]
pub struct CancelToken {
    status: Arc<AtomicU8>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken { status: Arc::new(AtomicU8::new(RunStatus::Running as u8)) }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set(&self, status: RunStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.status(), RunStatus::Stopped)
    }
}

/// Outcome of one `IsochroneEngine::route` invocation.
pub enum EngineOutcome {
    Reached { n_isoc: usize, last_step_duration: f64 },
    Exhausted,
    Stopped,
    Error(EngineError),
}

/// Borrowed read-only inputs plus the per-run owned isochrone storage.
/// Preallocated once per run, per the reference program's "resize upfront"
/// discipline — here, simply grown with `Vec::with_capacity` instead of a
/// realloc dance.
pub struct RouteContext<'a> {
    pub config: &'a Config,
    pub grib: &'a GribEvaluator<'a>,
    pub polar: &'a PolarEvaluator<'a>,
    pub nav: &'a NavMask,

    pub p_or: Pp,
    pub p_dest: Pp,
    pub start_time_hours: f64,

    /// Flat point arena; `arena[i].id == i as i64 + 1`.
    pub arena: Vec<Pp>,
    /// Arena indices belonging to each isochrone, in sector order after
    /// pruning.
    pub isochrones: Vec<Vec<usize>>,
    pub isoc_desc: Vec<IsoDesc>,
}

impl<'a> RouteContext<'a> {
    pub fn new(
        config: &'a Config,
        grib: &'a GribEvaluator<'a>,
        polar: &'a PolarEvaluator<'a>,
        nav: &'a NavMask,
        p_or: (f64, f64),
        p_dest: (f64, f64),
        start_time_hours: f64,
    ) -> Self {
        let mut origin = Pp::origin(p_or.0, p_or.1, 0);
        origin.dd = geometry::ortho_dist(p_or.0, p_or.1, p_dest.0, p_dest.1);
        let mut dest = Pp::origin(p_dest.0, p_dest.1, 0);
        dest.id = ID_DEST;

        RouteContext {
            config,
            grib,
            polar,
            nav,
            p_or: origin,
            p_dest: dest,
            start_time_hours,
            arena: Vec::new(),
            isochrones: Vec::new(),
            isoc_desc: Vec::new(),
        }
    }

    fn push_point(&mut self, mut p: Pp) -> Result<usize, CapacityError> {
        if self.arena.len() >= self.arena.capacity().max(1_000_000) {
            return Err(CapacityError::PointArena { capacity: self.arena.capacity() });
        }
        let idx = self.arena.len();
        p.id = idx as i64 + 1;
        self.arena.push(p);
        Ok(idx)
    }

    /// Resolves a point by its `father`/`id` convention: `-1` is the
    /// origin, `0` the (possibly not-yet-synthesized) destination, anything
    /// else an arena index offset by one.
    pub fn point_by_id(&self, id: i64) -> Pp {
        if id == ID_START {
            self.p_or
        } else if id == ID_DEST {
            self.p_dest
        } else {
            self.arena[(id - 1) as usize]
        }
    }

    fn last_isochrone(&self) -> &[usize] {
        self.isochrones.last().map(|v| v.as_slice()).unwrap_or(&[])
    }

}

fn is_daylight(_t: f64, _lat: f64, _lon: f64) -> bool {
    // A full sun-elevation model is outside this crate's scope; daylight
    // efficiency is applied uniformly until one is supplied.
    true
}

struct Candidate {
    pp: Pp,
}

/// One forward expansion step (`buildNextIsochrone`): sweeps every point of
/// the current frontier across a course range around the bearing to the
/// destination, keeping every navigable, in-range result.
fn build_next_isochrone(ctx: &RouteContext, parents: &[usize], t: f64) -> Vec<Candidate> {
    let cfg = ctx.config;
    let mut candidates = Vec::new();

    let parent_points: Vec<Pp> = if parents.is_empty() {
        vec![ctx.p_or]
    } else {
        parents.iter().map(|&i| ctx.arena[i]).collect()
    };

    for parent in parent_points.iter() {
        let wind = ctx.grib.wind(parent.lat, parent.lon, t);
        if wind.tws > cfg.max_wind {
            continue;
        }

        let cog_target = geometry::ortho_cap(parent.lat, parent.lon, ctx.p_dest.lat, ctx.p_dest.lon);
        let max_speed = ctx.polar.max_speed_at_tws(wind.tws * cfg.x_wind);
        let motor = max_speed < cfg.threshold && cfg.motor_speed > 0.0;
        let eff = if is_daylight(t, parent.lat, parent.lon) { cfg.day_efficiency } else { cfg.night_efficiency };

        let mut cog = cog_target - cfg.range_cog;
        let cog_end = cog_target + cfg.range_cog;
        while cog <= cog_end {
            let heading = geometry::heading_normalize(cog);
            let twa = geometry::f_twa(heading, wind.twd);
            let amure = Amure::from_twa(twa);

            let (sog, sail) = if motor {
                (cfg.motor_speed, 0)
            } else {
                let (base_speed, sail) = ctx.polar.speed(twa, wind.tws * cfg.x_wind);
                (eff * base_speed, sail)
            };

            let mut sog = sog;
            if cfg.with_waves && !motor {
                sog *= ctx.polar.wave_coeff(twa, wind.wave);
            }

            let mut penalty_hours = 0.0;
            if !motor {
                if amure != parent.amure {
                    penalty_hours += if twa.abs() < 90.0 { cfg.penalty0 } else { cfg.penalty1 } / 3600.0;
                }
                if sail != parent.sail {
                    penalty_hours += cfg.penalty2 / 3600.0;
                }
            }

            let travel_hours = (cfg.t_step - penalty_hours).max(0.0);
            let (mut new_lat, mut new_lon) = geometry::move_position(parent.lat, parent.lon, heading, sog * travel_hours);

            if cfg.with_current {
                let current = ctx.grib.current(parent.lat, parent.lon, t);
                new_lat += current.u * travel_hours / 60.0;
                new_lon += current.v * travel_hours / 60.0;
            }

            if ctx.nav.is_navigable(new_lat, new_lon) {
                let dd = geometry::ortho_dist(new_lat, new_lon, ctx.p_dest.lat, ctx.p_dest.lon);
                let cap_or_new = geometry::ortho_cap(ctx.p_or.lat, ctx.p_or.lon, new_lat, new_lon);
                let cap_or_dest = geometry::ortho_cap(ctx.p_or.lat, ctx.p_or.lon, ctx.p_dest.lat, ctx.p_dest.lon);
                let vmc = geometry::ortho_dist(ctx.p_or.lat, ctx.p_or.lon, new_lat, new_lon)
                    * geometry::angle_diff(cap_or_dest, cap_or_new).to_radians().cos();

                let father = if parents.is_empty() { ID_START } else { parent.id };

                candidates.push(Candidate {
                    pp: Pp {
                        lat: new_lat,
                        lon: new_lon,
                        id: 0,
                        father,
                        to_index_wp: parent.to_index_wp,
                        sector: 0,
                        amure,
                        sail,
                        motor,
                        dd,
                        vmc,
                    },
                });
            }

            cog += cfg.cog_step;
        }
    }

    candidates
}

/// Sector-based pruning (`forwardSectorOptimize`): keeps, per angular
/// sector around the focal point, the candidate minimizing `dd` and
/// maximizing `vmc`, subject to a monotonicity filter controlled by
/// `kFactor` and a runaway/stagnation guard.
fn forward_sector_optimize(
    ctx: &RouteContext,
    candidates: Vec<Candidate>,
    isoc_index: usize,
    focal: (f64, f64),
    prev_best_vmc: f64,
    prev_by_sector: &std::collections::HashMap<i32, (f64, f64)>,
) -> (Vec<Pp>, std::collections::HashMap<i32, (f64, f64)>) {
    let cfg = ctx.config;
    let n_sectors = cfg.effective_n_sectors(isoc_index);
    let step_theta = 360.0 / n_sectors as f64;
    let cap_focal_dest = geometry::ortho_cap(focal.0, focal.1, ctx.p_dest.lat, ctx.p_dest.lon);

    let mut by_sector: std::collections::HashMap<i32, Pp> = std::collections::HashMap::new();

    for cand in candidates {
        let p = cand.pp;
        let cap_focal_cand = geometry::ortho_cap(focal.0, focal.1, p.lat, p.lon);
        let theta = geometry::heading_normalize(cap_focal_cand - cap_focal_dest);
        let sector = ((360.0 - theta) / step_theta).round() as i32;

        match by_sector.get(&sector) {
            None => {
                by_sector.insert(sector, p);
            }
            Some(existing) => {
                let better_dd = p.dd <= existing.dd;
                let better_vmc = p.vmc >= existing.vmc;
                if better_dd && better_vmc {
                    by_sector.insert(sector, p);
                } else if !better_dd && !better_vmc {
                    // keep existing
                } else if (p.dd - existing.dd).abs() < 0.1 && p.vmc > existing.vmc {
                    by_sector.insert(sector, p);
                }
            }
        }
    }

    let runaway_limit = 1.1 * ctx.p_or.dd;
    let stagnation_floor = if isoc_index == 0 { f64::MIN } else { 0.8 * prev_best_vmc };
    by_sector.retain(|_, p| p.vmc > stagnation_floor && p.vmc < runaway_limit);

    let mut next_by_sector = std::collections::HashMap::new();
    let mut survivors: Vec<(i32, Pp)> = Vec::new();

    for (sector, p) in by_sector {
        let keep = match cfg.k_factor {
            0 => true,
            1 => prev_by_sector.get(&sector).map_or(true, |&(prev_vmc, _)| p.vmc >= prev_vmc),
            2 => prev_by_sector.get(&sector).map_or(true, |&(_, prev_dd)| p.dd <= prev_dd),
            3 => prev_by_sector.get(&sector).map_or(true, |&(prev_vmc, prev_dd)| p.vmc >= prev_vmc && p.dd <= prev_dd),
            4 => prev_by_sector.get(&sector).map_or(true, |&(prev_vmc, prev_dd)| p.vmc >= prev_vmc || p.dd <= prev_dd),
            _ => true,
        };

        next_by_sector.insert(sector, (p.vmc, p.dd));
        if keep {
            survivors.push((sector, p));
        }
    }

    survivors.sort_by_key(|(sector, _)| *sector);
    (survivors.into_iter().map(|(_, p)| p).collect(), next_by_sector)
}

/// Per-isochrone goal test: does a straight shot from any consecutive pair
/// reach the destination within the time budget of this step? Scans every
/// window and keeps the minimum-`step_duration` predecessor rather than the
/// first match, per the chosen resolution of the reference program's
/// "could be k-1, could be k" ambiguity.
fn goal_test(ctx: &RouteContext, members: &[Pp], travel_hours: f64, t: f64) -> Option<(Pp, f64)> {
    if members.len() < 2 {
        return None;
    }
    let cfg = ctx.config;
    let mut best: Option<(Pp, f64)> = None;

    for w in members.windows(2) {
        let (p_prev, p_cur) = (w[0], w[1]);
        let seg = geometry::dist_segment(ctx.p_dest.lat, ctx.p_dest.lon, p_prev.lat, p_prev.lon, p_cur.lat, p_cur.lon);
        let bearing = geometry::ortho_cap(p_prev.lat, p_prev.lon, ctx.p_dest.lat, ctx.p_dest.lon);
        let wind = ctx.grib.wind(p_prev.lat, p_prev.lon, t);
        let twa = geometry::f_twa(bearing, wind.twd);
        let amure = Amure::from_twa(twa);

        let (sog, sail) = if p_prev.motor {
            (cfg.motor_speed, 0u8)
        } else {
            ctx.polar.speed(twa, wind.tws * cfg.x_wind)
        };
        if sog <= 0.0 {
            continue;
        }

        let mut penalty_hours = 0.0;
        if !p_prev.motor {
            if amure != p_prev.amure {
                penalty_hours += if twa.abs() < 90.0 { cfg.penalty0 } else { cfg.penalty1 } / 3600.0;
            }
            if sail != p_prev.sail {
                penalty_hours += cfg.penalty2 / 3600.0;
            }
        }
        let available_hours = (travel_hours - penalty_hours).max(0.0);

        let dist = geometry::ortho_dist(p_prev.lat, p_prev.lon, ctx.p_dest.lat, ctx.p_dest.lon);
        let step_duration = dist / sog;
        if seg < sog * available_hours && step_duration < available_hours {
            let mut dest = ctx.p_dest;
            dest.father = p_prev.id;
            dest.motor = p_prev.motor;
            dest.amure = amure;
            dest.sail = sail;

            if best.map_or(true, |(_, best_duration)| step_duration < best_duration) {
                best = Some((dest, step_duration));
            }
        }
    }

    best
}

pub struct IsochroneEngine;

impl IsochroneEngine {
    /// Runs a full isochrone expansion from `ctx.p_or` toward `ctx.p_dest`,
    /// polling `cancel` once per isochrone boundary.
    pub fn route(ctx: &mut RouteContext, cancel: &CancelToken) -> EngineOutcome {
        if !ctx.nav.is_navigable(ctx.p_or.lat, ctx.p_or.lon) {
            return EngineOutcome::Error(EngineError::StartNotNavigable);
        }
        if !ctx.nav.is_navigable(ctx.p_dest.lat, ctx.p_dest.lon) {
            return EngineOutcome::Error(EngineError::DestinationNotNavigable);
        }

        let mut prev_best_vmc = f64::MAX;
        let mut prev_by_sector: std::collections::HashMap<i32, (f64, f64)> = std::collections::HashMap::new();
        let max_isoc = ((ctx.grib.zone.time_stamp.last().copied().unwrap_or(0.0) - ctx.start_time_hours)
            / ctx.config.t_step)
            .max(1.0) as usize
            + 1;

        loop {
            if cancel.is_stopped() {
                return EngineOutcome::Stopped;
            }

            let k = ctx.isochrones.len();
            let t = ctx.start_time_hours + (k as f64 + 1.0) * ctx.config.t_step;

            if t > ctx.grib.zone.time_stamp.last().copied().unwrap_or(t) || k >= max_isoc {
                return EngineOutcome::Exhausted;
            }

            let parents: Vec<usize> = ctx.last_isochrone().to_vec();
            let raw_candidates = build_next_isochrone(ctx, &parents, t);

            let focal = if k < crate::config::LIMIT_FOCAL_SHIFT || ctx.config.j_factor == 0.0 {
                (ctx.p_or.lat, ctx.p_or.lon)
            } else {
                let anchor = if k >= crate::config::LIMIT_FOCAL_SHIFT {
                    ctx.isoc_desc.get(k - crate::config::LIMIT_FOCAL_SHIFT).map(|d| d.distance).unwrap_or(ctx.p_or.dd)
                } else {
                    ctx.p_or.dd
                };
                let dist = (ctx.p_or.dd - anchor - ctx.config.j_factor).max(0.0);
                let bearing = geometry::ortho_cap(ctx.p_or.lat, ctx.p_or.lon, ctx.p_dest.lat, ctx.p_dest.lon);
                geometry::move_position(ctx.p_or.lat, ctx.p_or.lon, bearing, dist)
            };

            let (mut pruned, next_by_sector) = if ctx.config.opt == 0 {
                let members: Vec<Pp> = raw_candidates.into_iter().map(|c| c.pp).collect();
                (members, prev_by_sector.clone())
            } else {
                forward_sector_optimize(ctx, raw_candidates, k, focal, prev_best_vmc, &prev_by_sector)
            };

            let replicated = pruned.is_empty();
            if replicated {
                // No-wind replication: copy the previous isochrone verbatim
                // with fresh ids/father links so back-trace stays well
                // defined.
                let prev_members: Vec<Pp> = ctx.last_isochrone().iter().map(|&i| ctx.arena[i]).collect();
                pruned = prev_members
                    .into_iter()
                    .map(|mut p| {
                        p.father = p.id;
                        p
                    })
                    .collect();
            }

            prev_best_vmc = pruned.iter().map(|p| p.vmc).fold(f64::MIN, f64::max);
            prev_by_sector = next_by_sector;

            let mut members = Vec::with_capacity(pruned.len());
            for p in pruned {
                match ctx.push_point(p) {
                    Ok(idx) => members.push(idx),
                    Err(e) => return EngineOutcome::Error(EngineError::Capacity(e)),
                }
            }

            if members.len() > MAX_SIZE_ISOC {
                return EngineOutcome::Error(EngineError::Capacity(CapacityError::IsoDescStore { capacity: MAX_SIZE_ISOC }));
            }

            let member_points: Vec<Pp> = members.iter().map(|&i| ctx.arena[i]).collect();
            let closest_idx = member_points
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.dd.partial_cmp(&b.dd).unwrap())
                .map(|(i, _)| i)
                .unwrap_or(0);
            let first_idx = largest_gap_index(ctx, &member_points);

            ctx.isoc_desc.push(IsoDesc {
                size: member_points.len(),
                first: first_idx,
                closest: closest_idx,
                distance: member_points.get(closest_idx).map(|p| p.dd).unwrap_or(f64::MAX),
                best_vmc: prev_best_vmc,
                to_index_wp: member_points.first().map(|p| p.to_index_wp).unwrap_or(0),
                focal_lat: focal.0,
                focal_lon: focal.1,
            });
            ctx.isochrones.push(members);

            if let Some((dest, duration)) = goal_test(ctx, &member_points, ctx.config.t_step, t) {
                ctx.p_dest = dest;
                return EngineOutcome::Reached { n_isoc: ctx.isochrones.len(), last_step_duration: duration };
            }
        }
    }
}

fn largest_gap_index(ctx: &RouteContext, members: &[Pp]) -> usize {
    if members.len() < 2 {
        return 0;
    }
    let mut best_idx = 0;
    let mut best_gap = f64::MIN;
    for i in 0..members.len() {
        let next = members[(i + 1) % members.len()];
        let gap = geometry::ortho_dist(members[i].lat, members[i].lon, next.lat, next.lon);
        if gap > best_gap {
            best_gap = gap;
            best_idx = i;
        }
    }
    let _ = ctx;
    best_idx
}

pub fn timestamp_to_datetime(data_date: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    data_date + chrono::Duration::seconds((hours * 3600.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::grib::{GribSlice, Zone};
    use crate::navmask::NavMask;
    use crate::polar::Matrix;

    fn steady_zone() -> Zone {
        Zone {
            lat_min: 0.0,
            lat_max: 60.0,
            lon_left: -60.0,
            lon_right: 0.0,
            lat_step: 1.0,
            lon_step: 1.0,
            nb_lat: 61,
            nb_lon: 61,
            ante_meridian: false,
            time_stamp: (0..48).map(|i| i as f64 * 3.0).collect(),
            slices: (0..48)
                .map(|_| GribSlice {
                    u10: Some(vec![0.0; 61 * 61]),
                    v10: Some(vec![-12.0; 61 * 61]),
                    ..Default::default()
                })
                .collect(),
            all_time_step_ok: true,
        }
    }

    const POLAR: &str = "TWA/TWS;5;10;15;20\n0;0.0;0.0;0.0;0.0\n45;3.0;5.0;6.0;6.5\n90;4.0;7.0;8.0;8.5\n135;3.5;6.0;7.0;7.5\n180;2.0;4.0;5.0;5.5\n";

    #[test]
    fn reaches_destination_under_constant_wind() {
        let zone = steady_zone();
        let grib = GribEvaluator::new(&zone);
        let matrix = Matrix::from_str(POLAR).unwrap();
        let polar = PolarEvaluator::new(&matrix);
        let nav = NavMask::always_sea();
        let mut config = Config::default();
        config.n_sectors = 60;
        config.t_step = 3.0;
        config.range_cog = 60.0;
        config.cog_step = 5.0;

        let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (10.0, -10.0), (10.5, -10.5), 0.0);
        let cancel = CancelToken::new();
        let outcome = IsochroneEngine::route(&mut ctx, &cancel);
        assert!(matches!(outcome, EngineOutcome::Reached { .. } | EngineOutcome::Exhausted));
    }

    #[test]
    fn cancellation_stops_before_completion() {
        let zone = steady_zone();
        let grib = GribEvaluator::new(&zone);
        let matrix = Matrix::from_str(POLAR).unwrap();
        let polar = PolarEvaluator::new(&matrix);
        let nav = NavMask::always_sea();
        let config = Config::default();

        let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (10.0, -10.0), (30.0, -40.0), 0.0);
        let cancel = CancelToken::new();
        cancel.set(RunStatus::Stopped);
        let outcome = IsochroneEngine::route(&mut ctx, &cancel);
        assert!(matches!(outcome, EngineOutcome::Stopped));
    }

    #[test]
    fn unnavigable_start_is_an_error() {
        let zone = steady_zone();
        let grib = GribEvaluator::new(&zone);
        let matrix = Matrix::from_str(POLAR).unwrap();
        let polar = PolarEvaluator::new(&matrix);
        let nav = NavMask::from_raster(vec![0u8; crate::navmask::SIZE_T_IS_SEA], Vec::new()).unwrap();
        let config = Config::default();

        let mut ctx = RouteContext::new(&config, &grib, &polar, &nav, (10.0, -10.0), (10.5, -10.5), 0.0);
        let cancel = CancelToken::new();
        let outcome = IsochroneEngine::route(&mut ctx, &cancel);
        assert!(matches!(outcome, EngineOutcome::Error(EngineError::StartNotNavigable)));
    }
}
