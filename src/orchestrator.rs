//! Multi-waypoint leg sequencing, best-departure search and competitor
//! sweeps on top of a single [`IsochroneEngine`] run.

use chrono::{DateTime, Utc};
use log::{debug, info};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::{Config, MAX_UNREACHABLE};
use crate::engine::{CancelToken, EngineOutcome, IsochroneEngine, RouteContext};
use crate::grib::GribEvaluator;
use crate::navmask::NavMask;
use crate::polar::PolarEvaluator;
use crate::route::{HistoryRoutes, Route, RouteReconstructor};

pub struct Orchestrator<'a> {
    pub config: &'a Config,
    pub grib: &'a GribEvaluator<'a>,
    pub polar: &'a PolarEvaluator<'a>,
    pub nav: &'a NavMask,
    pub data_origin: DateTime<Utc>,
    pub history: HistoryRoutes,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, grib: &'a GribEvaluator<'a>, polar: &'a PolarEvaluator<'a>, nav: &'a NavMask, data_origin: DateTime<Utc>) -> Self {
        Orchestrator { config, grib, polar, nav, data_origin, history: HistoryRoutes::default() }
    }

    /// Runs a single origin-to-destination leg and returns its
    /// [`Route`] plus whether the destination was reached.
    fn run_leg(&self, from: (f64, f64), to: (f64, f64), start_time_hours: f64, cancel: &CancelToken) -> Result<(Route, bool, f64), EngineOutcome> {
        debug!("leg {from:?} -> {to:?} departing t+{start_time_hours}h");
        let mut ctx = RouteContext::new(self.config, self.grib, self.polar, self.nav, from, to, start_time_hours);
        match IsochroneEngine::route(&mut ctx, cancel) {
            EngineOutcome::Reached { n_isoc, last_step_duration } => {
                debug!("leg reached in {n_isoc} isochrones, last step {last_step_duration}h");
                let route = RouteReconstructor::reconstruct(&ctx, true, last_step_duration, self.data_origin, self.config.stamina_vr);
                Ok((route, true, last_step_duration))
            }
            EngineOutcome::Exhausted => {
                debug!("leg exhausted the grib time range without reaching the destination");
                let route = RouteReconstructor::reconstruct(&ctx, false, 0.0, self.data_origin, self.config.stamina_vr);
                Ok((route, false, 0.0))
            }
            other => Err(other),
        }
    }

    /// Multi-waypoint routing: runs one leg per consecutive pair
    /// `(start, w1, w2, …, destination)`, chaining each leg's departure
    /// time onto the previous leg's arrival.
    pub fn route_with_waypoints(
        &mut self,
        start: (f64, f64),
        waypoints: &[(f64, f64)],
        destination: (f64, f64),
        start_time_hours: f64,
        cancel: &CancelToken,
    ) -> Result<Route, EngineOutcome> {
        let mut legs: Vec<(f64, f64)> = Vec::with_capacity(waypoints.len() + 2);
        legs.push(start);
        legs.extend_from_slice(waypoints);
        legs.push(destination);

        let mut combined_points = Vec::new();
        let mut t = start_time_hours;
        let mut last_stats = crate::route::RouteStats::default();

        for pair in legs.windows(2) {
            if cancel.is_stopped() {
                return Err(EngineOutcome::Stopped);
            }
            let (route, reached, last_step) = self.run_leg(pair[0], pair[1], t, cancel)?;
            let n_isoc = route.points.len().saturating_sub(1) as f64;
            t += n_isoc * self.config.t_step + last_step;
            last_stats = route.stats.clone();
            combined_points.extend(route.points);
        }

        let route = Route { points: combined_points, stats: last_stats };
        self.history.push(route.clone());
        Ok(route)
    }

    /// Sweeps candidate departure times in `[t_begin, t_end]` stepping by
    /// `t_interval`, recording the duration of each and reporting the
    /// minimum. Aborts early after `MAX_UNREACHABLE` consecutive
    /// unreachable samples.
    pub fn best_departure(
        &self,
        from: (f64, f64),
        to: (f64, f64),
        t_begin: f64,
        t_end: f64,
        t_interval: f64,
        cancel: &CancelToken,
    ) -> BestDepartureReport {
        info!("best-departure sweep {from:?} -> {to:?} over [{t_begin}, {t_end}] every {t_interval}h");
        let mut durations = Vec::new();
        let mut t = t_begin;
        let mut consecutive_unreachable = 0u32;
        let mut best_count = 0usize;
        let mut best_duration = f64::MAX;

        while t <= t_end {
            if cancel.is_stopped() {
                break;
            }
            match self.run_leg(from, to, t, cancel) {
                Ok((route, true, _)) => {
                    consecutive_unreachable = 0;
                    let duration = route.stats.total_duration_hours * 3600.0;
                    if duration < best_duration {
                        best_duration = duration;
                        best_count = durations.len();
                    }
                    durations.push(Some(duration));
                }
                _ => {
                    consecutive_unreachable += 1;
                    durations.push(None);
                    if consecutive_unreachable >= MAX_UNREACHABLE {
                        break;
                    }
                }
            }
            t += t_interval;
        }

        let min_duration = durations.iter().flatten().cloned().fold(f64::MAX, f64::min);
        let max_duration = durations.iter().flatten().cloned().fold(f64::MIN, f64::max);

        BestDepartureReport {
            count: durations.len(),
            best_count,
            t_begin,
            t_end,
            t_stop: t,
            t_interval,
            min_duration: if min_duration.is_finite() { Some(min_duration) } else { None },
            max_duration: if max_duration.is_finite() { Some(max_duration) } else { None },
            best_time: t_begin + best_count as f64 * t_interval,
            durations,
        }
    }

    /// Runs one routing per competitor, last-to-first so the principal
    /// competitor (index 0) remains "current" in `history` after the
    /// sweep. Missing/unreachable competitors do not abort the sweep.
    pub fn competitors_sweep(&mut self, competitors: &[(f64, f64)], destination: (f64, f64), start_time_hours: f64, cancel: &CancelToken) {
        info!("running {} competitors toward {destination:?}", competitors.len());
        #[cfg(feature = "rayon")]
        let results: Vec<Option<Route>> = competitors
            .par_iter()
            .rev()
            .map(|&pos| self.run_leg(pos, destination, start_time_hours, cancel).ok().map(|(r, _, _)| r))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let results: Vec<Option<Route>> = competitors
            .iter()
            .rev()
            .map(|&pos| self.run_leg(pos, destination, start_time_hours, cancel).ok().map(|(r, _, _)| r))
            .collect();

        for route in results.into_iter().flatten().rev() {
            self.history.push(route);
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct BestDepartureReport {
    pub count: usize,
    pub best_count: usize,
    pub t_begin: f64,
    pub t_end: f64,
    pub t_stop: f64,
    pub t_interval: f64,
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub best_time: f64,
    pub durations: Vec<Option<f64>>,
}
