//! Gridded, time-varying meteorological field evaluator.
//!
//! The crate does not decode grib2 messages itself (parsing is delegated to
//! an external library, as in the reference program); it defines the
//! [`GribSource`] contract that decoder would implement, plus a `Zone`
//! container and bilinear/linear interpolation matching the teacher's
//! `bilinear_interpolate`/`interpolate_from_data` wind-provider math.

use serde::{Deserialize, Serialize};

use crate::error::GribError;

#[derive(Clone, Copy, Debug, Default)]
pub struct WindSample {
    pub u: f64,
    pub v: f64,
    pub gust: f64,
    pub wave: f64,
    pub twd: f64,
    pub tws: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentSample {
    pub u: f64,
    pub v: f64,
    pub twd: f64,
    pub tws: f64,
}

/// One decoded field slice at a single forecast time step.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GribSlice {
    pub u10: Option<Vec<f32>>,
    pub v10: Option<Vec<f32>>,
    pub gust: Option<Vec<f32>>,
    pub wave: Option<Vec<f32>>,
    pub msl: Option<Vec<f32>>,
    pub prate: Option<Vec<f32>>,
    pub current_u: Option<Vec<f32>>,
    pub current_v: Option<Vec<f32>>,
}

/// A caller-supplied decoded grib zone: bounding box, step, and one
/// [`GribSlice`] per forecast time offset (hours from the zone's origin).
/// `Zone` is itself plain data (no decoding logic lives here); a
/// `GribSource` implementation is expected to hand one of these to the
/// engine. For tooling and fixtures it round-trips through JSON directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Zone {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_left: f64,
    pub lon_right: f64,
    pub lat_step: f64,
    pub lon_step: f64,
    pub nb_lat: usize,
    pub nb_lon: usize,
    pub ante_meridian: bool,
    pub time_stamp: Vec<f64>,
    pub slices: Vec<GribSlice>,
    pub all_time_step_ok: bool,
}

/// Anything able to hand the engine a fully decoded [`Zone`]. Production
/// code implements this over a real grib2 decoder; tests use an in-memory
/// fixture.
pub trait GribSource {
    fn load(&self) -> Result<Zone, GribError>;
}

/// Loads a [`Zone`] from a JSON file carrying the pre-decoded field slices
/// described above. Stands in for the real grib2 decoder, which is an
/// external collaborator out of this crate's scope.
pub struct JsonFileGribSource {
    pub path: std::path::PathBuf,
}

impl GribSource for JsonFileGribSource {
    fn load(&self) -> Result<Zone, GribError> {
        let text = std::fs::read_to_string(&self.path)?;
        let zone: Zone = serde_json::from_str(&text).map_err(|e| GribError::Parse(e.to_string()))?;
        zone.validate()?;
        Ok(zone)
    }
}

impl Zone {
    pub fn validate(&self) -> Result<(), GribError> {
        if self.time_stamp.is_empty() {
            return Err(GribError::Parse("zone has no time steps".into()));
        }
        Ok(())
    }

    fn lon_index(&self, lon: f64) -> f64 {
        let lon = if self.ante_meridian && lon < 0.0 { lon + 360.0 } else { lon };
        (lon - self.lon_left) / self.lon_step
    }

    fn lat_index(&self, lat: f64) -> f64 {
        (self.lat_max - lat) / self.lat_step
    }

    /// Bracketing time indices `(k0, k1)` and interpolation fraction `f`
    /// such that `t ≈ (1-f)*timeStamp[k0] + f*timeStamp[k1]`. Times outside
    /// the covered range clamp to the nearest end, per §4.1.
    fn time_bracket(&self, t: f64) -> (usize, usize, f64) {
        let ts = &self.time_stamp;
        if t <= ts[0] {
            return (0, 0, 0.0);
        }
        if t >= *ts.last().unwrap() {
            let last = ts.len() - 1;
            return (last, last, 0.0);
        }
        for k in 0..ts.len() - 1 {
            if ts[k] <= t && t <= ts[k + 1] {
                let span = ts[k + 1] - ts[k];
                let f = if span > 0.0 { (t - ts[k]) / span } else { 0.0 };
                return (k, k + 1, f);
            }
        }
        let last = ts.len() - 1;
        (last, last, 0.0)
    }

    fn corner_value(field: &Option<Vec<f32>>, idx: usize) -> f64 {
        field.as_ref().and_then(|v| v.get(idx)).copied().unwrap_or(0.0) as f64
    }

    /// Bilinear interpolation of one scalar field at one time slice.
    fn bilinear(&self, slice: &GribSlice, field: impl Fn(&GribSlice) -> &Option<Vec<f32>>, lat: f64, lon: f64) -> f64 {
        if lat < self.lat_min || lat > self.lat_max {
            return 0.0;
        }
        let fi = self.lat_index(lat).clamp(0.0, (self.nb_lat - 1) as f64);
        let fj = self.lon_index(lon).rem_euclid(self.nb_lon as f64);

        let i0 = fi.floor() as usize;
        let i1 = (i0 + 1).min(self.nb_lat - 1);
        let j0 = fj.floor() as usize % self.nb_lon;
        let j1 = (j0 + 1) % self.nb_lon;

        let di = fi - i0 as f64;
        let dj = fj - j0 as f64;

        let field = field(slice);
        let v00 = Self::corner_value(field, i0 * self.nb_lon + j0);
        let v01 = Self::corner_value(field, i0 * self.nb_lon + j1);
        let v10 = Self::corner_value(field, i1 * self.nb_lon + j0);
        let v11 = Self::corner_value(field, i1 * self.nb_lon + j1);

        let top = v00 * (1.0 - dj) + v01 * dj;
        let bot = v10 * (1.0 - dj) + v11 * dj;
        top * (1.0 - di) + bot * di
    }

    fn sample_field(&self, field: impl Fn(&GribSlice) -> &Option<Vec<f32>> + Copy, lat: f64, lon: f64, t: f64) -> f64 {
        let (k0, k1, f) = self.time_bracket(t);
        if self.slices.is_empty() {
            return 0.0;
        }
        let v0 = self.bilinear(&self.slices[k0], field, lat, lon);
        if k0 == k1 {
            return v0;
        }
        let v1 = self.bilinear(&self.slices[k1], field, lat, lon);
        v0 * (1.0 - f) + v1 * f
    }
}

fn twd_tws(u: f64, v: f64) -> (f64, f64) {
    let tws = u.hypot(v);
    let mut twd = (-u).atan2(-v).to_degrees();
    if twd < 0.0 {
        twd += 360.0;
    }
    (twd, tws)
}

/// Wraps a [`Zone`] with the public evaluator contract used by the engine.
pub struct GribEvaluator<'a> {
    pub zone: &'a Zone,
}

impl<'a> GribEvaluator<'a> {
    pub fn new(zone: &'a Zone) -> Self {
        GribEvaluator { zone }
    }

    pub fn wind(&self, lat: f64, lon: f64, t: f64) -> WindSample {
        let u = self.zone.sample_field(|s| &s.u10, lat, lon, t);
        let v = self.zone.sample_field(|s| &s.v10, lat, lon, t);
        let gust = self.zone.sample_field(|s| &s.gust, lat, lon, t);
        let wave = self.zone.sample_field(|s| &s.wave, lat, lon, t);
        let (twd, tws) = twd_tws(u, v);
        WindSample { u, v, gust, wave, twd, tws }
    }

    pub fn current(&self, lat: f64, lon: f64, t: f64) -> CurrentSample {
        let u = self.zone.sample_field(|s| &s.current_u, lat, lon, t);
        let v = self.zone.sample_field(|s| &s.current_v, lat, lon, t);
        let (twd, tws) = twd_tws(u, v);
        CurrentSample { u, v, twd, tws }
    }

    pub fn rain(&self, lat: f64, lon: f64, t: f64) -> f64 {
        self.zone.sample_field(|s| &s.prate, lat, lon, t)
    }

    pub fn pressure(&self, lat: f64, lon: f64, t: f64) -> f64 {
        self.zone.sample_field(|s| &s.msl, lat, lon, t)
    }
}

/// A constant-wind/current stand-in used when no grib file is supplied
/// (`constWindTwd`/`constWindTws`/`constCurrentD`/`constCurrentS` in the
/// configuration).
pub struct ConstantWind {
    pub twd: f64,
    pub tws: f64,
    pub current_d: f64,
    pub current_s: f64,
}

impl ConstantWind {
    pub fn wind(&self) -> WindSample {
        let rad = self.twd.to_radians();
        WindSample {
            u: -self.tws * rad.sin(),
            v: -self.tws * rad.cos(),
            gust: self.tws,
            wave: 0.0,
            twd: self.twd,
            tws: self.tws,
        }
    }

    pub fn current(&self) -> CurrentSample {
        let rad = self.current_d.to_radians();
        CurrentSample {
            u: -self.current_s * rad.sin(),
            v: -self.current_s * rad.cos(),
            twd: self.current_d,
            tws: self.current_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_zone(value: f32) -> Zone {
        let nb_lat = 3;
        let nb_lon = 3;
        Zone {
            lat_min: 0.0,
            lat_max: 2.0,
            lon_left: 0.0,
            lon_right: 2.0,
            lat_step: 1.0,
            lon_step: 1.0,
            nb_lat,
            nb_lon,
            ante_meridian: false,
            time_stamp: vec![0.0, 3.0],
            slices: vec![
                GribSlice { u10: Some(vec![value; 9]), v10: Some(vec![0.0; 9]), ..Default::default() },
                GribSlice { u10: Some(vec![value; 9]), v10: Some(vec![0.0; 9]), ..Default::default() },
            ],
            all_time_step_ok: true,
        }
    }

    #[test]
    fn uniform_field_interpolates_to_itself() {
        let zone = flat_zone(5.0);
        let ev = GribEvaluator::new(&zone);
        let s = ev.wind(1.0, 1.0, 0.0);
        assert!((s.u - 5.0).abs() < 1e-9);
        assert!((s.tws - 5.0).abs() < 1e-9);
    }

    #[test]
    fn time_out_of_range_clamps() {
        let zone = flat_zone(5.0);
        let ev = GribEvaluator::new(&zone);
        let s = ev.wind(1.0, 1.0, 100.0);
        assert!((s.u - 5.0).abs() < 1e-9);
    }

    #[test]
    fn missing_field_is_zero() {
        let mut zone = flat_zone(5.0);
        zone.slices[0].wave = None;
        let ev = GribEvaluator::new(&zone);
        let s = ev.wind(1.0, 1.0, 0.0);
        assert_eq!(s.wave, 0.0);
    }
}
