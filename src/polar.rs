//! Boat-speed, sail-choice and stamina evaluator backed by CSV polar
//! matrices (row 0 = wind-speed columns, column 0 = wind-angle rows), the
//! layout the reference program's `PolMat`/`polWrite` use.

use std::io::Read;

use crate::error::PolarError;

/// A dense `twa × tws` matrix: row 0 of the source CSV holds the `tws`
/// header, column 0 holds the `twa` header.
#[derive(Clone, Debug)]
pub struct Matrix {
    pub twa: Vec<f64>,
    pub tws: Vec<f64>,
    pub cells: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, PolarError> {
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(PolarError::Io)?;
        Self::from_str(&text)
    }

    pub fn from_str(text: &str) -> Result<Self, PolarError> {
        let delim = if text.lines().next().map_or(false, |l| l.contains(';')) { ';' } else { ',' };

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or(PolarError::Empty)?;
        let tws: Vec<f64> = header
            .split(delim)
            .skip(1)
            .map(|c| c.trim().parse::<f64>().map_err(|e| PolarError::Parse(e.to_string())))
            .collect::<Result<_, _>>()?;

        let mut twa = Vec::new();
        let mut cells = Vec::new();
        for line in lines {
            let mut fields = line.split(delim);
            let first = fields.next().ok_or_else(|| PolarError::Parse("missing twa column".into()))?;
            twa.push(first.trim().parse::<f64>().map_err(|e| PolarError::Parse(e.to_string()))?);
            let row: Vec<f64> = fields
                .map(|c| c.trim().parse::<f64>().map_err(|e| PolarError::Parse(e.to_string())))
                .collect::<Result<_, _>>()?;
            cells.push(row);
        }

        if twa.is_empty() || tws.is_empty() {
            return Err(PolarError::Empty);
        }

        Ok(Matrix { twa, tws, cells })
    }

    /// Returns bracketing `(i0, i1, frac)` such that `value ≈
    /// (1-frac)*values[i0] + frac*values[i1]`, clamping out-of-range values
    /// to the matrix extent.
    fn bracket(values: &[f64], value: f64) -> (usize, usize, f64) {
        if value <= values[0] {
            return (0, 0, 0.0);
        }
        let last = values.len() - 1;
        if value >= values[last] {
            return (last, last, 0.0);
        }
        for i in 0..last {
            if values[i] <= value && value <= values[i + 1] {
                let span = values[i + 1] - values[i];
                let f = if span > 0.0 { (value - values[i]) / span } else { 0.0 };
                return (i, i + 1, f);
            }
        }
        (last, last, 0.0)
    }

    /// Bilinear lookup over `|twa| ∈ [0, 180]` and `tws`, both clamped.
    pub fn interpolate(&self, twa: f64, tws: f64) -> f64 {
        let twa = twa.abs().min(180.0);
        let (ta0, ta1, tf) = Self::bracket(&self.twa, twa);
        let (ts0, ts1, sf) = Self::bracket(&self.tws, tws);

        let v00 = self.cells[ta0][ts0];
        let v01 = self.cells[ta0][ts1];
        let v10 = self.cells[ta1][ts0];
        let v11 = self.cells[ta1][ts1];

        let top = v00 * (1.0 - sf) + v01 * sf;
        let bot = v10 * (1.0 - sf) + v11 * sf;
        top * (1.0 - tf) + bot * tf
    }

    /// Nearest-cell lookup, used for the integer sail-id matrix where
    /// interpolating between sail ids is meaningless.
    pub fn nearest(&self, twa: f64, tws: f64) -> f64 {
        let twa = twa.abs().min(180.0);
        let (ta0, ta1, tf) = Self::bracket(&self.twa, twa);
        let (ts0, ts1, sf) = Self::bracket(&self.tws, tws);
        let ta = if tf < 0.5 { ta0 } else { ta1 };
        let ts = if sf < 0.5 { ts0 } else { ts1 };
        self.cells[ta][ts]
    }

    pub fn max_at_tws(&self, tws: f64) -> f64 {
        let (ts0, ts1, sf) = Self::bracket(&self.tws, tws);
        self.cells
            .iter()
            .map(|row| row[ts0] * (1.0 - sf) + row[ts1] * sf)
            .fold(f64::MIN, f64::max)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct VmgPoint {
    pub twa: f64,
    pub speed: f64,
}

/// Boat-performance and stamina evaluator.
pub struct PolarEvaluator<'a> {
    pub polar: &'a Matrix,
    pub sail_polar: Option<&'a Matrix>,
    pub wave_polar: Option<&'a Matrix>,
}

impl<'a> PolarEvaluator<'a> {
    pub fn new(polar: &'a Matrix) -> Self {
        PolarEvaluator { polar, sail_polar: None, wave_polar: None }
    }

    pub fn with_sail_polar(mut self, sail_polar: &'a Matrix) -> Self {
        self.sail_polar = Some(sail_polar);
        self
    }

    pub fn with_wave_polar(mut self, wave_polar: &'a Matrix) -> Self {
        self.wave_polar = Some(wave_polar);
        self
    }

    /// `(sog, sail)`: bilinear boat speed plus the sail id at the same cell
    /// (nearest-cell semantics, per §4.2).
    pub fn speed(&self, twa: f64, tws: f64) -> (f64, u8) {
        let sog = self.polar.interpolate(twa, tws);
        let sail = self.sail_polar.map(|m| m.nearest(twa, tws) as u8).unwrap_or(0);
        (sog, sail)
    }

    pub fn wave_coeff(&self, twa: f64, wave_height: f64) -> f64 {
        match self.wave_polar {
            Some(m) => m.interpolate(twa, wave_height) / 100.0,
            None => 1.0,
        }
    }

    pub fn max_speed_at_tws(&self, tws: f64) -> f64 {
        self.polar.max_at_tws(tws)
    }

    fn best_vmg_in(&self, tws: f64, range: impl Iterator<Item = i32>, upwind: bool) -> VmgPoint {
        let mut best = VmgPoint { twa: if upwind { 0.0 } else { 180.0 }, speed: 0.0 };
        let mut best_vmg = f64::MIN;
        for tenths in range {
            let twa = tenths as f64 / 10.0;
            let speed = self.polar.interpolate(twa, tws);
            let vmg = if upwind { speed * twa.to_radians().cos() } else { -speed * twa.to_radians().cos() };
            if vmg > best_vmg {
                best_vmg = vmg;
                best = VmgPoint { twa, speed };
            }
        }
        best
    }

    /// `(twaUp, speedUp)` maximizing `speed·cos(twa)` on the upwind half.
    pub fn best_vmg(&self, tws: f64) -> VmgPoint {
        self.best_vmg_in(tws, 0..=900, true)
    }

    /// `(twaDown, speedDown)` maximizing `-speed·cos(twa)` on the downwind
    /// half.
    pub fn best_vmg_back(&self, tws: f64) -> VmgPoint {
        self.best_vmg_in(tws, 901..=1800, false)
    }

    /// Stamina loss on a sail or tack/gybe change, a percentage of `[0,100]`
    /// subtracted from the running total.
    pub fn point_loss(&self, changed_sail: bool, changed_amure: bool, tws: f64) -> f64 {
        let coef = stamina_coef(tws);
        let mut loss = 0.0;
        if changed_amure {
            loss += 10.0 * coef;
        }
        if changed_sail {
            loss += 20.0 * coef;
        }
        loss
    }

    /// Stamina recovered over `duration_hours` at the given wind speed.
    pub fn recovery(&self, duration_hours: f64, tws: f64) -> f64 {
        let recovery_time_min = recovery_time_minutes(tws);
        (duration_hours * 60.0) / recovery_time_min
    }
}

fn stamina_coef(tws: f64) -> f64 {
    if tws <= 10.0 {
        1.0 + tws / 10.0 * 0.25
    } else if tws <= 20.0 {
        1.25 + (tws - 10.0) / 10.0 * 0.25
    } else if tws <= 30.0 {
        1.5 + (tws - 20.0) / 10.0 * 0.5
    } else {
        2.0
    }
}

fn recovery_time_minutes(tws: f64) -> f64 {
    if tws <= 0.0 {
        5.0
    } else if tws >= 30.0 {
        15.0
    } else {
        5.0 + (tws / 30.0) * 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TWA/TWS;5;15;25\n0;0.0;0.0;0.0\n90;4.0;8.0;9.0\n180;2.0;5.0;6.0\n";

    #[test]
    fn parses_matrix_shape() {
        let m = Matrix::from_str(SAMPLE).unwrap();
        assert_eq!(m.tws, vec![5.0, 15.0, 25.0]);
        assert_eq!(m.twa, vec![0.0, 90.0, 180.0]);
        assert_eq!(m.cells[1][1], 8.0);
    }

    #[test]
    fn interpolates_between_cells() {
        let m = Matrix::from_str(SAMPLE).unwrap();
        let v = m.interpolate(45.0, 15.0);
        assert!(v > 0.0 && v < 8.0);
    }

    #[test]
    fn clamps_out_of_range() {
        let m = Matrix::from_str(SAMPLE).unwrap();
        assert_eq!(m.interpolate(200.0, 100.0), m.interpolate(180.0, 25.0));
    }

    #[test]
    fn best_vmg_upwind_is_nonzero_speed() {
        let m = Matrix::from_str(SAMPLE).unwrap();
        let ev = PolarEvaluator::new(&m);
        let vmg = ev.best_vmg(15.0);
        assert!(vmg.speed >= 0.0);
        assert!(vmg.twa <= 90.0);
    }

    #[test]
    fn stamina_recovers_over_time() {
        let m = Matrix::from_str(SAMPLE).unwrap();
        let ev = PolarEvaluator::new(&m);
        let recovered = ev.recovery(1.0, 10.0);
        assert!(recovered > 0.0);
    }
}
