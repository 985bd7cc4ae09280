//! Arena point type and isochrone metadata.
//!
//! Points are stored in a flat arena indexed by a monotonically increasing
//! `id`; back-trace follows `father` links rather than owned pointers, so
//! an isochrone engine run can be freed (or reused) as one contiguous block.

use serde::{Deserialize, Serialize};

pub const ID_START: i64 = -1;
pub const ID_DEST: i64 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amure {
    Port,
    Starboard,
}

impl Amure {
    pub fn from_twa(twa: f64) -> Self {
        if twa > 0.0 {
            Amure::Starboard
        } else {
            Amure::Port
        }
    }
}

/// One point produced during isochrone expansion.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Pp {
    pub lat: f64,
    pub lon: f64,
    pub id: i64,
    pub father: i64,
    pub to_index_wp: u32,
    pub sector: i32,
    pub amure: Amure,
    pub sail: u8,
    pub motor: bool,
    /// Orthodromic distance to destination.
    pub dd: f64,
    /// Velocity made good toward destination.
    pub vmc: f64,
}

impl Pp {
    pub fn origin(lat: f64, lon: f64, to_index_wp: u32) -> Self {
        Pp {
            lat,
            lon,
            id: ID_START,
            father: ID_START,
            to_index_wp,
            sector: 0,
            amure: Amure::Starboard,
            sail: 0,
            motor: false,
            dd: 0.0,
            vmc: 0.0,
        }
    }
}

/// Per-isochrone metadata.
#[derive(Clone, Debug, Default)]
pub struct IsoDesc {
    pub size: usize,
    pub first: usize,
    pub closest: usize,
    pub distance: f64,
    pub best_vmc: f64,
    pub to_index_wp: u32,
    pub focal_lat: f64,
    pub focal_lon: f64,
}
