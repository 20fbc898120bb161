use std::ops::AddAssign;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::schema::results;

pub type SimId = i64;
pub type GenId = i64;
pub type NatId = i64;
pub type LanuId = i64;
pub type BfId = i64;

/// Key of a clipped area: (sim_id, gen_id, nat_id).
pub type ClipKey = (SimId, GenId, NatId);
/// Key of a raw simulation result: (sim_id, gen_id, bf_id, lanu_id).
pub type ResultKey = (SimId, GenId, BfId, LanuId);

// ── Water balance ───────────────────────────────────────────────────────────

/// The aggregated water-balance components, all in mm/a.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterBalance {
    /// Precipitation.
    pub n: f64,
    /// Capillary rise.
    pub kap_a: f64,
    /// Actual evapotranspiration.
    pub et: f64,
    /// Potential evapotranspiration.
    pub pet: f64,
    /// Surface runoff plus interflow.
    pub runoff: f64,
    /// Direct surface runoff.
    pub oa: f64,
    /// Interflow.
    pub za: f64,
    /// Interflow near the groundwater.
    pub za_gwnah: f64,
    /// Deep percolation, i.e. groundwater recharge.
    pub tp: f64,
}

impl WaterBalance {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            n: self.n * factor,
            kap_a: self.kap_a * factor,
            et: self.et * factor,
            pet: self.pet * factor,
            runoff: self.runoff * factor,
            oa: self.oa * factor,
            za: self.za * factor,
            za_gwnah: self.za_gwnah * factor,
            tp: self.tp * factor,
        }
    }

    /// Values in the order of [`results::AGGREGATED`].
    pub fn values(&self) -> [f64; 9] {
        [
            self.n,
            self.kap_a,
            self.et,
            self.pet,
            self.runoff,
            self.oa,
            self.za,
            self.za_gwnah,
            self.tp,
        ]
    }

    pub fn named_values(&self) -> impl Iterator<Item = (&'static str, f64)> {
        results::AGGREGATED.into_iter().zip(self.values())
    }
}

impl AddAssign for WaterBalance {
    fn add_assign(&mut self, rhs: Self) {
        self.n += rhs.n;
        self.kap_a += rhs.kap_a;
        self.et += rhs.et;
        self.pet += rhs.pet;
        self.runoff += rhs.runoff;
        self.oa += rhs.oa;
        self.za += rhs.za;
        self.za_gwnah += rhs.za_gwnah;
        self.tp += rhs.tp;
    }
}

// ── Reference store rows ────────────────────────────────────────────────────

/// One row of the clip query: the input polygon intersected with a
/// simulation polygon and a natural region.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRow {
    pub sim_id: SimId,
    pub gen_id: GenId,
    pub nat_id: NatId,
    pub geometry: MultiPolygon<f64>,
    pub area: f64,
    pub color: String,
    pub legend_text: String,
    pub legend_short: String,
}

impl ClipRow {
    pub fn key(&self) -> ClipKey {
        (self.sim_id, self.gen_id, self.nat_id)
    }
}

/// Non-urban land-use area on a soil group inside a natural region.
#[derive(Debug, Clone, PartialEq)]
pub struct LanduseObservation {
    pub gen_id: GenId,
    pub nat_id: NatId,
    pub lanu_id: LanuId,
    pub area: f64,
    pub lanu_name: String,
}

/// Non-urban land-use area on a soil group inside a search buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedLanduse {
    pub gen_id: GenId,
    pub lanu_id: LanuId,
    pub area: f64,
}

/// One simulated soil profile under one land-use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub sim_id: SimId,
    pub gen_id: GenId,
    pub bf_id: BfId,
    pub lanu_id: LanuId,
    pub n: f64,
    pub kap_a: f64,
    pub et: f64,
    pub pet: f64,
    pub oa: f64,
    pub za: f64,
    pub tp: f64,
    /// 1 if the interflow reaches the groundwater, 0 otherwise.
    pub za_gwnah_flag: f64,
    /// Percentage of the soil profile within its soil group.
    pub bfid_area: f64,
}

impl SimulationResult {
    pub fn key(&self) -> ResultKey {
        (self.sim_id, self.gen_id, self.bf_id, self.lanu_id)
    }

    /// The aggregation columns, with the derived runoff and near-groundwater interflow.
    pub fn balance(&self) -> WaterBalance {
        WaterBalance {
            n: self.n,
            kap_a: self.kap_a,
            et: self.et,
            pet: self.pet,
            runoff: self.oa + self.za,
            oa: self.oa,
            za: self.za,
            za_gwnah: self.za * self.za_gwnah_flag,
            tp: self.tp,
        }
    }
}

// ── Quality flags ───────────────────────────────────────────────────────────

/// Categorical quality flags of a simulation polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Soil group substitution (0-4).
    BuekFlag,
    /// Land-use assignment (0-2); 2 forces a single land-use per profile.
    LanuFlag,
    /// Weather grid fill (0-2).
    WeaFlag,
    /// Precipitation grid fill (0-2).
    WeaFlagN,
    /// Slope estimation (0-2).
    SlFlag,
    /// Sunshine estimation (0-2).
    SunFlag,
}

impl QualityFlag {
    pub const ALL: [QualityFlag; 6] = [
        QualityFlag::BuekFlag,
        QualityFlag::LanuFlag,
        QualityFlag::WeaFlag,
        QualityFlag::WeaFlagN,
        QualityFlag::SlFlag,
        QualityFlag::SunFlag,
    ];

    pub fn column(&self) -> &'static str {
        use crate::schema::sim_info::*;
        match self {
            QualityFlag::BuekFlag => BUEK_FLAG,
            QualityFlag::LanuFlag => LANU_FLAG,
            QualityFlag::WeaFlag => WEA_FLAG,
            QualityFlag::WeaFlagN => WEA_FLAG_N,
            QualityFlag::SlFlag => SL_FLAG,
            QualityFlag::SunFlag => SUN_FLAG,
        }
    }

    /// Largest valid code.
    pub fn max_code(&self) -> u8 {
        match self {
            QualityFlag::BuekFlag => 4,
            _ => 2,
        }
    }
}

/// Standard deviations recorded per simulation polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StdVariable {
    #[serde(rename = "sl_std")]
    Slope,
    #[serde(rename = "wea_n_wihj_std")]
    WinterPrecipitation,
    #[serde(rename = "wea_n_sohj_std")]
    SummerPrecipitation,
    #[serde(rename = "wea_t_std")]
    Temperature,
    #[serde(rename = "wea_et_std")]
    Evapotranspiration,
    #[serde(rename = "rs_std")]
    Sunshine,
}

impl StdVariable {
    pub const ALL: [StdVariable; 6] = [
        StdVariable::Slope,
        StdVariable::WinterPrecipitation,
        StdVariable::SummerPrecipitation,
        StdVariable::Temperature,
        StdVariable::Evapotranspiration,
        StdVariable::Sunshine,
    ];

    pub fn column(&self) -> &'static str {
        use crate::schema::sim_info::*;
        match self {
            StdVariable::Slope => SL_STD,
            StdVariable::WinterPrecipitation => WEA_N_WIHJ_STD,
            StdVariable::SummerPrecipitation => WEA_N_SOHJ_STD,
            StdVariable::Temperature => WEA_T_STD,
            StdVariable::Evapotranspiration => WEA_ET_STD,
            StdVariable::Sunshine => RS_STD,
        }
    }
}

/// Fill distances recorded per simulation polygon, in m.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DistanceVariable {
    Weather,
    Precipitation,
    Slope,
    Sunshine,
}

impl DistanceVariable {
    pub const ALL: [DistanceVariable; 4] = [
        DistanceVariable::Weather,
        DistanceVariable::Precipitation,
        DistanceVariable::Slope,
        DistanceVariable::Sunshine,
    ];

    pub fn column(&self) -> &'static str {
        use crate::schema::sim_info::*;
        match self {
            DistanceVariable::Weather => WEA_DIST,
            DistanceVariable::Precipitation => WEA_DIST_N,
            DistanceVariable::Slope => SL_DIST,
            DistanceVariable::Sunshine => SUN_DIST,
        }
    }
}

/// Provenance and quality information of one simulation polygon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationInfo {
    pub sim_id: SimId,
    pub stat_id: Option<i64>,
    pub buek_flag: u8,
    /// Percentage of the soil group without a defined soil profile.
    pub bfid_undef: f64,
    pub lanu_flag: u8,
    pub wea_flag: u8,
    pub wea_dist: Option<f64>,
    pub wea_flag_n: u8,
    pub wea_dist_n: Option<f64>,
    pub sl_flag: u8,
    pub sl_dist: Option<f64>,
    pub sl_std: Option<f64>,
    pub sun_flag: u8,
    pub sun_dist: Option<f64>,
    pub rs_std: Option<f64>,
    pub wea_t_std: Option<f64>,
    pub wea_et_std: Option<f64>,
    pub wea_n_wihj_std: Option<f64>,
    pub wea_n_sohj_std: Option<f64>,
}

impl SimulationInfo {
    pub fn flag(&self, flag: QualityFlag) -> u8 {
        match flag {
            QualityFlag::BuekFlag => self.buek_flag,
            QualityFlag::LanuFlag => self.lanu_flag,
            QualityFlag::WeaFlag => self.wea_flag,
            QualityFlag::WeaFlagN => self.wea_flag_n,
            QualityFlag::SlFlag => self.sl_flag,
            QualityFlag::SunFlag => self.sun_flag,
        }
    }

    pub fn std_dev(&self, variable: StdVariable) -> Option<f64> {
        match variable {
            StdVariable::Slope => self.sl_std,
            StdVariable::WinterPrecipitation => self.wea_n_wihj_std,
            StdVariable::SummerPrecipitation => self.wea_n_sohj_std,
            StdVariable::Temperature => self.wea_t_std,
            StdVariable::Evapotranspiration => self.wea_et_std,
            StdVariable::Sunshine => self.rs_std,
        }
    }

    pub fn distance(&self, variable: DistanceVariable) -> Option<f64> {
        match variable {
            DistanceVariable::Weather => self.wea_dist,
            DistanceVariable::Precipitation => self.wea_dist_n,
            DistanceVariable::Slope => self.sl_dist,
            DistanceVariable::Sunshine => self.sun_dist,
        }
    }
}

// ── Final reference ─────────────────────────────────────────────────────────

/// Runoff, groundwater recharge and evapotranspiration as fractions of their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeShares {
    pub runoff_rel: f64,
    pub tp_rel: f64,
    pub et_rel: f64,
}

impl RelativeShares {
    /// `None` when runoff, recharge and evapotranspiration are all zero.
    pub fn of(balance: &WaterBalance) -> Option<Self> {
        let total = balance.runoff + balance.tp + balance.et;
        if total > 0.0 {
            Some(Self {
                runoff_rel: balance.runoff / total,
                tp_rel: balance.tp / total,
                et_rel: balance.et / total,
            })
        } else {
            None
        }
    }

    pub fn sum(&self) -> f64 {
        self.runoff_rel + self.tp_rel + self.et_rel
    }
}

/// The NatUrWB reference of one input polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NaturwbReference {
    pub balance: WaterBalance,
    pub shares: RelativeShares,
}

impl NaturwbReference {
    /// All values keyed by their column name, absolute values first.
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        use crate::schema::relative::*;
        let mut values: Vec<(&'static str, f64)> = self.balance.named_values().collect();
        values.push((RUNOFF_REL, self.shares.runoff_rel));
        values.push((TP_REL, self.shares.tp_rel));
        values.push((ET_REL, self.shares.et_rel));
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn result_row() -> SimulationResult {
        SimulationResult {
            sim_id: 1,
            gen_id: 10,
            bf_id: 100,
            lanu_id: 3,
            n: 800.0,
            kap_a: 5.0,
            et: 500.0,
            pet: 600.0,
            oa: 40.0,
            za: 60.0,
            tp: 205.0,
            za_gwnah_flag: 1.0,
            bfid_area: 100.0,
        }
    }

    #[test]
    fn balance_derives_runoff_and_near_groundwater_interflow() {
        let balance = result_row().balance();
        assert_eq!(balance.runoff, 100.0);
        assert_eq!(balance.za_gwnah, 60.0);

        let no_gw = SimulationResult {
            za_gwnah_flag: 0.0,
            ..result_row()
        };
        assert_eq!(no_gw.balance().za_gwnah, 0.0);
    }

    #[test]
    fn relative_shares_sum_to_one() {
        let shares = RelativeShares::of(&result_row().balance()).unwrap();
        assert_relative_eq!(shares.sum(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(shares.et_rel, 500.0 / 805.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_balance_has_no_relative_shares() {
        assert!(RelativeShares::of(&WaterBalance::default()).is_none());
    }

    #[test]
    fn scaled_and_added_balances() {
        let mut total = WaterBalance::default();
        total += result_row().balance().scaled(0.25);
        total += result_row().balance().scaled(0.75);
        assert_relative_eq!(total.n, 800.0, epsilon = 1e-9);
        assert_relative_eq!(total.tp, 205.0, epsilon = 1e-9);
    }
}
