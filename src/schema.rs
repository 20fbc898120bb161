/// Column-name constants for the NatUrWB reference tables and audit frames.
/// Single source of truth for CSV snapshots and exported DataFrames.

// ── Identifier columns ──────────────────────────────────────────────────────
pub mod ids {
    pub const SIM_ID: &str = "sim_id";
    pub const GEN_ID: &str = "gen_id";
    pub const NAT_ID: &str = "nat_id";
    pub const LANU_ID: &str = "lanu_id";
    pub const BF_ID: &str = "bf_id";
}

// ── Geometry layers ─────────────────────────────────────────────────────────
pub mod layer {
    pub const GEOMETRY: &str = "geometry";
    pub const AREA: &str = "area";
    pub const ANTEIL: &str = "anteil";
    pub const COLOR: &str = "color";
    pub const LEGEND_TEXT: &str = "leg_tkle_txt";
    pub const LEGEND_SHORT: &str = "leg_tkle_kurz";
    pub const NAME: &str = "name";
    pub const IS_URBAN: &str = "is_urban";
    pub const LANU_NAME: &str = "lanu_name";
}

// ── Simulation result columns ───────────────────────────────────────────────
pub mod results {
    pub const N: &str = "n";
    pub const KAP_A: &str = "kap.A.";
    pub const ET: &str = "et";
    pub const PET: &str = "pet";
    pub const RUNOFF: &str = "runoff";
    pub const OA: &str = "oa";
    pub const ZA: &str = "za";
    pub const ZA_GWNAH: &str = "za_gwnah";
    pub const TP: &str = "tp";
    pub const ZA_GWNAH_FLAG: &str = "za_gwnah_flag";
    pub const BFID_AREA: &str = "bfid_area";

    /// Aggregated water-balance columns, in output order.
    pub const AGGREGATED: [&str; 9] = [N, KAP_A, ET, PET, RUNOFF, OA, ZA, ZA_GWNAH, TP];

    /// Columns read from a raw result row.
    pub const RAW: [&str; 8] = [N, KAP_A, ET, PET, OA, ZA, TP, ZA_GWNAH_FLAG];
}

// ── Relative shares of the reference ────────────────────────────────────────
pub mod relative {
    pub const RUNOFF_REL: &str = "runoff_rel";
    pub const TP_REL: &str = "tp_rel";
    pub const ET_REL: &str = "et_rel";
}

// ── Simulation polygon quality columns ──────────────────────────────────────
pub mod sim_info {
    pub const STAT_ID: &str = "stat_id";
    pub const BUEK_FLAG: &str = "buek_flag";
    pub const BFID_UNDEF: &str = "bfid_undef";
    pub const LANU_FLAG: &str = "lanu_flag";
    pub const WEA_FLAG: &str = "wea_flag";
    pub const WEA_DIST: &str = "wea_dist";
    pub const WEA_FLAG_N: &str = "wea_flag_n";
    pub const WEA_DIST_N: &str = "wea_dist_n";
    pub const SL_FLAG: &str = "sl_flag";
    pub const SL_DIST: &str = "sl_dist";
    pub const SL_STD: &str = "sl_std";
    pub const SUN_FLAG: &str = "sun_flag";
    pub const SUN_DIST: &str = "sun_dist";
    pub const RS_STD: &str = "rs_std";
    pub const WEA_T_STD: &str = "wea_t_std";
    pub const WEA_ET_STD: &str = "wea_et_std";
    pub const WEA_N_WIHJ_STD: &str = "wea_n_wihj_std";
    pub const WEA_N_SOHJ_STD: &str = "wea_n_sohj_std";
}

// ── Coefficient columns ─────────────────────────────────────────────────────
pub mod coefficients {
    pub const COEF_GEN: &str = "coef_gen";
    pub const COEF_SIM: &str = "coef_sim";
    pub const COEF_NAT: &str = "coef_nat";
    pub const COEF_LANU: &str = "coef_lanu";
    pub const COEF_BFID: &str = "coef_bfid";
    pub const PRODUCT: &str = "product";
    pub const SOURCE: &str = "source";

    /// Chain factors, ordered from the soil group down to the soil profile.
    pub const CHAIN: [&str; 5] = [COEF_GEN, COEF_SIM, COEF_NAT, COEF_LANU, COEF_BFID];
}

// ── Land-use resolver columns ───────────────────────────────────────────────
pub mod resolver {
    pub const RESOLVED: &str = "resolved";
    pub const NOLANU_DIST: &str = "nolanu_dist";
}

// ── Query pool columns ──────────────────────────────────────────────────────
pub mod pool {
    pub const QUERY_ID: &str = "query_id";
    pub const CREATED_AT: &str = "created_at";
    pub const LANU_PREFIX: &str = "lanu_";
}
