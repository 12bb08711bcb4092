use std::fmt::Display;

use crate::util::depth::{Depth, ONE_PLY};

const RAZOR_DEPTH: Depth = 4 * ONE_PLY;
const RAZOR_MARGIN_BASE: i32 = 512;
const RAZOR_MARGIN_SLOPE: i32 = 16;
const THREAT_DEPTH: Depth = 5 * ONE_PLY;
const IID_DEPTH_PV: Depth = 5 * ONE_PLY;
const IID_DEPTH_NON_PV: Depth = 8 * ONE_PLY;
const IID_MARGIN: i32 = 0x100;
const SINGULAR_DEPTH_PV: Depth = 6 * ONE_PLY;
const SINGULAR_DEPTH_NON_PV: Depth = 8 * ONE_PLY;
const PROBCUT_MARGIN: i32 = 200;
const PROBCUT_REDUCTION: Depth = 4 * ONE_PLY;
const EASY_MOVE_MARGIN: i32 = 0x150;
const ASPIRATION_DELTA: i32 = 16;
const ASPIRATION_MAX_DELTA: i32 = 600;
const QS_FUTILITY_MARGIN: i32 = 0x80;
const FUTILITY_MARGIN_SCALE: i32 = 112;
const FUTILITY_MARGIN_MOVE_SLOPE: i32 = 8;
const FUTILITY_MARGIN_BASE: i32 = 45;
const LMR_PV_DIVISION: f64 = 3.0;
const LMR_NON_PV_BASE: f64 = 0.33;
const LMR_NON_PV_DIVISION: f64 = 2.25;

/// Depth (in half plies) below which futility margins are tabulated.
const FUTILITY_MARGIN_DEPTHS: usize = 16;
const FUTILITY_MOVE_COUNT_DEPTHS: usize = 32;

/// Search tunables, the on/off switch of every pruning technique,
/// and the pruning tables derived from them.
#[derive(Clone, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    pub razor_depth: Depth,
    pub razor_margin_base: i32,
    pub razor_margin_slope: i32,
    pub threat_depth: Depth,
    pub iid_depth_pv: Depth,
    pub iid_depth_non_pv: Depth,
    pub iid_margin: i32,
    pub singular_depth_pv: Depth,
    pub singular_depth_non_pv: Depth,
    pub probcut_margin: i32,
    pub probcut_reduction: Depth,
    pub easy_move_margin: i32,
    pub aspiration_delta: i32,
    pub aspiration_max_delta: i32,
    pub qs_futility_margin: i32,
    pub futility_margin_scale: i32,
    pub futility_margin_move_slope: i32,
    pub futility_margin_base: i32,
    pub lmr_pv_division: f64,
    pub lmr_non_pv_base: f64,
    pub lmr_non_pv_division: f64,

    pub use_razoring: bool,
    pub use_static_null_move: bool,
    pub use_null_move: bool,
    pub use_probcut: bool,
    pub use_iid: bool,
    pub use_singular_extension: bool,
    pub use_futility_pruning: bool,
    pub use_move_count_pruning: bool,
    pub use_see_pruning: bool,
    pub use_lmr: bool,
    pub use_qs_pruning: bool,
    pub use_aspiration: bool,

    pub tables: PruningTables,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            razor_depth: RAZOR_DEPTH,
            razor_margin_base: RAZOR_MARGIN_BASE,
            razor_margin_slope: RAZOR_MARGIN_SLOPE,
            threat_depth: THREAT_DEPTH,
            iid_depth_pv: IID_DEPTH_PV,
            iid_depth_non_pv: IID_DEPTH_NON_PV,
            iid_margin: IID_MARGIN,
            singular_depth_pv: SINGULAR_DEPTH_PV,
            singular_depth_non_pv: SINGULAR_DEPTH_NON_PV,
            probcut_margin: PROBCUT_MARGIN,
            probcut_reduction: PROBCUT_REDUCTION,
            easy_move_margin: EASY_MOVE_MARGIN,
            aspiration_delta: ASPIRATION_DELTA,
            aspiration_max_delta: ASPIRATION_MAX_DELTA,
            qs_futility_margin: QS_FUTILITY_MARGIN,
            futility_margin_scale: FUTILITY_MARGIN_SCALE,
            futility_margin_move_slope: FUTILITY_MARGIN_MOVE_SLOPE,
            futility_margin_base: FUTILITY_MARGIN_BASE,
            lmr_pv_division: LMR_PV_DIVISION,
            lmr_non_pv_base: LMR_NON_PV_BASE,
            lmr_non_pv_division: LMR_NON_PV_DIVISION,
            use_razoring: true,
            use_static_null_move: true,
            use_null_move: true,
            use_probcut: true,
            use_iid: true,
            use_singular_extension: true,
            use_futility_pruning: true,
            use_move_count_pruning: true,
            use_see_pruning: true,
            use_lmr: true,
            use_qs_pruning: true,
            use_aspiration: true,
            tables: PruningTables::NULL,
        };
        config.rebuild_tables();
        config
    }
}

impl Config {
    /// Recompute the pruning tables after a tunable changed.
    pub fn rebuild_tables(&mut self) {
        self.tables = PruningTables::new(self);
    }

    /// Every pruning and reduction switched off: a plain alpha-beta search.
    pub fn without_pruning() -> Self {
        Self {
            use_razoring: false,
            use_static_null_move: false,
            use_null_move: false,
            use_probcut: false,
            use_iid: false,
            use_singular_extension: false,
            use_futility_pruning: false,
            use_move_count_pruning: false,
            use_see_pruning: false,
            use_lmr: false,
            use_qs_pruning: false,
            use_aspiration: false,
            ..Self::default()
        }
    }

    pub const fn razor_margin(&self, depth: Depth) -> i32 {
        self.razor_margin_base + self.razor_margin_slope * depth
    }

    pub const fn iid_depth(&self, pv: bool) -> Depth {
        if pv { self.iid_depth_pv } else { self.iid_depth_non_pv }
    }

    pub const fn singular_depth(&self, pv: bool) -> Depth {
        if pv { self.singular_depth_pv } else { self.singular_depth_non_pv }
    }
}

/// Margins, move counts, and reductions, indexed by depth in half plies.
#[derive(Clone, Debug)]
pub struct PruningTables {
    futility_margins: [[i32; 64]; FUTILITY_MARGIN_DEPTHS],
    futility_move_counts: [usize; FUTILITY_MOVE_COUNT_DEPTHS],
    /// `reductions[pv][depth in plies][move count]`, in half plies.
    reductions: [[[i8; 64]; 64]; 2],
}

impl PruningTables {
    pub const NULL: Self = Self {
        futility_margins: [[0; 64]; FUTILITY_MARGIN_DEPTHS],
        futility_move_counts: [0; FUTILITY_MOVE_COUNT_DEPTHS],
        reductions: [[[0; 64]; 64]; 2],
    };

    pub fn new(config: &Config) -> Self {
        #![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
        let mut out = Self::NULL;
        for hd in 1..64 {
            for mc in 1..64 {
                let ll = f64::ln(hd as f64) * f64::ln(mc as f64);
                let pv_red = ll / config.lmr_pv_division;
                let non_pv_red = config.lmr_non_pv_base + ll / config.lmr_non_pv_division;
                let one_ply = f64::from(ONE_PLY);
                out.reductions[1][hd][mc] = if pv_red >= 1.0 { (pv_red * one_ply).floor() as i8 } else { 0 };
                out.reductions[0][hd][mc] = if non_pv_red >= 1.0 { (non_pv_red * one_ply).floor() as i8 } else { 0 };
            }
        }
        for d in 1..FUTILITY_MARGIN_DEPTHS {
            for mc in 0..64 {
                let log_term = (f64::from((d * d) as u32) / 2.0).ln() / std::f64::consts::LN_2 + 1.001;
                out.futility_margins[d][mc] = config.futility_margin_scale * log_term as i32
                    - config.futility_margin_move_slope * mc as i32
                    + config.futility_margin_base;
            }
        }
        for (d, count) in out.futility_move_counts.iter_mut().enumerate() {
            *count = (3.001 + 0.25 * (d as f64).powi(2)) as usize;
        }
        out
    }

    /// Margin for value-based futility at `depth`, tightening with the move count.
    /// Beyond seven plies nothing is futile.
    pub fn futility_margin(&self, depth: Depth, move_count: usize) -> i32 {
        #![allow(clippy::cast_sign_loss)]
        if depth < 7 * ONE_PLY {
            self.futility_margins[depth.max(1) as usize][move_count.min(63)]
        } else {
            2 * crate::util::INFINITY
        }
    }

    /// Move count after which quiet moves are pruned at `depth`.
    pub fn futility_move_count(&self, depth: Depth) -> usize {
        #![allow(clippy::cast_sign_loss)]
        if depth < 16 * ONE_PLY {
            self.futility_move_counts[depth.max(0) as usize]
        } else {
            usize::MAX
        }
    }

    pub fn reduction(&self, pv: bool, depth: Depth, move_count: usize) -> Depth {
        #![allow(clippy::cast_sign_loss)]
        let plies = (depth / ONE_PLY).clamp(0, 63) as usize;
        Depth::from(self.reductions[usize::from(pv)][plies][move_count.min(63)])
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Search parameters:")?;
        for (id, value, _, _) in self.tunables() {
            writeln!(f, "    {id}: {value}")?;
        }
        for (id, value) in self.switches() {
            writeln!(f, "    {id}: {value}")?;
        }
        Ok(())
    }
}

macro_rules! id_parser_gen {
    ($($option:ident = [$($field:tt)*]),*) => {
        vec![$(
            (stringify!($option), Box::new(|s: &str| {
                $($field)* = s.parse().map_err(|_| format!("invalid value for {}: {}", stringify!($option), s))?;
                Ok(())
            }) as LazyFieldParser<'_>),)
            *
        ]
    }
}

macro_rules! id_value_gen {
    ($($option:ident = [$field:expr, $min:expr, $max:expr]),*) => {
        vec![$(
            (stringify!($option), f64::from($field), f64::from($min), f64::from($max)),)
            *
        ]
    }
}

type LazyFieldParser<'a> = Box<dyn FnMut(&str) -> Result<(), String> + 'a>;

impl Config {
    pub fn ids_with_parsers(&mut self) -> Vec<(&'static str, LazyFieldParser<'_>)> {
        id_parser_gen![
            RAZOR_DEPTH = [self.razor_depth],
            RAZOR_MARGIN_BASE = [self.razor_margin_base],
            RAZOR_MARGIN_SLOPE = [self.razor_margin_slope],
            THREAT_DEPTH = [self.threat_depth],
            IID_DEPTH_PV = [self.iid_depth_pv],
            IID_DEPTH_NON_PV = [self.iid_depth_non_pv],
            IID_MARGIN = [self.iid_margin],
            SINGULAR_DEPTH_PV = [self.singular_depth_pv],
            SINGULAR_DEPTH_NON_PV = [self.singular_depth_non_pv],
            PROBCUT_MARGIN = [self.probcut_margin],
            PROBCUT_REDUCTION = [self.probcut_reduction],
            EASY_MOVE_MARGIN = [self.easy_move_margin],
            ASPIRATION_DELTA = [self.aspiration_delta],
            ASPIRATION_MAX_DELTA = [self.aspiration_max_delta],
            QS_FUTILITY_MARGIN = [self.qs_futility_margin],
            FUTILITY_MARGIN_SCALE = [self.futility_margin_scale],
            FUTILITY_MARGIN_MOVE_SLOPE = [self.futility_margin_move_slope],
            FUTILITY_MARGIN_BASE = [self.futility_margin_base],
            LMR_PV_DIVISION = [self.lmr_pv_division],
            LMR_NON_PV_BASE = [self.lmr_non_pv_base],
            LMR_NON_PV_DIVISION = [self.lmr_non_pv_division],
            USE_RAZORING = [self.use_razoring],
            USE_STATIC_NULL_MOVE = [self.use_static_null_move],
            USE_NULL_MOVE = [self.use_null_move],
            USE_PROBCUT = [self.use_probcut],
            USE_IID = [self.use_iid],
            USE_SINGULAR_EXTENSION = [self.use_singular_extension],
            USE_FUTILITY_PRUNING = [self.use_futility_pruning],
            USE_MOVE_COUNT_PRUNING = [self.use_move_count_pruning],
            USE_SEE_PRUNING = [self.use_see_pruning],
            USE_LMR = [self.use_lmr],
            USE_QS_PRUNING = [self.use_qs_pruning],
            USE_ASPIRATION = [self.use_aspiration]
        ]
    }

    /// Numeric tunables with their UCI bounds.
    pub fn tunables(&self) -> Vec<(&'static str, f64, f64, f64)> {
        id_value_gen![
            RAZOR_DEPTH = [self.razor_depth, 0, 32],
            RAZOR_MARGIN_BASE = [self.razor_margin_base, 0, 2000],
            RAZOR_MARGIN_SLOPE = [self.razor_margin_slope, 0, 200],
            THREAT_DEPTH = [self.threat_depth, 0, 32],
            IID_DEPTH_PV = [self.iid_depth_pv, 2, 64],
            IID_DEPTH_NON_PV = [self.iid_depth_non_pv, 2, 64],
            IID_MARGIN = [self.iid_margin, 0, 2000],
            SINGULAR_DEPTH_PV = [self.singular_depth_pv, 2, 64],
            SINGULAR_DEPTH_NON_PV = [self.singular_depth_non_pv, 2, 64],
            PROBCUT_MARGIN = [self.probcut_margin, 0, 2000],
            PROBCUT_REDUCTION = [self.probcut_reduction, 2, 16],
            EASY_MOVE_MARGIN = [self.easy_move_margin, 0, 2000],
            ASPIRATION_DELTA = [self.aspiration_delta, 1, 500],
            ASPIRATION_MAX_DELTA = [self.aspiration_max_delta, 1, 30_000],
            QS_FUTILITY_MARGIN = [self.qs_futility_margin, 0, 1000],
            FUTILITY_MARGIN_SCALE = [self.futility_margin_scale, 0, 500],
            FUTILITY_MARGIN_MOVE_SLOPE = [self.futility_margin_move_slope, 0, 100],
            FUTILITY_MARGIN_BASE = [self.futility_margin_base, -500, 500],
            LMR_PV_DIVISION = [self.lmr_pv_division, 0.5, 10],
            LMR_NON_PV_BASE = [self.lmr_non_pv_base, 0, 2],
            LMR_NON_PV_DIVISION = [self.lmr_non_pv_division, 0.5, 10]
        ]
    }

    /// On/off switches of the pruning techniques.
    pub fn switches(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("USE_RAZORING", self.use_razoring),
            ("USE_STATIC_NULL_MOVE", self.use_static_null_move),
            ("USE_NULL_MOVE", self.use_null_move),
            ("USE_PROBCUT", self.use_probcut),
            ("USE_IID", self.use_iid),
            ("USE_SINGULAR_EXTENSION", self.use_singular_extension),
            ("USE_FUTILITY_PRUNING", self.use_futility_pruning),
            ("USE_MOVE_COUNT_PRUNING", self.use_move_count_pruning),
            ("USE_SEE_PRUNING", self.use_see_pruning),
            ("USE_LMR", self.use_lmr),
            ("USE_QS_PRUNING", self.use_qs_pruning),
            ("USE_ASPIRATION", self.use_aspiration),
        ]
    }

    /// Set a tunable or switch by its option name. Returns `Ok(false)` for unknown names.
    pub fn set_by_name(&mut self, name: &str, value: &str) -> Result<bool, String> {
        let mut found = false;
        for (id, mut parser) in self.ids_with_parsers() {
            if id.eq_ignore_ascii_case(name) {
                parser(value)?;
                found = true;
                break;
            }
        }
        if found {
            self.rebuild_tables();
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_hackery_same_length() {
        let mut config = Config::default();
        let n_parsers = config.ids_with_parsers().len();
        assert_eq!(n_parsers, config.tunables().len() + config.switches().len());
    }

    #[test]
    fn parser_actually_works() {
        let mut config = Config::default();
        assert_eq!(config.set_by_name("PROBCUT_MARGIN", "321"), Ok(true));
        assert_eq!(config.probcut_margin, 321);
        assert_eq!(config.set_by_name("use_lmr", "false"), Ok(true));
        assert!(!config.use_lmr);
        assert!(config.set_by_name("IID_MARGIN", "lots").is_err());
        assert_eq!(config.set_by_name("NOT_AN_OPTION", "1"), Ok(false));
    }

    #[test]
    fn tables_have_the_expected_shape() {
        let config = Config::default();
        let t = &config.tables;
        // reductions grow with depth and move count, and PV nodes reduce less.
        assert_eq!(t.reduction(false, ONE_PLY, 1), 0);
        assert!(t.reduction(false, 20 * ONE_PLY, 40) > t.reduction(false, 4 * ONE_PLY, 4));
        assert!(t.reduction(true, 20 * ONE_PLY, 40) < t.reduction(false, 20 * ONE_PLY, 40));
        // futility margins shrink as more moves are tried.
        assert!(t.futility_margin(3 * ONE_PLY, 1) > t.futility_margin(3 * ONE_PLY, 20));
        assert!(t.futility_margin(8 * ONE_PLY, 1) > crate::util::INFINITY);
        assert_eq!(t.futility_move_count(2 * ONE_PLY), 7);
        assert_eq!(t.futility_move_count(16 * ONE_PLY), usize::MAX);
    }

    #[test]
    fn razor_margin_grows_with_depth() {
        let config = Config::default();
        assert_eq!(config.razor_margin(ONE_PLY), RAZOR_MARGIN_BASE + 2 * RAZOR_MARGIN_SLOPE);
        assert!(config.razor_margin(3 * ONE_PLY) > config.razor_margin(ONE_PLY));
    }
}
