//! DMI — Wilder's Directional Movement system.
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! The four lines are exposed as separate `Indicator` instances, one per
//! `DmiLine`. DX is the "momentum" series and ADX the "average strength"
//! series the crossover detector compares.

use super::atr::{true_range, wilder_smooth};
use super::indicator::Indicator;
use crate::domain::Bar;

/// Which DMI line to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmiLine {
    Plus,
    Minus,
    Dx,
    Adx,
}

impl DmiLine {
    fn prefix(&self) -> &'static str {
        match self {
            DmiLine::Plus => "plus_di",
            DmiLine::Minus => "minus_di",
            DmiLine::Dx => "dx",
            DmiLine::Adx => "adx",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dmi {
    period: usize,
    line: DmiLine,
    name: String,
}

/// All four DMI lines computed in one pass.
#[derive(Debug, Clone)]
pub struct DmiSeries {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub dx: Vec<f64>,
    pub adx: Vec<f64>,
}

impl Dmi {
    pub fn new(period: usize, line: DmiLine) -> Self {
        assert!(period >= 1, "DMI period must be >= 1");
        Self {
            period,
            line,
            name: format!("{}_{period}", line.prefix()),
        }
    }

    pub fn plus(period: usize) -> Self {
        Self::new(period, DmiLine::Plus)
    }

    pub fn minus(period: usize) -> Self {
        Self::new(period, DmiLine::Minus)
    }

    pub fn dx(period: usize) -> Self {
        Self::new(period, DmiLine::Dx)
    }

    pub fn adx(period: usize) -> Self {
        Self::new(period, DmiLine::Adx)
    }

    /// Compute every line at once. The provider uses this to avoid
    /// smoothing the same inputs four times.
    pub fn compute_all(period: usize, bars: &[Bar]) -> DmiSeries {
        let n = bars.len();
        let mut series = DmiSeries {
            plus_di: vec![f64::NAN; n],
            minus_di: vec![f64::NAN; n],
            dx: vec![f64::NAN; n],
            adx: vec![f64::NAN; n],
        };

        if n < 2 {
            return series;
        }

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];

        for i in 1..n {
            if bars[i].high.is_nan()
                || bars[i].low.is_nan()
                || bars[i - 1].high.is_nan()
                || bars[i - 1].low.is_nan()
            {
                continue;
            }

            let high_diff = bars[i].high - bars[i - 1].high;
            let low_diff = bars[i - 1].low - bars[i].low;

            plus_dm[i] = if high_diff > low_diff && high_diff > 0.0 {
                high_diff
            } else {
                0.0
            };
            minus_dm[i] = if low_diff > high_diff && low_diff > 0.0 {
                low_diff
            } else {
                0.0
            };
        }

        let mut tr = true_range(bars);
        // Align TR with the DM series, which starts at index 1.
        tr[0] = f64::NAN;
        let smooth_tr = wilder_smooth(&tr, period);
        let smooth_plus_dm = wilder_smooth(&plus_dm, period);
        let smooth_minus_dm = wilder_smooth(&minus_dm, period);

        for i in 0..n {
            if smooth_tr[i].is_nan()
                || smooth_plus_dm[i].is_nan()
                || smooth_minus_dm[i].is_nan()
                || smooth_tr[i] == 0.0
            {
                continue;
            }

            let plus_di = 100.0 * smooth_plus_dm[i] / smooth_tr[i];
            let minus_di = 100.0 * smooth_minus_dm[i] / smooth_tr[i];
            let di_sum = plus_di + minus_di;

            series.plus_di[i] = plus_di;
            series.minus_di[i] = minus_di;
            series.dx[i] = if di_sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / di_sum
            };
        }

        series.adx = wilder_smooth(&series.dx, period);
        series
    }
}

impl Indicator for Dmi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        match self.line {
            DmiLine::Plus | DmiLine::Minus | DmiLine::Dx => self.period,
            DmiLine::Adx => 2 * self.period - 1,
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let series = Self::compute_all(self.period, bars);
        match self.line {
            DmiLine::Plus => series.plus_di,
            DmiLine::Minus => series.minus_di,
            DmiLine::Dx => series.dx,
            DmiLine::Adx => series.adx,
        }
    }
}
