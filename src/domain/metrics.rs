//! Performance metrics over return series.
//!
//! Every function takes per-period log returns and is pure. Annualization
//! assumes 252 periods per year. NaN inputs are skipped. Undefined results
//! are reported as NaN (or infinity for omega without losses) rather than
//! clamped to zero, so callers can tell "no signal" from "zero".

use serde::Serialize;

use super::backtest::BacktestResult;
use super::indicator::TRADING_DAYS_PER_YEAR;
use super::portfolio::EquityPoint;
use super::trades::TradeSummary;

fn clean(returns: &[f64]) -> Vec<f64> {
    returns.iter().copied().filter(|r| !r.is_nan()).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Log returns between consecutive equity samples. Steps touching
/// non-positive equity are dropped.
pub fn equity_log_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .filter(|w| w[0].equity > 0.0 && w[1].equity > 0.0)
        .map(|w| (w[1].equity / w[0].equity).ln())
        .collect()
}

/// Annualized Sharpe ratio against an annual risk-free rate.
///
/// per-period rf = ln(1 + rf_annual) / 252
/// sharpe = sqrt(252) * mean(r - rf) / std(r - rf)
pub fn sharpe(returns: &[f64], risk_free_annual: f64) -> f64 {
    let rf = (1.0 + risk_free_annual).ln() / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = clean(returns).into_iter().map(|r| r - rf).collect();
    TRADING_DAYS_PER_YEAR.sqrt() * mean(&excess) / sample_std(&excess)
}

/// Annualized Sortino ratio with a zero target. NaN when nothing fell
/// below the target.
pub fn sortino(returns: &[f64]) -> f64 {
    let r = clean(returns);
    if r.is_empty() {
        return f64::NAN;
    }
    let downside: Vec<f64> = r.iter().map(|x| x.min(0.0).powi(2)).collect();
    let downside_dev = mean(&downside).sqrt();
    if downside_dev == 0.0 {
        return f64::NAN;
    }
    TRADING_DAYS_PER_YEAR.sqrt() * mean(&r) / downside_dev
}

/// Sum of gains over sum of losses around zero.
pub fn omega(returns: &[f64]) -> f64 {
    let r = clean(returns);
    let gains: f64 = r.iter().map(|x| x.max(0.0)).sum();
    let losses: f64 = r.iter().map(|x| (-x).max(0.0)).sum();
    if losses == 0.0 {
        f64::INFINITY
    } else {
        gains / losses
    }
}

/// Growth of one unit: cumulative product of exp(r).
pub fn equity_from_log_returns(returns: &[f64]) -> Vec<f64> {
    clean(returns)
        .iter()
        .scan(1.0_f64, |level, r| {
            *level *= r.exp();
            Some(*level)
        })
        .collect()
}

/// Deepest peak-to-trough loss as a non-positive fraction (-0.25 is a 25%
/// drawdown). The starting level of 1 counts as a peak. NaN for an empty
/// series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let equity = equity_from_log_returns(returns);
    if equity.is_empty() {
        return f64::NAN;
    }
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for level in equity {
        peak = peak.max(level);
        worst = worst.min(level / peak - 1.0);
    }
    worst
}

/// Longest run of samples spent below a previous equity peak.
pub fn max_drawdown_duration(curve: &[EquityPoint]) -> usize {
    let mut peak = f64::NEG_INFINITY;
    let mut current = 0usize;
    let mut longest = 0usize;
    for point in curve {
        if point.equity >= peak {
            peak = point.equity;
            current = 0;
        } else {
            current += 1;
            longest = longest.max(current);
        }
    }
    longest
}

/// Compound annual growth rate. NaN for fewer than two returns.
pub fn cagr(returns: &[f64]) -> f64 {
    let equity = equity_from_log_returns(returns);
    let Some(&last) = equity.last() else {
        return f64::NAN;
    };
    if equity.len() <= 1 {
        return f64::NAN;
    }
    let years = equity.len() as f64 / TRADING_DAYS_PER_YEAR;
    last.powf(1.0 / years) - 1.0
}

/// CAGR over the absolute maximum drawdown. NaN without a drawdown.
pub fn calmar(returns: &[f64]) -> f64 {
    let mdd = max_drawdown(returns).abs();
    if mdd == 0.0 || mdd.is_nan() {
        return f64::NAN;
    }
    cagr(returns) / mdd
}

/// Annualized standard deviation of returns.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    sample_std(&clean(returns)) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Headline numbers for one equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub omega: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
}

impl Metrics {
    pub fn from_equity(curve: &[EquityPoint], risk_free_rate: f64) -> Self {
        let returns = equity_log_returns(curve);
        let total_return = match (curve.first(), curve.last()) {
            (Some(first), Some(last)) if first.equity > 0.0 => last.equity / first.equity - 1.0,
            _ => 0.0,
        };
        Metrics {
            total_return,
            cagr: cagr(&returns),
            volatility: annualized_volatility(&returns),
            sharpe: sharpe(&returns, risk_free_rate),
            sortino: sortino(&returns),
            omega: omega(&returns),
            calmar: calmar(&returns),
            max_drawdown: max_drawdown(&returns),
            max_drawdown_duration: max_drawdown_duration(curve),
        }
    }

    /// Metrics of a finished run together with its round-trip statistics.
    pub fn compute(result: &BacktestResult, risk_free_rate: f64) -> (Metrics, TradeSummary) {
        let metrics = Metrics::from_equity(&result.equity_curve, risk_free_rate);
        let summary = TradeSummary::from_trades(&result.closed_trades());
        (metrics, summary)
    }

    /// Name/value pairs in display order.
    pub fn rows(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("volatility", self.volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("omega", self.omega),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("max_drawdown_duration", self.max_drawdown_duration as f64),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                equity: v,
            })
            .collect()
    }

    #[test]
    fn report_returns_lead_with_zero_and_otherwise_match() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let report = crate::domain::portfolio::log_returns(&curve);
        assert_eq!(report.len(), curve.len());
        assert_eq!(report[0], 0.0);
        assert_eq!(&report[1..], &equity_log_returns(&curve)[..]);
    }

    #[test]
    fn log_returns_between_samples() {
        let r = equity_log_returns(&make_equity_curve(&[100.0, 110.0, 99.0]));
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], (1.1_f64).ln(), epsilon = 1e-12);
        assert_relative_eq!(r[1], (0.9_f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn sharpe_uses_sample_std() {
        let r = [0.01, 0.02, -0.01, 0.03];
        let m = 0.0125;
        let var = [0.01, 0.02, -0.01, 0.03].iter().map(|x: &f64| (x - m).powi(2)).sum::<f64>() / 3.0;
        assert_relative_eq!(sharpe(&r, 0.0), 252.0_f64.sqrt() * m / var.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn sharpe_subtracts_risk_free() {
        let r = [0.01, 0.02, -0.01, 0.03];
        assert!(sharpe(&r, 0.05) < sharpe(&r, 0.0));
    }

    #[test]
    fn sharpe_undefined_for_single_return() {
        assert!(sharpe(&[0.01], 0.0).is_nan());
    }

    #[test]
    fn sortino_nan_without_downside() {
        assert!(sortino(&[0.01, 0.02]).is_nan());
    }

    #[test]
    fn sortino_value() {
        let r = [0.02, -0.01];
        let dd = (0.0001_f64 / 2.0).sqrt();
        assert_relative_eq!(sortino(&r), 252.0_f64.sqrt() * 0.005 / dd, epsilon = 1e-12);
    }

    #[test]
    fn omega_ratio() {
        assert_relative_eq!(omega(&[0.02, -0.01, 0.01]), 3.0, epsilon = 1e-12);
        assert!(omega(&[0.01, 0.02]).is_infinite());
    }

    #[test]
    fn equity_compounds() {
        let eq = equity_from_log_returns(&[(1.1_f64).ln(), (0.5_f64).ln()]);
        assert_relative_eq!(eq[0], 1.1, epsilon = 1e-12);
        assert_relative_eq!(eq[1], 0.55, epsilon = 1e-12);
    }

    #[test]
    fn drawdown_from_peak() {
        let r = [(1.2_f64).ln(), (0.5_f64).ln(), (1.5_f64).ln()];
        assert_relative_eq!(max_drawdown(&r), -0.5, epsilon = 1e-12);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
        assert!(max_drawdown(&[]).is_nan());
    }

    #[test]
    fn drawdown_duration_counts_samples_under_water() {
        let curve = make_equity_curve(&[100.0, 110.0, 105.0, 100.0, 111.0, 109.0]);
        assert_eq!(max_drawdown_duration(&curve), 2);
    }

    #[test]
    fn cagr_over_one_year() {
        let daily = (1.1_f64).ln() / 252.0;
        let r = vec![daily; 252];
        assert_relative_eq!(cagr(&r), 0.1, epsilon = 1e-9);
        assert!(cagr(&[0.01]).is_nan());
    }

    #[test]
    fn calmar_nan_without_drawdown() {
        assert!(calmar(&[0.01, 0.01]).is_nan());
    }

    #[test]
    fn nan_returns_are_skipped() {
        assert_relative_eq!(omega(&[0.02, f64::NAN, -0.01]), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn metrics_from_flat_curve() {
        let m = Metrics::from_equity(&make_equity_curve(&[100.0, 100.0, 100.0]), 0.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert!(m.sortino.is_nan());
        assert_eq!(m.rows().len(), 9);
    }

    #[test]
    fn metrics_total_return() {
        let m = Metrics::from_equity(&make_equity_curve(&[100_000.0, 90_000.0, 110_000.0]), 0.05);
        assert_relative_eq!(m.total_return, 0.10, epsilon = 1e-12);
        assert_relative_eq!(m.max_drawdown, -0.10, epsilon = 1e-12);
        assert_eq!(m.max_drawdown_duration, 1);
    }
}
