//! Statistical primitives shared by the analyzers.
//!
//! Everything here is a pure function of its input slices. Undefined results
//! (too few observations, zero variance) are reported through
//! [`AnalysisError`] or `None`, never as a numeric placeholder.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{AnalysisError, Result};

/// Minimum number of paired observations for a correlation or a regression.
pub const MIN_PAIRED_OBSERVATIONS: usize = 3;

/// Minimum observations per group for a two-sample test.
pub const MIN_GROUP_OBSERVATIONS: usize = 2;

// ── Descriptive helpers ───────────────────────────────────────────────────────

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n − 1 denominator), `None` for fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    if is_constant(values) {
        return Some(0.0);
    }
    let m = mean(values)?;
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some(ss / (values.len() - 1) as f64)
}

/// Sample standard deviation, `None` for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks.
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let (&first, _) = sorted_data.split_first()?;
    let len = sorted_data.len();
    if len == 1 {
        return Some(first);
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted_data[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
}

/// Median of unsorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 50.0)
}

/// Whether every value is bit-for-bit equal to the first one.
///
/// Used instead of testing the computed variance against zero, which rounding
/// in the mean can leave slightly positive for a constant series.
pub fn is_constant(values: &[f64]) -> bool {
    match values.split_first() {
        Some((first, rest)) => rest.iter().all(|v| v == first),
        None => true,
    }
}

/// Count / mean / sample standard deviation of one field over a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub count: usize,
    /// `None` when the group is empty.
    pub mean: Option<f64>,
    /// `None` when the group holds fewer than two values.
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SummaryStats {
    pub fn from_values(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            mean: mean(values),
            std_dev: sample_std_dev(values),
            min: values.iter().copied().min_by(f64::total_cmp),
            max: values.iter().copied().max_by(f64::total_cmp),
        }
    }
}

// ── Significance ──────────────────────────────────────────────────────────────

/// Two-tailed probability of a Student's t statistic at least as extreme as `t`.
pub fn two_tailed_p_value(t: f64, degrees_of_freedom: f64) -> Result<f64> {
    if t.is_nan() {
        return Err(AnalysisError::DegenerateInput(
            "t statistic is not a number".to_string(),
        ));
    }
    if t.is_infinite() {
        return Ok(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| {
        AnalysisError::DegenerateInput(format!(
            "invalid t distribution with {degrees_of_freedom} degrees of freedom: {e}"
        ))
    })?;
    let p = 2.0 * (1.0 - dist.cdf(t.abs()));
    Ok(p.clamp(0.0, 1.0))
}

// ── Pearson correlation ───────────────────────────────────────────────────────

/// Pearson product-moment correlation with its two-tailed significance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Coefficient in `[-1, 1]`.
    pub coefficient: f64,
    /// Probability under the null hypothesis of no linear relationship.
    pub p_value: f64,
    /// Number of paired observations.
    pub n: usize,
}

/// Correlate two paired series.
///
/// Fails with [`AnalysisError::InvalidInput`] on unequal lengths,
/// [`AnalysisError::InsufficientData`] below three pairs and
/// [`AnalysisError::DegenerateInput`] when either series is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Result<Correlation> {
    if x.len() != y.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "paired series differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < MIN_PAIRED_OBSERVATIONS {
        return Err(AnalysisError::InsufficientData {
            required: MIN_PAIRED_OBSERVATIONS,
            actual: n,
        });
    }
    if is_constant(x) || is_constant(y) {
        return Err(AnalysisError::DegenerateInput(
            "correlation is undefined for a series with zero variance".to_string(),
        ));
    }

    let mx = x.iter().sum::<f64>() / n as f64;
    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let coefficient = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let t = if coefficient.abs() >= 1.0 {
        f64::INFINITY
    } else {
        coefficient * (df / (1.0 - coefficient * coefficient)).sqrt()
    };

    Ok(Correlation {
        coefficient,
        p_value: two_tailed_p_value(t, df)?,
        n,
    })
}

// ── Ordinary least squares ────────────────────────────────────────────────────

/// Least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; `None` when `y` is constant.
    pub r_squared: Option<f64>,
    /// Two-tailed probability that the slope is zero; `None` when `y` is constant.
    pub p_value: Option<f64>,
    /// Standard error of the slope; `None` when `y` is constant.
    pub slope_std_err: Option<f64>,
    pub n: usize,
}

/// Fit `y` against `x` by ordinary least squares.
///
/// A constant `y` yields an exact zero slope with no goodness-of-fit figures;
/// a constant `x` is [`AnalysisError::DegenerateInput`].
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "paired series differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < MIN_PAIRED_OBSERVATIONS {
        return Err(AnalysisError::InsufficientData {
            required: MIN_PAIRED_OBSERVATIONS,
            actual: n,
        });
    }
    if is_constant(x) {
        return Err(AnalysisError::DegenerateInput(
            "regression needs at least two distinct x values".to_string(),
        ));
    }

    let mx = x.iter().sum::<f64>() / n as f64;
    if is_constant(y) {
        return Ok(LinearFit {
            slope: 0.0,
            intercept: y[0],
            r_squared: None,
            p_value: None,
            slope_std_err: None,
            n,
        });
    }

    let my = y.iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r_squared = ((sxy * sxy) / (sxx * syy)).clamp(0.0, 1.0);
    let df = (n - 2) as f64;
    let slope_std_err = ((1.0 - r_squared) * syy / sxx / df).sqrt();
    let t = if slope_std_err == 0.0 {
        f64::INFINITY
    } else {
        slope / slope_std_err
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared: Some(r_squared),
        p_value: Some(two_tailed_p_value(t, df)?),
        slope_std_err: Some(slope_std_err),
        n,
    })
}

// ── Welch's t-test ────────────────────────────────────────────────────────────

/// Independent two-sample t-test without the equal-variance assumption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    pub t_statistic: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    /// `mean(a) - mean(b)`.
    pub mean_difference: f64,
}

/// Compare the means of two independent samples.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<WelchTest> {
    let smallest = a.len().min(b.len());
    if smallest < MIN_GROUP_OBSERVATIONS {
        return Err(AnalysisError::InsufficientData {
            required: MIN_GROUP_OBSERVATIONS,
            actual: smallest,
        });
    }

    let (ma, va) = mean_and_variance(a)?;
    let (mb, vb) = mean_and_variance(b)?;
    let na = a.len() as f64;
    let nb = b.len() as f64;
    let qa = va / na;
    let qb = vb / nb;
    let se_sq = qa + qb;
    if se_sq == 0.0 {
        return Err(AnalysisError::DegenerateInput(
            "both groups have zero variance".to_string(),
        ));
    }

    let mean_difference = ma - mb;
    let t_statistic = mean_difference / se_sq.sqrt();
    let degrees_of_freedom = se_sq * se_sq / (qa * qa / (na - 1.0) + qb * qb / (nb - 1.0));

    Ok(WelchTest {
        t_statistic,
        degrees_of_freedom,
        p_value: two_tailed_p_value(t_statistic, degrees_of_freedom)?,
        mean_difference,
    })
}

fn mean_and_variance(values: &[f64]) -> Result<(f64, f64)> {
    let insufficient = || AnalysisError::InsufficientData {
        required: MIN_GROUP_OBSERVATIONS,
        actual: values.len(),
    };
    let m = mean(values).ok_or_else(insufficient)?;
    let v = sample_variance(values).ok_or_else(insufficient)?;
    Ok((m, v))
}
