use crate::metrics::TimeSeriesPoint;

/// X (seconds) and Y (WPM) upper bounds for the results chart
pub fn compute_chart_params(series: &[TimeSeriesPoint]) -> (f64, f64) {
    let highest_wpm = series.iter().map(|p| p.wpm).fold(0.0, f64::max);
    let overall_duration = series.last().map_or(1.0, |p| p.t).max(1.0);
    (overall_duration, highest_wpm.ceil().max(1.0))
}

/// Whole numbers without decimals, everything else to two places
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
