use crate::config::ConfigError;
use gale_instruments::MetricSnapshot;
use gale_summary_model::{ThresholdOutcome, ThresholdReport};
use std::collections::BTreeMap;

/// Fraction of request attempts that failed.
pub const FAILURE_RATE_METRIC: &str = "http_req_failed";
/// Request latency in milliseconds.
pub const DURATION_METRIC: &str = "http_req_duration";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMetric {
    /// `rate<bound`, failures over attempts
    FailureRate,
    /// `p(N)<bound`, the Nth latency percentile in milliseconds
    DurationPercentile(f64),
}

/// A declared pass condition for a scenario, such as `http_req_failed: rate<0.20`.
///
/// Thresholds are parsed once when the run is configured and never change while it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSpec {
    source: String,
    metric: ThresholdMetric,
    bound: f64,
    scenario: Option<String>,
    required: bool,
}

impl ThresholdSpec {
    /// Parse a threshold from a metric key and an expression.
    ///
    /// The key is a metric name with an optional scenario filter, `http_req_duration` or
    /// `http_req_duration{scenario:products}`. The expression is `rate<x` for
    /// `http_req_failed` and `p(N)<ms` for `http_req_duration`.
    pub fn parse(key: &str, expression: &str) -> Result<Self, ConfigError> {
        let source = format!("{}: {}", key.trim(), expression.trim());
        let invalid = |reason: String| ConfigError::InvalidThreshold {
            threshold: source.clone(),
            reason,
        };

        let (metric_name, scenario) = parse_key(key.trim()).map_err(invalid)?;
        let (aggregation, bound) = split_comparison(expression.trim()).map_err(invalid)?;

        let metric = match metric_name {
            FAILURE_RATE_METRIC => {
                if aggregation != "rate" {
                    return Err(invalid(format!(
                        "{FAILURE_RATE_METRIC} only supports `rate`, got `{aggregation}`"
                    )));
                }
                ThresholdMetric::FailureRate
            }
            DURATION_METRIC => ThresholdMetric::DurationPercentile(
                parse_percentile(aggregation).map_err(invalid)?,
            ),
            other => {
                return Err(invalid(format!(
                    "unknown metric `{other}`, expected `{FAILURE_RATE_METRIC}` or `{DURATION_METRIC}`"
                )))
            }
        };

        Ok(Self {
            source,
            metric,
            bound,
            scenario,
            required: true,
        })
    }

    /// Parse a threshold that was declared on a scenario, so it only applies to that scenario.
    pub fn parse_for_scenario(
        scenario: &str,
        key: &str,
        expression: &str,
    ) -> Result<Self, ConfigError> {
        let mut spec = Self::parse(key, expression)?;
        match &spec.scenario {
            Some(other) if other != scenario => Err(ConfigError::InvalidThreshold {
                threshold: spec.source,
                reason: format!("declared on scenario `{scenario}` but filtered to `{other}`"),
            }),
            _ => {
                spec.scenario = Some(scenario.to_string());
                Ok(spec)
            }
        }
    }

    /// Whether an inconclusive result fails the run. Defaults to `true`.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn metric(&self) -> ThresholdMetric {
        self.metric
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn scenario(&self) -> Option<&str> {
        self.scenario.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn applies_to(&self, scenario: &str) -> bool {
        self.scenario.as_deref().map_or(true, |s| s == scenario)
    }

    /// Evaluate against a snapshot. Passing requires the observed value to be strictly below the
    /// bound. No attempts, or no latency samples, is inconclusive.
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> ThresholdReport {
        let observed = match self.metric {
            ThresholdMetric::FailureRate => snapshot.failure_rate(),
            ThresholdMetric::DurationPercentile(p) => snapshot.percentile(p),
        };

        let outcome = match observed {
            None => ThresholdOutcome::Inconclusive,
            Some(value) if value < self.bound => ThresholdOutcome::Passed,
            Some(_) => ThresholdOutcome::Failed,
        };

        ThresholdReport {
            threshold: self.source.clone(),
            outcome,
            observed,
            required: self.required,
        }
    }
}

/// Evaluate every threshold that applies to `scenario_name` against its snapshot.
///
/// This is a pure function of its inputs, so it can be run against a live snapshot without
/// affecting the final result.
pub fn evaluate(
    scenario_name: &str,
    thresholds: &[ThresholdSpec],
    snapshot: &MetricSnapshot,
) -> BTreeMap<String, Vec<ThresholdReport>> {
    let results = thresholds
        .iter()
        .filter(|t| t.applies_to(scenario_name))
        .map(|t| t.evaluate(snapshot))
        .collect();

    BTreeMap::from([(scenario_name.to_string(), results)])
}

fn parse_key(key: &str) -> Result<(&str, Option<String>), String> {
    let Some((metric, filter)) = key.split_once('{') else {
        return Ok((key, None));
    };

    let filter = filter
        .strip_suffix('}')
        .ok_or_else(|| format!("unterminated filter in `{key}`"))?;
    let (tag, value) = filter
        .split_once(':')
        .ok_or_else(|| format!("filter `{filter}` should look like `scenario:name`"))?;

    if tag.trim() != "scenario" {
        return Err(format!("only `scenario` filters are supported, got `{}`", tag.trim()));
    }
    let value = value.trim();
    if value.is_empty() {
        return Err("empty scenario name in filter".to_string());
    }

    Ok((metric.trim(), Some(value.to_string())))
}

fn split_comparison(expression: &str) -> Result<(&str, f64), String> {
    if expression.contains("<=") || expression.contains('>') || expression.contains("==") {
        return Err("only the strict `<` comparator is supported".to_string());
    }

    let (aggregation, bound) = expression
        .split_once('<')
        .ok_or_else(|| format!("expected `<` in `{expression}`"))?;

    let bound = bound
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid bound `{}`: {e}", bound.trim()))?;
    if !bound.is_finite() || bound < 0.0 {
        return Err(format!("bound must be a finite non-negative number, got {bound}"));
    }

    Ok((aggregation.trim(), bound))
}

fn parse_percentile(aggregation: &str) -> Result<f64, String> {
    let value = aggregation
        .strip_prefix("p(")
        .and_then(|rest| rest.strip_suffix(')'))
        .or_else(|| aggregation.strip_prefix('p'))
        .ok_or_else(|| format!("{DURATION_METRIC} only supports `p(N)`, got `{aggregation}`"))?;

    let percentile = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid percentile `{value}`: {e}"))?;
    if !(0.0..=100.0).contains(&percentile) {
        return Err(format!("percentile must be in [0, 100], got {percentile}"));
    }

    Ok(percentile)
}
