use crate::cli::{GaleScenarioCli, ReporterOpt};
use crate::threshold::ThresholdSpec;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Name of the behaviour registered with
/// [crate::definition::ScenarioDefinitionBuilder::use_vu_behaviour].
pub const DEFAULT_BEHAVIOUR: &str = "default";
/// Name of the scenario created by `--vus` and `--duration`.
pub const DEFAULT_SCENARIO: &str = "default";

/// Invalid or missing configuration. Reported before any VU starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no target host configured, use --target-host or set TARGET_HOST")]
    MissingTargetHost,
    #[error("invalid target host `{value}`: {reason}")]
    InvalidTargetHost { value: String, reason: String },
    #[error("invalid threshold `{threshold}`: {reason}")]
    InvalidThreshold { threshold: String, reason: String },
    #[error("invalid scenario `{scenario}`: {reason}")]
    InvalidScenario { scenario: String, reason: String },
    #[error("scenario `{scenario}` runs behaviour `{exec}` which is not defined")]
    UnknownBehaviour { scenario: String, exec: String },
    #[error("no scenarios configured")]
    NoScenarios,
    #[error("failed to read config file {}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Start `vus` VUs at time zero and keep them running for `duration`.
    ConstantVus { vus: usize, duration: Duration },
    /// Move the VU count linearly from the previous target to each stage's target over the
    /// stage's duration, starting from `start_vus`.
    RampingVus { start_vus: usize, stages: Vec<Stage> },
}

/// One named load profile within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSpec {
    pub name: String,
    pub executor: ExecutorKind,
    /// The behaviour each VU of this scenario runs on every iteration.
    pub exec: String,
    /// Pause between iterations of each VU.
    pub think_time: Option<Duration>,
    /// Thresholds that only apply to this scenario.
    pub thresholds: Vec<ThresholdSpec>,
}

impl ScenarioSpec {
    pub fn constant(name: &str, vus: usize, duration: Duration) -> Self {
        Self::new(name, ExecutorKind::ConstantVus { vus, duration })
    }

    pub fn ramping(name: &str, stages: Vec<Stage>) -> Self {
        Self::new(
            name,
            ExecutorKind::RampingVus {
                start_vus: 0,
                stages,
            },
        )
    }

    fn new(name: &str, executor: ExecutorKind) -> Self {
        Self {
            name: name.to_string(),
            executor,
            exec: DEFAULT_BEHAVIOUR.to_string(),
            think_time: None,
            thresholds: Vec::new(),
        }
    }

    pub fn with_exec(mut self, exec: &str) -> Self {
        self.exec = exec.to_string();
        self
    }

    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = Some(think_time);
        self
    }

    /// Only meaningful for ramping scenarios.
    pub fn with_start_vus(mut self, vus: usize) -> Self {
        if let ExecutorKind::RampingVus { start_vus, .. } = &mut self.executor {
            *start_vus = vus;
        }
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdSpec) -> Self {
        self.thresholds.push(threshold);
        self
    }

    /// How long this scenario runs for, measured from the start of the run.
    pub fn duration(&self) -> Duration {
        match &self.executor {
            ExecutorKind::ConstantVus { duration, .. } => *duration,
            ExecutorKind::RampingVus { stages, .. } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// The most VUs this scenario will ever ask for.
    pub fn max_vus(&self) -> usize {
        match &self.executor {
            ExecutorKind::ConstantVus { vus, .. } => *vus,
            ExecutorKind::RampingVus { start_vus, stages } => stages
                .iter()
                .map(|s| s.target)
                .fold(*start_vus, usize::max),
        }
    }

    /// The number of VUs that should be active `elapsed` after the start of the run.
    ///
    /// Ramps interpolate linearly between stage targets and round to the nearest VU. Once the
    /// scenario's duration has passed this is always 0.
    pub fn desired_vus(&self, elapsed: Duration) -> usize {
        match &self.executor {
            ExecutorKind::ConstantVus { vus, duration } => {
                if elapsed < *duration {
                    *vus
                } else {
                    0
                }
            }
            ExecutorKind::RampingVus { start_vus, stages } => {
                let mut from = *start_vus as f64;
                let mut stage_start = Duration::ZERO;
                for stage in stages {
                    let stage_end = stage_start + stage.duration;
                    // Zero length stages are never entered, they just move `from`.
                    if elapsed < stage_end {
                        let progress = (elapsed - stage_start).as_secs_f64()
                            / stage.duration.as_secs_f64();
                        let to = stage.target as f64;
                        return (from + (to - from) * progress).round() as usize;
                    }
                    from = stage.target as f64;
                    stage_start = stage_end;
                }
                0
            }
        }
    }

    /// Human readable description of the load profile.
    pub fn plan(&self) -> String {
        match &self.executor {
            ExecutorKind::ConstantVus { vus, duration } => {
                format!(
                    "constant-vus {vus} for {}",
                    humantime::format_duration(*duration)
                )
            }
            ExecutorKind::RampingVus { start_vus, stages } => {
                let stages = stages
                    .iter()
                    .map(|s| format!("{} -> {}", humantime::format_duration(s.duration), s.target))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("ramping-vus from {start_vus}: {stages}")
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidScenario {
            scenario: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.name.contains(['{', '}', ':']) {
            return Err(invalid("name must not contain `{`, `}` or `:`"));
        }
        if self.exec.trim().is_empty() {
            return Err(invalid("exec must not be empty"));
        }

        match &self.executor {
            ExecutorKind::ConstantVus { vus, duration } => {
                if *vus == 0 {
                    return Err(invalid("constant-vus needs at least one VU"));
                }
                if duration.is_zero() {
                    return Err(invalid("constant-vus needs a non-zero duration"));
                }
            }
            ExecutorKind::RampingVus { stages, .. } => {
                if stages.is_empty() {
                    return Err(invalid("ramping-vus needs at least one stage"));
                }
                if self.duration().is_zero() {
                    return Err(invalid("ramping-vus stages must add up to a non-zero duration"));
                }
            }
        }

        Ok(())
    }
}

/// Defaults declared in code by a scenario binary. Overridden by the config file and the CLI.
#[derive(Debug, Clone, Default)]
pub struct ConfigDefaults {
    pub target_host: Option<String>,
    pub scenarios: Vec<ScenarioSpec>,
    /// `(metric key, expression)` pairs
    pub thresholds: Vec<(String, String)>,
}

/// Fully resolved configuration for a run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub target_host: Url,
    pub scenarios: Vec<ScenarioSpec>,
    /// Thresholds declared for the whole run. They apply to every scenario unless filtered.
    pub thresholds: Vec<ThresholdSpec>,
    pub request_timeout: Duration,
    pub graceful_stop: Duration,
    pub tick_interval: Duration,
    pub reporter: ReporterOpt,
    pub outcome_dir: PathBuf,
    pub report_path: Option<PathBuf>,
    pub run_summary_path: PathBuf,
    pub run_id: Option<String>,
    pub no_progress: bool,
}

impl RunOptions {
    /// Resolve the configuration from CLI flags, then the config file, then the defaults declared
    /// in code.
    pub fn resolve(cli: &GaleScenarioCli, defaults: ConfigDefaults) -> Result<Self, ConfigError> {
        let file = cli
            .config
            .as_deref()
            .map(FileConfig::load)
            .transpose()?
            .unwrap_or_default();

        let target_host = cli
            .target_host
            .clone()
            .or(file.target_host)
            .or(defaults.target_host)
            .ok_or(ConfigError::MissingTargetHost)?;
        let target_host = parse_target_host(&target_host)?;

        let thresholds = match file.thresholds {
            Some(thresholds) => parse_threshold_table(None, thresholds)?,
            None => defaults
                .thresholds
                .iter()
                .map(|(key, expression)| ThresholdSpec::parse(key, expression))
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut scenarios = match file.scenarios {
            Some(scenarios) if !scenarios.is_empty() => scenarios
                .into_iter()
                .map(|(name, scenario)| scenario.into_spec(&name))
                .collect::<Result<Vec<_>, _>>()?,
            _ => defaults.scenarios,
        };

        if cli.vus.is_some() || cli.duration.is_some() {
            scenarios = vec![command_line_scenario(cli, &scenarios)?];
        }

        let options = Self {
            target_host,
            scenarios,
            thresholds,
            request_timeout: cli
                .request_timeout
                .or(file.request_timeout.map(|d| d.0))
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            graceful_stop: cli
                .graceful_stop
                .or(file.graceful_stop.map(|d| d.0))
                .unwrap_or(DEFAULT_GRACEFUL_STOP),
            tick_interval: file
                .tick_interval
                .map(|d| d.0)
                .unwrap_or(DEFAULT_TICK_INTERVAL),
            reporter: cli.reporter,
            outcome_dir: cli.outcome_dir.clone(),
            report_path: cli.report_path.clone(),
            run_summary_path: cli.run_summary_path.clone(),
            run_id: cli.run_id.clone(),
            no_progress: cli.no_progress,
        };
        options.validate()?;

        Ok(options)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios.is_empty() {
            return Err(ConfigError::NoScenarios);
        }

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                return Err(ConfigError::InvalidScenario {
                    scenario: scenario.name.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
        }

        for threshold in &self.thresholds {
            if let Some(scenario) = threshold.scenario() {
                if !names.contains(scenario) {
                    return Err(ConfigError::InvalidThreshold {
                        threshold: threshold.source().to_string(),
                        reason: format!("there is no scenario named `{scenario}`"),
                    });
                }
            }
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidScenario {
                scenario: "*".to_string(),
                reason: "tick_interval must be non-zero".to_string(),
            });
        }

        Ok(())
    }

    /// The planned duration of the run, which is the longest scenario duration.
    pub fn run_duration(&self) -> Duration {
        self.scenarios
            .iter()
            .map(ScenarioSpec::duration)
            .max()
            .unwrap_or_default()
    }

    /// Every threshold that applies to `scenario`, run level ones first.
    pub fn thresholds_for(&self, scenario: &ScenarioSpec) -> Vec<ThresholdSpec> {
        self.thresholds
            .iter()
            .filter(|t| t.applies_to(&scenario.name))
            .chain(scenario.thresholds.iter())
            .cloned()
            .collect()
    }

    /// Every declared threshold, as written.
    pub fn threshold_sources(&self) -> Vec<String> {
        self.thresholds
            .iter()
            .chain(self.scenarios.iter().flat_map(|s| s.thresholds.iter()))
            .map(|t| t.source().to_string())
            .collect()
    }
}

fn parse_target_host(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidTargetHost {
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "scheme must be http or https, got {}",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

fn command_line_scenario(
    cli: &GaleScenarioCli,
    configured: &[ScenarioSpec],
) -> Result<ScenarioSpec, ConfigError> {
    let duration = match cli.duration {
        Some(duration) => duration,
        None => configured
            .iter()
            .map(ScenarioSpec::duration)
            .max()
            .ok_or_else(|| ConfigError::InvalidScenario {
                scenario: DEFAULT_SCENARIO.to_string(),
                reason: "--vus needs --duration when no scenarios are configured".to_string(),
            })?,
    };

    let mut scenario = ScenarioSpec::constant(DEFAULT_SCENARIO, cli.vus.unwrap_or(1), duration);
    // Keep the pacing of the scenario that runs the default behaviour.
    scenario.think_time = configured
        .iter()
        .find(|s| s.exec == DEFAULT_BEHAVIOUR)
        .and_then(|s| s.think_time);

    Ok(scenario)
}

fn parse_threshold_table(
    scenario: Option<&str>,
    table: BTreeMap<String, ThresholdExprs>,
) -> Result<Vec<ThresholdSpec>, ConfigError> {
    let mut thresholds = Vec::new();
    for (key, expressions) in table {
        for entry in expressions.into_entries() {
            let (expression, required) = match entry {
                ThresholdEntry::Expression(expression) => (expression, true),
                ThresholdEntry::Detailed {
                    threshold,
                    required,
                } => (threshold, required),
            };
            let spec = match scenario {
                Some(scenario) => ThresholdSpec::parse_for_scenario(scenario, &key, &expression)?,
                None => ThresholdSpec::parse(&key, &expression)?,
            };
            thresholds.push(spec.with_required(required));
        }
    }
    Ok(thresholds)
}

/// The TOML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    target_host: Option<String>,
    request_timeout: Option<ConfigDuration>,
    graceful_stop: Option<ConfigDuration>,
    tick_interval: Option<ConfigDuration>,
    thresholds: Option<BTreeMap<String, ThresholdExprs>>,
    scenarios: Option<BTreeMap<String, ScenarioConfig>>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ExecutorName {
    #[default]
    ConstantVus,
    RampingVus,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioConfig {
    #[serde(default)]
    executor: ExecutorName,
    vus: Option<usize>,
    duration: Option<ConfigDuration>,
    start_vus: Option<usize>,
    #[serde(default)]
    stages: Vec<StageConfig>,
    exec: Option<String>,
    think_time: Option<ConfigDuration>,
    #[serde(default)]
    thresholds: BTreeMap<String, ThresholdExprs>,
}

impl ScenarioConfig {
    fn into_spec(self, name: &str) -> Result<ScenarioSpec, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidScenario {
            scenario: name.to_string(),
            reason: reason.to_string(),
        };

        let executor = match self.executor {
            ExecutorName::ConstantVus => {
                if !self.stages.is_empty() || self.start_vus.is_some() {
                    return Err(invalid("`stages` and `start_vus` need executor = \"ramping-vus\""));
                }
                ExecutorKind::ConstantVus {
                    vus: self.vus.unwrap_or(1),
                    duration: self
                        .duration
                        .ok_or_else(|| invalid("constant-vus needs a `duration`"))?
                        .0,
                }
            }
            ExecutorName::RampingVus => {
                if self.vus.is_some() || self.duration.is_some() {
                    return Err(invalid("ramping-vus is configured with `stages`, not `vus` and `duration`"));
                }
                ExecutorKind::RampingVus {
                    start_vus: self.start_vus.unwrap_or(0),
                    stages: self
                        .stages
                        .into_iter()
                        .map(|s| Stage::new(s.duration.0, s.target))
                        .collect(),
                }
            }
        };

        Ok(ScenarioSpec {
            name: name.to_string(),
            executor,
            exec: self.exec.unwrap_or_else(|| DEFAULT_BEHAVIOUR.to_string()),
            think_time: self.think_time.map(|d| d.0),
            thresholds: parse_threshold_table(Some(name), self.thresholds)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageConfig {
    duration: ConfigDuration,
    target: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdExprs {
    One(ThresholdEntry),
    Many(Vec<ThresholdEntry>),
}

impl ThresholdExprs {
    fn into_entries(self) -> Vec<ThresholdEntry> {
        match self {
            ThresholdExprs::One(entry) => vec![entry],
            ThresholdExprs::Many(entries) => entries,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThresholdEntry {
    Expression(String),
    Detailed {
        threshold: String,
        #[serde(default = "required_by_default")]
        required: bool,
    },
}

fn required_by_default() -> bool {
    true
}

/// A duration written as a human readable string such as `30s` or `1m 30s`, or as whole seconds.
#[derive(Debug, Clone, Copy)]
struct ConfigDuration(Duration);

impl<'de> Deserialize<'de> for ConfigDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = ConfigDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as a string (e.g. 10s) or integer seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ConfigDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|v| ConfigDuration(Duration::from_secs(v)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                humantime::parse_duration(v)
                    .map(ConfigDuration)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_any(V)
    }
}
