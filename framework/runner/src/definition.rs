use std::collections::HashMap;
use std::sync::Arc;

use crate::cli::GaleScenarioCli;
use crate::config::{ConfigDefaults, ConfigError, RunOptions, ScenarioSpec, DEFAULT_BEHAVIOUR};
use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::init::init;

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type VuHookMut<RV, V> = fn(&mut VuContext<RV, V>) -> HookResult;

/// The builder for a scenario definition.
///
/// This must be used at the start of a scenario binary to define what you want to run. The load
/// profiles and thresholds declared here are defaults, which can be replaced from a config file
/// or the command line.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario suite, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: GaleScenarioCli,
    defaults: ConfigDefaults,
    /// Global setup hook. It will be run once, before any VUs are started.
    ///
    /// An error from this hook aborts the run.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a VU, which will be run once for each VU as it starts.
    ///
    /// An error from this hook stops that VU only.
    setup_vu_fn: Option<VuHookMut<RV, V>>,
    /// The VU behaviours, keyed by name. Each scenario picks one with its `exec` option.
    vu_behaviour: HashMap<String, VuHookMut<RV, V>>,
    /// Teardown hook for a VU, run once the VU has been told to stop.
    teardown_vu_fn: Option<VuHookMut<RV, V>>,
    /// Global teardown hook, run after every VU has stopped. This is best effort, errors are
    /// logged and do not change the outcome of the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) options: RunOptions,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_vu_fn: Option<VuHookMut<RV, V>>,
    pub(crate) vu_behaviour: HashMap<String, VuHookMut<RV, V>>,
    pub(crate) teardown_vu_fn: Option<VuHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    pub fn new(name: &str, cli: GaleScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            defaults: ConfigDefaults::default(),
            setup_fn: None,
            setup_vu_fn: None,
            vu_behaviour: HashMap::new(),
            teardown_vu_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise logging, parse the command line and create a new scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, init())
    }

    /// The target host to use when neither the command line nor the config file set one.
    pub fn with_default_target_host(mut self, target_host: &str) -> Self {
        self.defaults.target_host = Some(target_host.to_string());
        self
    }

    /// Add a scenario to run when the config file does not declare any.
    pub fn with_default_scenario(mut self, scenario: ScenarioSpec) -> Self {
        self.defaults.scenarios.push(scenario);
        self
    }

    /// Add a run level threshold to use when the config file does not declare any. For example
    /// `with_default_threshold("http_req_duration", "p(95)<3000")`.
    pub fn with_default_threshold(mut self, key: &str, expression: &str) -> Self {
        self.defaults
            .thresholds
            .push((key.to_string(), expression.to_string()));
        self
    }

    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    pub fn use_vu_setup(mut self, setup_vu_fn: VuHookMut<RV, V>) -> Self {
        self.setup_vu_fn = Some(setup_vu_fn);
        self
    }

    /// Set the behaviour that scenarios run when they do not name one.
    pub fn use_vu_behaviour(self, behaviour: VuHookMut<RV, V>) -> Self {
        self.use_named_vu_behaviour(DEFAULT_BEHAVIOUR, behaviour)
    }

    /// Register a behaviour that scenarios can run by setting `exec` to `name`.
    pub fn use_named_vu_behaviour(mut self, name: &str, behaviour: VuHookMut<RV, V>) -> Self {
        let previous = self.vu_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    pub fn use_vu_teardown(mut self, teardown_vu_fn: VuHookMut<RV, V>) -> Self {
        self.teardown_vu_fn = Some(teardown_vu_fn);
        self
    }

    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> Result<ScenarioDefinition<RV, V>, ConfigError> {
        let options = RunOptions::resolve(&self.cli, self.defaults)?;

        for scenario in &options.scenarios {
            if !self.vu_behaviour.contains_key(&scenario.exec) {
                return Err(ConfigError::UnknownBehaviour {
                    scenario: scenario.name.clone(),
                    exec: scenario.exec.clone(),
                });
            }
        }

        Ok(ScenarioDefinition {
            name: self.name,
            options,
            setup_fn: self.setup_fn,
            setup_vu_fn: self.setup_vu_fn,
            vu_behaviour: self.vu_behaviour,
            teardown_vu_fn: self.teardown_vu_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}
