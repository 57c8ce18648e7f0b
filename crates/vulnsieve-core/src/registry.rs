//! Task registry and dispatch.
//!
//! Collaborators are looked up by task name (after alias resolution),
//! loaded from a module table filled in at startup, and invoked through
//! the [`Plugin`] entry contract. [`Registry::dispatch`] returns an
//! [`Outcome`] rather than a `Result`: every load or run fault, including
//! a panic inside the collaborator, comes back as a displayable value.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::PluginError;

pub type PluginResult = Result<PluginOutput, PluginError>;

/// Entry contract for a collaborator.
///
/// `run_plugin` is the primary entry point and `run` the fallback. Both
/// default to absent (`None`); a collaborator implements at least one.
pub trait Plugin {
    fn run_plugin(&self, _args: &PluginArgs) -> Option<PluginResult> {
        None
    }

    fn run(&self, _args: &PluginArgs) -> Option<PluginResult> {
        None
    }
}

pub type Loader = Box<dyn Fn() -> Result<Box<dyn Plugin>, PluginError>>;

/// What a collaborator hands back; dispatch passes it through untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginOutput {
    Text(String),
    Json(Value),
}

impl fmt::Display for PluginOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginOutput::Text(text) => f.write_str(text),
            PluginOutput::Json(value) => write!(f, "{value:#}"),
        }
    }
}

/// String-keyed arguments. Accepted keys are up to each collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginArgs(Map<String, Value>);

impl PluginArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, PluginError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_str()
                .ok_or_else(|| PluginError::invalid_argument(key, "expected a string")),
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, PluginError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .ok_or_else(|| PluginError::invalid_argument(key, "expected a non-negative integer")),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, PluginError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| PluginError::invalid_argument(key, "expected true or false")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for PluginArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for PluginArgs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub task: String,
    pub category: String,
    pub module: String,
}

impl PluginDescriptor {
    pub fn new(task: &str, category: &str, module: &str) -> Self {
        Self {
            task: task.to_string(),
            category: category.to_string(),
            module: module.to_string(),
        }
    }
}

/// Result of a dispatch. Never a raw fault.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Completed(PluginOutput),
    UnknownPlugin(String),
    Failed { task: String, error: PluginError },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed(output) => output.fmt(f),
            Outcome::UnknownPlugin(task) => write!(f, "[!] Unknown plugin: {task}"),
            Outcome::Failed { error, .. } => write!(f, "[!] Plugin execution failed: {error}"),
        }
    }
}

/// Read-only once built.
pub struct Registry {
    descriptors: BTreeMap<String, PluginDescriptor>,
    aliases: BTreeMap<String, String>,
    modules: HashMap<String, Loader>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Canonical task name for `task`; the name itself when no alias exists.
    pub fn resolve<'a>(&'a self, task: &'a str) -> &'a str {
        self.aliases.get(task).map(String::as_str).unwrap_or(task)
    }

    pub fn get(&self, task: &str) -> Option<&PluginDescriptor> {
        self.descriptors.get(self.resolve(task))
    }

    /// Registered tasks in name order.
    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> + '_ {
        self.descriptors.values()
    }

    /// `(alias, canonical task)` pairs in alias order.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.aliases
            .iter()
            .map(|(alias, task)| (alias.as_str(), task.as_str()))
    }

    pub fn dispatch(&self, task: &str, args: &PluginArgs) -> Outcome {
        let resolved = self.resolve(task);
        let Some(descriptor) = self.descriptors.get(resolved) else {
            warn!(task, "unknown plugin");
            return Outcome::UnknownPlugin(task.to_string());
        };
        debug!(task, resolved, module = %descriptor.module, "dispatching");

        let invoked = contain(|| self.invoke(descriptor, args));
        let error = match invoked {
            Ok(Ok(output)) => return Outcome::Completed(output),
            Ok(Err(error)) => error,
            Err(payload) => PluginError::Panicked(panic_message(&*payload)),
        };
        warn!(task = resolved, error = %error, "plugin failed");
        Outcome::Failed {
            task: resolved.to_string(),
            error,
        }
    }

    fn invoke(&self, descriptor: &PluginDescriptor, args: &PluginArgs) -> PluginResult {
        let plugin = self.load(descriptor)?;
        if let Some(result) = plugin.run_plugin(args) {
            return result;
        }
        if let Some(result) = plugin.run(args) {
            return result;
        }
        Err(PluginError::MissingEntryPoint(descriptor.module.clone()))
    }

    fn load(&self, descriptor: &PluginDescriptor) -> Result<Box<dyn Plugin>, PluginError> {
        let loader = self
            .modules
            .get(&descriptor.module)
            .ok_or_else(|| PluginError::ModuleNotFound {
                category: descriptor.category.clone(),
                module: descriptor.module.clone(),
            })?;
        loader()
    }
}

thread_local! {
    static IN_PLUGIN: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

// Chains onto the existing hook once per process. Panics raised while a
// plugin runs on this thread go to the log instead of stderr; every other
// panic reaches the previous hook unchanged.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_PLUGIN.try_with(Cell::get).unwrap_or(false) {
                debug!(panic = %info, "plugin panic contained");
                return;
            }
            previous(info);
        }));
    });
}

struct PluginScope {
    outer: bool,
}

impl PluginScope {
    fn enter() -> Self {
        Self {
            outer: IN_PLUGIN.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for PluginScope {
    fn drop(&mut self) {
        IN_PLUGIN.with(|flag| flag.set(self.outer));
    }
}

fn contain<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    install_quiet_hook();
    let _scope = PluginScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "unknown panic".to_string()
}

pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: Registry {
                descriptors: BTreeMap::new(),
                aliases: BTreeMap::new(),
                modules: HashMap::new(),
            },
        }
    }

    pub fn with_plugin(mut self, descriptor: PluginDescriptor) -> Self {
        self.registry
            .descriptors
            .insert(descriptor.task.clone(), descriptor);
        self
    }

    pub fn with_alias(mut self, alias: &str, task: &str) -> Self {
        self.registry
            .aliases
            .insert(alias.to_string(), task.to_string());
        self
    }

    pub fn with_module<F>(mut self, module: &str, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Plugin>, PluginError> + 'static,
    {
        self.registry
            .modules
            .insert(module.to_string(), Box::new(loader));
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
