//! Job steps: synthesized steps built in code, and user steps carried as YAML.

pub mod tracker;

use indexmap::IndexMap;
use serde_yaml::Value;

pub use tracker::{StepOrderTracker, SCANNABLE_ROOTS};

/// A step the compiler builds itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub if_condition: Option<String>,
    pub continue_on_error: bool,
    pub timeout_minutes: Option<i64>,
    pub uses: Option<String>,
    pub env: IndexMap<String, String>,
    pub working_directory: Option<String>,
    pub shell: Option<String>,
    pub run: Option<String>,
    pub with: IndexMap<String, String>,
}

impl Step {
    pub fn run<N: Into<String>, S: Into<String>>(name: N, script: S) -> Self {
        Step {
            name: Some(name.into()),
            run: Some(script.into()),
            ..Step::default()
        }
    }

    /// `action` is the full `uses:` value, already pinned.
    pub fn uses<N: Into<String>, A: Into<String>>(name: N, action: A) -> Self {
        Step {
            name: Some(name.into()),
            uses: Some(action.into()),
            ..Step::default()
        }
    }

    pub fn id<T: Into<String>>(mut self, id: T) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn when<T: Into<String>>(mut self, condition: T) -> Self {
        self.if_condition = Some(condition.into());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.env.insert(key.into(), value.into());
        }
        self
    }

    pub fn input<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, minutes: i64) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.continue_on_error = true;
        self
    }
}

/// One entry of a job's `steps:` list.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEntry {
    Built(Step),
    /// A step copied from the workflow source, emitted as YAML
    Raw(Value),
}

impl StepEntry {
    pub fn name(&self) -> Option<String> {
        match self {
            StepEntry::Built(step) => step.name.clone(),
            StepEntry::Raw(value) => value.get("name").and_then(Value::as_str).map(str::to_string),
        }
    }

    pub fn uses(&self) -> Option<String> {
        match self {
            StepEntry::Built(step) => step.uses.clone(),
            StepEntry::Raw(value) => value.get("uses").and_then(Value::as_str).map(str::to_string),
        }
    }

    pub fn run(&self) -> Option<String> {
        match self {
            StepEntry::Built(step) => step.run.clone(),
            StepEntry::Raw(value) => value.get("run").and_then(Value::as_str).map(str::to_string),
        }
    }

    /// `with.<key>` as text.
    pub fn input(&self, key: &str) -> Option<String> {
        match self {
            StepEntry::Built(step) => step.with.get(key).cloned(),
            StepEntry::Raw(value) => value
                .get("with")
                .and_then(|with| with.get(key))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

impl From<Step> for StepEntry {
    fn from(step: Step) -> Self {
        StepEntry::Built(step)
    }
}
