//! Avoid-rule configuration parser.
//!
//! A config names the rules to run, the device each one forbids, custom
//! declarative patterns, and what the runner does when a rule fails. Rules
//! can be given as `[[rules]]` tables or as compact entries in the `avoid`
//! string (`"P:RMSNorm/NPU,Op:Sqrt/NPU"`).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::types::OpKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvoidConfig {
    #[serde(default)]
    pub on_error: OnError,
    /// Compact, comma separated rule entries.
    #[serde(default)]
    pub avoid: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

/// What a rule-set run does after a rule fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Stop the whole pass at the first failing rule.
    #[default]
    Abort,
    /// Record the failure and keep running the remaining rules.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Library or custom pattern name. Exclusive with `op`.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Single operation kind to avoid. Exclusive with `pattern`.
    #[serde(default)]
    pub op: Option<OpKind>,
    pub device: String,
    #[serde(default)]
    pub params: PatternParams,
}

/// Parameters for library patterns that accept them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternParams {
    #[serde(default)]
    pub vocab_size: Option<usize>,
    #[serde(default)]
    pub hidden_size: Option<usize>,
}

/// What a rule matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    Pattern(String),
    Op(OpKind),
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Pattern(name) => write!(f, "P:{name}"),
            RuleTarget::Op(kind) => write!(f, "Op:{kind}"),
        }
    }
}

impl RuleConfig {
    pub fn target(&self) -> GraphResult<RuleTarget> {
        match (&self.pattern, self.op) {
            (Some(pattern), None) => Ok(RuleTarget::Pattern(pattern.clone())),
            (None, Some(op)) => Ok(RuleTarget::Op(op)),
            (Some(_), Some(_)) => Err(self.invalid("both `pattern` and `op` are set")),
            (None, None) => Err(self.invalid("one of `pattern` or `op` is required")),
        }
    }

    /// Explicit name, or `<target>/<device>`.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.target() {
            Ok(target) => format!("{target}/{}", self.device),
            Err(_) => format!("?/{}", self.device),
        }
    }

    fn invalid(&self, reason: &str) -> GraphError {
        GraphError::InvalidRule {
            rule: self.name.clone().unwrap_or_else(|| format!("?/{}", self.device)),
            reason: reason.to_string(),
        }
    }
}

/// One compact entry: `P:<Pattern>/<Device>` or `Op:<OpKind>/<Device>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvoidEntry {
    pub target: RuleTarget,
    pub device: String,
}

impl FromStr for AvoidEntry {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| GraphError::InvalidAvoidEntry {
            entry: s.to_string(),
            reason: reason.to_string(),
        };

        let (target, device) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected <target>/<device>"))?;
        let device = device.trim();
        if device.is_empty() {
            return Err(invalid("device is empty"));
        }

        let (kind, name) = target
            .split_once(':')
            .ok_or_else(|| invalid("expected P:<pattern> or Op:<kind>"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("target name is empty"));
        }

        let target = match kind.trim().to_ascii_lowercase().as_str() {
            "p" => RuleTarget::Pattern(name.to_string()),
            "op" => RuleTarget::Op(
                name.parse()
                    .map_err(|_| invalid(&format!("unknown operation kind {name:?}")))?,
            ),
            other => return Err(invalid(&format!("unknown target prefix {other:?}"))),
        };

        Ok(AvoidEntry {
            target,
            device: device.to_string(),
        })
    }
}

impl From<AvoidEntry> for RuleConfig {
    fn from(entry: AvoidEntry) -> Self {
        let (pattern, op) = match entry.target {
            RuleTarget::Pattern(name) => (Some(name), None),
            RuleTarget::Op(kind) => (None, Some(kind)),
        };
        RuleConfig {
            name: None,
            pattern,
            op,
            device: entry.device,
            params: PatternParams::default(),
        }
    }
}

/// Declarative pattern: slots reference each other by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub root: String,
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,
    #[serde(flatten)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub inputs: Vec<InputConfig>,
    #[serde(default)]
    pub commutative: bool,
}

/// A slot input: another slot's name, `"*"` for any producer, or an inline
/// filter the producer must satisfy without being bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputConfig {
    Slot(String),
    Guard(FilterConfig),
}

impl InputConfig {
    pub const ANY: &'static str = "*";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub op: Option<OpKind>,
    #[serde(default)]
    pub ops: Vec<OpKind>,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub shape: Option<Vec<usize>>,
    #[serde(default)]
    pub rank: Option<usize>,
    #[serde(default)]
    pub scalar: Option<f64>,
    #[serde(default)]
    pub element_type: Option<String>,
}

impl AvoidConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> GraphResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parsed compact entries from the `avoid` string.
    pub fn entries(&self) -> GraphResult<Vec<AvoidEntry>> {
        let Some(avoid) = &self.avoid else {
            return Ok(Vec::new());
        };
        avoid
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<AvoidEntry>())
            .collect()
    }

    /// Every rule, compact entries first, then `[[rules]]` in file order.
    pub fn all_rules(&self) -> GraphResult<Vec<RuleConfig>> {
        let mut rules: Vec<RuleConfig> = self.entries()?.into_iter().map(RuleConfig::from).collect();
        for rule in &self.rules {
            rule.target()?;
            rules.push(rule.clone());
        }
        Ok(rules)
    }

    pub fn pattern(&self, name: &str) -> Option<&PatternConfig> {
        self.patterns.iter().find(|p| p.name == name)
    }
}
