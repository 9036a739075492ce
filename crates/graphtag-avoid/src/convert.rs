//! Conversion from configuration types to runnable rules.
//!
//! Maps `graphtag_core::config` types to avoid-crate domain types: custom
//! `[[patterns]]` become [`Pattern`]s, rule entries become [`AvoidRule`]s.

use graphtag_core::{AvoidConfig, RuleConfig, RuleTarget};
use graphtag_pattern::{Pattern, library};
use tracing::debug;

use crate::error::{AvoidError, AvoidResult};
use crate::registry::GroupRegistry;
use crate::rule::AvoidRule;
use crate::runner::RuleSet;

/// Resolve the pattern a rule refers to.
///
/// Custom patterns declared in `config` shadow library patterns of the same
/// name. `Op:` targets become single-node patterns.
pub fn resolve_pattern(rule: &RuleConfig, config: &AvoidConfig) -> AvoidResult<Pattern> {
    match rule.target()? {
        RuleTarget::Op(kind) => Ok(library::single_op(kind)),
        RuleTarget::Pattern(name) => {
            if let Some(custom) = config.pattern(&name) {
                return Ok(Pattern::from_config(custom)?);
            }
            library::by_name(&name, &rule.params).ok_or(AvoidError::UnknownPattern(name))
        }
    }
}

/// Build a [`RuleSet`] from configuration.
///
/// Every custom pattern is validated first, used or not, so a malformed
/// declaration fails here rather than halfway through a pass. Rules come
/// out compact entries first, then `[[rules]]` in file order.
pub fn rule_set_from_config<'r>(
    config: &AvoidConfig,
    registry: &'r dyn GroupRegistry,
) -> AvoidResult<RuleSet<'r>> {
    for custom in &config.patterns {
        Pattern::from_config(custom)?;
    }

    let mut set = RuleSet::new(config.on_error);
    for rule in config.all_rules()? {
        let pattern = resolve_pattern(&rule, config)?;
        let name = rule.display_name();
        debug!(rule = %name, pattern = %pattern.name(), device = %rule.device, "configured avoid rule");
        set.push(AvoidRule::new(name, pattern, rule.device, registry));
    }
    Ok(set)
}
