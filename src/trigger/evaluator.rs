//! Trigger Evaluator (C6, spec §4.6). Holds a hot-reloadable rule list
//! (replaced atomically under a short lock per spec §5's "pointer/handle
//! swap" guidance) and per-(mint, rule) cooldown state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::counters::AggregateSnapshot;
use crate::error::TriggerError;
use crate::model::RawTriggerRule;
use crate::trigger::rule::{compile_rules, CompiledRule};

pub struct TriggerEvaluator {
    rules: Mutex<Arc<Vec<CompiledRule>>>,
    last_fired: Mutex<HashMap<(String, String), i64>>,
}

impl TriggerEvaluator {
    pub fn new(initial: &[RawTriggerRule]) -> Result<Self, TriggerError> {
        let compiled = compile_rules(initial)?;
        Ok(Self {
            rules: Mutex::new(Arc::new(compiled)),
            last_fired: Mutex::new(HashMap::new()),
        })
    }

    /// Hot reload: validate and compile the whole batch before touching the
    /// live rule list. A failure leaves existing rules intact (spec §4.6).
    pub fn reload(&self, raw: &[RawTriggerRule]) -> Result<(), TriggerError> {
        let compiled = compile_rules(raw)?;
        let mut rules = self.rules.lock().unwrap();
        *rules = Arc::new(compiled);
        Ok(())
    }

    pub fn current_rules(&self) -> Arc<Vec<CompiledRule>> {
        self.rules.lock().unwrap().clone()
    }

    /// Evaluates all enabled rules against `mint`'s snapshot. Returns the
    /// names of rules that fired and were not suppressed by cooldown.
    pub fn evaluate(&self, mint: &str, snapshot: &AggregateSnapshot, now: i64, cooldown_seconds: i64) -> Vec<String> {
        let rules = self.current_rules();
        let mut fired = Vec::new();
        let mut last_fired = self.last_fired.lock().unwrap();
        for rule in rules.iter() {
            if !rule.evaluate(snapshot) {
                continue;
            }
            let key = (mint.to_string(), rule.name.clone());
            let suppressed = last_fired.get(&key).map(|&t| now - t < cooldown_seconds).unwrap_or(false);
            if suppressed {
                continue;
            }
            last_fired.insert(key, now);
            fired.push(rule.name.clone());
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPredicate;

    fn rule(name: &str, field: &str, op: &str, literal: f64) -> RawTriggerRule {
        RawTriggerRule {
            name: name.to_string(),
            enabled: true,
            conditions: vec![RawPredicate { field: field.to_string(), op: op.to_string(), literal }],
        }
    }

    #[test]
    fn fires_once_then_suppressed_within_cooldown() {
        let evaluator = TriggerEvaluator::new(&[rule("r1", "buy_count_5m", ">=", 1.0)]).unwrap();
        let mut snap = AggregateSnapshot::default();
        snap.five_min.buy_count = 5;

        let fired = evaluator.evaluate("M", &snap, 100, 300);
        assert_eq!(fired, vec!["r1".to_string()]);

        let fired_again = evaluator.evaluate("M", &snap, 150, 300);
        assert!(fired_again.is_empty());

        let fired_after_cooldown = evaluator.evaluate("M", &snap, 500, 300);
        assert_eq!(fired_after_cooldown, vec!["r1".to_string()]);
    }

    #[test]
    fn bad_reload_leaves_existing_rules_intact() {
        let evaluator = TriggerEvaluator::new(&[rule("r1", "buy_count_5m", ">=", 1.0)]).unwrap();
        let bad = vec![rule("r2", "nonexistent_field", ">=", 1.0)];
        let result = evaluator.reload(&bad);
        assert!(result.is_err());

        let mut snap = AggregateSnapshot::default();
        snap.five_min.buy_count = 5;
        let fired = evaluator.evaluate("M", &snap, 100, 300);
        assert_eq!(fired, vec!["r1".to_string()]);
    }

    #[test]
    fn disabled_rule_never_fires() {
        let mut r = rule("r1", "buy_count_5m", ">=", 1.0);
        r.enabled = false;
        let evaluator = TriggerEvaluator::new(&[r]).unwrap();
        let mut snap = AggregateSnapshot::default();
        snap.five_min.buy_count = 100;
        assert!(evaluator.evaluate("M", &snap, 100, 300).is_empty());
    }
}
