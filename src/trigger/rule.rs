//! Compiles raw trigger rules into a typed, validated form (spec §4.6, §9:
//! "replace dynamic attribute access with a typed compilation step").

use crate::counters::AggregateSnapshot;
use crate::error::TriggerError;
use crate::model::{Op, RawTriggerRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    BuyCount5m,
    SellCount5m,
    UniqueBuyers5m,
    UniqueSellers5m,
    BuyVolumeSol5m,
    SellVolumeSol5m,
    AvgBuySize5m,
    BuySellRatio5m,
    Top3BuyersVolumeShare5m,
    NewWalletPct5m,
    BuyCount1h,
    SellCount1h,
    UniqueBuyers1h,
    UniqueSellers1h,
    BuyVolumeSol1h,
    SellVolumeSol1h,
    AvgBuySize1h,
    BuySellRatio1h,
    Top3BuyersVolumeShare1h,
    NewWalletPct1h,
}

impl FieldId {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "buy_count_5m" => FieldId::BuyCount5m,
            "sell_count_5m" => FieldId::SellCount5m,
            "unique_buyers_5m" => FieldId::UniqueBuyers5m,
            "unique_sellers_5m" => FieldId::UniqueSellers5m,
            "buy_volume_sol_5m" => FieldId::BuyVolumeSol5m,
            "sell_volume_sol_5m" => FieldId::SellVolumeSol5m,
            "avg_buy_size_5m" => FieldId::AvgBuySize5m,
            "buy_sell_ratio_5m" => FieldId::BuySellRatio5m,
            "top_3_buyers_volume_share_5m" => FieldId::Top3BuyersVolumeShare5m,
            "new_wallet_pct_5m" => FieldId::NewWalletPct5m,
            "buy_count_1h" => FieldId::BuyCount1h,
            "sell_count_1h" => FieldId::SellCount1h,
            "unique_buyers_1h" => FieldId::UniqueBuyers1h,
            "unique_sellers_1h" => FieldId::UniqueSellers1h,
            "buy_volume_sol_1h" => FieldId::BuyVolumeSol1h,
            "sell_volume_sol_1h" => FieldId::SellVolumeSol1h,
            "avg_buy_size_1h" => FieldId::AvgBuySize1h,
            "buy_sell_ratio_1h" => FieldId::BuySellRatio1h,
            "top_3_buyers_volume_share_1h" => FieldId::Top3BuyersVolumeShare1h,
            "new_wallet_pct_1h" => FieldId::NewWalletPct1h,
            _ => return None,
        })
    }

    pub fn read(&self, snap: &AggregateSnapshot) -> f64 {
        match self {
            FieldId::BuyCount5m => snap.five_min.buy_count as f64,
            FieldId::SellCount5m => snap.five_min.sell_count as f64,
            FieldId::UniqueBuyers5m => snap.five_min.unique_buyers,
            FieldId::UniqueSellers5m => snap.five_min.unique_sellers,
            FieldId::BuyVolumeSol5m => snap.five_min.buy_volume_sol,
            FieldId::SellVolumeSol5m => snap.five_min.sell_volume_sol,
            FieldId::AvgBuySize5m => snap.five_min.avg_buy_size,
            FieldId::BuySellRatio5m => snap.five_min.buy_sell_ratio,
            FieldId::Top3BuyersVolumeShare5m => snap.five_min.top_3_buyers_volume_share,
            FieldId::NewWalletPct5m => snap.five_min.new_wallet_pct,
            FieldId::BuyCount1h => snap.one_hour.buy_count as f64,
            FieldId::SellCount1h => snap.one_hour.sell_count as f64,
            FieldId::UniqueBuyers1h => snap.one_hour.unique_buyers,
            FieldId::UniqueSellers1h => snap.one_hour.unique_sellers,
            FieldId::BuyVolumeSol1h => snap.one_hour.buy_volume_sol,
            FieldId::SellVolumeSol1h => snap.one_hour.sell_volume_sol,
            FieldId::AvgBuySize1h => snap.one_hour.avg_buy_size,
            FieldId::BuySellRatio1h => snap.one_hour.buy_sell_ratio,
            FieldId::Top3BuyersVolumeShare1h => snap.one_hour.top_3_buyers_volume_share,
            FieldId::NewWalletPct1h => snap.one_hour.new_wallet_pct,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompiledPredicate {
    pub field: FieldId,
    pub op: Op,
    pub literal: f64,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub enabled: bool,
    pub conditions: Vec<CompiledPredicate>,
}

impl CompiledRule {
    pub fn evaluate(&self, snap: &AggregateSnapshot) -> bool {
        self.enabled && self.conditions.iter().all(|c| c.op.eval(c.field.read(snap), c.literal))
    }
}

/// Compiles and validates a full rule list. All-or-nothing: the first error
/// aborts the whole batch (spec §4.6: "Validation is all-or-nothing").
pub fn compile_rules(raw: &[RawTriggerRule]) -> Result<Vec<CompiledRule>, TriggerError> {
    if raw.is_empty() {
        return Err(TriggerError::EmptyRuleList);
    }
    raw.iter().map(compile_rule).collect()
}

fn compile_rule(raw: &RawTriggerRule) -> Result<CompiledRule, TriggerError> {
    let conditions = raw
        .conditions
        .iter()
        .map(|p| {
            let field = FieldId::parse(&p.field).ok_or_else(|| TriggerError::UnknownField {
                rule: raw.name.clone(),
                field: p.field.clone(),
            })?;
            let op = Op::parse(&p.op)
                .ok_or_else(|| TriggerError::InvalidOperator { rule: raw.name.clone(), op: p.op.clone() })?;
            Ok(CompiledPredicate { field, op, literal: p.literal })
        })
        .collect::<Result<Vec<_>, TriggerError>>()?;
    Ok(CompiledRule { name: raw.name.clone(), enabled: raw.enabled, conditions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawPredicate;

    fn rule(field: &str, op: &str, literal: f64) -> RawTriggerRule {
        RawTriggerRule {
            name: "r1".to_string(),
            enabled: true,
            conditions: vec![RawPredicate { field: field.to_string(), op: op.to_string(), literal }],
        }
    }

    #[test]
    fn unknown_field_rejects_whole_batch() {
        let rules = vec![rule("nonexistent_field", ">=", 1.0)];
        let err = compile_rules(&rules).unwrap_err();
        assert!(matches!(err, TriggerError::UnknownField { .. }));
    }

    #[test]
    fn invalid_operator_rejects_whole_batch() {
        let rules = vec![rule("buy_count_5m", "~=", 1.0)];
        let err = compile_rules(&rules).unwrap_err();
        assert!(matches!(err, TriggerError::InvalidOperator { .. }));
    }

    #[test]
    fn empty_rule_list_is_rejected() {
        let err = compile_rules(&[]).unwrap_err();
        assert!(matches!(err, TriggerError::EmptyRuleList));
    }

    #[test]
    fn valid_rule_compiles_and_evaluates() {
        let rules = compile_rules(&[rule("buy_count_5m", ">=", 10.0)]).unwrap();
        let mut snap = AggregateSnapshot::default();
        snap.five_min.buy_count = 10;
        assert!(rules[0].evaluate(&snap));
    }

    #[test]
    fn infinite_ratio_field_compares_against_finite_literal() {
        let rules = compile_rules(&[rule("buy_sell_ratio_5m", ">=", 10.0)]).unwrap();
        let mut snap = AggregateSnapshot::default();
        snap.five_min.buy_sell_ratio = f64::INFINITY;
        assert!(rules[0].evaluate(&snap));
    }
}
