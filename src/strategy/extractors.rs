//! Turns one cycle of agent reports into trading signals.
//!
//! Every extractor is a pure function of the reports (and agent weights).
//! Missing reports or fields produce fewer signals, never an error.

use std::collections::{BTreeMap, BTreeSet};

use super::signals::{Direction, TimeHorizon, TradingSignal};
use crate::agents::{AgentKind, AgentReports, CyclePhase, PolicyStance};
use crate::core::config::AgentWeights;

const MACRO_POSITION_SIZE: f64 = 0.4;
const SECTOR_SCORE_THRESHOLD: f64 = 0.1;
const MAX_SECTOR_POSITION: f64 = 0.1;
const CURRENCY_POSITION_SIZE: f64 = 0.2;
const DEFENSIVE_OVERRIDE_THRESHOLD: f64 = 0.5;
const RISK_SCORE_THRESHOLD: f64 = 0.2;

pub const RISK_ASSETS: &str = "risk_assets";
pub const SAFE_HAVENS: &str = "safe_havens";

/// Macro cycle phase crossed with the Fed's policy stance.
///
/// The hawkish check runs before the peak check, so peak + hawkish is a
/// bonds signal rather than an equities short.
pub fn extract_macro_signal(reports: &AgentReports) -> Option<TradingSignal> {
    let phase = reports
        .macro_cycle()
        .map(|r| r.cycle_analysis.current_phase)
        .unwrap_or_default();

    // An absent stance counts as neutral; an unrecognised one does not.
    let stance = reports
        .central_bank()
        .and_then(|r| r.fed_analysis.policy_stance)
        .unwrap_or(PolicyStance::Neutral);

    let easy_policy = matches!(stance, PolicyStance::Neutral | PolicyStance::Dovish);

    let (asset_class, direction, conviction) = match (phase, stance) {
        (CyclePhase::Expansion, _) if easy_policy => ("equities", Direction::Long, 0.7),
        (CyclePhase::Contraction, _) | (_, PolicyStance::Hawkish) => ("bonds", Direction::Long, 0.6),
        (CyclePhase::Peak, _) => ("equities", Direction::Short, 0.5),
        _ => return None,
    };

    tracing::debug!(
        "🧭 Macro signal: {} {} (phase={}, stance={})",
        direction,
        asset_class,
        phase,
        stance
    );

    Some(
        TradingSignal::new(
            reports.as_of,
            asset_class,
            direction,
            conviction,
            MACRO_POSITION_SIZE,
            TimeHorizon::Medium,
        )
        .with_risk_factor("cycle_transition")
        .with_risk_factor("policy_shift")
        .with_supporting_agent(AgentKind::MacroCycle)
        .with_supporting_agent(AgentKind::CentralBank)
        .with_regime(format!("{}/{}", phase, stance)),
    )
}

/// Weighted per-sector score from the macro and geopolitical desks; one
/// signal per sector whose score clears the threshold.
pub fn extract_sector_rotation_signals(
    reports: &AgentReports,
    weights: &AgentWeights,
) -> Vec<TradingSignal> {
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    let mut contributors: BTreeMap<String, BTreeSet<AgentKind>> = BTreeMap::new();

    let mut contribute = |sector: &str, amount: f64, agent: AgentKind| {
        *scores.entry(sector.to_string()).or_insert(0.0) += amount;
        if amount != 0.0 {
            contributors.entry(sector.to_string()).or_default().insert(agent);
        }
    };

    if let Some(report) = reports.macro_cycle() {
        let weight = weights.get(AgentKind::MacroCycle);
        for (sector, tilt) in &report.investment_implications {
            contribute(sector, tilt * weight, AgentKind::MacroCycle);
        }
    }

    if let Some(report) = reports.geopolitical() {
        let weight = weights.get(AgentKind::Geopolitical);
        for (sector, call) in &report.investment_implications.sector_rotation {
            contribute(sector, call.tilt() * weight, AgentKind::Geopolitical);
        }
    }

    scores
        .into_iter()
        .filter(|(_, score)| score.abs() > SECTOR_SCORE_THRESHOLD)
        .map(|(sector, score)| {
            let direction = if score > 0.0 { Direction::Long } else { Direction::Short };
            let conviction = (score.abs() * 2.0).min(1.0);
            let position_size = (conviction * 0.15).min(MAX_SECTOR_POSITION);

            let mut signal = TradingSignal::new(
                reports.as_of,
                sector.clone(),
                direction,
                conviction,
                position_size,
                TimeHorizon::Medium,
            )
            .with_risk_factor("sector_concentration")
            .with_regime("sector_rotation");
            if let Some(agents) = contributors.remove(&sector) {
                signal.supporting_agents = agents;
            }
            signal
        })
        .collect()
}

/// USD view from policy stance, overridden toward long on safe-haven demand.
pub fn extract_currency_signal(reports: &AgentReports) -> Option<TradingSignal> {
    let stance = reports.central_bank()?.fed_analysis.policy_stance?;

    let (mut direction, mut conviction) = match stance {
        PolicyStance::Hawkish => (Direction::Long, 0.6),
        PolicyStance::Dovish => (Direction::Short, 0.5),
        PolicyStance::Neutral | PolicyStance::Unknown => return None,
    };

    let defensive = reports
        .geopolitical()
        .and_then(|r| r.investment_implications.defensive_positioning)
        .unwrap_or(0.0);
    let safe_haven = defensive > DEFENSIVE_OVERRIDE_THRESHOLD;

    if safe_haven {
        direction = Direction::Long;
        conviction = (conviction + defensive * 0.3).min(1.0);
    }

    let mut signal = TradingSignal::new(
        reports.as_of,
        "USD",
        direction,
        conviction,
        CURRENCY_POSITION_SIZE,
        TimeHorizon::Short,
    )
    .with_risk_factor("fx_volatility")
    .with_supporting_agent(AgentKind::CentralBank);

    signal = if safe_haven {
        signal
            .with_risk_factor("geopolitical_shock")
            .with_supporting_agent(AgentKind::Geopolitical)
            .with_regime("safe_haven_demand")
    } else {
        signal.with_regime(format!("{}_policy", stance))
    };

    Some(signal)
}

/// Aggregate risk appetite across agents: long risk assets or long safe
/// havens, never short.
pub fn extract_risk_regime_signal(
    reports: &AgentReports,
    weights: &AgentWeights,
) -> Option<TradingSignal> {
    let mut score = 0.0;
    let mut supporting = BTreeSet::new();

    if let Some(level) = reports
        .geopolitical()
        .and_then(|r| r.global_risk_assessment.overall_risk_level)
    {
        score += (level - 5.0) / 5.0 * weights.get(AgentKind::Geopolitical);
        supporting.insert(AgentKind::Geopolitical);
    }

    if let Some(sentiment) = reports.sentiment().and_then(|r| r.overall_sentiment) {
        score += sentiment * weights.get(AgentKind::Sentiment);
        supporting.insert(AgentKind::Sentiment);
    }

    if let Some(risk) = reports.institutional_flow().and_then(|r| r.risk_sentiment) {
        score += risk * weights.get(AgentKind::InstitutionalFlow);
        supporting.insert(AgentKind::InstitutionalFlow);
    }

    if score.abs() <= RISK_SCORE_THRESHOLD {
        return None;
    }

    let (asset_class, regime) = if score > 0.0 {
        (RISK_ASSETS, "risk_on")
    } else {
        (SAFE_HAVENS, "risk_off")
    };
    let conviction = score.abs().min(1.0);

    let mut signal = TradingSignal::new(
        reports.as_of,
        asset_class,
        Direction::Long,
        conviction,
        conviction * 0.3,
        TimeHorizon::Short,
    )
    .with_risk_factor("regime_shift")
    .with_regime(regime);
    signal.supporting_agents = supporting;

    Some(signal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn reports(value: serde_json::Value) -> AgentReports {
        AgentReports::from_json(Utc::now(), &value)
    }

    fn weights(pairs: &[(AgentKind, f64)]) -> AgentWeights {
        AgentWeights::from_pairs(pairs)
    }

    #[test]
    fn test_macro_expansion_dovish() {
        let r = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "expansion"}},
            "central_bank": {"fed_analysis": {"policy_stance": "dovish"}}
        }));

        let signal = extract_macro_signal(&r).unwrap();
        assert_eq!(signal.asset_class, "equities");
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.conviction, 0.7);
        assert_eq!(signal.position_size, 0.4);
        assert_eq!(signal.time_horizon, TimeHorizon::Medium);
        assert_eq!(signal.market_regime, "expansion/dovish");
    }

    #[test]
    fn test_macro_hawkish_takes_precedence_over_peak() {
        let r = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "peak"}},
            "central_bank": {"fed_analysis": {"policy_stance": "hawkish"}}
        }));

        let signal = extract_macro_signal(&r).unwrap();
        assert_eq!(signal.asset_class, "bonds");
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.conviction, 0.6);
    }

    #[test]
    fn test_macro_peak_neutral_is_equities_short() {
        let r = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "peak"}},
            "central_bank": {"fed_analysis": {"policy_stance": "neutral"}}
        }));

        let signal = extract_macro_signal(&r).unwrap();
        assert_eq!(signal.asset_class, "equities");
        assert_eq!(signal.direction, Direction::Short);
        assert_eq!(signal.conviction, 0.5);
    }

    #[test]
    fn test_macro_contraction_and_trough() {
        let contraction = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "contraction"}},
            "central_bank": {"fed_analysis": {"policy_stance": "dovish"}}
        }));
        assert_eq!(extract_macro_signal(&contraction).unwrap().asset_class, "bonds");

        let trough = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "trough"}},
            "central_bank": {"fed_analysis": {"policy_stance": "dovish"}}
        }));
        assert!(extract_macro_signal(&trough).is_none());
        assert!(extract_macro_signal(&reports(json!({}))).is_none());
    }

    #[test]
    fn test_macro_stance_absent_or_unrecognised() {
        let absent = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "expansion"}}
        }));
        let signal = extract_macro_signal(&absent).unwrap();
        assert_eq!(signal.asset_class, "equities");
        assert_eq!(signal.market_regime, "expansion/neutral");

        let restrictive = reports(json!({
            "macro_cycle": {"cycle_analysis": {"current_phase": "expansion"}},
            "central_bank": {"fed_analysis": {"policy_stance": "restrictive"}}
        }));
        assert!(extract_macro_signal(&restrictive).is_none());
        assert!(extract_currency_signal(&restrictive).is_none());
    }

    #[test]
    fn test_macro_survives_bad_sibling_field() {
        let r = reports(json!({
            "macro_cycle": {
                "cycle_analysis": {"current_phase": "expansion"},
                "investment_implications": {"technology": 0.3, "notes": "favour quality"}
            },
            "central_bank": {"fed_analysis": {"policy_stance": "dovish"}}
        }));

        let signal = extract_macro_signal(&r).unwrap();
        assert_eq!(signal.asset_class, "equities");
        assert_eq!(signal.direction, Direction::Long);
    }

    #[test]
    fn test_sector_rotation_survives_bad_risk_level() {
        let r = reports(json!({
            "geopolitical": {
                "global_risk_assessment": {"overall_risk_level": "high"},
                "investment_implications": {"sector_rotation": {"energy": "overweight"}}
            }
        }));
        let w = weights(&[(AgentKind::Geopolitical, 1.0)]);

        let signals = extract_sector_rotation_signals(&r, &w);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].asset_class, "energy");
        assert_eq!(signals[0].direction, Direction::Long);
    }

    #[test]
    fn test_sector_rotation_conviction_cap() {
        let r = reports(json!({
            "macro_cycle": {"investment_implications": {"technology": 0.7}}
        }));
        let w = weights(&[(AgentKind::MacroCycle, 1.0)]);

        let signals = extract_sector_rotation_signals(&r, &w);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].conviction, 1.0);
        assert_eq!(signals[0].position_size, 0.1);
    }

    #[test]
    fn test_sector_rotation_weighted_scores() {
        let r = reports(json!({
            "macro_cycle": {"investment_implications": {"technology": 0.3, "utilities": -0.05}},
            "geopolitical": {"investment_implications": {"sector_rotation": {
                "technology": "overweight",
                "energy": "underweight",
                "utilities": "hold"
            }}}
        }));
        let w = weights(&[(AgentKind::MacroCycle, 1.0), (AgentKind::Geopolitical, 0.5)]);

        let signals = extract_sector_rotation_signals(&r, &w);
        // energy: -0.1 sits on the threshold and is dropped
        assert_eq!(signals.len(), 1);

        let tech = &signals[0];
        assert_eq!(tech.asset_class, "technology");
        assert_eq!(tech.direction, Direction::Long);
        assert!((tech.conviction - 0.8).abs() < 1e-9);
        assert!((tech.position_size - 0.1).abs() < 1e-9);
        assert!(tech.supporting_agents.contains(&AgentKind::MacroCycle));
        assert!(tech.supporting_agents.contains(&AgentKind::Geopolitical));
    }

    #[test]
    fn test_sector_rotation_short_side() {
        let r = reports(json!({
            "geopolitical": {"investment_implications": {"sector_rotation": {"energy": "underweight"}}}
        }));
        let w = weights(&[(AgentKind::Geopolitical, 1.0)]);

        let signals = extract_sector_rotation_signals(&r, &w);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].direction, Direction::Short);
        assert!((signals[0].conviction - 0.4).abs() < 1e-9);
        assert!((signals[0].position_size - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_currency_signal_from_stance() {
        let hawkish = reports(json!({"central_bank": {"fed_analysis": {"policy_stance": "hawkish"}}}));
        let signal = extract_currency_signal(&hawkish).unwrap();
        assert_eq!(signal.asset_class, "USD");
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.conviction, 0.6);
        assert_eq!(signal.position_size, 0.2);
        assert_eq!(signal.time_horizon, TimeHorizon::Short);

        let neutral = reports(json!({"central_bank": {"fed_analysis": {"policy_stance": "neutral"}}}));
        assert!(extract_currency_signal(&neutral).is_none());
    }

    #[test]
    fn test_currency_safe_haven_overrides_dovish() {
        let r = reports(json!({
            "central_bank": {"fed_analysis": {"policy_stance": "dovish"}},
            "geopolitical": {"investment_implications": {"defensive_positioning": 0.8}}
        }));

        let signal = extract_currency_signal(&r).unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert!((signal.conviction - 0.74).abs() < 1e-9);
        assert_eq!(signal.market_regime, "safe_haven_demand");
        assert!(signal.risk_factors.contains("geopolitical_shock"));
    }

    #[test]
    fn test_currency_boost_is_capped() {
        let r = reports(json!({
            "central_bank": {"fed_analysis": {"policy_stance": "hawkish"}},
            "geopolitical": {"investment_implications": {"defensive_positioning": 1.5}}
        }));

        let signal = extract_currency_signal(&r).unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert_eq!(signal.conviction, 1.0);
    }

    #[test]
    fn test_risk_on_from_geopolitical_level() {
        let r = reports(json!({
            "geopolitical": {"global_risk_assessment": {"overall_risk_level": 8}}
        }));
        let w = weights(&[(AgentKind::Geopolitical, 1.0)]);

        let signal = extract_risk_regime_signal(&r, &w).unwrap();
        assert_eq!(signal.asset_class, RISK_ASSETS);
        assert_eq!(signal.direction, Direction::Long);
        assert!((signal.conviction - 0.6).abs() < 1e-9);
        assert!((signal.position_size - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_risk_off_goes_long_safe_havens() {
        let r = reports(json!({
            "sentiment": {"overall_sentiment": -0.5},
            "institutional_flow": {"risk_sentiment": -0.4}
        }));
        let w = weights(&[(AgentKind::Sentiment, 1.0), (AgentKind::InstitutionalFlow, 0.5)]);

        let signal = extract_risk_regime_signal(&r, &w).unwrap();
        assert_eq!(signal.asset_class, SAFE_HAVENS);
        assert_eq!(signal.direction, Direction::Long);
        assert!((signal.conviction - 0.7).abs() < 1e-9);
        assert_eq!(signal.market_regime, "risk_off");
    }

    #[test]
    fn test_risk_regime_below_threshold_and_unweighted() {
        let r = reports(json!({"sentiment": {"overall_sentiment": 0.9}}));
        assert!(extract_risk_regime_signal(&r, &weights(&[])).is_none());

        let mild = reports(json!({"sentiment": {"overall_sentiment": 0.15}}));
        assert!(extract_risk_regime_signal(&mild, &weights(&[(AgentKind::Sentiment, 1.0)])).is_none());
    }
}
