use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The research agents feeding the allocator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    MacroCycle,
    CentralBank,
    Geopolitical,
    Sentiment,
    InstitutionalFlow,
    Commodity,
    Credit,
    Technical,
    AlternativeData,
    Regulatory,
}

impl AgentKind {
    pub const ALL: [AgentKind; 10] = [
        AgentKind::MacroCycle,
        AgentKind::CentralBank,
        AgentKind::Geopolitical,
        AgentKind::Sentiment,
        AgentKind::InstitutionalFlow,
        AgentKind::Commodity,
        AgentKind::Credit,
        AgentKind::Technical,
        AgentKind::AlternativeData,
        AgentKind::Regulatory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::MacroCycle => "macro_cycle",
            AgentKind::CentralBank => "central_bank",
            AgentKind::Geopolitical => "geopolitical",
            AgentKind::Sentiment => "sentiment",
            AgentKind::InstitutionalFlow => "institutional_flow",
            AgentKind::Commodity => "commodity",
            AgentKind::Credit => "credit",
            AgentKind::Technical => "technical",
            AgentKind::AlternativeData => "alternative_data",
            AgentKind::Regulatory => "regulatory",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown agent: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Expansion,
    Peak,
    Contraction,
    Trough,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CyclePhase::Expansion => "expansion",
            CyclePhase::Peak => "peak",
            CyclePhase::Contraction => "contraction",
            CyclePhase::Trough => "trough",
            CyclePhase::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// `Unknown` is an explicit stance the allocator does not recognise, not a
/// missing one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStance {
    Hawkish,
    Dovish,
    Neutral,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PolicyStance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyStance::Hawkish => "hawkish",
            PolicyStance::Dovish => "dovish",
            PolicyStance::Neutral => "neutral",
            PolicyStance::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Geopolitical desk's call on a sector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationCall {
    Overweight,
    Underweight,
    #[default]
    #[serde(other)]
    Neutral,
}

impl RotationCall {
    pub fn tilt(&self) -> f64 {
        match self {
            RotationCall::Overweight => 0.2,
            RotationCall::Underweight => -0.2,
            RotationCall::Neutral => 0.0,
        }
    }
}

/// Field-level decoding for agent reports. A field that does not decode
/// falls back to its default without discarding its siblings.
mod lenient {
    use serde::de::{Deserialize, DeserializeOwned, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    pub fn field<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    /// Entries whose value does not decode are skipped.
    pub fn map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Value::Object(entries) = Value::deserialize(deserializer)? else {
            return Ok(BTreeMap::new());
        };

        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
            .collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CycleAnalysis {
    #[serde(deserialize_with = "lenient::field")]
    pub current_phase: CyclePhase,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MacroCycleReport {
    #[serde(deserialize_with = "lenient::field")]
    pub cycle_analysis: CycleAnalysis,
    /// Sector -> tilt weight.
    #[serde(deserialize_with = "lenient::map")]
    pub investment_implications: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FedAnalysis {
    /// `None` when the desk gave no stance.
    #[serde(deserialize_with = "lenient::field")]
    pub policy_stance: Option<PolicyStance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CentralBankReport {
    #[serde(deserialize_with = "lenient::field")]
    pub fed_analysis: FedAnalysis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalRiskAssessment {
    /// 0-10 scale, 5 is neutral.
    #[serde(deserialize_with = "lenient::field")]
    pub overall_risk_level: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeopoliticalImplications {
    #[serde(deserialize_with = "lenient::map")]
    pub sector_rotation: BTreeMap<String, RotationCall>,
    #[serde(deserialize_with = "lenient::field")]
    pub defensive_positioning: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeopoliticalReport {
    #[serde(deserialize_with = "lenient::field")]
    pub global_risk_assessment: GlobalRiskAssessment,
    #[serde(deserialize_with = "lenient::field")]
    pub investment_implications: GeopoliticalImplications,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SentimentReport {
    #[serde(deserialize_with = "lenient::field")]
    pub overall_sentiment: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InstitutionalFlowReport {
    #[serde(deserialize_with = "lenient::field")]
    pub risk_sentiment: Option<f64>,
}

/// One agent's output for a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum AgentReport {
    MacroCycle(MacroCycleReport),
    CentralBank(CentralBankReport),
    Geopolitical(GeopoliticalReport),
    Sentiment(SentimentReport),
    InstitutionalFlow(InstitutionalFlowReport),
    Generic(serde_json::Value),
    Failed { error: String },
}

impl AgentReport {
    /// Decode an untyped report for `kind`. Fields decode independently; a
    /// payload that is not an object becomes the empty record for that kind.
    pub fn from_value(kind: AgentKind, value: serde_json::Value) -> Self {
        match kind {
            AgentKind::MacroCycle => AgentReport::MacroCycle(decode_or_default(kind, value)),
            AgentKind::CentralBank => AgentReport::CentralBank(decode_or_default(kind, value)),
            AgentKind::Geopolitical => AgentReport::Geopolitical(decode_or_default(kind, value)),
            AgentKind::Sentiment => AgentReport::Sentiment(decode_or_default(kind, value)),
            AgentKind::InstitutionalFlow => {
                AgentReport::InstitutionalFlow(decode_or_default(kind, value))
            }
            _ => AgentReport::Generic(value),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AgentReport::Failed { .. })
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(kind: AgentKind, value: serde_json::Value) -> T {
    match serde_json::from_value(value) {
        Ok(report) => report,
        Err(e) => {
            tracing::debug!("{} report is not a record, treating as empty: {}", kind, e);
            T::default()
        }
    }
}

/// All agent reports collected for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReports {
    pub as_of: DateTime<Utc>,
    pub reports: BTreeMap<AgentKind, AgentReport>,
}

impl AgentReports {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            reports: BTreeMap::new(),
        }
    }

    pub fn with_report(mut self, kind: AgentKind, report: AgentReport) -> Self {
        self.insert(kind, report);
        self
    }

    pub fn insert(&mut self, kind: AgentKind, report: AgentReport) {
        self.reports.insert(kind, report);
    }

    /// Build from the untyped `{agent_name: {...}}` mapping. Unknown agent
    /// names and non-object values are skipped.
    pub fn from_json(as_of: DateTime<Utc>, value: &serde_json::Value) -> Self {
        let mut reports = Self::new(as_of);

        let Some(map) = value.as_object() else {
            tracing::debug!("Agent reports payload is not an object, ignoring");
            return reports;
        };

        for (name, report) in map {
            match name.parse::<AgentKind>() {
                Ok(kind) => reports.insert(kind, AgentReport::from_value(kind, report.clone())),
                Err(e) => tracing::debug!("Skipping report: {}", e),
            }
        }

        reports
    }

    pub fn get(&self, kind: AgentKind) -> Option<&AgentReport> {
        self.reports.get(&kind)
    }

    pub fn macro_cycle(&self) -> Option<&MacroCycleReport> {
        match self.get(AgentKind::MacroCycle) {
            Some(AgentReport::MacroCycle(r)) => Some(r),
            _ => None,
        }
    }

    pub fn central_bank(&self) -> Option<&CentralBankReport> {
        match self.get(AgentKind::CentralBank) {
            Some(AgentReport::CentralBank(r)) => Some(r),
            _ => None,
        }
    }

    pub fn geopolitical(&self) -> Option<&GeopoliticalReport> {
        match self.get(AgentKind::Geopolitical) {
            Some(AgentReport::Geopolitical(r)) => Some(r),
            _ => None,
        }
    }

    pub fn sentiment(&self) -> Option<&SentimentReport> {
        match self.get(AgentKind::Sentiment) {
            Some(AgentReport::Sentiment(r)) => Some(r),
            _ => None,
        }
    }

    pub fn institutional_flow(&self) -> Option<&InstitutionalFlowReport> {
        match self.get(AgentKind::InstitutionalFlow) {
            Some(AgentReport::InstitutionalFlow(r)) => Some(r),
            _ => None,
        }
    }

    pub fn failed_agents(&self) -> Vec<AgentKind> {
        self.reports
            .iter()
            .filter(|(_, report)| report.is_failed())
            .map(|(kind, _)| *kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_typed_fields() {
        let reports = AgentReports::from_json(
            Utc::now(),
            &json!({
                "macro_cycle": {"cycle_analysis": {"current_phase": "expansion"}},
                "central_bank": {"fed_analysis": {"policy_stance": "dovish"}},
                "geopolitical": {
                    "global_risk_assessment": {"overall_risk_level": 8},
                    "investment_implications": {"sector_rotation": {"energy": "overweight"}}
                },
                "credit": {"spread_view": "tight"}
            }),
        );

        assert_eq!(
            reports.macro_cycle().unwrap().cycle_analysis.current_phase,
            CyclePhase::Expansion
        );
        assert_eq!(
            reports.central_bank().unwrap().fed_analysis.policy_stance,
            Some(PolicyStance::Dovish)
        );
        let geo = reports.geopolitical().unwrap();
        assert_eq!(geo.global_risk_assessment.overall_risk_level, Some(8.0));
        assert_eq!(
            geo.investment_implications.sector_rotation["energy"],
            RotationCall::Overweight
        );
        assert!(matches!(reports.get(AgentKind::Credit), Some(AgentReport::Generic(_))));
    }

    #[test]
    fn test_unknown_strings_and_malformed_reports() {
        let reports = AgentReports::from_json(
            Utc::now(),
            &json!({
                "macro_cycle": {"cycle_analysis": {"current_phase": "stagflation"}},
                "sentiment": {"overall_sentiment": "very bullish"},
                "astrology": {"stars": "aligned"}
            }),
        );

        assert_eq!(
            reports.macro_cycle().unwrap().cycle_analysis.current_phase,
            CyclePhase::Unknown
        );
        assert_eq!(reports.sentiment().unwrap().overall_sentiment, None);
        assert_eq!(reports.reports.len(), 2);
    }

    #[test]
    fn test_bad_field_keeps_valid_siblings() {
        let reports = AgentReports::from_json(
            Utc::now(),
            &json!({
                "macro_cycle": {
                    "cycle_analysis": {"current_phase": "expansion"},
                    "investment_implications": {"technology": 0.3, "notes": "favour quality"}
                },
                "geopolitical": {
                    "global_risk_assessment": {"overall_risk_level": "high"},
                    "investment_implications": {
                        "sector_rotation": {"energy": "overweight", "defense": 3},
                        "defensive_positioning": [0.4]
                    }
                }
            }),
        );

        let macro_report = reports.macro_cycle().unwrap();
        assert_eq!(macro_report.cycle_analysis.current_phase, CyclePhase::Expansion);
        assert_eq!(
            macro_report.investment_implications,
            BTreeMap::from([("technology".to_string(), 0.3)])
        );

        let geo = reports.geopolitical().unwrap();
        assert_eq!(geo.global_risk_assessment.overall_risk_level, None);
        assert_eq!(geo.investment_implications.defensive_positioning, None);
        assert_eq!(
            geo.investment_implications.sector_rotation,
            BTreeMap::from([("energy".to_string(), RotationCall::Overweight)])
        );
    }

    #[test]
    fn test_absent_and_unrecognised_stance_differ() {
        let reports = AgentReports::from_json(
            Utc::now(),
            &json!({"central_bank": {"fed_analysis": {"policy_stance": "restrictive"}}}),
        );
        assert_eq!(
            reports.central_bank().unwrap().fed_analysis.policy_stance,
            Some(PolicyStance::Unknown)
        );

        let reports = AgentReports::from_json(
            Utc::now(),
            &json!({"central_bank": {"fed_analysis": {}}, "sentiment": "bullish"}),
        );
        assert_eq!(reports.central_bank().unwrap().fed_analysis.policy_stance, None);
        assert_eq!(reports.sentiment(), Some(&SentimentReport::default()));
    }

    #[test]
    fn test_non_object_payload() {
        let reports = AgentReports::from_json(Utc::now(), &json!([1, 2, 3]));
        assert!(reports.reports.is_empty());
    }

    #[test]
    fn test_failed_agents() {
        let reports = AgentReports::new(Utc::now())
            .with_report(AgentKind::Technical, AgentReport::Failed { error: "timeout".into() })
            .with_report(AgentKind::Sentiment, AgentReport::Sentiment(SentimentReport::default()));

        assert_eq!(reports.failed_agents(), vec![AgentKind::Technical]);
    }
}
