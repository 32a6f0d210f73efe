//! Risk classification for the dangerous capability.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use crate::store::RiskSource;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub risk: RiskLevel,
    /// User-facing warning; present exactly when `risk` is High.
    pub warning: Option<String>,
    pub metric: Option<f64>,
}

impl Assessment {
    fn low() -> Self {
        Self {
            risk: RiskLevel::Low,
            warning: None,
            metric: None,
        }
    }
}

/// Classifies a pending dangerous call by its target entity's risk metric.
///
/// Missing data and lookup failures both classify as Low: blocking every
/// dangerous action on untracked entities or on infrastructure flakiness is
/// worse than the residual risk. Failures are logged.
pub struct ConsequenceEvaluator {
    risk_source: Arc<dyn RiskSource>,
}

impl ConsequenceEvaluator {
    pub fn new(risk_source: Arc<dyn RiskSource>) -> Self {
        Self { risk_source }
    }

    pub async fn assess(&self, entity_id: &str) -> Assessment {
        match self.risk_source.get_risk(entity_id).await {
            Ok(Some(metric)) if metric > 0.0 => {
                debug!(target: "consequence", entity_id, metric, "High-risk entity");
                Assessment {
                    risk: RiskLevel::High,
                    warning: Some(format!(
                        "Wait - this trip is {metric:.0}% booked. Removing the vehicle will \
                         cancel these bookings.\n\nDo you want to proceed?"
                    )),
                    metric: Some(metric),
                }
            }
            Ok(_) => Assessment::low(),
            Err(e) => {
                warn!(target: "consequence", entity_id, error = %e, "Risk lookup failed; defaulting to LOW");
                Assessment::low()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use async_trait::async_trait;

    struct FixedRisk(Option<f64>);

    #[async_trait]
    impl RiskSource for FixedRisk {
        async fn get_risk(&self, _entity_id: &str) -> Result<Option<f64>, StoreError> {
            Ok(self.0)
        }
    }

    struct BrokenRisk;

    #[async_trait]
    impl RiskSource for BrokenRisk {
        async fn get_risk(&self, _entity_id: &str) -> Result<Option<f64>, StoreError> {
            Err(StoreError::connection("risk source unreachable"))
        }
    }

    #[tokio::test]
    async fn nonzero_metric_is_high_with_warning() {
        let evaluator = ConsequenceEvaluator::new(Arc::new(FixedRisk(Some(60.0))));
        let assessment = evaluator.assess("trip_1").await;
        assert_eq!(assessment.risk, RiskLevel::High);
        assert!(assessment.warning.unwrap().contains("60% booked"));
        assert_eq!(assessment.metric, Some(60.0));
    }

    #[tokio::test]
    async fn zero_metric_is_low() {
        let evaluator = ConsequenceEvaluator::new(Arc::new(FixedRisk(Some(0.0))));
        assert_eq!(evaluator.assess("trip_1").await.risk, RiskLevel::Low);
    }

    #[tokio::test]
    async fn missing_row_is_low() {
        let evaluator = ConsequenceEvaluator::new(Arc::new(FixedRisk(None)));
        assert_eq!(evaluator.assess("trip_1").await.risk, RiskLevel::Low);
    }

    #[tokio::test]
    async fn lookup_failure_fails_open_to_low() {
        let evaluator = ConsequenceEvaluator::new(Arc::new(BrokenRisk));
        let assessment = evaluator.assess("trip_1").await;
        assert_eq!(assessment.risk, RiskLevel::Low);
        assert!(assessment.warning.is_none());
    }

    #[tokio::test]
    async fn assessment_is_stable_for_unchanged_data() {
        let evaluator = ConsequenceEvaluator::new(Arc::new(FixedRisk(Some(25.0))));
        let first = evaluator.assess("trip_1").await;
        let second = evaluator.assess("trip_1").await;
        assert_eq!(first, second);
    }
}
