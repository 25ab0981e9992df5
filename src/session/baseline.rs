//! Per-source baselines.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::config::ConfigError;
use crate::types::Baseline;

/// Supplies the physiological baseline for a source. Consulted once when a
/// session starts.
#[async_trait]
pub trait BaselineProvider: Send + Sync {
    /// `None` when the source is unknown; callers fall back to
    /// `Baseline::default()`.
    async fn baseline(&self, source_id: &str) -> Option<Baseline>;
}

/// Fixed baselines held in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticBaselineProvider {
    baselines: HashMap<String, Baseline>,
}

impl StaticBaselineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(mut self, source_id: impl Into<String>, baseline: Baseline) -> Self {
        self.baselines.insert(source_id.into(), baseline);
        self
    }

    /// Load a JSON object mapping source ids to baselines, e.g.
    /// `{ "bed-1": { "baseline_hr": 68, "baseline_rr": 14, "baseline_risk": 0.2 } }`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let baselines: HashMap<String, Baseline> = serde_json::from_str(&text)?;
        for baseline in baselines.values() {
            if !(0.0..=1.0).contains(&baseline.baseline_risk) {
                return Err(ConfigError::Invalid {
                    field: "baseline_risk",
                    reason: format!("{} is outside [0, 1]", baseline.baseline_risk),
                });
            }
        }
        Ok(Self { baselines })
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

#[async_trait]
impl BaselineProvider for StaticBaselineProvider {
    async fn baseline(&self, source_id: &str) -> Option<Baseline> {
        self.baselines.get(source_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_lookup_and_fallback() {
        let provider = StaticBaselineProvider::new().with_baseline(
            "bed-1",
            Baseline {
                baseline_hr: 64,
                baseline_rr: 12,
                baseline_risk: 0.3,
            },
        );
        assert_eq!(provider.baseline("bed-1").await.unwrap().baseline_hr, 64);
        assert_eq!(provider.baseline("bed-2").await, None);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "bed-7": {{ "baseline_hr": 80, "baseline_rr": 18, "baseline_risk": 0.1 }} }}"#
        )
        .unwrap();

        let provider = StaticBaselineProvider::from_json_file(file.path()).unwrap();
        assert_eq!(provider.len(), 1);
        let baseline = provider.baseline("bed-7").await.unwrap();
        assert_eq!((baseline.baseline_hr, baseline.baseline_rr), (80, 18));
    }

    #[test]
    fn test_out_of_range_risk_refused() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "bed-7": {{ "baseline_hr": 80, "baseline_rr": 18, "baseline_risk": 3.0 }} }}"#
        )
        .unwrap();
        assert!(StaticBaselineProvider::from_json_file(file.path()).is_err());
    }
}
