use crate::{
    benchmark::{Metric, Statistic},
    classifier::{OutlierRule, Tail},
    threshold::{Comparison, ThresholdRule},
    types::{MarginConvention, Money},
};
use serde::{Deserialize, Serialize};

/// A fixed-threshold margin check with its comparison and margin
/// convention spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginCheck {
    pub threshold:  Money,
    pub comparison: Comparison,
    pub convention: MarginConvention,
}

impl MarginCheck {
    pub fn rule(&self) -> ThresholdRule {
        let metric = match self.convention {
            MarginConvention::RatioOfSums => Metric::Margin,
            MarginConvention::MeanOfRatios => Metric::MeanTransactionMargin,
        };
        ThresholdRule::new(metric, self.comparison, self.threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierConfig {
    pub volume: Statistic,
    pub margin: Statistic,
    pub tail:   Tail,
}

impl From<OutlierConfig> for OutlierRule {
    fn from(c: OutlierConfig) -> Self {
        OutlierRule { volume: c.volume, margin: c.margin, tail: c.tail }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Rows kept in the top-products section.
    pub top_products: usize,
    /// Months whose margin falls under this floor are flagged.
    pub low_margin_month: MarginCheck,
    /// Products flagged as unprofitable. Defaults to the mean of
    /// per-transaction ratios, `<= 0`.
    pub unprofitable_product: MarginCheck,
    pub outlier: OutlierConfig,
    /// Rounding applied to ratios in report rows only.
    pub ratio_decimals: u32,
    /// Rounding applied to currency in report rows only.
    pub currency_decimals: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_products: 10,
            low_margin_month: MarginCheck {
                threshold:  Money::new(15, 2),
                comparison: Comparison::Lt,
                convention: MarginConvention::RatioOfSums,
            },
            unprofitable_product: MarginCheck {
                threshold:  Money::ZERO,
                comparison: Comparison::Le,
                convention: MarginConvention::MeanOfRatios,
            },
            outlier: OutlierConfig {
                volume: Statistic::Mean,
                margin: Statistic::Percentile(Money::new(25, 2)),
                tail:   Tail::HighVolumeLowMargin,
            },
            ratio_decimals: 4,
            currency_decimals: 2,
        }
    }
}

impl ReportConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        for (field, stat) in [("volume", config.outlier.volume), ("margin", config.outlier.margin)] {
            if let Statistic::Percentile(p) = stat {
                anyhow::ensure!(
                    p >= Money::ZERO && p <= Money::ONE,
                    "outlier.{field} percentile {p} outside [0, 1]"
                );
            }
        }
        Ok(config)
    }
}
