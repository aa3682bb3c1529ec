use core_types::{Candle, StrategyCandidate};
use risk::{RiskError, RiskManager};
use strategies::{Strategy, StrategyContext, StrategyId};

/// Confidence bonus when more than one strategy agrees on the direction.
const CONFLUENCE_BONUS: f64 = 0.1;
const CONFLUENCE_CAP: f64 = 0.95;

/// The candidate that survived reconciliation and the risk gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub strategy: StrategyId,
    pub candidate: StrategyCandidate,
    pub reward_risk: f64,
    /// Whether another strategy pointed the same way.
    pub confluence: bool,
}

/// Runs a fixed list of strategies over the same data and reconciles their
/// outputs into at most one decision.
pub struct Selector {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Selector {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn select(
        &self,
        candles: &[Candle],
        ctx: &StrategyContext<'_>,
        risk: &dyn RiskManager,
    ) -> Option<Selection> {
        let mut candidates: Vec<(StrategyId, StrategyCandidate)> = self
            .strategies
            .iter()
            .filter_map(|strategy| match strategy.analyze(candles, ctx) {
                Ok(Some(candidate)) => {
                    tracing::debug!(
                        symbol = ctx.symbol,
                        strategy = %strategy.id(),
                        direction = %candidate.direction,
                        confidence = candidate.confidence,
                        "Strategy produced a candidate."
                    );
                    Some((strategy.id(), candidate))
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(symbol = ctx.symbol, strategy = %strategy.id(), error = %e, "Strategy failed.");
                    None
                }
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        // stable: equal confidences keep their original order
        candidates.sort_by(|a, b| b.1.confidence.total_cmp(&a.1.confidence));

        let direction = candidates[0].1.direction;
        let agreeing = candidates.iter().filter(|(_, c)| c.direction == direction).count();
        let confluence = agreeing > 1;

        let (strategy, mut candidate) = candidates.swap_remove(0);
        if confluence {
            candidate.confidence = (candidate.confidence + CONFLUENCE_BONUS).min(CONFLUENCE_CAP);
            tracing::info!(symbol = ctx.symbol, strategy = %strategy, agreeing, "Confluence found.");
        } else if !candidates.is_empty() {
            tracing::info!(symbol = ctx.symbol, strategy = %strategy, "Signals conflict, picking highest confidence.");
        }

        match risk.evaluate(&candidate) {
            Ok(reward_risk) => Some(Selection {
                strategy,
                candidate,
                reward_risk,
                confluence,
            }),
            Err(RiskError::Rejected { best, min }) => {
                tracing::info!(symbol = ctx.symbol, strategy = %strategy, best, min, "Candidate rejected by risk check.");
                None
            }
            Err(e) => {
                tracing::info!(symbol = ctx.symbol, strategy = %strategy, error = %e, "Candidate rejected by risk check.");
                None
            }
        }
    }
}
