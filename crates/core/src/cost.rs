//! Cost computation for pending generate actions.
//!
//! Unit cost is resolved from the pricing catalog keyed by
//! `(model, resolution)`. The total for a generate action is the unit
//! cost multiplied by how many tasks the action will create. The result
//! is recomputed whenever the selection changes and is frozen into each
//! task at creation time.

use std::collections::HashMap;

use crate::types::Credits;

// ---------------------------------------------------------------------------
// Pricing resolver
// ---------------------------------------------------------------------------

/// Resolves the per-task unit cost for a model at a resolution tier.
///
/// Catalog retrieval is an external concern; implementations may wrap a
/// fetched price list or a static table.
pub trait PricingResolver: Send + Sync {
    /// Unit cost in credits, or `None` when the pair is not priced.
    fn unit_cost(&self, model: &str, resolution: &str) -> Option<Credits>;
}

/// A static in-memory price table.
#[derive(Debug, Default)]
pub struct StaticPriceBook {
    prices: HashMap<(String, String), Credits>,
}

impl StaticPriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the price for a `(model, resolution)` pair.
    pub fn set(&mut self, model: impl Into<String>, resolution: impl Into<String>, cost: Credits) {
        self.prices.insert((model.into(), resolution.into()), cost);
    }
}

impl PricingResolver for StaticPriceBook {
    fn unit_cost(&self, model: &str, resolution: &str) -> Option<Credits> {
        self.prices
            .get(&(model.to_string(), resolution.to_string()))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Prompt plan
// ---------------------------------------------------------------------------

/// How many tasks a generate action creates, and with which prompts.
#[derive(Debug, Clone)]
pub enum PromptPlan {
    /// One prompt repeated `quantity` times.
    Single { prompt: String, quantity: u32 },
    /// One task per non-empty entry in the batch list.
    Batch { prompts: Vec<String> },
}

impl PromptPlan {
    /// Expand the plan into the per-task prompt list.
    ///
    /// Batch entries are trimmed and empty lines are skipped; a single
    /// prompt is repeated verbatim.
    pub fn expand(&self) -> Vec<String> {
        match self {
            PromptPlan::Single { prompt, quantity } => {
                if prompt.trim().is_empty() {
                    Vec::new()
                } else {
                    std::iter::repeat_with(|| prompt.clone())
                        .take(*quantity as usize)
                        .collect()
                }
            }
            PromptPlan::Batch { prompts } => prompts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Number of tasks this plan will create.
    pub fn task_count(&self) -> u32 {
        self.expand().len() as u32
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Resolve the unit cost for a selection, treating an unselected model
/// or an unpriced pair as zero.
pub fn unit_cost_or_zero(pricing: &dyn PricingResolver, model: &str, resolution: &str) -> Credits {
    if model.trim().is_empty() {
        return 0;
    }
    pricing.unit_cost(model, resolution).unwrap_or(0)
}

/// Total cost of a pending generate action.
pub fn total_cost(
    pricing: &dyn PricingResolver,
    model: &str,
    resolution: &str,
    plan: &PromptPlan,
) -> Credits {
    unit_cost_or_zero(pricing, model, resolution) * Credits::from(plan.task_count())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
