//! Portfolio rebalancing planner.
//!
//! Given a user's current on-chain portfolio, a set of scored charity
//! candidates surfaced by an article, and the article's urgency, the
//! planner produces a [`RebalancePlan`] describing the keep/add/remove
//! decision and the resulting integer allocation.
//!
//! # Algorithm
//!
//! 1. Candidates at or above `min_relevance` that are not already held
//!    become additions, highest relevance first, capped so the portfolio
//!    stays within `max_holdings`.
//! 2. A shift share `base_shift × urgency/10` of the existing allocation
//!    is moved to the additions, split among them in proportion to
//!    relevance. Surviving holdings scale by the complement.
//! 3. Entries whose share falls below `min_pct` are dropped and their
//!    weight rejoins the pool.
//! 4. The final weights are rounded to integer percentages with the
//!    largest-remainder method, so they always sum to exactly 100.
//! 5. An empty current portfolio gives the additions the full 100. A
//!    portfolio whose percentages are all zero carries no weight to
//!    shift, so its holdings are replaced outright and reported as
//!    removed.
//! 6. Urgency at or above `disburse_urgency` marks the plan for
//!    immediate fund disbursement.
//!
//! The planner is pure: it never touches the store, the chain, or the
//! clock. The engine in the app crate is responsible for acting on the
//! plan it returns.

use crate::models::Holding;

/// Tuning parameters for the planner.
#[derive(Debug, Clone)]
pub struct RebalanceParams {
    /// Minimum blended relevance for a candidate to enter the portfolio.
    pub min_relevance: f64,
    /// Maximum number of holdings in a portfolio.
    pub max_holdings: usize,
    /// Fraction of the portfolio reallocated at urgency 10.
    pub base_shift: f64,
    /// Holdings below this percentage are dropped.
    pub min_pct: u32,
    /// Urgency at or above this triggers disbursement.
    pub disburse_urgency: f64,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            min_relevance: 0.55,
            max_holdings: 6,
            base_shift: 0.3,
            min_pct: 2,
            disburse_urgency: 8.0,
        }
    }
}

/// A charity candidate with its blended relevance score.
#[derive(Debug, Clone)]
pub struct CharityCandidate {
    pub wallet: String,
    pub name: String,
    pub relevance: f64,
}

/// The planner's decision for one user.
#[derive(Debug, Clone)]
pub struct RebalancePlan {
    /// The resulting allocation. Sums to 100 whenever `changed` is true.
    pub holdings: Vec<Holding>,
    /// Names of charities added to the portfolio.
    pub added: Vec<String>,
    /// Names (or wallets, if unnamed) of charities removed.
    pub removed: Vec<String>,
    /// True if the allocation differs from the current portfolio.
    pub changed: bool,
    /// True if the plan requests immediate fund disbursement.
    pub disburse: bool,
}

impl RebalancePlan {
    fn keep(current: &[Holding], disburse: bool) -> Self {
        Self {
            holdings: current.to_vec(),
            added: Vec::new(),
            removed: Vec::new(),
            changed: false,
            disburse,
        }
    }
}

/// Compute the rebalance decision for one user.
///
/// `current` is the user's on-chain portfolio (possibly empty),
/// `candidates` the article's scored charities, and `urgency` the 1–10
/// article urgency. See the module docs for the full algorithm.
pub fn plan_rebalance(
    current: &[Holding],
    candidates: &[CharityCandidate],
    urgency: f64,
    params: &RebalanceParams,
) -> RebalancePlan {
    let urgency = urgency.clamp(0.0, 10.0);

    // Pick additions: relevant, not already held, best first.
    let mut additions: Vec<&CharityCandidate> = candidates
        .iter()
        .filter(|c| c.relevance >= params.min_relevance)
        .filter(|c| !current.iter().any(|h| h.wallet == c.wallet))
        .collect();
    additions.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.wallet.cmp(&b.wallet))
    });
    additions.dedup_by(|a, b| a.wallet == b.wallet);
    let slots = params
        .max_holdings
        .saturating_sub(current.len().min(params.max_holdings));
    additions.truncate(slots);

    let disburse =
        urgency >= params.disburse_urgency && !(current.is_empty() && additions.is_empty());

    if additions.is_empty() {
        return RebalancePlan::keep(current, disburse);
    }

    let relevance_sum: f64 = additions.iter().map(|c| c.relevance).sum();

    // Build the weight vector: survivors first, then additions.
    struct Entry {
        wallet: String,
        name: Option<String>,
        weight: f64,
        is_addition: bool,
    }

    let current_total: f64 = current.iter().map(|h| f64::from(h.percentage)).sum();
    let mut entries: Vec<Entry> = Vec::with_capacity(current.len() + additions.len());
    let mut removed: Vec<String> = Vec::new();

    if current_total > 0.0 {
        let shift = (params.base_shift * urgency / 10.0).clamp(0.0, 1.0);
        for h in current {
            entries.push(Entry {
                wallet: h.wallet.clone(),
                name: h.name.clone(),
                weight: f64::from(h.percentage) * (1.0 - shift),
                is_addition: false,
            });
        }
        for c in &additions {
            entries.push(Entry {
                wallet: c.wallet.clone(),
                name: Some(c.name.clone()),
                weight: shift * current_total * c.relevance / relevance_sum,
                is_addition: true,
            });
        }
    } else {
        // Zero-percentage holdings carry no weight to shift; the
        // additions replace them.
        for h in current {
            removed.push(h.name.clone().unwrap_or_else(|| h.wallet.clone()));
        }
        for c in &additions {
            entries.push(Entry {
                wallet: c.wallet.clone(),
                name: Some(c.name.clone()),
                weight: c.relevance / relevance_sum,
                is_addition: true,
            });
        }
    }

    // Drop entries whose share falls under min_pct; dropping raises the
    // remaining shares, so iterate until stable. Always keep at least one.
    loop {
        let total: f64 = entries.iter().map(|e| e.weight).sum();
        if total <= 0.0 || entries.len() <= 1 {
            break;
        }
        let cutoff = f64::from(params.min_pct);
        let victim = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.weight / total * 100.0 < cutoff)
            .min_by(|(_, a), (_, b)| {
                a.weight
                    .partial_cmp(&b.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i);
        match victim {
            Some(i) => {
                let e = entries.remove(i);
                if !e.is_addition {
                    removed.push(e.name.unwrap_or(e.wallet));
                }
            }
            None => break,
        }
    }

    let added: Vec<String> = entries
        .iter()
        .filter(|e| e.is_addition)
        .filter_map(|e| e.name.clone())
        .collect();

    // If nothing actually entered or left, keep the portfolio untouched
    // rather than re-rounding it.
    if added.is_empty() && removed.is_empty() {
        return RebalancePlan::keep(current, disburse);
    }

    let weights: Vec<f64> = entries.iter().map(|e| e.weight).collect();
    let pcts = largest_remainder(&weights, 100);

    let mut holdings: Vec<Holding> = entries
        .into_iter()
        .zip(pcts)
        .map(|(e, pct)| Holding {
            wallet: e.wallet,
            name: e.name,
            percentage: pct,
        })
        .collect();
    holdings.sort_by(|a, b| {
        b.percentage
            .cmp(&a.percentage)
            .then_with(|| a.wallet.cmp(&b.wallet))
    });

    RebalancePlan {
        changed: holdings != current,
        holdings,
        added,
        removed,
        disburse,
    }
}

/// Allocate `total` integer units across `weights` proportionally,
/// using the largest-remainder method.
///
/// The result always sums to exactly `total`. Ties on fractional parts
/// break toward the larger weight, then the earlier index, so the
/// allocation is deterministic. Non-positive weight sums fall back to an
/// even split.
pub fn largest_remainder(weights: &[f64], total: u32) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }

    let sum: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
    if sum <= 0.0 {
        let n = weights.len() as u32;
        let base = total / n;
        let extra = (total % n) as usize;
        return (0..weights.len())
            .map(|i| if i < extra { base + 1 } else { base })
            .collect();
    }

    let exact: Vec<f64> = weights
        .iter()
        .map(|w| w.max(0.0) / sum * f64::from(total))
        .collect();
    let mut alloc: Vec<u32> = exact.iter().map(|e| e.floor() as u32).collect();
    let assigned: u32 = alloc.iter().sum();
    let mut leftover = total.saturating_sub(assigned) as usize;

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = exact[a] - exact[a].floor();
        let fb = exact[b] - exact[b].floor();
        fb.partial_cmp(&fa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                weights[b]
                    .partial_cmp(&weights[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.cmp(&b))
    });

    for &i in &order {
        if leftover == 0 {
            break;
        }
        alloc[i] += 1;
        leftover -= 1;
    }

    alloc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(wallet: &str, pct: u32) -> Holding {
        Holding {
            wallet: wallet.to_string(),
            name: Some(format!("Charity {}", wallet)),
            percentage: pct,
        }
    }

    fn candidate(wallet: &str, relevance: f64) -> CharityCandidate {
        CharityCandidate {
            wallet: wallet.to_string(),
            name: format!("Charity {}", wallet),
            relevance,
        }
    }

    fn total(plan: &RebalancePlan) -> u32 {
        plan.holdings.iter().map(|h| h.percentage).sum()
    }

    #[test]
    fn test_empty_portfolio_gets_full_allocation() {
        let candidates = vec![candidate("0xa", 0.9), candidate("0xb", 0.6)];
        let plan = plan_rebalance(&[], &candidates, 7.0, &RebalanceParams::default());

        assert!(plan.changed);
        assert_eq!(total(&plan), 100);
        assert_eq!(plan.holdings.len(), 2);
        assert_eq!(plan.added.len(), 2);
        // Higher relevance gets the larger share.
        assert_eq!(plan.holdings[0].wallet, "0xa");
        assert!(plan.holdings[0].percentage > plan.holdings[1].percentage);
    }

    #[test]
    fn test_below_threshold_candidates_ignored() {
        let candidates = vec![candidate("0xa", 0.2), candidate("0xb", 0.4)];
        let current = vec![holding("0xc", 100)];
        let plan = plan_rebalance(&current, &candidates, 9.0, &RebalanceParams::default());

        assert!(!plan.changed);
        assert_eq!(plan.holdings, current);
        assert!(plan.added.is_empty());
    }

    #[test]
    fn test_zero_urgency_leaves_portfolio_alone() {
        // shift = 0 at urgency 0, so additions get nothing and fall under
        // min_pct; the plan must come back as a no-op.
        let current = vec![holding("0xc", 60), holding("0xd", 40)];
        let candidates = vec![candidate("0xa", 0.95)];
        let plan = plan_rebalance(&current, &candidates, 0.0, &RebalanceParams::default());

        assert!(!plan.changed);
        assert_eq!(plan.holdings, current);
    }

    #[test]
    fn test_addition_shifts_share_and_sums_to_100() {
        let current = vec![holding("0xc", 50), holding("0xd", 50)];
        let candidates = vec![candidate("0xa", 0.8)];
        let plan = plan_rebalance(&current, &candidates, 10.0, &RebalanceParams::default());

        assert!(plan.changed);
        assert_eq!(total(&plan), 100);
        assert_eq!(plan.added, vec!["Charity 0xa".to_string()]);
        let new = plan.holdings.iter().find(|h| h.wallet == "0xa").unwrap();
        // base_shift 0.3 at urgency 10 moves 30% to the single addition.
        assert_eq!(new.percentage, 30);
        for h in plan.holdings.iter().filter(|h| h.wallet != "0xa") {
            assert_eq!(h.percentage, 35);
        }
    }

    #[test]
    fn test_max_holdings_caps_additions() {
        let params = RebalanceParams {
            max_holdings: 3,
            ..RebalanceParams::default()
        };
        let current = vec![holding("0xc", 50), holding("0xd", 50)];
        let candidates = vec![
            candidate("0xa", 0.9),
            candidate("0xb", 0.8),
            candidate("0xe", 0.7),
        ];
        let plan = plan_rebalance(&current, &candidates, 10.0, &params);

        // Only one slot free; the best candidate takes it.
        assert_eq!(plan.added, vec!["Charity 0xa".to_string()]);
        assert_eq!(plan.holdings.len(), 3);
        assert_eq!(total(&plan), 100);
    }

    #[test]
    fn test_already_held_candidate_not_readded() {
        let current = vec![holding("0xa", 100)];
        let candidates = vec![candidate("0xa", 0.99)];
        let plan = plan_rebalance(&current, &candidates, 9.0, &RebalanceParams::default());

        assert!(!plan.changed);
        assert!(plan.added.is_empty());
    }

    #[test]
    fn test_small_holding_dropped() {
        let current = vec![holding("0xc", 97), holding("0xd", 3)];
        let candidates = vec![candidate("0xa", 0.9)];
        let params = RebalanceParams {
            min_pct: 5,
            ..RebalanceParams::default()
        };
        let plan = plan_rebalance(&current, &candidates, 10.0, &params);

        assert!(plan.changed);
        assert_eq!(plan.removed, vec!["Charity 0xd".to_string()]);
        assert!(!plan.holdings.iter().any(|h| h.wallet == "0xd"));
        assert_eq!(total(&plan), 100);
    }

    #[test]
    fn test_zero_total_holdings_reported_as_removed() {
        let current = vec![holding("0xc", 0), holding("0xd", 0)];
        let candidates = vec![candidate("0xa", 0.9)];
        let plan = plan_rebalance(&current, &candidates, 10.0, &RebalanceParams::default());

        assert!(plan.changed);
        assert_eq!(total(&plan), 100);
        assert_eq!(
            plan.removed,
            vec!["Charity 0xc".to_string(), "Charity 0xd".to_string()]
        );
        assert_eq!(plan.holdings.len(), 1);
        assert_eq!(plan.holdings[0].wallet, "0xa");
    }

    #[test]
    fn test_disburse_flag() {
        let current = vec![holding("0xc", 100)];
        let plan = plan_rebalance(&current, &[], 8.0, &RebalanceParams::default());
        assert!(plan.disburse);
        assert!(!plan.changed);

        let quiet = plan_rebalance(&current, &[], 7.9, &RebalanceParams::default());
        assert!(!quiet.disburse);

        // Nothing to disburse from an empty portfolio.
        let empty = plan_rebalance(&[], &[], 10.0, &RebalanceParams::default());
        assert!(!empty.disburse);
    }

    #[test]
    fn test_drifted_portfolio_renormalized_on_change() {
        // On-chain percentages that no longer sum to 100 still produce a
        // valid allocation once anything changes.
        let current = vec![holding("0xc", 40), holding("0xd", 30)];
        let candidates = vec![candidate("0xa", 0.9)];
        let plan = plan_rebalance(&current, &candidates, 10.0, &RebalanceParams::default());

        assert!(plan.changed);
        assert_eq!(total(&plan), 100);
    }

    #[test]
    fn test_duplicate_candidate_wallets_deduped() {
        let candidates = vec![candidate("0xa", 0.9), candidate("0xa", 0.7)];
        let plan = plan_rebalance(&[], &candidates, 9.0, &RebalanceParams::default());
        assert_eq!(plan.holdings.len(), 1);
        assert_eq!(total(&plan), 100);
    }

    #[test]
    fn test_largest_remainder_sums() {
        let cases: Vec<Vec<f64>> = vec![
            vec![1.0, 1.0, 1.0],
            vec![33.3, 33.3, 33.4],
            vec![0.7, 0.2, 0.1],
            vec![5.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        ];
        for weights in cases {
            let alloc = largest_remainder(&weights, 100);
            assert_eq!(alloc.iter().sum::<u32>(), 100, "weights {:?}", weights);
        }
    }

    #[test]
    fn test_largest_remainder_even_thirds() {
        let alloc = largest_remainder(&[1.0, 1.0, 1.0], 100);
        assert_eq!(alloc.iter().sum::<u32>(), 100);
        let mut sorted = alloc.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![33, 33, 34]);
    }

    #[test]
    fn test_largest_remainder_zero_weights() {
        let alloc = largest_remainder(&[0.0, 0.0], 100);
        assert_eq!(alloc, vec![50, 50]);

        let odd = largest_remainder(&[0.0, 0.0, 0.0], 100);
        assert_eq!(odd.iter().sum::<u32>(), 100);
        assert_eq!(odd, vec![34, 33, 33]);
    }

    #[test]
    fn test_largest_remainder_empty() {
        assert!(largest_remainder(&[], 100).is_empty());
    }

    #[test]
    fn test_largest_remainder_deterministic() {
        let weights = vec![0.25, 0.25, 0.25, 0.25];
        assert_eq!(
            largest_remainder(&weights, 99),
            largest_remainder(&weights, 99)
        );
    }
}
