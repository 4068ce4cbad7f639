use crate::core::currency::Money;
use crate::core::participant::ParticipantId;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance when checking that weights sum to 100.
///
/// Decimal arithmetic is exact, so this only absorbs upstream inputs
/// recorded with more precision than they were entered with.
pub fn weight_epsilon() -> Decimal {
    Decimal::new(1, 4) // 0.0001
}

/// Errors arising from allocation.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("participation percentages must sum to 100, got {total_percentage}")]
    UnbalancedWeights { total_percentage: Decimal },
}

/// One participant's allocated share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub participant_id: ParticipantId,
    pub amount: Money,
}

/// Sum the percentage weights of a roster slice.
///
/// Shared by the allocation engine and the voting tally: a vote's weight
/// is the same percentage sum an allocation would use.
pub fn total_weight(weights: &[(ParticipantId, Decimal)]) -> Decimal {
    weights.iter().map(|(_, pct)| *pct).sum()
}

/// Split `total` across `weights` so the shares sum to `total` exactly.
///
/// Each raw share is `total * percentage / 100`, rounded to the currency's
/// minor unit with round-half-to-even. The rounding residual (positive or
/// negative) is then assigned one minor unit at a time in a stable,
/// documented order: **descending percentage, ties broken by ascending
/// participant id**, cycling until the shares reconstruct the total.
///
/// Pure and deterministic: identical inputs always produce identical
/// shares and identical residual assignment. Weights that do not sum to
/// 100 (within [`weight_epsilon`]) fail with
/// [`AllocationError::UnbalancedWeights`] — never a silent rescale.
///
/// # Examples
///
/// ```
/// use settlement_ledger::allocation::engine::allocate;
/// use settlement_ledger::core::currency::{Currency, Money};
/// use settlement_ledger::core::participant::ParticipantId;
/// use rust_decimal_macros::dec;
///
/// let total = Money::new(dec!(100.00), Currency::Usd);
/// let weights = vec![
///     (ParticipantId::new("P1"), dec!(33.33)),
///     (ParticipantId::new("P2"), dec!(33.33)),
///     (ParticipantId::new("P3"), dec!(33.34)),
/// ];
/// let shares = allocate(&total, &weights).unwrap();
/// let sum: rust_decimal::Decimal = shares.iter().map(|s| s.amount.amount()).sum();
/// assert_eq!(sum, dec!(100.00));
/// ```
pub fn allocate(
    total: &Money,
    weights: &[(ParticipantId, Decimal)],
) -> Result<Vec<Share>, AllocationError> {
    let total_percentage = total_weight(weights);
    if (total_percentage - Decimal::ONE_HUNDRED).abs() > weight_epsilon() {
        return Err(AllocationError::UnbalancedWeights { total_percentage });
    }

    let currency = total.currency();
    let minor = currency.minor_unit();
    let step = currency.minor_step();
    let total_amount = total.round_minor().amount();

    let mut amounts: Vec<Decimal> = weights
        .iter()
        .map(|(_, pct)| {
            (total_amount * pct / Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(minor, RoundingStrategy::MidpointNearestEven)
        })
        .collect();

    // Residual assignment order: descending percentage, then ascending id.
    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        weights[b]
            .1
            .cmp(&weights[a].1)
            .then_with(|| weights[a].0.cmp(&weights[b].0))
    });

    let mut remainder = total_amount - amounts.iter().sum::<Decimal>();
    let mut cursor = 0;
    while !remainder.is_zero() {
        let idx = order[cursor % order.len()];
        let delta = if remainder > Decimal::ZERO { step } else { -step };
        amounts[idx] += delta;
        remainder -= delta;
        cursor += 1;
    }

    Ok(weights
        .iter()
        .zip(amounts)
        .map(|((id, _), amount)| Share {
            participant_id: id.clone(),
            amount: Money::new(amount, currency),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::Currency;
    use rust_decimal_macros::dec;

    fn weights(pairs: &[(&str, Decimal)]) -> Vec<(ParticipantId, Decimal)> {
        pairs
            .iter()
            .map(|(id, pct)| (ParticipantId::new(*id), *pct))
            .collect()
    }

    #[test]
    fn test_sixty_forty_split() {
        let total = Money::new(dec!(100.00), Currency::Usd);
        let shares = allocate(&total, &weights(&[("P1", dec!(60)), ("P2", dec!(40))])).unwrap();
        assert_eq!(shares[0].amount.amount(), dec!(60.00));
        assert_eq!(shares[1].amount.amount(), dec!(40.00));
    }

    #[test]
    fn test_thirds_reconstruct_exactly() {
        let total = Money::new(dec!(100.00), Currency::Usd);
        let shares = allocate(
            &total,
            &weights(&[("P1", dec!(33.33)), ("P2", dec!(33.33)), ("P3", dec!(33.34))]),
        )
        .unwrap();
        let sum: Decimal = shares.iter().map(|s| s.amount.amount()).sum();
        assert_eq!(sum, dec!(100.00));
    }

    #[test]
    fn test_residual_goes_to_largest_weight_first() {
        // 100.01 at equal thirds: raw shares round to 33.34 each (100.02),
        // so one cent must come back. Equal weights tie-break on id,
        // so P1 absorbs the correction.
        let total = Money::new(dec!(100.01), Currency::Ars);
        let thirds = dec!(100) / dec!(3);
        let shares = allocate(
            &total,
            &weights(&[("P1", thirds), ("P2", thirds), ("P3", thirds)]),
        )
        .unwrap();
        let sum: Decimal = shares.iter().map(|s| s.amount.amount()).sum();
        assert_eq!(sum, dec!(100.01));
        assert_eq!(shares[0].amount.amount(), dec!(33.33));
        assert_eq!(shares[1].amount.amount(), dec!(33.34));
        assert_eq!(shares[2].amount.amount(), dec!(33.34));
    }

    #[test]
    fn test_unbalanced_weights_rejected() {
        let total = Money::new(dec!(100.00), Currency::Usd);
        let result = allocate(&total, &weights(&[("P1", dec!(60)), ("P2", dec!(39.5))]));
        assert_eq!(
            result,
            Err(AllocationError::UnbalancedWeights {
                total_percentage: dec!(99.5)
            })
        );

        let result = allocate(&total, &weights(&[("P1", dec!(60)), ("P2", dec!(40.5))]));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_weights_rejected() {
        let total = Money::new(dec!(100.00), Currency::Usd);
        assert_eq!(
            allocate(&total, &[]),
            Err(AllocationError::UnbalancedWeights {
                total_percentage: Decimal::ZERO
            })
        );
    }

    #[test]
    fn test_deterministic() {
        let total = Money::new(dec!(77.77), Currency::Ars);
        let w = weights(&[("P1", dec!(12.5)), ("P2", dec!(12.5)), ("P3", dec!(75))]);
        let a = allocate(&total, &w).unwrap();
        let b = allocate(&total, &w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_output_order_matches_input_order() {
        let total = Money::new(dec!(10.00), Currency::Usd);
        let shares = allocate(&total, &weights(&[("P2", dec!(40)), ("P1", dec!(60))])).unwrap();
        assert_eq!(shares[0].participant_id.as_str(), "P2");
        assert_eq!(shares[1].participant_id.as_str(), "P1");
    }
}
