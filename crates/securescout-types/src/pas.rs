//! PAS amount arithmetic. Amounts are integer plancks; there is no
//! floating point anywhere in a money path.

/// An amount of PAS in plancks.
pub type Pas = u128;

/// Plancks per whole PAS token.
pub const ONE_PAS: Pas = 1_000_000_000_000_000_000;

/// Basis-point denominator for fee math.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// The platform's cut of a released payment, truncating division.
pub fn platform_fee(amount: Pas, fee_bps: u16) -> Pas {
    amount * fee_bps as u128 / BPS_DENOMINATOR
}

/// What the agent receives after the platform fee is deducted.
pub fn net_payout(amount: Pas, fee_bps: u16) -> Pas {
    amount - platform_fee(amount, fee_bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fee_basis_points() {
        // 2.5% of 10 PAS
        let fee = platform_fee(10 * ONE_PAS, 250);
        assert_eq!(fee, ONE_PAS / 4);
        assert_eq!(net_payout(10 * ONE_PAS, 250), 10 * ONE_PAS - ONE_PAS / 4);
    }

    #[test]
    fn test_zero_fee() {
        assert_eq!(platform_fee(10 * ONE_PAS, 0), 0);
        assert_eq!(net_payout(10 * ONE_PAS, 0), 10 * ONE_PAS);
    }

    #[test]
    fn test_full_fee() {
        assert_eq!(platform_fee(10 * ONE_PAS, 10_000), 10 * ONE_PAS);
        assert_eq!(net_payout(10 * ONE_PAS, 10_000), 0);
    }

    #[test]
    fn test_truncation() {
        // 1 bps of 1 planck truncates to zero.
        assert_eq!(platform_fee(1, 1), 0);
        assert_eq!(net_payout(1, 1), 1);
    }

    proptest! {
        #[test]
        fn prop_fee_plus_payout_is_amount(amount in 0u128..=1_000_000 * ONE_PAS, bps in 0u16..=10_000) {
            let fee = platform_fee(amount, bps);
            let payout = net_payout(amount, bps);
            prop_assert_eq!(fee + payout, amount);
            prop_assert!(fee <= amount);
        }
    }
}
