#[cfg(test)]
mod tests {
    use crate::constants::{CURVE_PRECISION, FEE_PRECISION};
    use crate::{
        Address, AmmReserves, CreatorId, Curve, ErrorKind, KeyArena, MarketConfig, MarketError,
        PiecewiseParams, ProfileMarket, StaticDirectory, TradeSide, TransferReason, UnitId, Vault,
    };
    use anyhow::Result;
    use once_cell::sync::Lazy;

    type Market = ProfileMarket<KeyArena, StaticDirectory, Vault>;

    const CREATOR_ID: CreatorId = CreatorId(1);
    const CREATOR_ID_A: CreatorId = CreatorId(2);
    const CREATOR_NOT_EXIST: CreatorId = CreatorId(10);
    const FEE_PERCENT: u128 = FEE_PRECISION / 20; // 5%

    static DEPLOYER: Lazy<Address> = Lazy::new(|| Address::from_low_u64(0xde));
    static CREATOR_OWNER: Lazy<Address> = Lazy::new(|| Address::from_low_u64(0xc0));
    static CREATOR_OWNER_1: Lazy<Address> = Lazy::new(|| Address::from_low_u64(0xc1));
    static USER: Lazy<Address> = Lazy::new(|| Address::from_low_u64(0x01));
    static USER_1: Lazy<Address> = Lazy::new(|| Address::from_low_u64(0x02));

    // ido 10000 x 5, then 10·s² + 10000
    static PIECEWISE: Lazy<Curve> = Lazy::new(|| {
        Curve::Piecewise(PiecewiseParams {
            ido_price: 10_000,
            ido_amount: 5,
            max_supply: 50,
            a: 10 * CURVE_PRECISION,
            b: 0,
            b_positive: true,
            c: 10_000 * CURVE_PRECISION,
            c_positive: true,
        })
    });

    // Open market, 5% on every fee, protocol fees to the deployer
    fn init() -> Result<Market> {
        let mut config = MarketConfig::new(*DEPLOYER);
        config.open = true;
        config.protocol_buy_fee_percent = FEE_PERCENT;
        config.protocol_sell_fee_percent = FEE_PERCENT;
        config.creator_buy_fee_percent = FEE_PERCENT;
        config.creator_sell_fee_percent = FEE_PERCENT;
        init_with(config)
    }

    fn init_with(config: MarketConfig) -> Result<Market> {
        let directory = StaticDirectory::new()
            .with_owner(CREATOR_ID, *CREATOR_OWNER)
            .with_owner(CREATOR_ID_A, *CREATOR_OWNER_1);
        ProfileMarket::new(&config, KeyArena::new(), directory, Vault::new())
    }

    fn init_create() -> Result<Market> {
        let mut market = init()?;
        market.create_pool(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone())?;
        Ok(market)
    }

    // user holds keys 0..10
    fn init_buy() -> Result<Market> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 10, 113_630)?;
        Ok(market)
    }

    fn ids(range: std::ops::Range<u64>) -> Vec<UnitId> {
        range.map(UnitId).collect()
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    #[test]
    fn test_create_pool() -> Result<()> {
        let market = init_create()?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 0);
        assert_eq!(market.pool(CREATOR_ID)?.curve, *PIECEWISE);
        Ok(())
    }

    #[test]
    fn test_create_pool_and_buy() -> Result<()> {
        let mut market = init()?;
        let receipt = market.create_pool_with_initial_buy(
            *CREATOR_OWNER_1,
            CREATOR_ID_A,
            PIECEWISE.clone(),
            3,
            33_000,
        )?;
        assert_eq!(receipt.unit_ids, ids(0..3));
        assert_eq!(market.supply_of(CREATOR_ID_A)?, 3);
        assert_eq!(market.claimable(CREATOR_ID_A), 1_500);
        Ok(())
    }

    #[test]
    fn test_create_pool_twice() -> Result<()> {
        let mut market = init_create()?;
        let err = market
            .create_pool(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone())
            .unwrap_err();
        assert!(matches!(err, MarketError::PoolCreated(CREATOR_ID)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = market
            .create_pool_with_initial_buy(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone(), 1, 11_000)
            .unwrap_err();
        assert!(matches!(err, MarketError::PoolCreated(CREATOR_ID)));
        Ok(())
    }

    #[test]
    fn test_create_pool_for_unknown_creator() -> Result<()> {
        let mut market = init()?;
        let err = market
            .create_pool(*CREATOR_OWNER, CREATOR_NOT_EXIST, PIECEWISE.clone())
            .unwrap_err();
        assert!(matches!(err, MarketError::CreatorCanNotBeZero(CREATOR_NOT_EXIST)));
        Ok(())
    }

    #[test]
    fn test_create_pool_with_negative_sign() -> Result<()> {
        let mut market = init()?;
        let curve = Curve::Piecewise(PiecewiseParams {
            ido_price: 10_000,
            ido_amount: 5,
            max_supply: 50,
            a: 500 * CURVE_PRECISION,
            b: 0,
            b_positive: true,
            c: 500 * CURVE_PRECISION,
            c_positive: false,
        });
        market.create_pool(*CREATOR_OWNER, CREATOR_ID, curve)?;
        market.buy(*CREATOR_OWNER, CREATOR_ID, 6, 74_250)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 6);
        Ok(())
    }

    #[test]
    fn test_fractional_coefficients() -> Result<()> {
        let curve = Curve::Piecewise(PiecewiseParams {
            ido_price: 0,
            ido_amount: 3,
            max_supply: 400,
            a: 625_035_158_227_651,
            b: 0,
            b_positive: true,
            c: 5_625_316_420_160_000,
            c_positive: false,
        });

        let mut market = init()?;
        let err = market
            .create_pool_with_initial_buy(*CREATOR_OWNER, CREATOR_ID, curve.clone(), 4, 48_127_706)
            .unwrap_err();
        assert!(matches!(err, MarketError::InsufficientPayment { need: 48_127_707, .. }));
        assert!(market.pool(CREATOR_ID).is_err());

        market.create_pool_with_initial_buy(*CREATOR_OWNER, CREATOR_ID, curve, 4, 48_127_707)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 4);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Buy
    // ------------------------------------------------------------------

    #[test]
    fn test_buy_flat_keys() -> Result<()> {
        let mut market = init_create()?;
        let err = market.buy(*USER, CREATOR_ID, 2, 21_999).unwrap_err();
        assert!(matches!(err, MarketError::InsufficientPayment { have: 21_999, need: 22_000 }));
        assert_eq!(err.kind(), ErrorKind::Payment);

        let receipt = market.buy(*USER, CREATOR_ID, 2, 22_000)?;
        assert_eq!(receipt.side, TradeSide::Buy);
        assert_eq!(receipt.settled, 22_000);
        assert_eq!(market.custody().units_of(&USER), ids(0..2));
        Ok(())
    }

    #[test]
    fn test_buy_across_flat_and_curve() -> Result<()> {
        let mut market = init_create()?;
        assert!(matches!(
            market.buy(*USER, CREATOR_ID, 10, 113_629),
            Err(MarketError::InsufficientPayment { .. })
        ));
        market.buy(*USER, CREATOR_ID, 10, 113_630)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 10);
        Ok(())
    }

    #[test]
    fn test_buy_on_curve_only() -> Result<()> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 5, 55_000)?;
        assert_eq!(market.get_buy_price(CREATOR_ID, 10)?, 111_850);
        market.buy(*USER, CREATOR_ID, 10, 123_035)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 15);
        Ok(())
    }

    #[test]
    fn test_buy_both_after_one() -> Result<()> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 1, 11_000)?;
        market.buy(*USER, CREATOR_ID, 9, 102_630)?;
        assert_eq!(market.custody().balance_of(&USER), 10);
        Ok(())
    }

    #[test]
    #[should_panic(expected = "InsufficientPayment")]
    fn test_buy_underpaid() {
        let mut market = init_create().unwrap();
        market.buy(*USER, CREATOR_ID, 1, 10_999).unwrap();
    }

    #[test]
    fn test_buy_refunds_overpayment() -> Result<()> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 2, 30_000)?;
        assert_eq!(market.funds().balance_of(&USER), 8_000);
        assert_eq!(market.funds().balance_of(&DEPLOYER), 1_000);
        let reasons: Vec<_> = market.funds().history().iter().map(|t| t.reason).collect();
        assert_eq!(reasons, vec![TransferReason::Refund, TransferReason::ProtocolFee]);
        Ok(())
    }

    #[test]
    fn test_buy_from_missing_pool() -> Result<()> {
        let mut market = init()?;
        assert!(matches!(
            market.buy(*USER, CREATOR_ID, 1, 1_000_000),
            Err(MarketError::PoolNotExist(CREATOR_ID))
        ));
        assert!(matches!(
            market.get_buy_price(CREATOR_ID, 1),
            Err(MarketError::PoolNotExist(CREATOR_ID))
        ));
        Ok(())
    }

    #[test]
    fn test_buy_past_cap_changes_nothing() -> Result<()> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 45, u128::from(u64::MAX))?;
        let err = market.buy(*USER, CREATOR_ID, 6, u128::from(u64::MAX)).unwrap_err();
        assert!(matches!(err, MarketError::SupplyCapExceeded { max: 50, would_have: 51 }));
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
        assert_eq!(market.supply_of(CREATOR_ID)?, 45);
        assert_eq!(market.custody().total_live(), 45);
        Ok(())
    }

    #[test]
    fn test_exact_payment_boundary() -> Result<()> {
        let mut market = init_create()?;
        market.buy(*USER, CREATOR_ID, 3, 33_000)?;
        for amount in [1u64, 4, 9] {
            let price = market.get_buy_price_after_fee(CREATOR_ID, amount)?;
            assert!(matches!(
                market.buy(*USER, CREATOR_ID, amount, price - 1),
                Err(MarketError::InsufficientPayment { .. })
            ));
            market.buy(*USER, CREATOR_ID, amount, price)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sell
    // ------------------------------------------------------------------

    #[test]
    fn test_sell_on_curve_only() -> Result<()> {
        let mut market = init_buy()?;
        let receipt = market.sell(*USER, &[UnitId(0)], 9_900)?;
        assert_eq!(receipt.side, TradeSide::Sell);
        assert_eq!(receipt.settled, 9_900);
        assert_eq!(market.supply_of(CREATOR_ID)?, 9);
        assert_eq!(market.custody().owner_of(UnitId(0)), None);
        Ok(())
    }

    #[test]
    fn test_sell_across_flat_and_curve() -> Result<()> {
        let mut market = init_buy()?;
        market.sell(*USER, &ids(0..10), 92_970)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 0);
        Ok(())
    }

    #[test]
    fn test_sell_slippage_bound() -> Result<()> {
        let mut market = init_buy()?;
        let err = market.sell(*USER, &ids(0..10), 92_971).unwrap_err();
        assert!(matches!(err, MarketError::PriceNotInRange { proceeds: 92_970, min: 92_971 }));
        assert_eq!(err.kind(), ErrorKind::Range);
        assert_eq!(market.supply_of(CREATOR_ID)?, 10);
        assert_eq!(market.custody().balance_of(&USER), 10);
        Ok(())
    }

    #[test]
    fn test_sell_flat_only() -> Result<()> {
        let mut market = init_buy()?;
        market.sell(*USER, &ids(0..9), 83_970)?;
        market.sell(*USER, &[UnitId(9)], 9_000)?;
        assert_eq!(market.supply_of(CREATOR_ID)?, 0);
        assert_eq!(market.custody().total_live(), 0);
        Ok(())
    }

    #[test]
    fn test_sell_others_keys() -> Result<()> {
        let mut market = init_buy()?;
        let err = market.sell(*USER_1, &[UnitId(0)], 0).unwrap_err();
        assert!(matches!(err, MarketError::NotOwnerOrApproved(UnitId(0))));
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(matches!(
            market.sell(*USER, &[UnitId(42)], 0),
            Err(MarketError::NotOwnerOrApproved(UnitId(42)))
        ));
        Ok(())
    }

    #[test]
    fn test_sell_empty() -> Result<()> {
        let mut market = init_buy()?;
        let err = market.sell(*USER, &[], 0).unwrap_err();
        assert!(matches!(err, MarketError::EmptySell));
        assert_eq!(err.kind(), ErrorKind::State);
        Ok(())
    }

    #[test]
    fn test_sell_duplicate_ids() -> Result<()> {
        let mut market = init_buy()?;
        assert!(matches!(
            market.sell(*USER, &[UnitId(3), UnitId(3)], 0),
            Err(MarketError::DuplicateUnit(UnitId(3)))
        ));
        Ok(())
    }

    #[test]
    fn test_sell_mixed_pools() -> Result<()> {
        let mut market = init_buy()?;
        market.create_pool_with_initial_buy(*CREATOR_OWNER_1, CREATOR_ID_A, PIECEWISE.clone(), 1, 11_000)?;
        market.buy(*USER, CREATOR_ID_A, 1, 11_000)?;
        assert!(matches!(
            market.sell(*USER, &[UnitId(0), UnitId(11)], 0),
            Err(MarketError::MixedPools(CREATOR_ID, CREATOR_ID_A))
        ));
        Ok(())
    }

    #[test]
    fn test_sell_by_approved_operator() -> Result<()> {
        let mut market = init_buy()?;
        market.custody_mut().approve(&USER, *USER_1, UnitId(4))?;
        assert!(market.sell(*USER_1, &[UnitId(4), UnitId(5)], 0).is_err());

        let receipt = market.sell(*USER_1, &[UnitId(4)], 0)?;
        assert_eq!(market.funds().balance_of(&USER_1), receipt.settled);
        assert_eq!(market.funds().balance_of(&USER), 0);
        Ok(())
    }

    #[test]
    fn test_supply_floor() -> Result<()> {
        let mut config = MarketConfig::new(*DEPLOYER);
        config.open = true;
        config.supply_floor = 1;
        let mut market = init_with(config)?;
        market.create_pool(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone())?;
        market.buy(*USER, CREATOR_ID, 2, 20_000)?;

        let err = market.sell(*USER, &ids(0..2), 0).unwrap_err();
        assert!(matches!(err, MarketError::SupplyFloor { supply: 2, requested: 2, floor: 1 }));
        market.sell(*USER, &[UnitId(1)], 10_000)?;
        assert!(market.sell(*USER, &[UnitId(0)], 0).is_err());
        assert_eq!(market.supply_of(CREATOR_ID)?, 1);
        Ok(())
    }

    #[test]
    fn test_fee_conservation() -> Result<()> {
        let mut market = init_create()?;
        let bought = market.buy(*USER, CREATOR_ID, 13, u128::from(u64::MAX))?;
        let split = bought.split;
        assert_eq!(bought.settled, split.base + split.protocol_fee + split.creator_fee);

        let sold = market.sell(*USER, &bought.unit_ids[..7], 0)?;
        let split = sold.split;
        assert_eq!(split.protocol_fee + split.creator_fee + sold.settled, split.base);
        Ok(())
    }

    #[test]
    fn test_buy_then_sell_loses_only_fees() -> Result<()> {
        let mut market = init_create()?;
        market.set_protocol_buy_fee_percent(*DEPLOYER, 0)?;
        market.set_protocol_sell_fee_percent(*DEPLOYER, 0)?;
        market.set_creator_buy_fee_percent(*DEPLOYER, 0)?;
        market.set_creator_sell_fee_percent(*DEPLOYER, 0)?;

        let bought = market.buy(*USER, CREATOR_ID, 8, 1_000_000)?;
        let sold = market.sell(*USER, &bought.unit_ids, 0)?;
        assert_eq!(bought.settled, sold.settled);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Claim
    // ------------------------------------------------------------------

    #[test]
    fn test_claim_zero() -> Result<()> {
        let mut market = init_buy()?;
        let err = market.claim_all(*USER).unwrap_err();
        assert!(matches!(err, MarketError::ZeroClaimable));
        assert_eq!(market.user_claimable(*CREATOR_OWNER_1)?, 0);

        let mut fresh = init_create()?;
        assert_eq!(fresh.user_claimable(*CREATOR_OWNER)?, 0);
        assert!(matches!(
            fresh.claim(*CREATOR_OWNER, CREATOR_ID),
            Err(MarketError::ZeroClaimable)
        ));
        Ok(())
    }

    #[test]
    fn test_claim_amount() -> Result<()> {
        // 113630 / 11 / 2 = 5165
        let market = init_buy()?;
        assert_eq!(market.user_claimable(*CREATOR_OWNER)?, 5_165);
        assert_eq!(market.claimable(CREATOR_ID), 5_165);
        Ok(())
    }

    #[test]
    fn test_claim() -> Result<()> {
        let mut market = init_buy()?;
        assert!(matches!(
            market.claim(*USER, CREATOR_ID),
            Err(MarketError::NotCreatorOwner(CREATOR_ID))
        ));

        assert_eq!(market.claim(*CREATOR_OWNER, CREATOR_ID)?, 5_165);
        assert_eq!(market.funds().balance_of(&CREATOR_OWNER), 5_165);
        assert_eq!(market.user_claimable(*CREATOR_OWNER)?, 0);
        assert!(matches!(
            market.claim(*CREATOR_OWNER, CREATOR_ID),
            Err(MarketError::ZeroClaimable)
        ));
        Ok(())
    }

    #[test]
    fn test_claim_all_across_creators() -> Result<()> {
        let mut market = init_buy()?;
        market.identity_mut().register(CREATOR_ID_A, *CREATOR_OWNER);
        market.create_pool_with_initial_buy(*CREATOR_OWNER, CREATOR_ID_A, PIECEWISE.clone(), 2, 22_000)?;

        assert_eq!(market.user_claimable(*CREATOR_OWNER)?, 5_165 + 1_000);
        assert_eq!(market.claim_all(*CREATOR_OWNER)?, 6_165);
        assert_eq!(market.claimable(CREATOR_ID), 0);
        assert_eq!(market.claimable(CREATOR_ID_A), 0);
        Ok(())
    }

    #[test]
    fn test_sell_fees_accrue() -> Result<()> {
        let mut market = init_buy()?;
        market.sell(*USER, &ids(0..10), 0)?;
        // 5165 from the buy, 5% of 103300 from the sell
        assert_eq!(market.claimable(CREATOR_ID), 10_330);
        assert_eq!(market.funds().balance_of(&DEPLOYER), 10_330);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    #[test]
    fn test_quotes() -> Result<()> {
        let market = init_buy()?;
        assert_eq!(market.get_buy_price(CREATOR_ID, 1)?, 11_210);
        assert_eq!(market.get_sell_price(CREATOR_ID, 1)?, 11_000);
        assert_eq!(market.get_buy_price_after_fee(CREATOR_ID, 1)?, 12_330);
        assert_eq!(market.get_sell_price_after_fee(CREATOR_ID, 1)?, 9_900);
        Ok(())
    }

    #[test]
    fn test_quotes_are_exact_payments_without_fees() -> Result<()> {
        let mut config = MarketConfig::new(*DEPLOYER);
        config.open = true;
        let mut market = init_with(config)?;
        market.create_pool(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone())?;
        market.buy(*USER, CREATOR_ID, 10, 103_300)?;

        assert_eq!(market.get_buy_price(CREATOR_ID, 1)?, 11_210);
        assert_eq!(market.get_sell_price(CREATOR_ID, 1)?, 11_000);
        assert!(matches!(
            market.buy(*USER, CREATOR_ID, 1, 11_209),
            Err(MarketError::InsufficientPayment { .. })
        ));
        market.buy(*USER, CREATOR_ID, 1, 11_210)?;
        Ok(())
    }

    #[test]
    fn test_fee_changes_apply_immediately() -> Result<()> {
        let mut market = init_create()?;
        let before = market.get_buy_price_after_fee(CREATOR_ID, 2)?;
        market.set_creator_buy_fee_percent(*DEPLOYER, 0)?;
        let after = market.get_buy_price_after_fee(CREATOR_ID, 2)?;
        assert_eq!(before - after, 1_000);
        market.buy(*USER, CREATOR_ID, 2, after)?;
        assert_eq!(market.claimable(CREATOR_ID), 0);
        Ok(())
    }

    #[test]
    fn test_amm_pool_trades() -> Result<()> {
        let mut market = init()?;
        market.create_pool(
            *CREATOR_OWNER,
            CREATOR_ID,
            Curve::Amm(AmmReserves::new(1_000_000, 1_000)),
        )?;
        let price = market.get_buy_price_after_fee(CREATOR_ID, 5)?;
        let bought = market.buy(*USER, CREATOR_ID, 5, price)?;
        assert_eq!(bought.supply_after, 5);

        let quote = market.get_sell_price_after_fee(CREATOR_ID, 5)?;
        let sold = market.sell(*USER, &bought.unit_ids, quote)?;
        assert_eq!(sold.settled, quote);
        assert!(sold.settled < bought.settled);
        Ok(())
    }

    #[test]
    fn test_market_closed_until_opened() -> Result<()> {
        let mut market = init_with(MarketConfig::new(*DEPLOYER))?;
        market.create_pool(*CREATOR_OWNER, CREATOR_ID, PIECEWISE.clone())?;
        let err = market.buy(*USER, CREATOR_ID, 1, 10_000).unwrap_err();
        assert!(matches!(err, MarketError::OpenNotInit));
        assert!(market
            .create_pool_with_initial_buy(*CREATOR_OWNER_1, CREATOR_ID_A, PIECEWISE.clone(), 1, 10_000)
            .is_err());

        market.set_open_init(*DEPLOYER, true)?;
        market.buy(*USER, CREATOR_ID, 1, 10_000)?;
        Ok(())
    }
}
