use std::collections::{HashMap, HashSet};

use num_rational::BigRational;
use num_traits::{Signed, Zero};
use time::Date;

use crate::portfolio::model::errors::{AcbError, TxIdent};
use crate::portfolio::{Affiliate, Tx, TxAction};
use crate::util::date::add_days;
use crate::util::rational::{rational_to_string, ShareRatio};

use super::tracker::AffiliateStatusTracker;

pub fn first_day_in_sfl_period(settlement_date: Date) -> Date {
    add_days(settlement_date, -30)
}

pub fn last_day_in_sfl_period(settlement_date: Date) -> Date {
    add_days(settlement_date, 30)
}

fn ident(tx: &Tx) -> TxIdent {
    TxIdent {
        security: tx.security.clone(),
        trade_date: tx.trade_date,
        shares: tx.shares_str(),
    }
}

// Everything gathered from the +/-30-day window around a SELL that partial
// superficial-loss calculation needs.
//
// 'Active' affiliates may include pure sellers, which is a superset of
// buying_affiliates. Sellers get populated because a seller may still buy
// later in the window; they are simply never read if they don't.
struct WindowScan {
    is_superficial: bool,
    all_aff_shares_at_eop: BigRational,
    // Total bought (not net) within the window.
    total_acquired_in_period: BigRational,
    buying_affiliates: HashSet<Affiliate>,
    active_affiliate_shares_at_eop: HashMap<Affiliate, BigRational>,
}

/// Checks whether the SELL at txs[idx] has a BUY within 30 days before or
/// after AND shares remain held at the end of the window, gathering the
/// per-affiliate counts needed to apportion a partial loss.
///
/// Ignores any explicit SFL attached to the Tx, and does not check that the
/// sale is actually a loss; the applier does both.
fn scan_window(
    idx: usize,
    txs: &[Tx],
    tracker: &AffiliateStatusTracker,
) -> Result<WindowScan, AcbError> {
    let tx = &txs[idx];
    assert_eq!(tx.action, TxAction::Sell);

    let first_bad_buy_date = first_day_in_sfl_period(tx.settlement_date);
    let last_bad_buy_date = last_day_in_sfl_period(tx.settlement_date);

    let latest = tracker.latest_post_status();
    // The selling affiliate's post-sale status is not yet in the tracker, so
    // recompute the post-sale totals. The applier has already rejected
    // oversells, so going negative here is a bug.
    let all_aff_shares_after_sell =
        &latest.all_affiliates_share_balance - &tx.shares;
    if all_aff_shares_after_sell.is_negative() {
        return Err(AcbError::Sanity {
            tx: ident(tx),
            msg: format!(
                "the share balance total for all affiliates ({}) is less than \
                 the sold shares",
                rational_to_string(&latest.all_affiliates_share_balance)
            ),
        });
    }

    // Share balance an affiliate holds at the point of the sale, used to seed
    // its end-of-period count the first time it appears in the window.
    let seed_balance = |af: &Affiliate| -> Result<BigRational, AcbError> {
        match tracker.latest_post_status_for(af) {
            Some(st) => {
                if af == &tx.affiliate {
                    let bal = &st.share_balance - &tx.shares;
                    if bal.is_negative() {
                        return Err(AcbError::Sanity {
                            tx: ident(tx),
                            msg: format!(
                                "the share balance ({}) for affiliate {} is \
                                 less than the sold shares",
                                rational_to_string(&st.share_balance),
                                af.name()
                            ),
                        });
                    }
                    Ok(bal)
                } else {
                    Ok(st.share_balance.clone())
                }
            }
            None => {
                if af == &tx.affiliate {
                    return Err(AcbError::Sanity {
                        tx: ident(tx),
                        msg: format!(
                            "no existing portfolio status for affiliate {}",
                            af.name()
                        ),
                    });
                }
                Ok(BigRational::zero())
            }
        }
    };

    let mut scan = WindowScan {
        is_superficial: false,
        all_aff_shares_at_eop: all_aff_shares_after_sell,
        total_acquired_in_period: BigRational::zero(),
        buying_affiliates: HashSet::new(),
        active_affiliate_shares_at_eop: HashMap::new(),
    };
    scan.active_affiliate_shares_at_eop
        .insert(tx.affiliate.clone(), seed_balance(&tx.affiliate)?);

    let mut did_buy_after_in_period = false;
    for after_tx in txs.iter().skip(idx + 1) {
        if after_tx.settlement_date > last_bad_buy_date {
            break;
        }
        let af = &after_tx.affiliate;
        match after_tx.action {
            TxAction::Buy => {
                did_buy_after_in_period = true;
                scan.all_aff_shares_at_eop += &after_tx.shares;
                scan.total_acquired_in_period += &after_tx.shares;
                let old = match scan.active_affiliate_shares_at_eop.get(af) {
                    Some(v) => v.clone(),
                    None => seed_balance(af)?,
                };
                scan.active_affiliate_shares_at_eop
                    .insert(af.clone(), old + &after_tx.shares);
                scan.buying_affiliates.insert(af.clone());
            }
            TxAction::Sell => {
                scan.all_aff_shares_at_eop -= &after_tx.shares;
                if scan.all_aff_shares_at_eop.is_negative() {
                    // These txs may not have been validated by the fold yet,
                    // so this is a user error, not a bug.
                    return Err(AcbError::Oversell {
                        tx: ident(after_tx),
                        balance: rational_to_string(
                            &(&scan.all_aff_shares_at_eop + &after_tx.shares),
                        ),
                    });
                }
                let old = match scan.active_affiliate_shares_at_eop.get(af) {
                    Some(v) => v.clone(),
                    None => seed_balance(af)?,
                };
                let new = old - &after_tx.shares;
                if new.is_negative() {
                    return Err(AcbError::Oversell {
                        tx: ident(after_tx),
                        balance: rational_to_string(&(&new + &after_tx.shares)),
                    });
                }
                scan.active_affiliate_shares_at_eop.insert(af.clone(), new);
            }
            // No change to share quantities.
            TxAction::Roc | TxAction::Sfla => (),
        }
    }

    if scan.all_aff_shares_at_eop.is_zero() {
        // Everything was disposed of by the end of the window; the loss
        // stands regardless of window buys.
        return Ok(scan);
    }

    let mut did_buy_before_in_period = false;
    for before_tx in txs[..idx].iter().rev() {
        if before_tx.settlement_date < first_bad_buy_date {
            break;
        }
        if before_tx.action != TxAction::Buy {
            continue;
        }
        did_buy_before_in_period = true;
        scan.total_acquired_in_period += &before_tx.shares;
        let af = &before_tx.affiliate;
        scan.buying_affiliates.insert(af.clone());
        if !scan.active_affiliate_shares_at_eop.contains_key(af) {
            // This affiliate only bought before the sale, so its
            // end-of-period count is just its current balance.
            scan.active_affiliate_shares_at_eop
                .insert(af.clone(), seed_balance(af)?);
        }
    }

    scan.is_superficial = did_buy_before_in_period || did_buy_after_in_period;
    Ok(scan)
}

#[derive(Debug)]
pub(super) struct SflAllocation {
    pub ratio: ShareRatio,
    // Affiliate -> its portion of the total adjustment. Sums to 1.
    pub affiliate_portions: HashMap<Affiliate, ShareRatio>,
    // Set when the buying affiliates' remaining shares sum to fewer than the
    // SFL shares, meaning the selling affiliate retained shares that are not
    // represented among the buyers. The computed SFL may then exceed what a
    // stricter allocation (I.2) would produce. Reported as a warning only.
    pub fewer_remaining_shares_than_sfl_shares: bool,
}

/// Partial superficial loss calculation:
///   superficial_loss = (min(sold, acquired_in_period, end_balance) / sold)
///                      x total_loss
/// Returns the parenthesized ratio, plus the per-affiliate split of the
/// adjustment, if (and only if) the loss is superficial.
///
/// Adjustments are allocated per interpretation I.1: proportionally to each
/// buying affiliate's end-of-period share count.
pub(super) fn superficial_loss_ratio(
    idx: usize,
    txs: &[Tx],
    tracker: &AffiliateStatusTracker,
) -> Result<Option<SflAllocation>, AcbError> {
    let scan = scan_window(idx, txs, tracker)?;
    if !scan.is_superficial {
        return Ok(None);
    }

    let sold_shares = &txs[idx].shares;
    let numerator = sold_shares
        .min(&scan.total_acquired_in_period)
        .min(&scan.all_aff_shares_at_eop)
        .clone();
    let ratio = ShareRatio {
        numerator,
        denominator: sold_shares.clone(),
    };

    assert_ne!(
        scan.buying_affiliates.len(),
        0,
        "superficial_loss_ratio: loss was superficial, but no buying affiliates"
    );

    let zero = BigRational::zero();
    let buying_total_at_eop: BigRational = scan
        .buying_affiliates
        .iter()
        .map(|af| {
            scan.active_affiliate_shares_at_eop.get(af).unwrap_or(&zero)
        })
        .sum();

    // If no buyer has shares remaining, no automatic adjustment can be
    // allocated; the over-application flag below gets reported instead.
    let mut affiliate_portions = HashMap::new();
    if buying_total_at_eop.is_positive() {
        for af in &scan.buying_affiliates {
            let af_shares_at_eop = scan
                .active_affiliate_shares_at_eop
                .get(af)
                .unwrap_or(&zero)
                .clone();
            affiliate_portions.insert(
                af.clone(),
                ShareRatio {
                    numerator: af_shares_at_eop,
                    denominator: buying_total_at_eop.clone(),
                },
            );
        }
    }

    // The numerator of the reduced fraction is not itself a share count;
    // this comparison is a heuristic indicator inherited from the original
    // behavior, not a tight bound.
    let reduced_numerator =
        BigRational::from_integer(ratio.fraction().numer().clone());

    Ok(Some(SflAllocation {
        ratio,
        affiliate_portions,
        fewer_remaining_shares_than_sfl_shares: buying_total_at_eop
            < reduced_numerator,
    }))
}

// MARK: Tests
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use num_rational::BigRational;
    use rust_decimal_macros::dec;

    use crate::portfolio::bookkeeping::AffiliateStatusTracker;
    use crate::portfolio::testlib::{default_sec, TStat, TTx};
    use crate::portfolio::{Affiliate, SflInput, Tx, TxAction as A};
    use crate::util::rational::testlib::rat;
    use crate::util::rational::ShareRatio;

    use super::{scan_window, superficial_loss_ratio};

    // Statuses where each affiliate holds the given share count, with an
    // arbitrary $1/share ACB on non-registered ones.
    fn tracker_with(
        af_shares: &[(Affiliate, BigRational)],
    ) -> AffiliateStatusTracker {
        let mut tracker = AffiliateStatusTracker::new(default_sec(), None);
        let mut total = rat("0");
        for (af, shares) in af_shares {
            total += shares;
            let acb = if af.registered() {
                None
            } else {
                Some(crate::util::rational::rational_to_decimal(shares))
            };
            tracker.set_latest_post_status(
                af,
                TStat {
                    shares: shares.clone(),
                    all_shares: Some(total.clone()),
                    acb,
                    ..TStat::d()
                }
                .x(),
            );
        }
        tracker
    }

    fn buy(t_day: i64, shares: &str, af: Affiliate) -> Tx {
        TTx {
            t_day,
            act: A::Buy,
            shares: rat(shares),
            price: dec!(1),
            af,
            ..TTx::d()
        }
        .x()
    }

    fn sell(t_day: i64, shares: &str, af: Affiliate) -> Tx {
        TTx {
            t_day,
            act: A::Sell,
            shares: rat(shares),
            price: dec!(0.01),
            af,
            ..TTx::d()
        }
        .x()
    }

    #[test]
    fn test_not_superficial_when_no_window_buys() {
        let default_af = Affiliate::default();
        let tracker = tracker_with(&[(default_af.clone(), rat("10"))]);

        // Buy is outside the window (31+2 settle vs 10+2 settle).
        let txs = vec![
            sell(10, "5", default_af.clone()),
            buy(60, "5", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_not_superficial_when_all_disposed() {
        let default_af = Affiliate::default();
        let tracker = tracker_with(&[(default_af.clone(), rat("10"))]);

        // Repurchases, but everything is sold off by the end of the window.
        let txs = vec![
            sell(10, "10", default_af.clone()),
            buy(12, "5", default_af.clone()),
            sell(14, "5", default_af.clone()),
        ];
        let scan = scan_window(0, &txs, &tracker).unwrap();
        assert!(!scan.is_superficial);

        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap();
        assert!(res.is_none());

        // The explicit SFL marker makes no difference to detection.
        let mut txs_sfl = txs.clone();
        txs_sfl[0].specified_superficial_loss =
            Some(SflInput::req_new(dec!(-1), true));
        assert!(superficial_loss_ratio(0, &txs_sfl, &tracker)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_superficial_with_buy_before() {
        let default_af = Affiliate::default();
        let tracker = tracker_with(&[(default_af.clone(), rat("100"))]);

        let txs = vec![
            buy(5, "20", default_af.clone()),
            sell(10, "10", default_af.clone()),
        ];
        let scan = scan_window(1, &txs, &tracker).unwrap();
        assert!(scan.is_superficial);
        assert_eq!(scan.all_aff_shares_at_eop, rat("90"));
        assert_eq!(scan.total_acquired_in_period, rat("20"));
        assert!(scan.buying_affiliates.contains(&default_af));
    }

    #[test]
    fn test_superficial_with_buy_after() {
        let default_af = Affiliate::default();
        let tracker = tracker_with(&[(default_af.clone(), rat("100"))]);

        let txs = vec![
            sell(10, "100", default_af.clone()),
            buy(15, "30", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("30"), denominator: rat("100") }
        );
        assert_eq!(
            res.affiliate_portions,
            HashMap::from([(
                default_af.clone(),
                ShareRatio { numerator: rat("30"), denominator: rat("30") }
            )])
        );
        assert!(!res.fewer_remaining_shares_than_sfl_shares);
    }

    #[test]
    fn test_ratio_takes_min_of_three() {
        let default_af = Affiliate::default();

        // sold=10, acquired=3, eop=93 -> min is 3
        let tracker = tracker_with(&[(default_af.clone(), rat("100"))]);
        let txs = vec![
            sell(10, "10", default_af.clone()),
            buy(15, "3", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("3"), denominator: rat("10") }
        );

        // sold=10, acquired=12, eop=4 -> min is 4
        let tracker = tracker_with(&[(default_af.clone(), rat("10"))]);
        let txs = vec![
            sell(10, "10", default_af.clone()),
            buy(15, "12", default_af.clone()),
            sell(20, "8", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("4"), denominator: rat("10") }
        );
    }

    #[test]
    fn test_fractional_shares() {
        let default_af = Affiliate::default();
        let tracker = tracker_with(&[(default_af.clone(), rat("0.7"))]);

        let txs = vec![
            sell(10, "0.7", default_af.clone()),
            buy(15, "0.3", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("0.3"), denominator: rat("0.7") }
        );
    }

    #[test]
    fn test_multi_affiliate_portions() {
        let default_af = Affiliate::default();
        let af_b = Affiliate::from_label("B");

        // B has no prior position; both buy within the window after the sale.
        let tracker = tracker_with(&[(default_af.clone(), rat("100"))]);
        let txs = vec![
            sell(10, "100", default_af.clone()),
            buy(15, "40", default_af.clone()),
            buy(15, "10", af_b.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("50"), denominator: rat("100") }
        );
        assert_eq!(
            res.affiliate_portions,
            HashMap::from([
                (
                    default_af.clone(),
                    ShareRatio { numerator: rat("40"), denominator: rat("50") }
                ),
                (
                    af_b.clone(),
                    ShareRatio { numerator: rat("10"), denominator: rat("50") }
                ),
            ])
        );
    }

    #[test]
    fn test_seller_with_prior_position_seeds_eop_count() {
        let default_af = Affiliate::default();
        let af_b = Affiliate::from_label("B");

        // B already holds 50; its end-of-period count includes them.
        let tracker = tracker_with(&[
            (default_af.clone(), rat("100")),
            (af_b.clone(), rat("50")),
        ]);
        let txs = vec![
            sell(10, "100", default_af.clone()),
            buy(15, "40", default_af.clone()),
            buy(15, "10", af_b.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.affiliate_portions,
            HashMap::from([
                (
                    default_af.clone(),
                    ShareRatio { numerator: rat("40"), denominator: rat("100") }
                ),
                (
                    af_b.clone(),
                    ShareRatio { numerator: rat("60"), denominator: rat("100") }
                ),
            ])
        );
    }

    #[test]
    fn test_over_applied_flag() {
        let default_af = Affiliate::default();
        let af_b = Affiliate::from_label("B");

        // B acquires 3 but only keeps 2; the seller keeps the rest itself.
        // Buying affiliates hold 2 at EOP, fewer than the 3 SFL shares.
        let tracker = tracker_with(&[(default_af.clone(), rat("20"))]);
        let txs = vec![
            sell(10, "10", default_af.clone()),
            buy(15, "3", af_b.clone()),
            sell(16, "1", af_b.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("3"), denominator: rat("10") }
        );
        assert_eq!(
            res.affiliate_portions,
            HashMap::from([(
                af_b.clone(),
                ShareRatio { numerator: rat("2"), denominator: rat("2") }
            )])
        );
        assert!(res.fewer_remaining_shares_than_sfl_shares);

        // The comparison uses the reduced fraction's numerator, so a ratio
        // that reduces (2/4 -> 1/2) does not trip the flag even though the
        // buyers hold fewer shares than min(sold, acquired, eop).
        let tracker = tracker_with(&[(default_af.clone(), rat("12"))]);
        let txs = vec![
            sell(10, "4", default_af.clone()),
            buy(15, "2", af_b.clone()),
            sell(16, "8", default_af.clone()),
        ];
        let res = superficial_loss_ratio(0, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("2"), denominator: rat("4") }
        );
        assert!(!res.fewer_remaining_shares_than_sfl_shares);
    }

    #[test]
    fn test_buyers_with_no_remaining_shares() {
        let default_af = Affiliate::default();
        let af_b = Affiliate::from_label("B");

        // B buys and fully sells within the window. The default affiliate
        // keeps 1 share, so the loss is still superficial, but nothing can
        // be auto-allocated.
        let tracker = tracker_with(&[
            (af_b.clone(), rat("10")),
            (default_af.clone(), rat("1")),
        ]);
        let txs = vec![
            buy(8, "10", af_b.clone()),
            sell(9, "10", af_b.clone()),
        ];
        let res = superficial_loss_ratio(1, &txs, &tracker).unwrap().unwrap();
        assert_eq!(
            res.ratio,
            ShareRatio { numerator: rat("1"), denominator: rat("10") }
        );
        assert!(res.affiliate_portions.is_empty());
        assert!(res.fewer_remaining_shares_than_sfl_shares);
    }

    #[test]
    fn test_window_oversell_errors() {
        let default_af = Affiliate::default();
        let af_b = Affiliate::from_label("B");

        // A later in-window sell drives B negative.
        let tracker = tracker_with(&[(default_af.clone(), rat("10"))]);
        let txs = vec![
            sell(10, "5", default_af.clone()),
            buy(11, "3", af_b.clone()),
            sell(13, "4", af_b.clone()),
        ];
        let e = superficial_loss_ratio(0, &txs, &tracker).unwrap_err();
        crate::testlib::assert_re("is more than the current holdings", &e.to_string());
    }
}
