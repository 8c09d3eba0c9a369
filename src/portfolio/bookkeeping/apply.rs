use std::rc::Rc;

use num_rational::BigRational;
use num_traits::{One, Zero};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::portfolio::model::errors::{AcbError, TxIdent};
use crate::portfolio::{
    Affiliate, PortfolioSecurityStatus, Tx, TxAction, TxDelta,
};
use crate::util::decimal::{is_negative, NullableDecimal};
use crate::util::rational::{rational_to_decimal, rational_to_string, ShareRatio};

use super::superficial_loss::{superficial_loss_ratio, SflAllocation};
use super::tracker::AffiliateStatusTracker;

// Max tolerated difference between a user-specified superficial loss and the
// computed one, before requiring the '!' force marker.
const MAX_SPECIFIED_SFL_DIFF: Decimal = dec!(0.001);

fn ident(tx: &Tx) -> TxIdent {
    TxIdent {
        security: tx.security.clone(),
        trade_date: tx.trade_date,
        shares: tx.shares_str(),
    }
}

fn sanity_check_pre_status(
    pre: &PortfolioSecurityStatus,
    tx: &Tx,
) -> Result<(), AcbError> {
    let registered = tx.affiliate.registered();
    if pre.all_affiliates_share_balance < pre.share_balance {
        Err(AcbError::Sanity {
            tx: ident(tx),
            msg: format!(
                "the share balance across all affiliates ({}) is lower than \
                 the share balance for the affiliate of the transaction ({})",
                rational_to_string(&pre.all_affiliates_share_balance),
                rational_to_string(&pre.share_balance)
            ),
        })
    } else if registered && !pre.total_acb.is_null() {
        Err(AcbError::Sanity {
            tx: ident(tx),
            msg: "found an ACB on a registered affiliate".to_string(),
        })
    } else if !registered && pre.total_acb.is_null() {
        Err(AcbError::Sanity {
            tx: ident(tx),
            msg: "found an invalid ACB (null)".to_string(),
        })
    } else {
        Ok(())
    }
}

struct SellSflOutcome {
    superficial_loss: NullableDecimal,
    adjusted_capital_gain: NullableDecimal,
    ratio: Option<ShareRatio>,
    potentially_over_applied: bool,
    adjust_txs: Vec<Tx>,
}

// Handles the superficial-loss leg of a losing SELL on a non-registered
// affiliate: either validates the user-specified loss, or computes the
// automatic one and synthesizes the SfLA adjustment Txs.
fn resolve_sell_sfl(
    idx: usize,
    txs: &[Tx],
    tracker: &AffiliateStatusTracker,
    capital_loss: Decimal,
) -> Result<Option<SellSflOutcome>, AcbError> {
    let tx = &txs[idx];

    let allocation: Option<SflAllocation> =
        superficial_loss_ratio(idx, txs, tracker)?;
    let computed_sfl = match &allocation {
        Some(alloc) => capital_loss * alloc.ratio.to_decimal(),
        None => Decimal::ZERO,
    };

    if let Some(specified) = &tx.specified_superficial_loss {
        if !specified.force {
            let diff = (computed_sfl - specified.value).abs();
            if diff > MAX_SPECIFIED_SFL_DIFF {
                return Err(AcbError::SflMismatch {
                    tx: ident(tx),
                    specified: specified.value,
                    computed: computed_sfl,
                    max_diff: MAX_SPECIFIED_SFL_DIFF,
                });
            }
        }

        // The user takes responsibility for entering their own SfLA Txs, so
        // none are synthesized here.
        return Ok(Some(SellSflOutcome {
            superficial_loss: NullableDecimal::from(specified.value),
            adjusted_capital_gain: NullableDecimal::from(
                capital_loss - specified.value,
            ),
            ratio: allocation.map(|a| a.ratio),
            potentially_over_applied: false,
            adjust_txs: Vec::new(),
        }));
    }

    let alloc = match allocation {
        Some(a) => a,
        None => return Ok(None),
    };

    // Emission must be deterministic: sorted by affiliate id.
    let mut adjust_affiliates: Vec<&Affiliate> =
        alloc.affiliate_portions.keys().collect();
    adjust_affiliates.sort_by(|a, b| a.id().cmp(b.id()));

    let mut adjust_txs = Vec::new();
    for af in adjust_affiliates {
        let portion = &alloc.affiliate_portions[af];
        if af.registered() || portion.numerator.is_zero() {
            continue;
        }
        let portion_dec = portion.to_decimal();
        adjust_txs.push(Tx {
            security: tx.security.clone(),
            trade_date: tx.trade_date,
            settlement_date: tx.settlement_date,
            action: TxAction::Sfla,
            shares: BigRational::one(),
            // computed_sfl is negative; the adjustment bumps ACB up.
            amount_per_share: dec!(-1) * computed_sfl * portion_dec,
            tx_currency: crate::portfolio::Currency::default(),
            tx_curr_to_local_rate: Decimal::ONE,
            commission: Decimal::ZERO,
            commission_currency: crate::portfolio::Currency::default(),
            commission_curr_to_local_rate: Decimal::ONE,
            memo: format!(
                "Automatic SfL ACB adjustment. {:.2}% ({}) of SfL, which was \
                 {} of sale shares.",
                portion_dec * dec!(100),
                portion,
                alloc.ratio,
            ),
            affiliate: af.clone(),
            specified_superficial_loss: None,
            read_index: tx.read_index,
        });
    }

    Ok(Some(SellSflOutcome {
        superficial_loss: NullableDecimal::from(computed_sfl),
        adjusted_capital_gain: NullableDecimal::from(
            capital_loss - computed_sfl,
        ),
        ratio: Some(alloc.ratio),
        potentially_over_applied: alloc.fewer_remaining_shares_than_sfl_shares,
        adjust_txs,
    }))
}

/// Applies txs[idx] against the tracker's current state, producing its
/// TxDelta and any synthesized SfLA Txs. The synthesized Txs must be spliced
/// into the stream immediately after this one and evaluated next.
///
/// Does not update the tracker; the fold does that with the returned
/// post-status.
pub fn apply_tx(
    idx: usize,
    txs: &[Tx],
    tracker: &AffiliateStatusTracker,
) -> Result<(TxDelta, Vec<Tx>), AcbError> {
    let tx = &txs[idx];
    let pre_status = tracker.next_pre_status(&tx.affiliate);
    let registered = tx.affiliate.registered();

    assert_eq!(
        tx.security, pre_status.security,
        "apply_tx: securities do not match"
    );

    sanity_check_pre_status(&pre_status, tx)?;

    let shares_dec = rational_to_decimal(&tx.shares);
    let total_local_price =
        shares_dec * tx.amount_per_share * tx.tx_curr_to_local_rate;
    let commission_local = tx.commission * tx.commission_curr_to_local_rate;

    let mut new_share_balance = pre_status.share_balance.clone();
    let mut new_all_affiliates_share_balance =
        pre_status.all_affiliates_share_balance.clone();
    let mut new_acb_total = pre_status.total_acb;

    let mut capital_gain = if registered {
        NullableDecimal::NULL
    } else {
        NullableDecimal::zero()
    };
    let mut superficial_loss = if registered {
        NullableDecimal::NULL
    } else {
        NullableDecimal::zero()
    };
    let mut gross_income = Decimal::ZERO;
    let mut superficial_loss_ratio_out: Option<ShareRatio> = None;
    let mut potentially_over_applied_sfl = false;
    let mut adjust_txs: Vec<Tx> = Vec::new();

    match tx.action {
        TxAction::Buy => {
            new_share_balance = &pre_status.share_balance + &tx.shares;
            new_all_affiliates_share_balance =
                &pre_status.all_affiliates_share_balance + &tx.shares;
            new_acb_total =
                pre_status.total_acb + (total_local_price + commission_local);
        }
        TxAction::Sell => {
            if tx.shares > pre_status.share_balance {
                return Err(AcbError::Oversell {
                    tx: ident(tx),
                    balance: rational_to_string(&pre_status.share_balance),
                });
            }
            new_share_balance = &pre_status.share_balance - &tx.shares;
            new_all_affiliates_share_balance =
                &pre_status.all_affiliates_share_balance - &tx.shares;

            // Commission has no effect on a sale's ACB.
            let per_share_acb = pre_status.per_share_acb();
            new_acb_total =
                pre_status.total_acb - per_share_acb * shares_dec;

            let total_payout = total_local_price - commission_local;
            gross_income = total_local_price;
            capital_gain = -(per_share_acb * shares_dec) + total_payout;

            tracing::debug!(
                "sell: new_acb_total = {}, total_payout = {}, raw gain = {}",
                new_acb_total,
                total_payout,
                capital_gain
            );

            let raw_gain = capital_gain.value();
            match raw_gain {
                Some(gain) if !registered && is_negative(&gain) => {
                    if let Some(outcome) =
                        resolve_sell_sfl(idx, txs, tracker, gain)?
                    {
                        superficial_loss = outcome.superficial_loss;
                        capital_gain = outcome.adjusted_capital_gain;
                        superficial_loss_ratio_out = outcome.ratio;
                        potentially_over_applied_sfl =
                            outcome.potentially_over_applied;
                        adjust_txs = outcome.adjust_txs;
                    }
                }
                _ => {
                    if tx.specified_superficial_loss.is_some() {
                        return Err(AcbError::SflWithoutLoss { tx: ident(tx) });
                    }
                }
            }
        }
        TxAction::Roc => {
            if registered {
                return Err(AcbError::RocOnRegistered { tx: ident(tx) });
            }
            if !tx.shares.is_zero() {
                return Err(AcbError::RocWithShares { tx: ident(tx) });
            }
            let reduction = tx.amount_per_share
                * rational_to_decimal(&pre_status.share_balance)
                * tx.tx_curr_to_local_rate;
            new_acb_total = pre_status.total_acb - reduction;
            if let Some(acb) = new_acb_total.value() {
                if is_negative(&acb) {
                    return Err(AcbError::RocExceedsAcb {
                        tx: ident(tx),
                        reduction,
                        acb: pre_status.total_acb.unwrap_or_zero(),
                    });
                }
            }
        }
        TxAction::Sfla => {
            if registered {
                return Err(AcbError::SflaOnRegistered { tx: ident(tx) });
            }
            if !tx.tx_currency.is_default()
                || tx.tx_curr_to_local_rate != Decimal::ONE
            {
                return Err(AcbError::SflaBadCurrency { tx: ident(tx) });
            }
            let adjustment = tx.amount_per_share * shares_dec;
            new_acb_total = pre_status.total_acb + adjustment;
        }
    }

    let post_status = Rc::new(PortfolioSecurityStatus {
        security: pre_status.security.clone(),
        share_balance: new_share_balance,
        all_affiliates_share_balance: new_all_affiliates_share_balance,
        total_acb: new_acb_total,
    });

    let delta = TxDelta {
        tx: tx.clone(),
        pre_status,
        post_status,
        capital_gain,
        gross_income,
        superficial_loss,
        superficial_loss_ratio: superficial_loss_ratio_out,
        potentially_over_applied_sfl,
    };
    Ok((delta, adjust_txs))
}
