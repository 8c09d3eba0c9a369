use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;
use time::{Date, Month};

use crate::portfolio::bookkeeping::{
    first_day_in_sfl_period, last_day_in_sfl_period,
};
use crate::portfolio::{Affiliate, Security, Tx, TxAction, TxDelta};
use crate::util::date::today_local;
use crate::util::decimal::is_negative;

const SHARE_BALANCE_ZERO_WARNING: &str =
    "Share balance at the end of the summarized period was zero";

fn jan1(year: i32) -> Date {
    Date::from_calendar_date(year, Month::January, 1).unwrap()
}

fn summary_base_tx(security: &str, af: &Affiliate) -> Tx {
    Tx {
        security: security.to_string(),
        trade_date: Date::MIN,
        settlement_date: Date::MIN,
        action: TxAction::Buy,
        shares: BigRational::zero(),
        amount_per_share: Decimal::ZERO,
        tx_currency: crate::portfolio::Currency::default(),
        tx_curr_to_local_rate: Decimal::ONE,
        commission: Decimal::ZERO,
        commission_currency: crate::portfolio::Currency::default(),
        commission_curr_to_local_rate: Decimal::ONE,
        memo: String::new(),
        affiliate: af.clone(),
        specified_superficial_loss: None,
        read_index: 0,
    }
}

// Finds (latest_in_range_idx, latest_summarizable_idx).
//
// latest_in_range is simply the last delta settling on or before latest_date.
// latest_summarizable walks back from there past anything that could affect
// a still-relevant superficial loss: every SFL within 30 days after the
// summary boundary pushes the boundary back, and further SFLs encountered
// within the walk push it back again.
fn summary_range_indices(
    latest_date: Date,
    deltas: &[TxDelta],
) -> (Option<usize>, Option<usize>, Vec<String>) {
    let mut latest_in_range: Option<usize> = None;
    for (i, delta) in deltas.iter().enumerate() {
        if delta.tx.settlement_date > latest_date {
            break;
        }
        latest_in_range = Some(i);
    }
    let latest_in_range_idx = match latest_in_range {
        Some(i) => i,
        None => {
            return (
                None,
                None,
                vec!["No transactions in the summary period".to_string()],
            )
        }
    };

    // Is any superficial loss after the boundary within 30 days of it?
    let latest_in_range_date = deltas[latest_in_range_idx].tx.settlement_date;
    let mut overlapping_sfl_period_start: Option<Date> = None;
    for delta in &deltas[latest_in_range_idx + 1..] {
        if delta.is_superficial_loss() {
            let period_start =
                first_day_in_sfl_period(delta.tx.settlement_date);
            if latest_in_range_date >= period_start {
                overlapping_sfl_period_start = Some(period_start);
            }
            break;
        }
    }

    let latest_summarizable_idx = match overlapping_sfl_period_start {
        None => Some(latest_in_range_idx),
        Some(mut first_sfl_period_day) => {
            let mut found: Option<usize> = None;
            for i in (0..=latest_in_range_idx).rev() {
                let delta = &deltas[i];
                if delta.tx.settlement_date < first_sfl_period_day {
                    found = Some(i);
                    break;
                }
                if delta.is_superficial_loss() {
                    // Another SFL within the summary range; anything within
                    // its own 30-day look-back can't be summarized either.
                    first_sfl_period_day =
                        first_day_in_sfl_period(delta.tx.settlement_date);
                }
            }
            found
        }
    };

    (Some(latest_in_range_idx), latest_summarizable_idx, Vec::new())
}

// One synthetic BUY reproducing the affiliate's entire position, dated at its
// last summarizable delta.
fn simple_summary_txs(
    af: &Affiliate,
    deltas: &[TxDelta],
    latest_summarizable_idx: usize,
) -> (Vec<Tx>, Vec<String>) {
    let delta = &deltas[latest_summarizable_idx];
    let post = &delta.post_status;
    if post.share_balance.is_zero() {
        return (Vec::new(), vec![SHARE_BALANCE_ZERO_WARNING.to_string()]);
    }

    // Registered summaries substitute zero where the null ACB would appear;
    // a serialized Tx stream cannot carry nulls.
    let amount_per_share = post
        .per_share_acb()
        .unwrap_or_zero();

    let mut tx = summary_base_tx(&delta.tx.security, af);
    // Not a real trade; nothing depends on a separate trade date.
    tx.trade_date = delta.tx.settlement_date;
    tx.settlement_date = delta.tx.settlement_date;
    tx.shares = post.share_balance.clone();
    tx.amount_per_share = amount_per_share;
    tx.memo = "Summary".to_string();
    (vec![tx], Vec::new())
}

// A base BUY dated the year before the first delta, plus one 1-share SELL
// per year with non-zero gains, each reproducing that year's total. Loss
// years put the loss magnitude in the commission so the SELL realizes it.
fn annual_gains_summary_txs(
    af: &Affiliate,
    deltas: &[TxDelta],
    latest_summarizable_idx: usize,
) -> (Vec<Tx>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut txs = Vec::new();

    let mut yearly_gains = HashMap::<i32, Decimal>::new();
    if !af.registered() {
        for delta in &deltas[..=latest_summarizable_idx] {
            if &delta.tx.affiliate != af {
                continue;
            }
            if let Some(gain) = delta.capital_gain.value() {
                if !gain.is_zero() {
                    *yearly_gains
                        .entry(delta.tx.settlement_date.year())
                        .or_default() += gain;
                }
            }
        }
    }
    let mut years_with_gains: Vec<i32> = yearly_gains.keys().copied().collect();
    years_with_gains.sort();

    let first_year = deltas[0].tx.settlement_date.year();
    let summary_delta = &deltas[latest_summarizable_idx];
    let post = &summary_delta.post_status;

    let base_acb_per_share = post.per_share_acb().unwrap_or_zero();

    if post.share_balance.is_zero() {
        warnings.push(SHARE_BALANCE_ZERO_WARNING.to_string());
    }

    // One extra share per gain year gets sold off again below.
    let n_base_shares = &post.share_balance
        + BigRational::from_integer(years_with_gains.len().into());
    if n_base_shares.is_positive() {
        let mut tx = summary_base_tx(&summary_delta.tx.security, af);
        let dt = jan1(first_year - 1);
        tx.trade_date = dt;
        tx.settlement_date = dt;
        tx.shares = n_base_shares;
        tx.amount_per_share = base_acb_per_share;
        tx.memo = "Summary base (buy)".to_string();
        txs.push(tx);
    }

    for year in years_with_gains {
        let mut gain = yearly_gains[&year];
        let mut loss = Decimal::ZERO;
        if is_negative(&gain) {
            loss = -gain;
            gain = Decimal::ZERO;
        }
        let dt = jan1(year);
        let mut tx = summary_base_tx(&summary_delta.tx.security, af);
        tx.trade_date = dt;
        tx.settlement_date = dt;
        tx.action = TxAction::Sell;
        tx.shares = BigRational::from_integer(1.into());
        tx.amount_per_share = base_acb_per_share + gain;
        tx.commission = loss;
        tx.memo = format!("{} gain summary (sell)", year);
        txs.push(tx);
    }

    (txs, warnings)
}

/// Produces a minimal Tx sequence which, replayed through the engine, yields
/// the same end state as all txs settling on or before `latest_date`.
///
/// The caller should provide deltas extending at least 60 days past
/// latest_date; a transaction added within that window could introduce a
/// superficial loss reaching back into the summary (hence the freshness
/// warning below).
pub fn make_summary_txs(
    latest_date: Date,
    deltas: &[TxDelta],
    split_annual_gains: bool,
) -> (Vec<Tx>, Vec<String>) {
    let (latest_in_range_idx, latest_summarizable_idx, warnings) =
        summary_range_indices(latest_date, deltas);
    let latest_in_range_idx = match latest_in_range_idx {
        Some(i) => i,
        None => return (Vec::new(), warnings),
    };

    let mut warnings = BTreeSet::<String>::new();
    let mut summary_txs: Vec<Tx> = Vec::new();

    if let Some(latest_summarizable_idx) = latest_summarizable_idx {
        // Each affiliate is summarized at its own last summarizable delta.
        // Iterated in id order for deterministic emission.
        let mut last_idx_by_affiliate = HashMap::<Affiliate, usize>::new();
        for i in (0..=latest_summarizable_idx).rev() {
            let af = deltas[i].tx.affiliate.clone();
            last_idx_by_affiliate.entry(af).or_insert(i);
        }
        let mut affiliates: Vec<Affiliate> =
            last_idx_by_affiliate.keys().cloned().collect();
        affiliates.sort_by(|a, b| a.id().cmp(b.id()));

        for af in &affiliates {
            let af_last_idx = last_idx_by_affiliate[af];
            let (af_txs, af_warnings) = if split_annual_gains {
                annual_gains_summary_txs(af, deltas, af_last_idx)
            } else {
                simple_summary_txs(af, deltas, af_last_idx)
            };
            summary_txs.extend(af_txs);
            warnings.extend(af_warnings);
        }
    }

    // Stabilize, then strip the temporary read indices: the vector order is
    // now the canonical order.
    for (i, tx) in summary_txs.iter_mut().enumerate() {
        tx.read_index = i as u32;
    }
    summary_txs.sort();
    for tx in summary_txs.iter_mut() {
        tx.read_index = 0;
    }

    let first_unsummarizable =
        latest_summarizable_idx.map(|i| i + 1).unwrap_or(0);
    if first_unsummarizable <= latest_in_range_idx {
        warnings.insert(
            "Some transactions to be summarized could not be due to \
             superficial-loss conflicts"
                .to_string(),
        );
        for delta in &deltas[first_unsummarizable..=latest_in_range_idx] {
            summary_txs.push(delta.tx.clone());
        }
    }

    // Find the latest day that could still affect (or be affected by) the
    // last tx in range: 30 days of window, plus 30 days of look-back from a
    // new SFL, is 60 days.
    let last_affecting_day = last_day_in_sfl_period(last_day_in_sfl_period(
        deltas[latest_in_range_idx].tx.settlement_date,
    ));
    if today_local() <= last_affecting_day {
        warnings.insert(
            "The current date is such that new TXs could potentially alter \
             how the summary is created. You should wait 60 days after your \
             latest transaction within the summary period to generate the \
             summary"
                .to_string(),
        );
    }

    (summary_txs, warnings.into_iter().collect())
}

pub struct CollectedSummaryData {
    pub txs: Vec<Tx>,
    // Warning -> securities which encountered it.
    pub warnings: HashMap<String, Vec<Security>>,
}

pub fn make_aggregate_summary_txs(
    latest_date: Date,
    deltas_by_sec: &HashMap<Security, Vec<TxDelta>>,
    split_annual_gains: bool,
) -> CollectedSummaryData {
    let mut all_txs = Vec::new();
    let mut all_warnings: HashMap<String, Vec<Security>> = HashMap::new();

    for sec in deltas_by_sec.keys().sorted() {
        let deltas = &deltas_by_sec[sec];
        let (txs, warnings) =
            make_summary_txs(latest_date, deltas, split_annual_gains);
        for warning in warnings {
            all_warnings.entry(warning).or_default().push(sec.clone());
        }
        all_txs.extend(txs);
    }

    CollectedSummaryData {
        txs: all_txs,
        warnings: all_warnings,
    }
}
