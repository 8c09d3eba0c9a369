use std::cmp::Ordering;
use std::fmt::Display;

use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rust_decimal::Decimal;
use time::Date;

use crate::portfolio::csv_common::CsvCol;
use crate::portfolio::model::affiliate::Affiliate;
use crate::portfolio::model::currency::Currency;
use crate::util::basic::SError;
use crate::util::decimal::{is_negative, is_positive};
use crate::util::rational::rational_to_string;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TxAction {
    Buy,
    Sell,
    Roc,  // Return of capital
    Sfla, // Superficial loss ACB adjustment
}

impl TxAction {
    fn pretty_str(&self) -> &str {
        match self {
            TxAction::Buy => "Buy",
            TxAction::Sell => "Sell",
            TxAction::Roc => "RoC",
            TxAction::Sfla => "SfLA",
        }
    }

    // Same-day ordering: adjustments land first, then acquisitions,
    // dispositions, and distributions.
    pub(crate) fn sort_rank(&self) -> u8 {
        match self {
            TxAction::Sfla => 0,
            TxAction::Buy => 1,
            TxAction::Sell => 2,
            TxAction::Roc => 3,
        }
    }
}

impl Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_str())
    }
}

/// A user-specified superficial loss override for a SELL.
/// The value is the total loss disallowed, so always <= 0 (matching how the
/// value is displayed). `force` skips cross-validation against the computed
/// value, and means the user takes responsibility for their own SfLA entries.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SflInput {
    pub value: Decimal,
    pub force: bool,
}

impl SflInput {
    pub fn try_new(value: Decimal, force: bool) -> Result<SflInput, SError> {
        if is_positive(&value) {
            return Err(format!(
                "Superficial loss must not be positive (was {})",
                value
            ));
        }
        Ok(SflInput { value, force })
    }

    pub fn req_new(value: Decimal, force: bool) -> SflInput {
        SflInput::try_new(value, force).unwrap()
    }
}

/// The unvalidated, CSV-shaped transaction record. Every column is optional
/// here; conversion to `Tx` enforces which are required for which action.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RawTx {
    pub security: Option<String>,
    pub trade_date: Option<Date>,
    pub settlement_date: Option<Date>,
    pub action: Option<TxAction>,
    pub shares: Option<BigRational>,
    pub amount_per_share: Option<Decimal>,
    pub commission: Option<Decimal>,

    pub tx_currency: Option<Currency>,
    pub tx_curr_to_local_rate: Option<Decimal>,

    pub commission_currency: Option<Currency>,
    pub commission_curr_to_local_rate: Option<Decimal>,

    pub memo: Option<String>,
    pub affiliate: Option<Affiliate>,

    pub specified_superficial_loss: Option<SflInput>,

    // Order the record was read from its source. Tie-breaks the sort.
    pub read_index: u32,
}

impl Default for RawTx {
    fn default() -> Self {
        RawTx {
            security: None,
            trade_date: None,
            settlement_date: None,
            action: None,
            shares: None,
            amount_per_share: None,
            commission: None,
            tx_currency: None,
            tx_curr_to_local_rate: None,
            commission_currency: None,
            commission_curr_to_local_rate: None,
            memo: None,
            affiliate: None,
            specified_superficial_loss: None,
            read_index: 0,
        }
    }
}

/// A validated transaction. Immutable once constructed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tx {
    pub security: String,
    pub trade_date: Date,
    pub settlement_date: Date,
    pub action: TxAction,
    // >= 0. Zero only for RoC (which distributes against held shares).
    pub shares: BigRational,
    pub amount_per_share: Decimal,
    pub tx_currency: Currency,
    pub tx_curr_to_local_rate: Decimal,
    pub commission: Decimal,
    pub commission_currency: Currency,
    pub commission_curr_to_local_rate: Decimal,
    pub memo: String,
    pub affiliate: Affiliate,
    pub specified_superficial_loss: Option<SflInput>,
    pub read_index: u32,
}

// Resolves a (currency, rate) column pair. A missing rate is implicitly 1
// for the default currency, and an error otherwise (rate lookup happens
// before validation; see io::tx_loader).
fn resolve_currency_and_rate(
    curr_col: &str,
    curr: &Option<Currency>,
    rate_col: &str,
    rate: &Option<Decimal>,
) -> Result<(Currency, Decimal), SError> {
    let currency = curr.clone().unwrap_or_default();
    match rate {
        Some(r) => {
            if !is_positive(r) {
                return Err(format!("\"{rate_col}\" must be a positive value"));
            }
            if currency.is_default() && *r != Decimal::ONE {
                return Err(format!(
                    "Default currency ({}) \"{}\" was not 1 (was {})",
                    currency, rate_col, r
                ));
            }
            Ok((currency, *r))
        }
        None => {
            if currency.is_default() {
                Ok((currency, Decimal::ONE))
            } else {
                Err(format!(
                    "\"{curr_col}\" was {currency}, but \"{rate_col}\" not found"
                ))
            }
        }
    }
}

impl TryFrom<RawTx> for Tx {
    type Error = SError;

    fn try_from(raw: RawTx) -> Result<Self, Self::Error> {
        let not_found = |col: &str| format!("\"{col}\" not found");

        let action = raw.action.ok_or_else(|| not_found(CsvCol::ACTION))?;
        let security = raw.security.ok_or_else(|| not_found(CsvCol::SECURITY))?;
        if security.trim().is_empty() {
            return Err(format!("\"{}\" was empty", CsvCol::SECURITY));
        }

        let shares = match raw.shares {
            Some(s) => {
                if s.is_negative() {
                    return Err(format!(
                        "{} {} must not be negative",
                        action,
                        CsvCol::SHARES
                    ));
                }
                s
            }
            None => match action {
                // RoC distributes against held shares; the column may be
                // omitted entirely.
                TxAction::Roc => BigRational::zero(),
                _ => return Err(not_found(CsvCol::SHARES)),
            },
        };
        if shares.is_zero() && action != TxAction::Roc {
            return Err(format!(
                "{} {} must be a positive value",
                action,
                CsvCol::SHARES
            ));
        }

        let amount_per_share = raw
            .amount_per_share
            .ok_or_else(|| not_found(CsvCol::AMOUNT_PER_SHARE))?;
        if is_negative(&amount_per_share) {
            return Err(format!(
                "{} {} must not be negative",
                action,
                CsvCol::AMOUNT_PER_SHARE
            ));
        }

        let commission = raw.commission.unwrap_or(Decimal::ZERO);
        if is_negative(&commission) {
            return Err(format!(
                "{} {} must not be negative",
                action,
                CsvCol::COMMISSION
            ));
        }

        let (tx_currency, tx_curr_to_local_rate) = resolve_currency_and_rate(
            CsvCol::TX_CURR,
            &raw.tx_currency,
            CsvCol::TX_FX,
            &raw.tx_curr_to_local_rate,
        )?;

        // The commission currency falls back to the transaction currency.
        let (commission_currency, commission_curr_to_local_rate) =
            if raw.commission_currency.is_none()
                && raw.commission_curr_to_local_rate.is_none()
            {
                (tx_currency.clone(), tx_curr_to_local_rate)
            } else {
                resolve_currency_and_rate(
                    CsvCol::COMMISSION_CURR,
                    &raw.commission_currency,
                    CsvCol::COMMISSION_FX,
                    &raw.commission_curr_to_local_rate,
                )?
            };

        let specified_superficial_loss = match action {
            TxAction::Sell => raw.specified_superficial_loss,
            _ => None,
        };

        Ok(Tx {
            security,
            trade_date: raw.trade_date.ok_or_else(|| not_found(CsvCol::TRADE_DATE))?,
            settlement_date: raw
                .settlement_date
                .ok_or_else(|| not_found(CsvCol::SETTLEMENT_DATE))?,
            action,
            shares,
            amount_per_share,
            tx_currency,
            tx_curr_to_local_rate,
            commission,
            commission_currency,
            commission_curr_to_local_rate,
            memo: raw.memo.unwrap_or_default(),
            affiliate: raw.affiliate.unwrap_or_else(Affiliate::default),
            specified_superficial_loss,
            read_index: raw.read_index,
        })
    }
}

impl From<Tx> for RawTx {
    fn from(tx: Tx) -> RawTx {
        RawTx {
            security: Some(tx.security),
            trade_date: Some(tx.trade_date),
            settlement_date: Some(tx.settlement_date),
            action: Some(tx.action),
            shares: Some(tx.shares),
            amount_per_share: Some(tx.amount_per_share),
            commission: Some(tx.commission),
            tx_currency: Some(tx.tx_currency),
            tx_curr_to_local_rate: Some(tx.tx_curr_to_local_rate),
            commission_currency: Some(tx.commission_currency),
            commission_curr_to_local_rate: Some(tx.commission_curr_to_local_rate),
            memo: Some(tx.memo),
            affiliate: Some(tx.affiliate),
            specified_superficial_loss: tx.specified_superficial_loss,
            read_index: tx.read_index,
        }
    }
}

impl Tx {
    pub fn shares_str(&self) -> String {
        rational_to_string(&self.shares)
    }

    fn sort_key(&self) -> (Date, Date, u8, u32) {
        (
            self.settlement_date,
            self.trade_date,
            self.action.sort_rank(),
            self.read_index,
        )
    }
}

// Global ordering: settlement date, then trade date, then the same-day action
// rank, then source order.
impl PartialOrd for Tx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::portfolio::testlib::{mk_date, TTx};
    use crate::portfolio::{Affiliate, Currency, SflInput, TxAction};
    use crate::testlib::assert_vec_eq;
    use crate::util::rational::testlib::rat;

    use super::{RawTx, Tx};

    fn valid_raw(action: TxAction) -> RawTx {
        RawTx {
            security: Some("FOO".to_string()),
            trade_date: Some(mk_date(10)),
            settlement_date: Some(mk_date(12)),
            action: Some(action),
            shares: Some(rat("123.1")),
            amount_per_share: Some(dec!(10.1)),
            read_index: 5,
            ..RawTx::default()
        }
    }

    #[test]
    fn test_raw_to_tx_defaults() {
        let tx = Tx::try_from(valid_raw(TxAction::Buy)).unwrap();
        assert_eq!(tx.security, "FOO");
        assert_eq!(tx.shares, rat("123.1"));
        assert_eq!(tx.commission, dec!(0));
        assert_eq!(tx.tx_currency, Currency::cad());
        assert_eq!(tx.tx_curr_to_local_rate, dec!(1));
        assert_eq!(tx.commission_currency, Currency::cad());
        assert_eq!(tx.commission_curr_to_local_rate, dec!(1));
        assert_eq!(tx.affiliate, Affiliate::default());
        assert_eq!(tx.memo, "");
        assert_eq!(tx.read_index, 5);
    }

    #[test]
    fn test_raw_to_tx_full() {
        let raw = RawTx {
            commission: Some(dec!(1.01)),
            tx_currency: Some(Currency::usd()),
            tx_curr_to_local_rate: Some(dec!(1.21)),
            commission_currency: Some(Currency::new("EUR")),
            commission_curr_to_local_rate: Some(dec!(2.01)),
            memo: Some("A memo".to_string()),
            affiliate: Some(Affiliate::default_registered()),
            specified_superficial_loss: Some(SflInput::req_new(dec!(-2.5), false)),
            ..valid_raw(TxAction::Sell)
        };
        let tx = Tx::try_from(raw).unwrap();
        assert_eq!(tx.tx_currency, Currency::usd());
        assert_eq!(tx.tx_curr_to_local_rate, dec!(1.21));
        assert_eq!(tx.commission_currency, Currency::new("EUR"));
        assert_eq!(tx.commission_curr_to_local_rate, dec!(2.01));
        assert_eq!(tx.affiliate, Affiliate::default_registered());
        assert_eq!(
            tx.specified_superficial_loss,
            Some(SflInput::req_new(dec!(-2.5), false))
        );
    }

    #[test]
    fn test_raw_to_tx_sfl_ignored_on_buy() {
        let raw = RawTx {
            specified_superficial_loss: Some(SflInput::req_new(dec!(-2.5), true)),
            ..valid_raw(TxAction::Buy)
        };
        let tx = Tx::try_from(raw).unwrap();
        assert_eq!(tx.specified_superficial_loss, None);
    }

    #[test]
    fn test_raw_to_tx_errors() {
        let _ = Tx::try_from(RawTx::default()).unwrap_err();

        let mut raw = valid_raw(TxAction::Buy);
        raw.security = Some("  ".to_string());
        assert_eq!(Tx::try_from(raw).unwrap_err(), "\"security\" was empty");

        let mut raw = valid_raw(TxAction::Buy);
        raw.action = None;
        assert_eq!(Tx::try_from(raw).unwrap_err(), "\"action\" not found");

        let mut raw = valid_raw(TxAction::Buy);
        raw.shares = Some(rat("0"));
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "Buy shares must be a positive value"
        );

        let mut raw = valid_raw(TxAction::Sell);
        raw.shares = Some(rat("-1"));
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "Sell shares must not be negative"
        );

        // Non-default currency without a rate
        let mut raw = valid_raw(TxAction::Buy);
        raw.tx_currency = Some(Currency::usd());
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "\"currency\" was USD, but \"exchange rate\" not found"
        );

        // Default currency must have rate 1
        let mut raw = valid_raw(TxAction::Buy);
        raw.tx_currency = Some(Currency::cad());
        raw.tx_curr_to_local_rate = Some(dec!(1.2));
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "Default currency (CAD) \"exchange rate\" was not 1 (was 1.2)"
        );

        // Negative rate
        let mut raw = valid_raw(TxAction::Buy);
        raw.tx_currency = Some(Currency::usd());
        raw.tx_curr_to_local_rate = Some(dec!(-1.2));
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "\"exchange rate\" must be a positive value"
        );

        // Commission currency without a rate
        let mut raw = valid_raw(TxAction::Buy);
        raw.commission_currency = Some(Currency::usd());
        assert_eq!(
            Tx::try_from(raw).unwrap_err(),
            "\"commission currency\" was USD, but \"commission exchange rate\" \
             not found"
        );
    }

    #[test]
    fn test_roc_shares_optional() {
        let mut raw = valid_raw(TxAction::Roc);
        raw.shares = None;
        let tx = Tx::try_from(raw).unwrap();
        assert_eq!(tx.shares, rat("0"));

        // A non-zero share count parses; the applier rejects it.
        let tx = Tx::try_from(valid_raw(TxAction::Roc)).unwrap();
        assert_eq!(tx.shares, rat("123.1"));
    }

    #[test]
    fn test_tx_ordering() {
        let sell = |s_day: i64, ri: u32| {
            TTx {
                t_day: s_day - 2,
                act: TxAction::Sell,
                shares: rat("1"),
                price: dec!(1),
                read_index: ri,
                ..TTx::d()
            }
            .x()
        };
        let buy = |s_day: i64, ri: u32| {
            TTx {
                t_day: s_day - 2,
                act: TxAction::Buy,
                shares: rat("1"),
                price: dec!(1),
                read_index: ri,
                ..TTx::d()
            }
            .x()
        };

        let mut txs = vec![
            sell(4, 1),
            buy(4, 2),
            buy(2, 7),
            sell(6, 3),
            buy(2, 6),
        ];
        txs.sort();

        // Dates ascend; within a day buys precede sells; read index breaks
        // remaining ties.
        let expected = vec![
            buy(2, 6),
            buy(2, 7),
            buy(4, 2),
            sell(4, 1),
            sell(6, 3),
        ];
        assert_vec_eq(txs.clone(), expected);

        // Sorting is idempotent.
        let once = txs.clone();
        txs.sort();
        assert_vec_eq(txs, once);
    }

    #[test]
    fn test_sfl_input_validation() {
        assert!(SflInput::try_new(dec!(0.01), false).is_err());
        assert!(SflInput::try_new(dec!(0), false).is_ok());
        assert!(SflInput::try_new(dec!(-1), true).is_ok());
        assert_eq!(SflInput::req_new(dec!(-1), true).value, Decimal::from(-1));
    }
}
