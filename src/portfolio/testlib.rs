use std::rc::Rc;

use num_rational::BigRational;
use num_traits::Zero;
use rust_decimal::Decimal;
use time::Date;

use crate::portfolio::{
    Affiliate, Currency, PortfolioSecurityStatus, SflInput, Tx, TxAction,
};
use crate::util::date::testlib::doy_date;
use crate::util::decimal::NullableDecimal;

pub fn default_sec() -> String {
    "FOO".to_string()
}

/// Date at `day` days after Jan 1, 2017.
pub fn mk_date(day: i64) -> Date {
    doy_date(2017, day)
}

/// Terse Tx builder. The settlement date lands two days after the trade
/// date, like a real T+2 settlement.
pub struct TTx {
    pub sec: String,
    pub t_day: i64,
    pub act: TxAction,
    pub shares: BigRational,
    pub price: Decimal,
    pub comm: Decimal,
    pub curr: Currency,
    pub rate: Decimal,
    pub af: Affiliate,
    pub sfl: Option<SflInput>,
    pub memo: String,
    pub read_index: u32,
}

impl TTx {
    pub fn x(self) -> Tx {
        Tx {
            security: self.sec,
            trade_date: mk_date(self.t_day),
            settlement_date: mk_date(self.t_day + 2),
            action: self.act,
            shares: self.shares,
            amount_per_share: self.price,
            tx_currency: self.curr.clone(),
            tx_curr_to_local_rate: self.rate,
            commission: self.comm,
            commission_currency: self.curr,
            commission_curr_to_local_rate: self.rate,
            memo: self.memo,
            affiliate: self.af,
            specified_superficial_loss: self.sfl,
            read_index: self.read_index,
        }
    }

    pub fn d() -> TTx {
        TTx::default()
    }
}

impl Default for TTx {
    fn default() -> Self {
        TTx {
            sec: default_sec(),
            t_day: 0,
            act: TxAction::Buy,
            shares: BigRational::zero(),
            price: Decimal::ZERO,
            comm: Decimal::ZERO,
            curr: Currency::cad(),
            rate: Decimal::ONE,
            af: Affiliate::default(),
            sfl: None,
            memo: String::new(),
            read_index: 0,
        }
    }
}

/// Terse PortfolioSecurityStatus builder.
/// `all_shares` of None means "same as shares".
pub struct TStat {
    pub sec: String,
    pub shares: BigRational,
    pub all_shares: Option<BigRational>,
    pub acb: Option<Decimal>,
}

impl TStat {
    pub fn x(self) -> Rc<PortfolioSecurityStatus> {
        let all = self.all_shares.unwrap_or_else(|| self.shares.clone());
        Rc::new(PortfolioSecurityStatus {
            security: self.sec,
            share_balance: self.shares,
            all_affiliates_share_balance: all,
            total_acb: NullableDecimal::from(self.acb),
        })
    }

    pub fn d() -> TStat {
        TStat::default()
    }
}

impl Default for TStat {
    fn default() -> Self {
        TStat {
            sec: default_sec(),
            shares: BigRational::zero(),
            all_shares: None,
            acb: None,
        }
    }
}
