use std::rc::Rc;

use num_rational::BigRational;
use num_traits::Zero;
use rust_decimal::Decimal;

use crate::portfolio::model::tx::Tx;
use crate::portfolio::Security;
use crate::util::decimal::NullableDecimal;
use crate::util::rational::{rational_to_decimal, ShareRatio};

/// The running position of one affiliate in one security, after some Tx.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PortfolioSecurityStatus {
    pub security: Security,
    pub share_balance: BigRational,
    // Sum of share_balance over every affiliate that has ever transacted
    // in this security. Always >= share_balance.
    pub all_affiliates_share_balance: BigRational,
    // Null iff the owning affiliate is registered.
    pub total_acb: NullableDecimal,
}

impl PortfolioSecurityStatus {
    pub fn per_share_acb(&self) -> NullableDecimal {
        if self.total_acb.is_null() {
            return NullableDecimal::NULL;
        }
        if self.share_balance.is_zero() {
            return NullableDecimal::zero();
        }
        self.total_acb
            .checked_div(rational_to_decimal(&self.share_balance))
    }
}

/// The output record for one applied Tx: the position before and after, and
/// every derived quantity a reporting surface needs.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxDelta {
    pub tx: Tx,
    pub pre_status: Rc<PortfolioSecurityStatus>,
    pub post_status: Rc<PortfolioSecurityStatus>,
    // Null for registered affiliates. Zero for BUY/RoC/SfLA.
    pub capital_gain: NullableDecimal,
    // SELL payout before the commission offset. Zero for other actions.
    pub gross_income: Decimal,
    pub superficial_loss: NullableDecimal,
    pub superficial_loss_ratio: Option<ShareRatio>,
    pub potentially_over_applied_sfl: bool,
}

impl TxDelta {
    pub fn acb_delta(&self) -> NullableDecimal {
        self.post_status.total_acb - self.pre_status.total_acb
    }

    pub fn is_superficial_loss(&self) -> bool {
        match self.superficial_loss.value() {
            Some(v) => !v.is_zero(),
            None => false,
        }
    }
}
