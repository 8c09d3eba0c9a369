use std::fmt::Display;

use rust_decimal::Decimal;
use thiserror::Error;
use time::Date;

/// Identifies the offending transaction in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIdent {
    pub security: String,
    pub trade_date: Date,
    pub shares: String,
}

impl Display for TxIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "on {} of {} shares of {}",
            self.trade_date, self.shares, self.security
        )
    }
}

/// Errors produced while folding transactions for one security.
/// Each aborts that security's fold only; other securities are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcbError {
    // Pre-state inconsistencies. These indicate a bug rather than bad input.
    #[error("In transaction {tx}, {msg}")]
    Sanity { tx: TxIdent, msg: String },

    #[error("Sell order {tx} is more than the current holdings ({balance})")]
    Oversell { tx: TxIdent, balance: String },

    #[error(
        "Invalid RoC tx {tx}: registered affiliates do not have an ACB to adjust"
    )]
    RocOnRegistered { tx: TxIdent },

    #[error("Invalid RoC tx {tx}: the number of shares must be zero")]
    RocWithShares { tx: TxIdent },

    #[error("Invalid RoC tx {tx}: RoC ({reduction}) exceeds the current ACB ({acb})")]
    RocExceedsAcb {
        tx: TxIdent,
        reduction: Decimal,
        acb: Decimal,
    },

    #[error(
        "Invalid SfLA tx {tx}: registered affiliates do not have an ACB to adjust"
    )]
    SflaOnRegistered { tx: TxIdent },

    #[error(
        "Invalid SfLA tx {tx}: currency is not the default, and/or the exchange \
         rate is not 1"
    )]
    SflaBadCurrency { tx: TxIdent },

    #[error(
        "Sell order {tx}: superficial loss was specified, but the difference \
         between the specified value ({specified}) and the computed value \
         ({computed}) is greater than the max allowed discrepancy ({max_diff}). \
         To force this SfL value, append an '!' to the value"
    )]
    SflMismatch {
        tx: TxIdent,
        specified: Decimal,
        computed: Decimal,
        max_diff: Decimal,
    },

    #[error(
        "Sell order {tx}: superficial loss was specified, but there is no \
         capital loss"
    )]
    SflWithoutLoss { tx: TxIdent },

    #[error("Unknown affiliate '{id}'")]
    UnknownAffiliate { id: String },

    #[error("Initial status was specified more than once for {security}")]
    DuplicateInitialStatus { security: String },
}
