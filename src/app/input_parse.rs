use std::collections::HashMap;
use std::str::FromStr;

use num_traits::Signed;
use rust_decimal::Decimal;

use crate::portfolio::{AcbError, PortfolioSecurityStatus, Security};
use crate::util::basic::SError;
use crate::util::decimal::{is_negative, NullableDecimal};
use crate::util::rational::parse_rational;

/// Parses repeated initial-status flag values, each formatted as
/// SYM:nShares:totalAcb (eg. GOOG:20:1000.00).
pub fn parse_initial_status(
    initial_states: &[String],
) -> Result<HashMap<Security, PortfolioSecurityStatus>, SError> {
    let mut statuses =
        HashMap::<Security, PortfolioSecurityStatus>::with_capacity(
            initial_states.len(),
        );

    for opt in initial_states {
        let parts: Vec<&str> = opt.split(':').collect();
        if parts.len() != 3 {
            return Err(format!("Invalid initial status format '{}'", opt));
        }
        let symbol = parts[0].trim().to_string();
        if symbol.is_empty() {
            return Err("Symbol was empty".to_string());
        }

        let shares = parse_rational(parts[1])
            .map_err(|e| format!("Invalid shares format '{}'. {}", parts[1], e))?;
        if shares.is_negative() {
            return Err(format!("Shares {} were negative", parts[1]));
        }

        let acb = Decimal::from_str(parts[2].trim())
            .map_err(|e| format!("Invalid ACB format '{}'. {}", parts[2], e))?;
        if is_negative(&acb) {
            return Err(format!("ACB {} was negative", acb));
        }

        if statuses.contains_key(&symbol) {
            return Err(AcbError::DuplicateInitialStatus { security: symbol }
                .to_string());
        }
        statuses.insert(
            symbol.clone(),
            PortfolioSecurityStatus {
                security: symbol,
                share_balance: shares.clone(),
                all_affiliates_share_balance: shares,
                total_acb: NullableDecimal::from(acb),
            },
        );
    }

    Ok(statuses)
}
