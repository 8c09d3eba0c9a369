use rust_decimal::Decimal;

use crate::fx::io::RateLoader;
use crate::portfolio::{Currency, RawTx};
use crate::util::basic::SError;

// Resolves the rate for one (currency, date) pair. Only USD needs lookup;
// the default currency is always 1, and anything else must come with an
// explicit rate in the input.
fn rate_for(
    currency: &Currency,
    trade_date: time::Date,
    rate_loader: &mut RateLoader,
) -> Result<Decimal, SError> {
    if currency.is_default() {
        Ok(Decimal::ONE)
    } else if *currency == Currency::usd() {
        Ok(rate_loader
            .get_effective_usd_cad_rate(trade_date)?
            .foreign_to_local_rate)
    } else {
        Err(format!(
            "Automatic exchange rates are only supported for USD (found {}). \
             Provide the rate explicitly",
            currency
        ))
    }
}

/// Fills in any missing exchange rates by (currency, trade date) lookup.
/// Rates the user provided are left untouched.
pub fn load_tx_rates(
    txs: &mut [RawTx],
    rate_loader: &mut RateLoader,
) -> Result<(), SError> {
    for tx in txs.iter_mut() {
        let trade_date = match tx.trade_date {
            Some(d) => d,
            // Left for Tx validation to report.
            None => continue,
        };

        if tx.tx_curr_to_local_rate.is_none() {
            if let Some(currency) = &tx.tx_currency {
                if !currency.is_default() {
                    tx.tx_curr_to_local_rate =
                        Some(rate_for(currency, trade_date, rate_loader)?);
                }
            }
        }

        if tx.commission_curr_to_local_rate.is_none() {
            if let Some(currency) = &tx.commission_currency {
                if !currency.is_default() {
                    tx.commission_curr_to_local_rate =
                        Some(rate_for(currency, trade_date, rate_loader)?);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;

    use crate::fx::io::remote_testlib::MockRemoteRateLoader;
    use crate::fx::io::{InMemoryRatesCache, RateLoader};
    use crate::fx::DailyRate;
    use crate::portfolio::{Currency, RawTx};
    use crate::util::date::testlib::{doy_date, hold_today_for_test};
    use crate::util::rw::WriteHandle;

    use super::load_tx_rates;

    fn test_rate_loader() -> RateLoader {
        RateLoader::new(
            false,
            Box::new(InMemoryRatesCache::new()),
            Box::new(MockRemoteRateLoader {
                rates_by_year: HashMap::from([(
                    2022,
                    vec![DailyRate::new(doy_date(2022, 9), dec!(1.35))],
                )]),
            }),
            WriteHandle::empty_write_handle(),
        )
    }

    #[test]
    fn test_usd_rate_fill() {
        let _today = hold_today_for_test(doy_date(2022, 50));
        let mut txs = vec![RawTx {
            trade_date: Some(doy_date(2022, 10)),
            tx_currency: Some(Currency::usd()),
            ..RawTx::default()
        }];
        load_tx_rates(&mut txs, &mut test_rate_loader()).unwrap();
        // Day 10 had no published rate; the preceding day's applies.
        assert_eq!(txs[0].tx_curr_to_local_rate, Some(dec!(1.35)));
    }

    #[test]
    fn test_explicit_rate_untouched() {
        let _today = hold_today_for_test(doy_date(2022, 50));
        let mut txs = vec![RawTx {
            trade_date: Some(doy_date(2022, 10)),
            tx_currency: Some(Currency::usd()),
            tx_curr_to_local_rate: Some(dec!(1.5)),
            ..RawTx::default()
        }];
        load_tx_rates(&mut txs, &mut test_rate_loader()).unwrap();
        assert_eq!(txs[0].tx_curr_to_local_rate, Some(dec!(1.5)));
    }

    #[test]
    fn test_unsupported_currency() {
        let _today = hold_today_for_test(doy_date(2022, 50));
        let mut txs = vec![RawTx {
            trade_date: Some(doy_date(2022, 10)),
            tx_currency: Some(Currency::new("EUR")),
            ..RawTx::default()
        }];
        let err = load_tx_rates(&mut txs, &mut test_rate_loader()).unwrap_err();
        crate::testlib::assert_re("only supported for USD", &err);
    }

    #[test]
    fn test_default_currency_needs_no_rate() {
        let _today = hold_today_for_test(doy_date(2022, 50));
        let mut txs = vec![RawTx {
            trade_date: Some(doy_date(2022, 10)),
            tx_currency: Some(Currency::cad()),
            ..RawTx::default()
        }];
        load_tx_rates(&mut txs, &mut test_rate_loader()).unwrap();
        assert_eq!(txs[0].tx_curr_to_local_rate, None);
    }
}
