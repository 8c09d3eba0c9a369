use std::str::FromStr;

use rust_decimal::Decimal;
use time::Date;

use crate::fx::DailyRate;
use crate::util::basic::SError;
use crate::util::date::parse_standard_date;
use crate::verboseln;

pub struct RemoteRateLoadResult {
    pub rates: Vec<DailyRate>,
    // Individual observations that failed to parse. Not fatal; reported and
    // skipped.
    pub non_fatal_errors: Vec<String>,
}

pub trait RemoteRateLoader {
    fn get_remote_usd_cad_rates(
        &mut self,
        year: i32,
    ) -> Result<RemoteRateLoadResult, SError>;
}

// Bank of Canada "valet" API. The daily FXUSDCAD series begins in 2017; the
// legacy noon-rate series covers earlier years.
const USD_CAD_DAILY_SERIES: &str = "FXUSDCAD";
const USD_CAD_NOON_SERIES: &str = "IEXE0101";

fn fx_json_url(year: i32) -> String {
    let series = if year >= 2017 {
        USD_CAD_DAILY_SERIES
    } else {
        USD_CAD_NOON_SERIES
    };
    format!(
        "https://www.bankofcanada.ca/valet/observations/{}/json?\
         start_date={}-01-01&end_date={}-12-31",
        series, year, year
    )
}

fn decimal_from_json(value: &serde_json::Value) -> Result<Decimal, SError> {
    match value {
        serde_json::Value::String(s) => {
            Decimal::from_str(s).map_err(|e| e.to_string())
        }
        serde_json::Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(|e| e.to_string())
        }
        other => Err(format!("value is not a number: {}", other)),
    }
}

pub fn parse_rates_json(json_str: &str) -> Result<RemoteRateLoadResult, SError> {
    let root: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| format!("Error parsing USD/CAD rates: {}", e))?;

    let observations = root
        .get("observations")
        .and_then(|o| o.as_array())
        .ok_or("Error parsing USD/CAD rates: no observations found")?;

    let mut rates = Vec::with_capacity(observations.len());
    let mut non_fatal_errors = Vec::new();

    for obs in observations {
        let date: Option<Date> = obs
            .get("d")
            .and_then(|d| d.as_str())
            .and_then(|s| parse_standard_date(s).ok());
        let date = match date {
            Some(d) => d,
            None => {
                non_fatal_errors
                    .push(format!("observation with invalid date: {}", obs));
                continue;
            }
        };

        let value = obs
            .get(USD_CAD_DAILY_SERIES)
            .or_else(|| obs.get(USD_CAD_NOON_SERIES))
            .and_then(|series| series.get("v"));
        match value.map(decimal_from_json) {
            Some(Ok(rate)) if !rate.is_zero() && rate.is_sign_positive() => {
                rates.push(DailyRate::new(date, rate));
            }
            Some(Ok(rate)) => {
                non_fatal_errors
                    .push(format!("non-positive rate for {}: {}", date, rate));
            }
            Some(Err(e)) => {
                non_fatal_errors.push(format!("bad rate for {}: {}", date, e));
            }
            None => {
                non_fatal_errors.push(format!("no rate value for {}", date));
            }
        }
    }

    rates.sort_by_key(|r| r.date);
    Ok(RemoteRateLoadResult {
        rates,
        non_fatal_errors,
    })
}

/// Fetches USD/CAD rates over HTTP from the Bank of Canada.
pub struct BankOfCanadaRateLoader;

impl BankOfCanadaRateLoader {
    pub fn new_boxed() -> Box<BankOfCanadaRateLoader> {
        Box::new(BankOfCanadaRateLoader)
    }
}

impl RemoteRateLoader for BankOfCanadaRateLoader {
    fn get_remote_usd_cad_rates(
        &mut self,
        year: i32,
    ) -> Result<RemoteRateLoadResult, SError> {
        let url = fx_json_url(year);
        verboseln!("Fetching USD/CAD rates for {} from {}", year, url);
        let body = reqwest::blocking::get(&url)
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| format!("Error fetching rates for {}: {}", year, e))?;
        parse_rates_json(&body)
    }
}

#[cfg(test)]
pub mod testlib {
    use crate::util::basic::SError;

    use super::{RemoteRateLoadResult, RemoteRateLoader};

    /// Remote loader for tests which must not hit the network.
    pub struct MockRemoteRateLoader {
        pub rates_by_year:
            std::collections::HashMap<i32, Vec<crate::fx::DailyRate>>,
    }

    impl RemoteRateLoader for MockRemoteRateLoader {
        fn get_remote_usd_cad_rates(
            &mut self,
            year: i32,
        ) -> Result<RemoteRateLoadResult, SError> {
            match self.rates_by_year.get(&year) {
                Some(rates) => Ok(RemoteRateLoadResult {
                    rates: rates.clone(),
                    non_fatal_errors: Vec::new(),
                }),
                None => Err(format!("no remote rates for {}", year)),
            }
        }
    }

    pub struct UnusableRemoteRateLoader;

    impl RemoteRateLoader for UnusableRemoteRateLoader {
        fn get_remote_usd_cad_rates(
            &mut self,
            _year: i32,
        ) -> Result<RemoteRateLoadResult, SError> {
            Err("attempted remote rate load in test".to_string())
        }
    }
}
