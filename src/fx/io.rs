mod rate_loader;
mod rates_cache;
mod remote_rate_loader;

pub use rate_loader::RateLoader;
pub use rates_cache::{CsvRatesCache, InMemoryRatesCache, RatesCache};
pub use remote_rate_loader::{
    BankOfCanadaRateLoader, RemoteRateLoader, RemoteRateLoadResult,
};

#[cfg(test)]
pub use remote_rate_loader::testlib as remote_testlib;
