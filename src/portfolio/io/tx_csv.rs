use std::str::FromStr;

use rust_decimal::Decimal;

use crate::portfolio::csv_common::CsvCol;
use crate::portfolio::{Affiliate, Currency, RawTx, SflInput, TxAction};
use crate::util::basic::SError;
use crate::util::date::DynDateFormat;
use crate::util::rational::{parse_rational, rational_to_string};
use crate::util::rw::DescribedReader;

#[derive(Default)]
pub struct TxCsvParseOptions {
    pub date_format: Option<DynDateFormat>,
}

fn parse_csv_action(value: &str) -> Result<TxAction, SError> {
    match value.trim().to_lowercase().as_str() {
        "buy" => Ok(TxAction::Buy),
        "sell" => Ok(TxAction::Sell),
        "roc" => Ok(TxAction::Roc),
        "sfla" => Ok(TxAction::Sfla),
        _ => Err(format!("Invalid action '{}'", value)),
    }
}

// A trailing '!' forces the value past cross-validation.
fn parse_csv_superficial_loss(value: &str) -> Result<SflInput, SError> {
    let value = value.trim();
    let force = value.ends_with('!');
    let num_str = if force {
        &value[..value.len() - 1]
    } else {
        value
    };
    let number = Decimal::from_str(num_str).map_err(|_| {
        format!("Invalid number in {}: {}", CsvCol::SUPERFICIAL_LOSS, num_str)
    })?;
    SflInput::try_new(number, force)
}

fn parse_decimal(value: &str, col: &str) -> Result<Decimal, SError> {
    Decimal::from_str(value.trim()).map_err(|e| {
        format!("Failed to parse number for {} ('{}'): {}", col, value, e)
    })
}

/// Parses one CSV file into RawTx records. `first_read_index` is the global
/// record counter, so records keep their overall input order across files.
pub fn parse_tx_csv(
    reader: &DescribedReader,
    first_read_index: u32,
    options: &TxCsvParseOptions,
) -> Result<Vec<RawTx>, SError> {
    let desc = reader.desc().to_string();
    let io_reader = reader
        .reader()
        .map_err(|e| format!("Could not open {}: {}", desc, e))?;
    let mut csv_r = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(io_reader);

    let headers: Vec<String> = csv_r
        .headers()
        .map_err(|e| format!("Error reading headers of {}: {}", desc, e))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let known_cols = CsvCol::all_cols();
    for header in &headers {
        if !known_cols.contains(header.as_str()) {
            return Err(format!(
                "Unrecognized column \"{}\" in {}",
                header, desc
            ));
        }
    }

    let parse_date = |value: &str, col: &str| {
        crate::util::date::parse_date(value, &options.date_format)
            .map_err(|e| format!("Failed to parse {} \"{}\": {}", col, value, e))
    };

    let mut txs = Vec::new();
    for (row_num, record) in csv_r.records().enumerate() {
        let record = record
            .map_err(|e| format!("Error reading {} row {}: {}", desc, row_num + 2, e))?;

        let mut raw = RawTx {
            read_index: first_read_index + row_num as u32,
            ..RawTx::default()
        };

        let row_err = |col: &str, e: SError| {
            format!("Error on row {} of {}, in \"{}\": {}", row_num + 2, desc, col, e)
        };

        for (col, value) in headers.iter().zip(record.iter()) {
            if value.trim().is_empty() {
                continue;
            }
            match col.as_str() {
                CsvCol::SECURITY => raw.security = Some(value.to_string()),
                CsvCol::TRADE_DATE => {
                    raw.trade_date = Some(
                        parse_date(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::SETTLEMENT_DATE => {
                    raw.settlement_date = Some(
                        parse_date(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::ACTION => {
                    raw.action = Some(
                        parse_csv_action(value).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::SHARES => {
                    raw.shares = Some(
                        parse_rational(value).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::AMOUNT_PER_SHARE => {
                    raw.amount_per_share = Some(
                        parse_decimal(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::COMMISSION => {
                    raw.commission = Some(
                        parse_decimal(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::TX_CURR => {
                    raw.tx_currency = Some(Currency::new(value))
                }
                CsvCol::TX_FX => {
                    raw.tx_curr_to_local_rate = Some(
                        parse_decimal(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::COMMISSION_CURR => {
                    raw.commission_currency = Some(Currency::new(value))
                }
                CsvCol::COMMISSION_FX => {
                    raw.commission_curr_to_local_rate = Some(
                        parse_decimal(value, col).map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::SUPERFICIAL_LOSS => {
                    raw.specified_superficial_loss = Some(
                        parse_csv_superficial_loss(value)
                            .map_err(|e| row_err(col, e))?,
                    )
                }
                CsvCol::AFFILIATE => {
                    raw.affiliate = Some(Affiliate::from_label(value))
                }
                CsvCol::MEMO => raw.memo = Some(value.to_string()),
                _ => unreachable!("column was validated above"),
            }
        }

        txs.push(raw);
    }

    Ok(txs)
}

/// Writes RawTxs with the standard column set. The inverse of parse_tx_csv,
/// used to emit generated summaries.
pub fn write_txs_to_csv(
    txs: &[RawTx],
    writer: &mut dyn std::io::Write,
) -> Result<(), SError> {
    let mut csv_w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_w
        .write_record(CsvCol::export_order_cols())
        .map_err(|e| e.to_string())?;

    for tx in txs {
        let opt_str = |v: &Option<String>| v.clone().unwrap_or_default();
        let date_str = |v: &Option<time::Date>| {
            v.map(|d| d.to_string()).unwrap_or_default()
        };
        let dec_str =
            |v: &Option<Decimal>| v.map(|d| d.to_string()).unwrap_or_default();

        // The default currency is implicit; leave its columns blank.
        let (curr, rate) = match &tx.tx_currency {
            Some(c) if !c.is_default() => (
                c.to_string(),
                dec_str(&tx.tx_curr_to_local_rate),
            ),
            _ => (String::new(), String::new()),
        };
        let (comm_curr, comm_rate) = match &tx.commission_currency {
            Some(c) if !c.is_default() => (
                c.to_string(),
                dec_str(&tx.commission_curr_to_local_rate),
            ),
            _ => (String::new(), String::new()),
        };

        let sfl = match &tx.specified_superficial_loss {
            Some(sfl) => {
                format!("{}{}", sfl.value, if sfl.force { "!" } else { "" })
            }
            None => String::new(),
        };

        let record = [
            opt_str(&tx.security),
            date_str(&tx.trade_date),
            date_str(&tx.settlement_date),
            tx.action.map(|a| a.to_string()).unwrap_or_default(),
            tx.shares
                .as_ref()
                .map(rational_to_string)
                .unwrap_or_default(),
            dec_str(&tx.amount_per_share),
            dec_str(&tx.commission),
            curr,
            rate,
            comm_curr,
            comm_rate,
            sfl,
            tx.affiliate
                .as_ref()
                .map(|af| af.name().to_string())
                .unwrap_or_default(),
            opt_str(&tx.memo),
        ];
        csv_w.write_record(&record).map_err(|e| e.to_string())?;
    }

    csv_w.flush().map_err(|e| e.to_string())
}
