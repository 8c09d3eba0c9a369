use std::collections::HashMap;

use itertools::Itertools;
use time::Date;

use crate::fx::io::RateLoader;
use crate::portfolio::bookkeeping::{
    split_txs_by_security, txs_to_delta_list, DeltaListResult,
};
use crate::portfolio::cumulative_gains::{
    calc_portfolio_cumulative_gains, calc_security_cumulative_gains,
};
use crate::portfolio::io::tx_csv::{
    parse_tx_csv, write_txs_to_csv, TxCsvParseOptions,
};
use crate::portfolio::io::tx_loader::load_tx_rates;
use crate::portfolio::render::{
    render_aggregate_gains, render_tx_table, RenderTable,
};
use crate::portfolio::summary::{make_aggregate_summary_txs, CollectedSummaryData};
use crate::portfolio::{
    CumulativeGains, PortfolioSecurityStatus, RawTx, Security, Tx, TxDelta,
};
use crate::util::basic::SError;
use crate::util::rw::{DescribedReader, WriteHandle};
use crate::write_errln;

use super::outfmt::model::{OutputType, TableWriter};

pub struct Options {
    pub render_full_dollar_values: bool,
    pub summary_mode_latest_date: Option<Date>,
    pub split_annual_summary_gains: bool,
    pub csv_output_dir: Option<String>,
    pub csv_parse_options: TxCsvParseOptions,
}

impl Options {
    pub fn summary_mode(&self) -> bool {
        self.summary_mode_latest_date.is_some()
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            render_full_dollar_values: false,
            summary_mode_latest_date: None,
            split_annual_summary_gains: false,
            csv_output_dir: None,
            csv_parse_options: TxCsvParseOptions::default(),
        }
    }
}

/// Parses, rate-fills, validates, sorts and folds everything, yielding the
/// per-security delta results. No aggregation happens here.
pub fn run_acb_app_to_delta_models(
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    csv_parse_options: &TxCsvParseOptions,
    rate_loader: &mut RateLoader,
) -> Result<HashMap<Security, DeltaListResult>, SError> {
    let mut all_txs = Vec::<Tx>::new();
    let mut global_read_index: u32 = 0;

    for reader in csv_readers {
        let mut raw_txs =
            parse_tx_csv(reader, global_read_index, csv_parse_options)?;
        load_tx_rates(&mut raw_txs, rate_loader)?;
        global_read_index += raw_txs.len() as u32;

        for raw in raw_txs {
            let record_num = raw.read_index;
            let tx = Tx::try_from(raw).map_err(|e| {
                format!("Transaction {} of {}: {}", record_num + 1, reader.desc(), e)
            })?;
            all_txs.push(tx);
        }
    }

    all_txs.sort();
    let txs_by_sec = split_txs_by_security(all_txs);

    let mut delta_results = HashMap::<Security, DeltaListResult>::new();
    for (sec, sec_txs) in txs_by_sec {
        let init_status = all_init_status
            .get(&sec)
            .map(|status| std::rc::Rc::new(status.clone()));
        let result = txs_to_delta_list(&sec_txs, init_status);
        delta_results.insert(sec, result);
    }
    Ok(delta_results)
}

pub struct AppRenderResult {
    pub security_tables: HashMap<Security, RenderTable>,
    pub aggregate_gains_table: RenderTable,
}

/// Runs the app in its default mode, producing format-agnostic render
/// tables that any TableWriter can consume.
pub fn run_acb_app_to_render_model(
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    options: &Options,
    rate_loader: &mut RateLoader,
) -> Result<AppRenderResult, SError> {
    let delta_results = run_acb_app_to_delta_models(
        csv_readers,
        all_init_status,
        &options.csv_parse_options,
        rate_loader,
    )?;

    let mut gains_by_sec = HashMap::<Security, CumulativeGains>::new();
    for (sec, result) in &delta_results {
        if result.is_ok() {
            gains_by_sec.insert(
                sec.clone(),
                calc_security_cumulative_gains(&result.deltas),
            );
        }
    }
    let aggregate_gains = calc_portfolio_cumulative_gains(&gains_by_sec);

    let default_gains = CumulativeGains::default();
    let mut security_tables = HashMap::new();
    for (sec, result) in delta_results {
        let gains = gains_by_sec.get(&sec).unwrap_or(&default_gains);
        let mut table = render_tx_table(
            &result.deltas,
            gains,
            options.render_full_dollar_values,
        );
        if let Some(err) = &result.error {
            table.errors.push(err.to_string());
        }
        security_tables.insert(sec, table);
    }

    Ok(AppRenderResult {
        security_tables,
        aggregate_gains_table: render_aggregate_gains(
            &aggregate_gains,
            options.render_full_dollar_values,
        ),
    })
}

// Returns the securities which had errors.
fn write_render_result(
    render_res: &AppRenderResult,
    writer: &mut dyn TableWriter,
) -> Result<Vec<Security>, SError> {
    let mut secs_with_errors = Vec::<Security>::new();
    for sec in render_res.security_tables.keys().sorted() {
        let table = &render_res.security_tables[sec];
        writer
            .print_render_table(OutputType::Transactions, sec, table)
            .map_err(|e| format!("Rendering transactions for {}: {}", sec, e))?;
        if !table.errors.is_empty() {
            secs_with_errors.push(sec.clone());
        }
    }

    writer
        .print_render_table(
            OutputType::AggregateGains,
            "",
            &render_res.aggregate_gains_table,
        )
        .map_err(|e| format!("Rendering aggregate gains: {}", e))?;

    Ok(secs_with_errors)
}

pub fn run_acb_app_to_writer(
    writer: &mut dyn TableWriter,
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    options: &Options,
    rate_loader: &mut RateLoader,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let render_res = match run_acb_app_to_render_model(
        csv_readers,
        all_init_status,
        options,
        rate_loader,
    ) {
        Ok(res) => res,
        Err(e) => {
            write_errln!(err_printer, "Error: {}", e);
            return Err(());
        }
    };

    match write_render_result(&render_res, writer) {
        Ok(secs_with_errors) => {
            if !secs_with_errors.is_empty() {
                write_errln!(
                    err_printer,
                    "[!] There are errors for the following securities: {}",
                    secs_with_errors.join(", ")
                );
                return Err(());
            }
            Ok(())
        }
        Err(e) => {
            write_errln!(err_printer, "Error: {}", e);
            Err(())
        }
    }
}

pub fn run_acb_app_summary_to_model(
    latest_date: Date,
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    options: &Options,
    rate_loader: &mut RateLoader,
) -> Result<CollectedSummaryData, Vec<SError>> {
    let delta_results = run_acb_app_to_delta_models(
        csv_readers,
        all_init_status,
        &options.csv_parse_options,
        rate_loader,
    )
    .map_err(|e| vec![e])?;

    let mut deltas_by_sec = HashMap::<Security, Vec<TxDelta>>::new();
    let mut errors = Vec::new();
    for (sec, result) in delta_results {
        match result.error {
            None => {
                deltas_by_sec.insert(sec, result.deltas);
            }
            Some(e) => errors.push(format!("Error in {}: {}", sec, e)),
        }
    }
    if !errors.is_empty() {
        errors.sort();
        return Err(errors);
    }

    Ok(make_aggregate_summary_txs(
        latest_date,
        &deltas_by_sec,
        options.split_annual_summary_gains,
    ))
}

pub fn run_acb_app_summary_to_console(
    latest_date: Date,
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    options: &Options,
    rate_loader: &mut RateLoader,
    mut err_printer: WriteHandle,
) -> Result<(), ()> {
    let summary = match run_acb_app_summary_to_model(
        latest_date,
        csv_readers,
        all_init_status,
        options,
        rate_loader,
    ) {
        Ok(summary) => summary,
        Err(errors) => {
            for e in errors {
                write_errln!(err_printer, "{}", e);
            }
            return Err(());
        }
    };

    if !summary.warnings.is_empty() {
        write_errln!(err_printer, "Warnings:");
        let mut warnings: Vec<(&String, &Vec<Security>)> =
            summary.warnings.iter().collect();
        warnings.sort();
        for (warning, secs) in warnings {
            write_errln!(err_printer, " {}. Encountered for {}", warning, secs.join(","));
        }
        write_errln!(err_printer, "");
    }

    if !summary.txs.is_empty() {
        let raw_txs: Vec<RawTx> =
            summary.txs.into_iter().map(RawTx::from).collect();
        let mut stdout = WriteHandle::stdout_write_handle();
        if let Err(e) = write_txs_to_csv(&raw_txs, &mut stdout) {
            write_errln!(err_printer, "Error: {}", e);
            return Err(());
        }
    }

    Ok(())
}

pub fn run_acb_app_to_console(
    csv_readers: &[DescribedReader],
    all_init_status: &HashMap<Security, PortfolioSecurityStatus>,
    options: Options,
    mut rate_loader: RateLoader,
    err_printer: WriteHandle,
) -> Result<(), ()> {
    if let Some(latest_date) = options.summary_mode_latest_date {
        return run_acb_app_summary_to_console(
            latest_date,
            csv_readers,
            all_init_status,
            &options,
            &mut rate_loader,
            err_printer,
        );
    }

    let mut writer: Box<dyn TableWriter> = match &options.csv_output_dir {
        Some(dir_path) => {
            match super::outfmt::csv::CsvWriter::new_to_output_dir(dir_path) {
                Ok(w) => Box::new(w),
                Err(e) => {
                    let mut err_printer = err_printer;
                    write_errln!(err_printer, "{}", e);
                    return Err(());
                }
            }
        }
        None => Box::new(super::outfmt::text::TextWriter::new(
            WriteHandle::stdout_write_handle(),
        )),
    };

    run_acb_app_to_writer(
        writer.as_mut(),
        csv_readers,
        all_init_status,
        &options,
        &mut rate_loader,
        err_printer,
    )
}
