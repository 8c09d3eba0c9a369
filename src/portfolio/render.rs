use num_traits::Signed;
use rust_decimal::Decimal;

use crate::portfolio::{Currency, CumulativeGains, TxAction, TxDelta};
use crate::util::decimal::{dollar_precision_str, is_negative, is_positive};
use crate::util::rational::rational_to_string;

/// Output-format-agnostic table. The text and CSV writers both consume this.
pub struct RenderTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<String>,
    pub notes: Vec<String>,
    pub errors: Vec<String>,
}

impl RenderTable {
    fn new() -> RenderTable {
        RenderTable {
            header: Vec::new(),
            rows: Vec::new(),
            footer: Vec::new(),
            notes: Vec::new(),
            errors: Vec::new(),
        }
    }
}

fn env_flag_set(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !(v.trim().is_empty() || v.trim() == "0"),
        Err(_) => false,
    }
}

// Inserts thousands separators into a plain decimal string.
fn thousands_separated(s: &str) -> String {
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

struct PrintHelper {
    print_all_decimals: bool,
    display_nan: bool,
    humanize: bool,
}

impl PrintHelper {
    fn new(print_all_decimals: bool) -> PrintHelper {
        PrintHelper {
            print_all_decimals,
            // Render null as NaN rather than a dash. Occasionally clearer
            // when debugging.
            display_nan: env_flag_set("DISPLAY_NAN"),
            humanize: env_flag_set("HUMANIZE"),
        }
    }

    fn null_str(&self) -> &str {
        if self.display_nan {
            "NaN"
        } else {
            "-"
        }
    }

    fn curr_str(&self, val: Decimal) -> String {
        let s = if self.print_all_decimals {
            val.to_string()
        } else {
            dollar_precision_str(&val)
        };
        if self.humanize {
            thousands_separated(&s)
        } else {
            s
        }
    }

    fn dollar_str(&self, opt_val: Option<Decimal>) -> String {
        match opt_val {
            Some(val) => format!("${}", self.curr_str(val)),
            None => self.null_str().to_string(),
        }
    }

    /// A currency value, converted to the local currency, with the original
    /// amount appended when it is in a foreign currency.
    fn curr_with_fx_str(&self, val: Decimal, curr: &Currency, rate: Decimal) -> String {
        if curr.is_default() {
            self.dollar_str(Some(val))
        } else {
            format!(
                "{}\n({} {})",
                self.dollar_str(Some(val * rate)),
                self.curr_str(val),
                curr
            )
        }
    }

    fn plus_minus_dollar(&self, opt_val: Option<Decimal>, show_plus: bool) -> String {
        let val = match opt_val {
            Some(v) => v,
            None => return self.null_str().to_string(),
        };
        if is_negative(&val) {
            format!("-${}", self.curr_str(-val))
        } else {
            let plus = if show_plus { "+" } else { "" };
            format!("{}${}", plus, self.curr_str(val))
        }
    }
}

fn str_or_dash(use_str: bool, s: String) -> String {
    if use_str {
        s
    } else {
        "-".to_string()
    }
}

pub fn render_tx_table(
    deltas: &[TxDelta],
    gains: &CumulativeGains,
    render_full_dollar_values: bool,
) -> RenderTable {
    let mut table = RenderTable::new();
    table.header = [
        "Security", "Trade Date", "Settl. Date", "TX", "Amount", "Shares",
        "Amt/Share", "ACB", "Commission", "Cap. Gain", "Share Balance",
        "ACB +/-", "New ACB", "New ACB/Share", "Affiliate", "Memo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let ph = PrintHelper::new(render_full_dollar_values);

    let mut saw_superficial_loss = false;
    let mut saw_over_applied_sfl = false;

    for d in deltas {
        let tx = &d.tx;

        let mut sfl_annotation = String::new();
        if d.is_superficial_loss() {
            let forced = tx
                .specified_superficial_loss
                .as_ref()
                .map(|sfl| sfl.force)
                .unwrap_or(false);
            let ratio_str = match &d.superficial_loss_ratio {
                Some(ratio) => ratio.to_string(),
                None => "??".to_string(),
            };
            sfl_annotation = format!(
                " *\n(SfL {}{}; {}{})",
                ph.plus_minus_dollar(d.superficial_loss.value(), false),
                if forced { "!" } else { "" },
                ratio_str,
                if d.potentially_over_applied_sfl { " [1]" } else { "" },
            );
            saw_superficial_loss = true;
            saw_over_applied_sfl |= d.potentially_over_applied_sfl;
        }

        // RoC distributes against held shares rather than transacted ones.
        let displayed_shares = match tx.action {
            TxAction::Roc => &d.pre_status.share_balance,
            _ => &tx.shares,
        };
        let shares_dec =
            crate::util::rational::rational_to_decimal(displayed_shares);

        let acb_of_sale = if tx.action == TxAction::Sell
            && d.pre_status.share_balance.is_positive()
        {
            d.pre_status
                .per_share_acb()
                .value()
                .map(|psa| ph.dollar_str(Some(psa * shares_dec)))
        } else {
            None
        };

        let post_share_balance = if d.post_status.share_balance
            == d.post_status.all_affiliates_share_balance
        {
            rational_to_string(&d.post_status.share_balance)
        } else {
            format!(
                "{} / {}",
                rational_to_string(&d.post_status.share_balance),
                rational_to_string(&d.post_status.all_affiliates_share_balance)
            )
        };

        let new_acb_per_share = if d.post_status.share_balance.is_positive() {
            d.post_status.per_share_acb().value()
        } else {
            None
        };

        let row: Vec<String> = vec![
            tx.security.clone(),
            tx.trade_date.to_string(),
            tx.settlement_date.to_string(),
            tx.action.to_string(),
            ph.curr_with_fx_str(
                shares_dec * tx.amount_per_share,
                &tx.tx_currency,
                tx.tx_curr_to_local_rate,
            ),
            rational_to_string(displayed_shares),
            ph.curr_with_fx_str(
                tx.amount_per_share,
                &tx.tx_currency,
                tx.tx_curr_to_local_rate,
            ),
            acb_of_sale.unwrap_or_else(|| "-".to_string()),
            str_or_dash(
                !tx.commission.is_zero(),
                ph.curr_with_fx_str(
                    tx.commission,
                    &tx.commission_currency,
                    tx.commission_curr_to_local_rate,
                ),
            ),
            str_or_dash(
                tx.action == TxAction::Sell,
                format!(
                    "{}{}",
                    ph.plus_minus_dollar(d.capital_gain.value(), false),
                    sfl_annotation
                ),
            ),
            post_share_balance,
            ph.plus_minus_dollar(d.acb_delta().value(), true),
            ph.dollar_str(d.post_status.total_acb.value()),
            str_or_dash(
                new_acb_per_share.is_some(),
                ph.dollar_str(new_acb_per_share),
            ),
            tx.affiliate.name().to_string(),
            tx.memo.clone(),
        ];
        table.rows.push(row);
    }

    // Footer: the cap-gains total, split by year when there are multiple.
    let years = gains.capital_gains_years_sorted();
    let mut total_label = "Total".to_string();
    let mut total_values =
        ph.plus_minus_dollar(Some(gains.capital_gains_total), false);
    if !years.is_empty() {
        for year in years {
            total_label += &format!("\n{}", year);
            total_values += &format!(
                "\n{}",
                ph.plus_minus_dollar(
                    Some(gains.capital_gains_year_totals[&year]),
                    false
                )
            );
        }
    }
    let mut footer = vec![String::new(); 16];
    footer[8] = total_label;
    footer[9] = total_values;
    table.footer = footer;

    if saw_superficial_loss {
        table
            .notes
            .push(" SfL = Superficial loss adjustment".to_string());
    }
    if saw_over_applied_sfl {
        table.notes.push(
            " [1] Superficial loss was potentially over-applied, resulting in \
             a lower-than-expected allowable capital loss."
                .to_string(),
        );
    }

    table
}

/// | Year            | Capital Gains | Gross Income |
/// per year, with a "Since inception" row at the bottom.
pub fn render_aggregate_gains(
    gains: &CumulativeGains,
    render_full_dollar_values: bool,
) -> RenderTable {
    let mut table = RenderTable::new();
    table.header = vec![
        "Year".to_string(),
        "Capital Gains".to_string(),
        "Gross Income".to_string(),
    ];

    let ph = PrintHelper::new(render_full_dollar_values);

    for year in gains.capital_gains_years_sorted() {
        table.rows.push(vec![
            year.to_string(),
            ph.plus_minus_dollar(
                Some(gains.capital_gains_year_totals[&year]),
                false,
            ),
            ph.plus_minus_dollar(
                gains.gross_income_year_totals.get(&year).copied(),
                false,
            ),
        ]);
    }
    table.rows.push(vec![
        "Since inception".to_string(),
        ph.plus_minus_dollar(Some(gains.capital_gains_total), false),
        ph.plus_minus_dollar(Some(gains.gross_income_total), false),
    ]);

    table
}
