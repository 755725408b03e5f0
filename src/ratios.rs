use crate::config::AnalysisConfig;
use crate::schema::{Category, CleanedStatement, LineItemRecord};
use crate::summary::{Cell, SummaryTable};
use log::info;
use std::collections::BTreeMap;

/// How [`aggregate`] selects the records to sum.
#[derive(Debug, Clone)]
pub enum Selector<'a> {
    /// Case-insensitive substring match against the metric name.
    MetricContains(&'a str),
    /// Any of the given substrings matches (case-insensitive).
    MetricContainsAny(&'a [String]),
    /// Category equality.
    Category(Category),
    /// Exact match (trimmed, case-insensitive) against an enumerated list.
    MetricIn(&'a [String]),
}

impl Selector<'_> {
    fn matches(&self, record: &LineItemRecord) -> bool {
        match self {
            Selector::MetricContains(needle) => record
                .metric
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Selector::MetricContainsAny(needles) => {
                let metric = record.metric.to_lowercase();
                needles
                    .iter()
                    .any(|needle| metric.contains(&needle.to_lowercase()))
            }
            Selector::Category(category) => record.category == Some(*category),
            Selector::MetricIn(names) => names
                .iter()
                .any(|name| name.trim().eq_ignore_ascii_case(record.metric.trim())),
        }
    }
}

/// Sums `value` over every record matching the selector for the given year.
/// No matching records yields `None`, never zero; callers that want zero for
/// legitimately absent sub-lines substitute it explicitly.
pub fn aggregate(records: &[LineItemRecord], selector: &Selector, year: i32) -> Option<f64> {
    let mut total = None;
    for record in records {
        if record.year == year && selector.matches(record) {
            *total.get_or_insert(0.0) += record.value;
        }
    }
    total
}

/// Per-year aggregate over every year with at least one matching record.
pub fn series(records: &[LineItemRecord], selector: &Selector) -> BTreeMap<i32, f64> {
    let mut out: BTreeMap<i32, f64> = BTreeMap::new();
    for record in records {
        if selector.matches(record) {
            *out.entry(record.year).or_insert(0.0) += record.value;
        }
    }
    out
}

/// Year-over-year percentage change. Undefined for the first year in range,
/// for years whose predecessor is absent, and where the prior value is zero.
pub fn yoy_change(values: &BTreeMap<i32, f64>) -> BTreeMap<i32, Cell> {
    let mut out = BTreeMap::new();
    let first = match values.keys().next() {
        Some(year) => *year,
        None => return out,
    };

    for (year, value) in values.iter().skip_while(|(y, _)| **y == first) {
        let cell = match values.get(&(year - 1)) {
            Some(prev) if *prev != 0.0 => Some((value - prev) / prev * 100.0),
            _ => None,
        };
        out.insert(*year, cell);
    }
    out
}

/// Compound annual growth rate over the full span of the series.
/// Undefined when the span is zero years or the starting value is
/// non-positive.
pub fn cagr(values: &BTreeMap<i32, f64>) -> Option<f64> {
    let (first_year, start) = values.iter().next()?;
    let (last_year, end) = values.iter().next_back()?;
    let years = last_year - first_year;
    if years == 0 || *start <= 0.0 {
        return None;
    }
    Some((end / start).powf(1.0 / years as f64) - 1.0)
}

fn defined(values: &BTreeMap<i32, f64>) -> BTreeMap<i32, Cell> {
    values.iter().map(|(y, v)| (*y, Some(*v))).collect()
}

/// Fills a series with zero for every year in `years` that has no matches.
/// The explicit missing-means-zero choice for sub-lines that are genuinely
/// absent in some years.
fn zero_filled(values: BTreeMap<i32, f64>, years: &[i32]) -> BTreeMap<i32, f64> {
    let mut out = values;
    for year in years {
        out.entry(*year).or_insert(0.0);
    }
    out
}

/// Combines two cell series pointwise; a year undefined (or absent) on
/// either side stays undefined in the result.
fn combine(
    a: &BTreeMap<i32, Cell>,
    b: &BTreeMap<i32, Cell>,
    f: impl Fn(f64, f64) -> Cell,
) -> BTreeMap<i32, Cell> {
    let mut out = BTreeMap::new();
    for year in a.keys().chain(b.keys()) {
        let cell = match (a.get(year).copied().flatten(), b.get(year).copied().flatten()) {
            (Some(x), Some(y)) => f(x, y),
            _ => None,
        };
        out.insert(*year, cell);
    }
    out
}

fn add(a: &BTreeMap<i32, Cell>, b: &BTreeMap<i32, Cell>) -> BTreeMap<i32, Cell> {
    combine(a, b, |x, y| Some(x + y))
}

fn percent_of(numerator: &BTreeMap<i32, Cell>, denominator: &BTreeMap<i32, Cell>) -> BTreeMap<i32, Cell> {
    combine(numerator, denominator, |n, d| {
        if d == 0.0 {
            None
        } else {
            Some(n / d * 100.0)
        }
    })
}

fn ratio_of(numerator: &BTreeMap<i32, Cell>, denominator: &BTreeMap<i32, Cell>) -> BTreeMap<i32, Cell> {
    combine(numerator, denominator, |n, d| {
        if d == 0.0 {
            None
        } else {
            Some(n / d)
        }
    })
}

/// CAGR over the analysis span for the headline series.
#[derive(Debug, Clone)]
pub struct CagrReport {
    pub first_year: i32,
    pub last_year: i32,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

impl CagrReport {
    pub fn render(&self) -> String {
        let line = |name: &str, value: Option<f64>| match value {
            Some(v) => format!(
                "{name} CAGR ({}-{}): {:.2}%\n",
                self.first_year,
                self.last_year,
                v * 100.0
            ),
            None => format!(
                "{name} CAGR ({}-{}): undefined\n",
                self.first_year, self.last_year
            ),
        };
        let mut out = String::new();
        out.push_str(&line("Revenue", self.revenue));
        out.push_str(&line("Net Income", self.net_income));
        out.push_str(&line("Free Cash Flow", self.free_cash_flow));
        out
    }
}

const NET_INCOME_METRIC: &str = "Profit For The Year";
const TOTAL_ASSETS_METRIC: &str = "Total Assets";
const TOTAL_EQUITY_METRIC: &str = "Total Equity";
const FINANCE_COSTS_METRIC: &str = "Finance Costs";
const OPERATING_CASH_FLOW_METRIC: &str = "Net Cash Flows From Operating Activities";

const EBITDA_ADDBACK_METRICS: &[&str] = &[
    "Other Operating Income",
    "Other Operating Expense",
    "Selling, General And Administrative Expenses",
    "Depreciation Of Property, Plant And Equipment",
    "Depreciation Of Investment Properties",
];

/// Derives every summary table from the three cleaned statements.
///
/// All inputs are in the internal sign convention (outflows negative), so
/// every composite formula here is additive.
pub struct RatioEngine<'a> {
    balance: &'a CleanedStatement,
    income: &'a CleanedStatement,
    cashflow: &'a CleanedStatement,
    config: &'a AnalysisConfig,
}

impl<'a> RatioEngine<'a> {
    pub fn new(
        balance: &'a CleanedStatement,
        income: &'a CleanedStatement,
        cashflow: &'a CleanedStatement,
        config: &'a AnalysisConfig,
    ) -> Self {
        Self {
            balance,
            income,
            cashflow,
            config,
        }
    }

    fn revenue(&self) -> BTreeMap<i32, f64> {
        series(&self.income.records, &Selector::Category(Category::Revenue))
    }

    fn net_income(&self) -> BTreeMap<i32, f64> {
        series(
            &self.income.records,
            &Selector::MetricContains(NET_INCOME_METRIC),
        )
    }

    fn gross_profit(&self) -> BTreeMap<i32, Cell> {
        let revenue = defined(&self.revenue());
        let cogs = defined(&series(
            &self.income.records,
            &Selector::Category(Category::Cogs),
        ));
        add(&revenue, &cogs)
    }

    fn free_cash_flow(&self) -> BTreeMap<i32, Cell> {
        let operating = defined(&series(
            &self.cashflow.records,
            &Selector::MetricContains(OPERATING_CASH_FLOW_METRIC),
        ));
        let capex = defined(&series(
            &self.cashflow.records,
            &Selector::MetricContainsAny(&self.config.capex_metrics),
        ));
        add(&operating, &capex)
    }

    /// Headline level series: revenue, net income, and the main cost lines.
    pub fn growth_summary(&self) -> SummaryTable {
        let mut table = SummaryTable::new();
        table.push_values("Revenue", &self.revenue());
        table.push_values("Net Income", &self.net_income());
        table.push_values(
            "Operating Expenses",
            &series(
                &self.income.records,
                &Selector::Category(Category::OperatingExpenses),
            ),
        );
        table.push_values(
            "Cost of Revenue",
            &series(&self.income.records, &Selector::Category(Category::Cogs)),
        );
        table.push_values(
            "Finance Costs",
            &series(
                &self.income.records,
                &Selector::MetricContains(FINANCE_COSTS_METRIC),
            ),
        );
        table
    }

    /// YoY % change of every growth-summary series. First year excluded.
    pub fn yoy_summary(&self) -> SummaryTable {
        let levels = self.growth_summary();
        let mut table = SummaryTable::new();
        for name in levels.columns().to_vec() {
            let values: BTreeMap<i32, f64> = levels
                .column(&name)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(year, cell)| cell.map(|v| (year, v)))
                .collect();
            table.push_column(&format!("{name} YoY (%)"), &yoy_change(&values));
        }
        table
    }

    pub fn cagr_report(&self) -> CagrReport {
        let revenue = self.revenue();
        let years = self.income.years();
        let first_year = years.first().copied().unwrap_or_default();
        let last_year = years.last().copied().unwrap_or_default();

        let fcf: BTreeMap<i32, f64> = self
            .free_cash_flow()
            .into_iter()
            .filter_map(|(year, cell)| cell.map(|v| (year, v)))
            .collect();

        CagrReport {
            first_year,
            last_year,
            revenue: cagr(&revenue),
            net_income: cagr(&self.net_income()),
            free_cash_flow: cagr(&fcf),
        }
    }

    /// Margins and profit levels. Gross profit is revenue plus cost of
    /// revenue (cost already negative internally); operating profit adds the
    /// reported operating-expense category total, not a rebuild from
    /// sub-lines.
    pub fn profitability_summary(&self) -> SummaryTable {
        let revenue = defined(&self.revenue());
        let gross_profit = self.gross_profit();
        let opex = defined(&series(
            &self.income.records,
            &Selector::Category(Category::OperatingExpenses),
        ));
        let operating_profit = add(&gross_profit, &opex);

        let income_years = self.income.years();
        let mut ebitda = gross_profit.clone();
        for metric in EBITDA_ADDBACK_METRICS {
            let addback = zero_filled(
                series(&self.income.records, &Selector::MetricContains(metric)),
                &income_years,
            );
            ebitda = add(&ebitda, &defined(&addback));
        }

        let net_income = defined(&self.net_income());

        let mut table = SummaryTable::new();
        table.push_values("Revenue", &self.revenue());
        table.push_values("Net Income", &self.net_income());
        table.push_column("Gross Profit", &gross_profit);
        table.push_column("Gross Margin (%)", &percent_of(&gross_profit, &revenue));
        table.push_column("Operating Profit", &operating_profit);
        table.push_column(
            "Operating Margin (%)",
            &percent_of(&operating_profit, &revenue),
        );
        table.push_column("EBITDA", &ebitda);
        table.push_column("Net Margin (%)", &percent_of(&net_income, &revenue));
        table
    }

    pub fn returns_summary(&self) -> SummaryTable {
        let net_income = defined(&self.net_income());
        let assets = defined(&series(
            &self.balance.records,
            &Selector::MetricContains(TOTAL_ASSETS_METRIC),
        ));
        let equity = defined(&series(
            &self.balance.records,
            &Selector::MetricContains(TOTAL_EQUITY_METRIC),
        ));

        let mut table = SummaryTable::new();
        table.push_values("Net Income", &self.net_income());
        table.push_column("Total Assets", &assets);
        table.push_column("ROA (%)", &percent_of(&net_income, &assets));
        table.push_column("ROE (%)", &percent_of(&net_income, &equity));
        table
    }

    /// Asset turnover and interest coverage. Finance costs enter coverage as
    /// an absolute value.
    pub fn efficiency_summary(&self) -> SummaryTable {
        let revenue = defined(&self.revenue());
        let assets = defined(&series(
            &self.balance.records,
            &Selector::MetricContains(TOTAL_ASSETS_METRIC),
        ));
        let ebit = defined(&series(
            &self.income.records,
            &Selector::Category(Category::OperatingIncome),
        ));
        let finance_costs: BTreeMap<i32, Cell> = series(
            &self.income.records,
            &Selector::MetricContains(FINANCE_COSTS_METRIC),
        )
        .iter()
        .map(|(y, v)| (*y, Some(v.abs())))
        .collect();

        let mut table = SummaryTable::new();
        table.push_column("Asset Turnover", &ratio_of(&revenue, &assets));
        table.push_column("Interest Coverage", &ratio_of(&ebit, &finance_costs));
        table
    }

    /// Current ratio and debt-to-equity. Membership of the current-asset,
    /// current-liability, and debt groups is an enumerated list of metric
    /// names from the configuration, matched exactly after trimming.
    pub fn liquidity_summary(&self) -> SummaryTable {
        let current_assets = defined(&series(
            &self.balance.records,
            &Selector::MetricIn(&self.config.current_asset_metrics),
        ));
        let current_liabilities = defined(&series(
            &self.balance.records,
            &Selector::MetricIn(&self.config.current_liability_metrics),
        ));
        let debt = defined(&series(
            &self.balance.records,
            &Selector::MetricIn(&self.config.debt_metrics),
        ));
        let equity = defined(&series(
            &self.balance.records,
            &Selector::MetricContains(TOTAL_EQUITY_METRIC),
        ));

        let mut table = SummaryTable::new();
        table.push_column("Current Assets", &current_assets);
        table.push_column("Current Liabilities", &current_liabilities);
        table.push_column(
            "Current Ratio",
            &ratio_of(&current_assets, &current_liabilities),
        );
        table.push_column("Debt-to-Equity", &ratio_of(&debt, &equity));
        table
    }

    /// Operating cash flow, capital additions, and free cash flow. CapEx is
    /// negative internally, so free cash flow is the plain sum.
    pub fn cash_summary(&self) -> SummaryTable {
        let operating = series(
            &self.cashflow.records,
            &Selector::MetricContains(OPERATING_CASH_FLOW_METRIC),
        );
        let capex = series(
            &self.cashflow.records,
            &Selector::MetricContainsAny(&self.config.capex_metrics),
        );

        let mut table = SummaryTable::new();
        table.push_values("Operating Cash Flow", &operating);
        table.push_values("CapEx", &capex);
        table.push_column("Free Cash Flow", &self.free_cash_flow());
        table
    }

    pub fn run_all(&self) -> DerivedTables {
        info!("Deriving summary tables for years {:?}", self.income.years());
        DerivedTables {
            growth: self.growth_summary(),
            yoy: self.yoy_summary(),
            profitability: self.profitability_summary(),
            returns: self.returns_summary(),
            efficiency: self.efficiency_summary(),
            liquidity: self.liquidity_summary(),
            cash: self.cash_summary(),
            cagr: self.cagr_report(),
        }
    }
}

/// Every table the engine produces, ready for export or presentation.
#[derive(Debug, Clone)]
pub struct DerivedTables {
    pub growth: SummaryTable,
    pub yoy: SummaryTable,
    pub profitability: SummaryTable,
    pub returns: SummaryTable,
    pub efficiency: SummaryTable,
    pub liquidity: SummaryTable,
    pub cash: SummaryTable,
    pub cagr: CagrReport,
}
