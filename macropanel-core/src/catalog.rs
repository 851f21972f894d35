//! Static catalog of every series the pipeline knows about.
//!
//! Each entry ties a semantic column name to its provider series id, the raw
//! file it is stored in, its scope, and whether the panel can be built
//! without it.

use crate::domain::{Frequency, Scope, StateCode, StateInfo};
use serde::{Deserialize, Serialize};

/// Whether the panel can be assembled without this series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Anchors the panel; absence is fatal.
    Required,
    /// Left-joined when present, all-null column when absent.
    Optional,
    /// Input to a derived share column; never joined directly.
    ShareInput,
}

/// Which provider serves the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Fred,
    Bls,
}

/// Provider series id, either fixed or expanded per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesId {
    National(&'static str),
    /// `{code}` and `{fips}` are replaced per state. `states` limits the
    /// expansion to a subset when the provider only publishes some states.
    PerState {
        template: &'static str,
        states: Option<&'static [&'static str]>,
    },
}

impl SeriesId {
    /// Concrete id for one state, or `None` when the state is outside the subset.
    pub fn for_state(&self, info: &StateInfo) -> Option<String> {
        match self {
            SeriesId::National(id) => Some((*id).to_string()),
            SeriesId::PerState { template, states } => {
                if let Some(subset) = states {
                    if !subset.contains(&info.code) {
                        return None;
                    }
                }
                Some(template.replace("{code}", info.code).replace("{fips}", info.fips))
            }
        }
    }

    /// States this id expands to, in code order.
    pub fn states(&self) -> Vec<StateCode> {
        match self {
            SeriesId::National(_) => Vec::new(),
            SeriesId::PerState { states: None, .. } => StateCode::all(),
            SeriesId::PerState {
                states: Some(subset),
                ..
            } => {
                let mut codes: Vec<StateCode> =
                    subset.iter().filter_map(|c| c.parse().ok()).collect();
                codes.sort();
                codes
            }
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSpec {
    /// Semantic column name in the panel and raw file.
    pub column: &'static str,
    pub file_name: &'static str,
    pub scope: Scope,
    pub role: Role,
    pub source: Source,
    pub id: SeriesId,
    /// Request aggregation to this frequency (e.g. daily yields to monthly means).
    pub aggregate_to: Option<Frequency>,
    pub unit: &'static str,
    pub description: &'static str,
}

impl SeriesSpec {
    pub fn is_required(&self) -> bool {
        self.role == Role::Required
    }
}

const PRIVATE_EMPLOYMENT_STATES: &[&str] = &[
    "CA", "TX", "FL", "NY", "PA", "IL", "OH", "GA", "MI", "NC", "AZ", "MA", "WA", "CO", "MN",
    "NJ", "VA", "IN", "MO", "TN",
];

pub const FEDERAL_FUNDS_RATE: SeriesSpec = SeriesSpec {
    column: "federal_funds_rate",
    file_name: "federal_funds_rate.csv",
    scope: Scope::National,
    role: Role::Required,
    source: Source::Fred,
    id: SeriesId::National("FEDFUNDS"),
    aggregate_to: None,
    unit: "percent",
    description: "Effective federal funds rate, monthly average",
};

pub const NATIONAL_UNEMPLOYMENT_RATE: SeriesSpec = SeriesSpec {
    column: "national_unemployment_rate",
    file_name: "national_unemployment_rate.csv",
    scope: Scope::National,
    role: Role::Required,
    source: Source::Fred,
    id: SeriesId::National("UNRATE"),
    aggregate_to: None,
    unit: "percent",
    description: "US civilian unemployment rate, seasonally adjusted",
};

pub const STATE_UNEMPLOYMENT_RATE: SeriesSpec = SeriesSpec {
    column: "unemployment_rate",
    file_name: "state_unemployment_rates.csv",
    scope: Scope::State,
    role: Role::Required,
    source: Source::Fred,
    id: SeriesId::PerState {
        template: "{code}UR",
        states: None,
    },
    aggregate_to: None,
    unit: "percent",
    description: "State unemployment rate, seasonally adjusted",
};

pub const INFLATION_CPI: SeriesSpec = SeriesSpec {
    column: "inflation_cpi",
    file_name: "inflation_cpi.csv",
    scope: Scope::National,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::National("CPIAUCSL"),
    aggregate_to: None,
    unit: "index 1982-1984=100",
    description: "CPI for all urban consumers, all items",
};

pub const RECESSION_INDICATOR: SeriesSpec = SeriesSpec {
    column: "recession_indicator",
    file_name: "recession_indicator.csv",
    scope: Scope::National,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::National("USREC"),
    aggregate_to: None,
    unit: "0/1",
    description: "NBER-based recession indicator",
};

pub const TREASURY_10Y_YIELD: SeriesSpec = SeriesSpec {
    column: "treasury_10y_yield",
    file_name: "treasury_10y_yield.csv",
    scope: Scope::National,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::National("DGS10"),
    aggregate_to: Some(Frequency::Monthly),
    unit: "percent",
    description: "10-year Treasury constant maturity yield, monthly mean of daily values",
};

pub const EMPLOYMENT_LEVEL: SeriesSpec = SeriesSpec {
    column: "employment_level",
    file_name: "state_employment_level.csv",
    scope: Scope::State,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::PerState {
        template: "SMS{fips}000000000000001",
        states: None,
    },
    aggregate_to: None,
    unit: "thousands of persons",
    description: "Total nonfarm employment by state",
};

pub const LABOR_FORCE_LEVEL: SeriesSpec = SeriesSpec {
    column: "labor_force_level",
    file_name: "state_labor_force_level.csv",
    scope: Scope::State,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::PerState {
        template: "LASST{fips}0000000000006",
        states: None,
    },
    aggregate_to: None,
    unit: "persons",
    description: "Civilian labor force by state",
};

pub const PRIVATE_EMPLOYMENT: SeriesSpec = SeriesSpec {
    column: "private_employment",
    file_name: "state_private_employment.csv",
    scope: Scope::State,
    role: Role::Optional,
    source: Source::Fred,
    id: SeriesId::PerState {
        template: "SMS{fips}000000500000001",
        states: Some(PRIVATE_EMPLOYMENT_STATES),
    },
    aggregate_to: None,
    unit: "thousands of persons",
    description: "Total private employment by state (20-state subset)",
};

pub const TOTAL_NONFARM_EMPLOYMENT: SeriesSpec = SeriesSpec {
    column: "total_nonfarm_employment",
    file_name: "national_nonfarm_payroll.csv",
    scope: Scope::National,
    role: Role::ShareInput,
    source: Source::Fred,
    id: SeriesId::National("PAYEMS"),
    aggregate_to: None,
    unit: "thousands of persons",
    description: "All employees, total nonfarm",
};

pub const MANUFACTURING_EMPLOYMENT: SeriesSpec = SeriesSpec {
    column: "manufacturing_employment",
    file_name: "national_manufacturing_employment.csv",
    scope: Scope::National,
    role: Role::ShareInput,
    source: Source::Fred,
    id: SeriesId::National("MANEMP"),
    aggregate_to: None,
    unit: "thousands of persons",
    description: "All employees, manufacturing",
};

pub const CONSTRUCTION_EMPLOYMENT: SeriesSpec = SeriesSpec {
    column: "construction_employment",
    file_name: "national_construction_employment.csv",
    scope: Scope::National,
    role: Role::ShareInput,
    source: Source::Fred,
    id: SeriesId::National("USCONS"),
    aggregate_to: None,
    unit: "thousands of persons",
    description: "All employees, construction",
};

pub const LABOR_FORCE_PARTICIPATION: SeriesSpec = SeriesSpec {
    column: "labor_force_participation_rate",
    file_name: "labor_force_participation_rate.csv",
    scope: Scope::National,
    role: Role::ShareInput,
    source: Source::Fred,
    id: SeriesId::National("CIVPART"),
    aggregate_to: None,
    unit: "percent",
    description: "Labor force participation rate",
};

/// Every FRED series in fetch order: required anchors first.
pub const FRED_SERIES: [SeriesSpec; 13] = [
    FEDERAL_FUNDS_RATE,
    NATIONAL_UNEMPLOYMENT_RATE,
    STATE_UNEMPLOYMENT_RATE,
    INFLATION_CPI,
    RECESSION_INDICATOR,
    TREASURY_10Y_YIELD,
    EMPLOYMENT_LEVEL,
    LABOR_FORCE_LEVEL,
    PRIVATE_EMPLOYMENT,
    TOTAL_NONFARM_EMPLOYMENT,
    MANUFACTURING_EMPLOYMENT,
    CONSTRUCTION_EMPLOYMENT,
    LABOR_FORCE_PARTICIPATION,
];

/// Optional national series, in panel column order.
pub const OPTIONAL_NATIONAL: [SeriesSpec; 3] = [INFLATION_CPI, RECESSION_INDICATOR, TREASURY_10Y_YIELD];

/// Optional state series, in panel column order.
pub const OPTIONAL_STATE: [SeriesSpec; 3] = [EMPLOYMENT_LEVEL, LABOR_FORCE_LEVEL, PRIVATE_EMPLOYMENT];

/// A national series published by the BLS public data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlsSeries {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl BlsSeries {
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }
}

pub const BLS_SERIES: [BlsSeries; 10] = [
    BlsSeries {
        id: "CUUR0000SA0",
        name: "cpi",
        description: "CPI-U, all items, not seasonally adjusted",
    },
    BlsSeries {
        id: "CES0000000001",
        name: "total_nonfarm_employment",
        description: "All employees, total nonfarm (thousands)",
    },
    BlsSeries {
        id: "LNS11000000",
        name: "civilian_labor_force",
        description: "Civilian labor force level (thousands)",
    },
    BlsSeries {
        id: "CES0500000001",
        name: "total_private_employment",
        description: "All employees, total private (thousands)",
    },
    BlsSeries {
        id: "CES3000000001",
        name: "manufacturing_employment",
        description: "All employees, manufacturing (thousands)",
    },
    BlsSeries {
        id: "CES2000000001",
        name: "construction_employment",
        description: "All employees, construction (thousands)",
    },
    BlsSeries {
        id: "CES0500000003",
        name: "average_hourly_earnings",
        description: "Average hourly earnings, total private (dollars)",
    },
    BlsSeries {
        id: "JTS000000000000000JOL",
        name: "job_openings",
        description: "JOLTS job openings, total nonfarm (thousands)",
    },
    BlsSeries {
        id: "JTS000000000000000QUR",
        name: "quits_rate",
        description: "JOLTS quits rate, total nonfarm (percent)",
    },
    BlsSeries {
        id: "LNS12000000",
        name: "employment_level",
        description: "Civilian employment level (thousands)",
    },
];

/// Label and description for a panel column, used by the data dictionary.
pub fn column_label(column: &str) -> Option<(&'static str, &'static str)> {
    let entry = match column {
        "date" => ("Date", "Month start, YYYY-MM-DD"),
        "state" => ("State", "Two-letter postal code (AK-WY)"),
        "unemployment_rate" => ("Unemployment Rate", "State unemployment (%)"),
        "national_unemployment_rate" => ("National Unemployment", "US unemployment (%)"),
        "federal_funds_rate" => ("Federal Funds Rate", "Effective rate (%)"),
        "inflation_cpi" => ("Inflation", "CPI index level"),
        "recession_indicator" => ("Recession Indicator", "NBER recession (0/1)"),
        "treasury_10y_yield" => ("10-Year Treasury", "Yield (%)"),
        "employment_level" => ("Employment Level", "State nonfarm employment (thousands)"),
        "labor_force_level" => ("Labor Force Level", "State civilian labor force"),
        "private_employment" => ("Private Employment", "State private employment (thousands)"),
        "manufacturing_employment_share" => ("Mfg Employment Share", "Mfg as % of total nonfarm"),
        "construction_employment_share" => {
            ("Construction Share", "Construction as % of total nonfarm")
        }
        "labor_force_participation_rate" => ("Labor Force Participation", "Participation rate (%)"),
        "unemployment_yoy_change" => (
            "Unemployment YoY Change",
            "Lag-1 minus lag-13 unemployment within state (pp)",
        ),
        "fed_rate_change" => ("Fed Rate Change", "Change from previous month (pp)"),
        "unemployment_lagged_1mo" => ("Unemployment Lagged", "Previous month within state (%)"),
        "fed_rate_lagged_1mo" => ("Fed Rate Lagged", "Previous month (%)"),
        "unemployment_volatility_12mo" => (
            "Unemployment Volatility",
            "Trailing 12-month sample std dev within state",
        ),
        _ => return None,
    };
    Some(entry)
}
