//! Stage tests over temporary directories.
//!
//! Verifies:
//! 1. Merge writes the processed panel, analysis panel and quality report,
//!    byte-identical across runs
//! 2. A missing required file fails the stage and writes nothing
//! 3. A failed stage leaves earlier outputs untouched
//! 4. The start-date override clips but never extends the panel
//! 5. Enrich adds shares, participation and derived columns
//! 6. Fetch writes raw files plus a manifest that merge can consume
//! 7. Summary reads the newest panel
//! 8. The backfill fetches only absent raw files
//! 9. Synthesized columns survive from merge into the data dictionary

use chrono::{Datelike, NaiveDate};
use macropanel_core::data::provider::DatedValue;
use macropanel_core::data::{DataError, SeriesProvider, SeriesRequest, SilentProgress};
use macropanel_core::domain::next_month;
use macropanel_runner::stage::{
    FetchManifest, ANALYSIS_PANEL, BACKFILL_MANIFEST, DATA_DICTIONARY, ENHANCED_PANEL,
    FETCH_MANIFEST, PROCESSED_PANEL, QUALITY_REPORT, SYNTHESIZED_COLUMNS,
};
use macropanel_runner::{
    run_enrich, run_fetch, run_fetch_missing, run_merge, run_summary, PipelineConfig, StageError,
};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────

const STATES: [&str; 3] = ["AL", "AK", "CA"];

fn d(y: i32, m: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, 1).unwrap()
}

fn months(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut date = start;
    for _ in 0..n {
        out.push(date);
        date = next_month(date);
    }
    out
}

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        raw_dir: dir.path().join("raw"),
        processed_dir: dir.path().join("processed"),
        final_dir: dir.path().join("final"),
        request_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

fn write_national(config: &PipelineConfig, file: &str, start: NaiveDate, n: usize, f: impl Fn(usize) -> f64) {
    let mut text = String::from("date,value\n");
    for (i, date) in months(start, n).iter().enumerate() {
        let _ = writeln!(text, "{date},{}", f(i));
    }
    fs::create_dir_all(&config.raw_dir).unwrap();
    fs::write(config.raw_path(file), text).unwrap();
}

fn write_state_unemployment(config: &PipelineConfig, start: NaiveDate, n: usize) {
    let mut text = String::from("date,state,unemployment_rate\n");
    for (i, date) in months(start, n).iter().enumerate() {
        for (s, state) in STATES.iter().enumerate() {
            let _ = writeln!(text, "{date},{state},{}", 4.0 + s as f64 + i as f64 * 0.1);
        }
    }
    fs::create_dir_all(&config.raw_dir).unwrap();
    fs::write(config.raw_path("state_unemployment_rates.csv"), text).unwrap();
}

/// Required inputs: state unemployment 1990-02..1991-06 (17 months),
/// national series 1990-01..1991-06.
fn write_required(config: &PipelineConfig) {
    write_state_unemployment(config, d(1990, 2), 17);
    write_national(config, "national_unemployment_rate.csv", d(1990, 1), 18, |i| 5.0 + i as f64 * 0.01);
    write_national(config, "federal_funds_rate.csv", d(1990, 1), 18, |i| 8.0 - i as f64 * 0.25);
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

// ── 1. Merge outputs and determinism ─────────────────────────────────

#[test]
fn merge_writes_all_outputs_deterministically() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);

    let first = run_merge(&config, None).unwrap();
    assert_eq!(first.panel.len(), 3 * 17);
    assert_eq!(first.common_start, d(1990, 2));
    assert_eq!(first.common_end, d(1991, 6));
    assert_eq!(first.written.len(), 4);
    assert_eq!(read(&config.final_path(SYNTHESIZED_COLUMNS)), "[]");

    let analysis = read(&config.final_path(ANALYSIS_PANEL));
    assert_eq!(analysis, read(&config.processed_path(PROCESSED_PANEL)));
    assert!(analysis.starts_with(
        "date,state,unemployment_rate,national_unemployment_rate,federal_funds_rate,\
         inflation_cpi,recession_indicator,treasury_10y_yield,\
         employment_level,labor_force_level,private_employment\n"
    ));
    // Absent optional series are present as all-null columns.
    assert!(first.panel.column("recession_indicator").unwrap().null_count() == first.panel.len());

    let report = read(&config.final_path(QUALITY_REPORT));
    assert!(report.contains("Missing Values"));
    assert!(report.contains(&first.report.panel_hash));

    run_merge(&config, None).unwrap();
    assert_eq!(analysis, read(&config.final_path(ANALYSIS_PANEL)));
    assert_eq!(report, read(&config.final_path(QUALITY_REPORT)));
}

// ── 2. Missing required input ────────────────────────────────────────

#[test]
fn missing_required_file_fails_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_state_unemployment(&config, d(1990, 2), 17);
    write_national(&config, "national_unemployment_rate.csv", d(1990, 1), 18, |_| 5.0);

    let err = run_merge(&config, None).unwrap_err();
    assert!(matches!(err, StageError::Data(DataError::MissingSource { .. })));
    assert!(!config.final_path(ANALYSIS_PANEL).exists());
    assert!(!config.processed_path(PROCESSED_PANEL).exists());
    assert!(!config.final_path(QUALITY_REPORT).exists());
}

#[test]
fn disjoint_required_ranges_fail() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_state_unemployment(&config, d(1990, 2), 17);
    write_national(&config, "national_unemployment_rate.csv", d(1990, 1), 18, |_| 5.0);
    write_national(&config, "federal_funds_rate.csv", d(2000, 1), 12, |_| 1.0);

    let err = run_merge(&config, None).unwrap_err();
    assert!(err.to_string().contains("no common date range"));
    assert!(!config.final_path(ANALYSIS_PANEL).exists());
}

// ── 3. Earlier outputs survive a failed stage ────────────────────────

#[test]
fn failed_merge_keeps_previous_outputs() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);
    run_merge(&config, None).unwrap();
    let before = read(&config.final_path(ANALYSIS_PANEL));

    fs::remove_file(config.raw_path("federal_funds_rate.csv")).unwrap();
    assert!(run_merge(&config, None).is_err());
    assert_eq!(before, read(&config.final_path(ANALYSIS_PANEL)));

    let leftovers: Vec<_> = fs::read_dir(&config.final_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

// ── 4. Start-date override ───────────────────────────────────────────

#[test]
fn start_override_clips_but_never_extends() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);

    let clipped = run_merge(&config, Some(d(1990, 6))).unwrap();
    assert_eq!(clipped.panel.date_range(), Some((d(1990, 6), d(1991, 6))));
    assert_eq!(clipped.panel.len(), 3 * 13);

    let early = run_merge(&config, Some(d(1980, 1))).unwrap();
    assert_eq!(early.panel.date_range(), Some((d(1990, 2), d(1991, 6))));
}

// ── 5. Enrich ────────────────────────────────────────────────────────

#[test]
fn enrich_adds_share_and_derived_columns() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);
    write_national(&config, "national_nonfarm_payroll.csv", d(1990, 1), 18, |_| 100.0);
    write_national(&config, "national_manufacturing_employment.csv", d(1990, 1), 18, |_| 12.5);
    write_national(&config, "labor_force_participation_rate.csv", d(1990, 1), 18, |_| 66.4);

    let err = run_enrich(&config).unwrap_err();
    assert!(matches!(err, StageError::Data(DataError::MissingSource { .. })));

    run_merge(&config, None).unwrap();
    let outcome = run_enrich(&config).unwrap();
    let panel = &outcome.panel;

    assert_eq!(panel.len(), 3 * 17);
    let mfg = panel.values("manufacturing_employment_share").unwrap();
    assert!(mfg.iter().all(|v| (v.unwrap() - 12.5).abs() < 1e-9));
    // No construction input: the share column exists and is all null.
    let construction = panel.column("construction_employment_share").unwrap();
    assert_eq!(construction.null_count(), panel.len());
    assert!(panel
        .values("labor_force_participation_rate")
        .unwrap()
        .iter()
        .all(|v| *v == Some(66.4)));

    for column in [
        "unemployment_yoy_change",
        "fed_rate_change",
        "unemployment_lagged_1mo",
        "fed_rate_lagged_1mo",
        "unemployment_volatility_12mo",
    ] {
        assert!(panel.has_column(column), "missing {column}");
    }
    // Federal funds falls 0.25 every month.
    let change = panel.values("fed_rate_change").unwrap();
    assert!(change.iter().skip(3).all(|v| (v.unwrap() + 0.25).abs() < 1e-9));

    assert!(config.final_path(ENHANCED_PANEL).exists());
    let dictionary = read(&config.final_path(DATA_DICTIONARY));
    assert!(dictionary.contains("manufacturing_employment_share"));
    assert!(dictionary.contains("unemployment_volatility_12mo"));
}

// ── 6. Fetch ─────────────────────────────────────────────────────────

/// Returns 24 monthly readings from 1990-01 for every id except `failing`.
struct ScriptedProvider {
    failing: Vec<&'static str>,
}

impl SeriesProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError> {
        if self.failing.contains(&request.series_id.as_str()) {
            return Err(DataError::SeriesNotFound {
                series_id: request.series_id.clone(),
            });
        }
        let base = request.series_id.len() as f64;
        Ok(months(d(1990, 1), 24)
            .into_iter()
            .enumerate()
            .map(|(i, date)| (date, base + i as f64 * 0.1))
            .collect())
    }
}

#[test]
fn fetch_writes_raw_files_and_manifest_for_merge() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let provider = ScriptedProvider {
        failing: vec!["CAUR", "USREC"],
    };

    let outcome = run_fetch(&config, &provider, None, &SilentProgress).unwrap();
    assert_eq!(outcome.summary.failed, 2);
    assert!(config.raw_path("federal_funds_rate.csv").exists());
    assert!(!config.raw_path("recession_indicator.csv").exists());

    let manifest = FetchManifest::read(&config.raw_path(FETCH_MANIFEST)).unwrap();
    assert_eq!(manifest, outcome.manifest);
    assert_eq!(manifest.failures.len(), 2);
    assert!(manifest.missing_required.is_empty());
    let ff = manifest
        .files
        .iter()
        .find(|f| f.file == "federal_funds_rate.csv")
        .unwrap();
    assert_eq!(ff.rows, 24);
    assert_eq!(ff.blake3.len(), 64);

    let merged = run_merge(&config, None).unwrap();
    assert_eq!(merged.panel.states().len(), 49);
    assert_eq!(merged.panel.len(), 49 * 24);
    let recession = merged.panel.column("recession_indicator").unwrap();
    assert_eq!(recession.null_count(), merged.panel.len());
}

#[test]
fn fetch_fails_when_required_series_missing_but_keeps_the_rest() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let provider = ScriptedProvider {
        failing: vec!["FEDFUNDS"],
    };

    let err = run_fetch(&config, &provider, None, &SilentProgress).unwrap_err();
    match err {
        StageError::MissingRequired(missing) => assert_eq!(missing, vec!["federal_funds_rate"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(config.raw_path("national_unemployment_rate.csv").exists());
    let manifest = FetchManifest::read(&config.raw_path(FETCH_MANIFEST)).unwrap();
    assert_eq!(manifest.missing_required, vec!["federal_funds_rate"]);
}

// ── 7. Summary ───────────────────────────────────────────────────────

#[test]
fn summary_prefers_enhanced_panel() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);
    run_merge(&config, None).unwrap();

    let summary = run_summary(&config).unwrap();
    assert_eq!(summary.source, config.final_path(ANALYSIS_PANEL));
    assert_eq!(summary.states.len(), 3);
    assert!(summary.render().contains("Correlation matrix"));
    assert!(summary.correlations.columns.contains(&"federal_funds_rate".to_string()));
    assert!(!summary.correlations.columns.contains(&"recession_indicator".to_string()));

    run_enrich(&config).unwrap();
    let summary = run_summary(&config).unwrap();
    assert_eq!(summary.source, config.final_path(ENHANCED_PANEL));
}

// ── 8. Backfill ──────────────────────────────────────────────────────

/// Serves DGS10 as daily readings (day of month as the value) and every
/// other id as 24 monthly readings, recording each requested id.
struct GraphProvider {
    failing: Vec<&'static str>,
    requested: Mutex<Vec<String>>,
}

impl GraphProvider {
    fn new(failing: Vec<&'static str>) -> Self {
        Self {
            failing,
            requested: Mutex::new(Vec::new()),
        }
    }

    fn take_requested(&self) -> Vec<String> {
        std::mem::take(&mut *self.requested.lock().unwrap())
    }
}

impl SeriesProvider for GraphProvider {
    fn name(&self) -> &str {
        "graph"
    }

    fn fetch(&self, request: &SeriesRequest) -> Result<Vec<DatedValue>, DataError> {
        self.requested.lock().unwrap().push(request.series_id.clone());
        if self.failing.contains(&request.series_id.as_str()) {
            return Err(DataError::SeriesNotFound {
                series_id: request.series_id.clone(),
            });
        }
        if request.series_id == "DGS10" {
            let mut out = Vec::new();
            let mut day = d(1990, 1);
            while day < d(1992, 1) {
                out.push((day, day.day() as f64));
                day = day.succ_opt().unwrap();
            }
            return Ok(out);
        }
        Ok(months(d(1990, 1), 24).into_iter().map(|date| (date, 1.0)).collect())
    }
}

#[test]
fn backfill_fetches_only_absent_files() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);
    let fed_funds = read(&config.raw_path("federal_funds_rate.csv"));
    let provider = GraphProvider::new(vec!["CPIAUCSL"]);

    let outcome = run_fetch_missing(&config, &provider, None, &SilentProgress).unwrap();
    let requested = provider.take_requested();
    for present in ["FEDFUNDS", "UNRATE", "CAUR", "ALUR"] {
        assert!(!requested.iter().any(|id| id == present), "{present} was requested");
    }
    assert!(requested.iter().any(|id| id == "DGS10"));
    assert_eq!(fed_funds, read(&config.raw_path("federal_funds_rate.csv")));

    let manifest = FetchManifest::read(&config.raw_path(BACKFILL_MANIFEST)).unwrap();
    assert_eq!(manifest, outcome.manifest);
    assert_eq!(
        manifest.skipped,
        vec![
            "federal_funds_rate.csv",
            "national_unemployment_rate.csv",
            "state_unemployment_rates.csv"
        ]
    );
    assert_eq!(manifest.failures.len(), 1);
    assert!(!config.raw_path(FETCH_MANIFEST).exists());
    assert!(!config.raw_path("inflation_cpi.csv").exists());
    assert!(config.raw_path("state_private_employment.csv").exists());

    // Daily yields were reduced to monthly means.
    let treasury = manifest
        .files
        .iter()
        .find(|f| f.file == "treasury_10y_yield.csv")
        .unwrap();
    assert_eq!(treasury.rows, 24);
    let merged = run_merge(&config, None).unwrap();
    let yields = merged.panel.values("treasury_10y_yield").unwrap();
    assert_eq!(yields[0], Some(14.5));
    assert_eq!(yields[STATES.len()], Some(16.0));

    // A second run only retries what is still absent.
    run_fetch_missing(&config, &provider, None, &SilentProgress).unwrap();
    assert_eq!(provider.take_requested(), vec!["CPIAUCSL"]);
}

#[test]
fn backfill_fails_when_required_file_stays_absent() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_state_unemployment(&config, d(1990, 2), 17);
    let provider = GraphProvider::new(vec!["FEDFUNDS"]);

    let err = run_fetch_missing(&config, &provider, None, &SilentProgress).unwrap_err();
    match err {
        StageError::MissingRequired(missing) => assert_eq!(missing, vec!["federal_funds_rate"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(config.raw_path("national_unemployment_rate.csv").exists());
    let manifest = FetchManifest::read(&config.raw_path(BACKFILL_MANIFEST)).unwrap();
    assert_eq!(manifest.skipped, vec!["state_unemployment_rates.csv"]);
    assert_eq!(manifest.missing_required, vec!["federal_funds_rate"]);
}

// ── 9. Synthesized columns across stages ─────────────────────────────

#[test]
fn enrich_dictionary_lists_columns_synthesized_at_merge() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    write_required(&config);
    fs::write(
        config.raw_path("inflation_cpi.csv"),
        "date,value\n1990-01-01,130.7\n1991-01-01,134.6\n",
    )
    .unwrap();

    let merged = run_merge(&config, None).unwrap();
    assert_eq!(merged.report.synthesized, vec!["inflation_cpi"]);
    assert!(read(&config.final_path(SYNTHESIZED_COLUMNS)).contains("\"inflation_cpi\""));

    let enriched = run_enrich(&config).unwrap();
    assert_eq!(enriched.report.synthesized, vec!["inflation_cpi"]);
    let dictionary = read(&config.final_path(DATA_DICTIONARY));
    assert!(dictionary.contains("- `inflation_cpi`: annual readings carried forward to monthly"));

    // Without the sidecar nothing is claimed as synthesized.
    fs::remove_file(config.final_path(SYNTHESIZED_COLUMNS)).unwrap();
    run_enrich(&config).unwrap();
    let dictionary = read(&config.final_path(DATA_DICTIONARY));
    assert!(dictionary.contains("## Synthesized Columns\n\nNone."));
}
