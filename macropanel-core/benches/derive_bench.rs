//! Criterion benchmarks for panel hot paths.
//!
//! Benchmarks:
//! 1. Assembly of a 50-state by 426-month panel
//! 2. Grouped lag and rolling volatility on that panel
//! 3. Full derived-variable pass
//! 4. CSV rendering

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use macropanel_core::domain::{next_month, Observation, Scope, SeriesFrame, StateCode};
use macropanel_core::panel::derive::{grouped_lag, grouped_rolling_std};
use macropanel_core::panel::{add_derived_variables, assemble, AssemblyInputs, Panel};

// ── Helpers ──────────────────────────────────────────────────────────

const MONTHS: usize = 426;

fn dates() -> Vec<NaiveDate> {
    let mut date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
    let mut out = Vec::with_capacity(MONTHS);
    for _ in 0..MONTHS {
        out.push(date);
        date = next_month(date);
    }
    out
}

fn make_inputs() -> AssemblyInputs {
    let dates = dates();
    let national = |name: &str, scale: f64| {
        let obs = dates
            .iter()
            .enumerate()
            .map(|(i, d)| Observation::national(*d, Some((i as f64 * 0.05).sin() * scale + scale)))
            .collect();
        SeriesFrame::new(name, Scope::National, obs).unwrap()
    };
    let mut obs = Vec::with_capacity(50 * MONTHS);
    for (s, state) in StateCode::all().into_iter().enumerate() {
        for (i, d) in dates.iter().enumerate() {
            let v = 4.0 + s as f64 * 0.03 + (i as f64 * 0.1).cos();
            obs.push(Observation::for_state(*d, state, Some(v)));
        }
    }
    AssemblyInputs {
        state_unemployment: SeriesFrame::new("unemployment_rate", Scope::State, obs).unwrap(),
        national_unemployment: national("national_unemployment_rate", 5.0),
        federal_funds: national("federal_funds_rate", 3.0),
        optional_national: vec![],
        optional_state: vec![],
    }
}

fn make_panel() -> Panel {
    assemble(make_inputs()).unwrap().panel
}

// ── 1. Assembly ──────────────────────────────────────────────────────

fn bench_assemble(c: &mut Criterion) {
    let inputs = make_inputs();
    c.bench_function("assemble_50x426", |b| {
        b.iter(|| assemble(black_box(inputs.clone())).unwrap())
    });
}

// ── 2. Grouped operations ────────────────────────────────────────────

fn bench_grouped(c: &mut Criterion) {
    let panel = make_panel();
    c.bench_function("grouped_lag_13", |b| {
        b.iter(|| grouped_lag(black_box(&panel), "unemployment_rate", 13).unwrap())
    });
    c.bench_function("grouped_rolling_std_12", |b| {
        b.iter(|| grouped_rolling_std(black_box(&panel), "unemployment_rate", 12, 1).unwrap())
    });
}

// ── 3. Derived variables ─────────────────────────────────────────────

fn bench_derive(c: &mut Criterion) {
    let panel = make_panel();
    c.bench_function("add_derived_variables", |b| {
        b.iter(|| {
            let mut p = panel.clone();
            add_derived_variables(black_box(&mut p)).unwrap();
            p
        })
    });
}

// ── 4. Rendering ─────────────────────────────────────────────────────

fn bench_csv(c: &mut Criterion) {
    let mut panel = make_panel();
    add_derived_variables(&mut panel).unwrap();
    c.bench_function("panel_to_csv", |b| {
        b.iter(|| black_box(&panel).to_csv_bytes().unwrap())
    });
}

criterion_group!(benches, bench_assemble, bench_grouped, bench_derive, bench_csv);
criterion_main!(benches);
