use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use data_wrangler::impute::{ImputeConfig, ImputeStrategy};
use data_wrangler::loader::{self, LoadOptions};
use data_wrangler::pipeline::{StageHistory, StagePlan, StageSettings, run_stages};
use data_wrangler::scale::ScaleMethod;
use tempfile::TempDir;

fn generate_readings(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("readings.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "sensor,temperature,humidity,site").expect("header");
    for i in 0..rows {
        let site = match i % 3 {
            0 => "north",
            1 => "south",
            _ => "east",
        };
        let temperature = if i % 17 == 0 {
            String::new()
        } else {
            format!("{:.2}", 15.0 + (i % 40) as f64 * 0.5)
        };
        let humidity = if i % 23 == 0 {
            String::new()
        } else {
            format!("{}", 30 + (i * 7) % 50)
        };
        writeln!(file, "{},{temperature},{humidity},{site}", i % 250).expect("row");
    }
    (temp_dir, csv_path)
}

fn settings(strategy: ImputeStrategy) -> StageSettings {
    StageSettings {
        impute: Some(StagePlan::new(ImputeConfig::new(strategy))),
        dedupe: true,
        scale: Some(StagePlan::new(ScaleMethod::Standard)),
        ..StageSettings::default()
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let (temp_dir, csv_path) = generate_readings(2_000);
    let table = loader::load_table(&csv_path, &LoadOptions::default()).expect("load readings");
    let mean_settings = settings(ImputeStrategy::Mean);
    let knn_settings = settings(ImputeStrategy::Knn);

    let mut group = c.benchmark_group("clean");

    group.bench_function("mean_dedupe_standard", |b| {
        b.iter_batched(
            || table.clone(),
            |input| run_stages(input, &mean_settings, StageHistory::default()),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("knn_dedupe_standard", |b| {
        b.iter_batched(
            || table.clone(),
            |input| run_stages(input, &knn_settings, StageHistory::default()),
            BatchSize::SmallInput,
        );
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
