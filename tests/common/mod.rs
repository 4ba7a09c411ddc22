#![allow(dead_code)]

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Write `df` as Parquet to `dir/name` and return the path.
pub fn write_parquet(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
    path
}

/// `rows` runs: `id` 0.., `city` cycling through three names, `score` = id * 1.5.
pub fn runs_frame(rows: usize) -> DataFrame {
    let cities = ["Oslo", "Lima", "Pune"];
    df!(
        "id" => (0..rows as i64).collect::<Vec<i64>>(),
        "city" => (0..rows).map(|i| cities[i % 3]).collect::<Vec<&str>>(),
        "score" => (0..rows).map(|i| i as f64 * 1.5).collect::<Vec<f64>>()
    )
    .unwrap()
}

pub fn write_runs(dir: &Path, name: &str, rows: usize) -> PathBuf {
    write_parquet(dir, name, &mut runs_frame(rows))
}
