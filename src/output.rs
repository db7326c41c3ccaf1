// src/output.rs
use crate::mc::cashflow::{LegKind, PayoffBreakdown};
use crate::mc::mc_engine::{Estimate, ResultGrid};
use std::fs::File;
use std::io::{self, Write};

pub fn write_grid_to_csv(filename: &str, column: &str, grid: &ResultGrid<f64>) -> io::Result<()> {
    let mut file = File::create(filename)?;
    writeln!(file, "calc_price,{}", column)?;
    for entry in grid.entries() {
        writeln!(file, "{},{}", entry.calc_price, entry.value)?;
    }
    Ok(())
}

pub fn write_estimates_to_csv(filename: &str, grid: &ResultGrid<Estimate>) -> io::Result<()> {
    let mut file = File::create(filename)?;
    writeln!(file, "calc_price,price,std_error")?;
    for entry in grid.entries() {
        writeln!(
            file,
            "{},{},{}",
            entry.calc_price, entry.value.mean, entry.value.std_error
        )?;
    }
    Ok(())
}

/// One row per starting price, one column per day of the run window.
pub fn write_surface_to_csv(
    filename: &str,
    first_day: usize,
    grid: &ResultGrid<Vec<f64>>,
) -> io::Result<()> {
    let mut file = File::create(filename)?;
    let width = grid.values().map(Vec::len).max().unwrap_or(0);
    let header: Vec<String> = (0..width)
        .map(|i| format!("day_{}", first_day + i))
        .collect();
    writeln!(file, "calc_price,{}", header.join(","))?;
    for entry in grid.entries() {
        let row: Vec<String> = entry.value.iter().map(|v| v.to_string()).collect();
        writeln!(file, "{},{}", entry.calc_price, row.join(","))?;
    }
    Ok(())
}

/// Mean present value per leg, net value and knock-out ratio per starting price.
pub fn write_payoff_summary_to_csv(
    filename: &str,
    grid: &ResultGrid<PayoffBreakdown>,
) -> io::Result<()> {
    let mut file = File::create(filename)?;
    let legs: Vec<&str> = LegKind::ALL.iter().map(|l| l.name()).collect();
    writeln!(file, "calc_price,{},net,knock_out_ratio", legs.join(","))?;
    for entry in grid.entries() {
        let means: Vec<String> = entry
            .value
            .leg_means()
            .iter()
            .map(|(_, v)| v.to_string())
            .collect();
        writeln!(
            file,
            "{},{},{},{}",
            entry.calc_price,
            means.join(","),
            entry.value.mean_net(),
            entry.value.knock_out_ratio()
        )?;
    }
    Ok(())
}

pub fn write_summary_to_csv(filename: &str, summary_data: &[(&str, &str)]) -> io::Result<()> {
    let mut file = File::create(filename)?;
    for (key, value) in summary_data {
        writeln!(file, "{},{}", key, value)?;
    }
    Ok(())
}
