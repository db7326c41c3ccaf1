// scripts/benchmark.rs
use sharkfin_mc::analytics::bs_analytic::TerminalSharkfin;
use sharkfin_mc::config::{Greek, SharkfinConfig, SharkfinRequest};
use sharkfin_mc::math_utils::Timer;
use sharkfin_mc::mc::mc_engine::SharkfinPricer;
use sharkfin_mc::output;
use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::process::Command;
use tracing_subscriber::EnvFilter;

/// Machine description written above the results, as `(label, value)` pairs.
fn system_info() -> Vec<(&'static str, String)> {
    let cpu = fs::read_to_string("/proc/cpuinfo")
        .ok()
        .and_then(|info| {
            info.lines()
                .find(|line| line.starts_with("model name"))
                .and_then(|line| line.split(':').nth(1))
                .map(|model| model.trim().to_string())
        })
        .unwrap_or_else(|| "Unknown CPU".to_string());
    let rustc = Command::new("rustc")
        .arg("--version")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
        .unwrap_or_else(|_| "Unknown Rust version".to_string());
    vec![
        ("OS", env::consts::OS.to_string()),
        ("CPU", cpu),
        ("CPU Cores", num_cpus::get().to_string()),
        ("Rust Version", rustc),
        (
            "RUSTFLAGS",
            env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
        ),
        ("Rayon Threads", rayon::current_num_threads().to_string()),
    ]
}

#[derive(Debug)]
struct BenchmarkResult {
    name: String,
    paths: usize,
    steps: usize,
    time_ms: f64,
    throughput_paths_per_sec: f64,
    value: f64,
    std_error: Option<f64>,
    analytic_value: Option<f64>,
}

fn european_up_out(paths: usize) -> SharkfinRequest {
    SharkfinRequest {
        rand_rows: 0,
        rand_cols: 0,
        runs_size: paths,
        runs_step: 244,
        option_type: 1,
        barrier_type: 1,
        trade_long: true,
        notional: 1.0,
        strike_payoff_abs: true,
        h_h: 1.1,
        k_h: 1.0,
        x_h: 0.02,
        price_limit_ratio: 0.0,
        calc_price: vec![100.0],
        ..SharkfinRequest::double_sharkfin_example()
    }
}

fn build(request: &SharkfinRequest) -> (SharkfinPricer, f64) {
    let config = SharkfinConfig::from_request(request).expect("Valid configuration");
    let mut timer = Timer::new();
    timer.start();
    let pricer = SharkfinPricer::new(config).expect("Paths simulated");
    (pricer, timer.elapsed_ms())
}

fn run_european_benchmarks() -> Vec<BenchmarkResult> {
    let mut results = Vec::new();

    for &paths in &[10_000, 50_000, 200_000] {
        println!("Running European up-out benchmark with {} paths...", paths);
        let (pricer, sim_ms) = build(&european_up_out(paths));

        let mut timer = Timer::new();
        timer.start();
        let estimate = pricer.estimate_at(100.0, 0).expect("Price");
        let time_ms = sim_ms + timer.elapsed_ms();

        let analytic = TerminalSharkfin::from_config(pricer.config(), 0)
            .expect("European closed form")
            .value(100.0);

        results.push(BenchmarkResult {
            name: format!("European up-out ({}k paths)", paths / 1000),
            paths,
            steps: pricer.paths().steps(),
            time_ms,
            throughput_paths_per_sec: paths as f64 / (time_ms / 1000.0),
            value: estimate.mean,
            std_error: Some(estimate.std_error),
            analytic_value: Some(analytic),
        });
    }

    results
}

fn run_double_sharkfin_benchmarks(request: &SharkfinRequest) -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    println!("Running shark-fin benchmarks on {} paths...", request.runs_size);

    let (pricer, sim_ms) = build(request);
    let paths = pricer.paths().runs();
    let steps = pricer.paths().steps();
    let grid_points = pricer.config().grid.calc_price.len();
    results.push(BenchmarkResult {
        name: "Deviates + paths".to_string(),
        paths,
        steps,
        time_ms: sim_ms,
        throughput_paths_per_sec: paths as f64 / (sim_ms / 1000.0),
        value: f64::NAN,
        std_error: None,
        analytic_value: None,
    });

    let mut timer = Timer::new();
    timer.start();
    let estimates = pricer.price_estimates().expect("Prices");
    let time_ms = timer.elapsed_ms();
    let mid = &estimates.entries()[estimates.len() / 2];
    results.push(BenchmarkResult {
        name: format!("Price grid ({} prices)", grid_points),
        paths,
        steps,
        time_ms,
        throughput_paths_per_sec: (paths * grid_points) as f64 / (time_ms / 1000.0),
        value: mid.value.mean,
        std_error: Some(mid.value.std_error),
        analytic_value: None,
    });

    timer.start();
    let payoff = pricer.payoff().expect("Payoff");
    let time_ms = timer.elapsed_ms();
    results.push(BenchmarkResult {
        name: "Payoff breakdown".to_string(),
        paths,
        steps,
        time_ms,
        throughput_paths_per_sec: (paths * grid_points) as f64 / (time_ms / 1000.0),
        value: payoff.entries()[payoff.len() / 2].value.mean_net(),
        std_error: None,
        analytic_value: None,
    });

    for greek in [Greek::Delta, Greek::Vega] {
        timer.start();
        let grid = pricer.greeks(greek).expect("Greek");
        let time_ms = timer.elapsed_ms();
        results.push(BenchmarkResult {
            name: format!("{} grid", greek.name()),
            paths,
            steps,
            time_ms,
            throughput_paths_per_sec: (paths * grid_points) as f64 / (time_ms / 1000.0),
            value: grid.entries()[grid.len() / 2].value,
            std_error: None,
            analytic_value: None,
        });
    }

    let base = format!("bench/{}", timestamp());
    output::write_estimates_to_csv(&format!("{}_prices.csv", base), &estimates)
        .expect("Could not write price grid");
    output::write_payoff_summary_to_csv(&format!("{}_payoff.csv", base), &payoff)
        .expect("Could not write payoff summary");

    results
}

fn format_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.6}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &[(&str, String)],
    filename: &str,
) -> io::Result<()> {
    let mut file = File::create(filename)?;

    writeln!(file, "# System Information")?;
    for (label, value) in system_info {
        writeln!(file, "# {}: {}", label, value)?;
    }
    writeln!(
        file,
        "# Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "#")?;

    writeln!(
        file,
        "Benchmark,Paths,Steps,Time_ms,Throughput_paths_per_sec,Value,Std_Error,Analytic_Value"
    )?;
    for result in results {
        writeln!(
            file,
            "{},{},{},{:.2},{:.0},{:.6},{},{}",
            result.name,
            result.paths,
            result.steps,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.value,
            format_opt(result.std_error),
            format_opt(result.analytic_value)
        )?;
    }
    Ok(())
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// The double shark-fin example, or the request stored at `path`.
fn load_request(path: Option<&String>) -> SharkfinRequest {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path).expect("Could not read request file");
            SharkfinRequest::from_json(&json).expect("Could not parse request file")
        }
        None => SharkfinRequest::double_sharkfin_example(),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("sharkfin-mc Benchmark Suite");
    println!("===========================\n");

    let args: Vec<String> = env::args().collect();
    let request = load_request(args.get(1));

    let info = system_info();
    println!("System Information:");
    for (label, value) in &info {
        println!("  {}: {}", label, value);
    }
    println!();

    fs::create_dir_all("bench").expect("Could not create bench directory");

    let mut all_results = run_european_benchmarks();
    all_results.extend(run_double_sharkfin_benchmarks(&request));

    println!("\n{:=<96}", "");
    println!("BENCHMARK RESULTS");
    println!("{:=<96}", "");
    println!(
        "{:<32} {:>8} {:>6} {:>12} {:>14} {:>10} {:>10} {:>10}",
        "Benchmark", "Paths", "Steps", "Time (ms)", "Throughput", "Value", "Std Err", "Analytic"
    );
    println!("{:-<96}", "");
    for result in &all_results {
        println!(
            "{:<32} {:>8} {:>6} {:>12.2} {:>14.0} {:>10.4} {:>10} {:>10}",
            result.name,
            result.paths,
            result.steps,
            result.time_ms,
            result.throughput_paths_per_sec,
            result.value,
            result
                .std_error
                .map(|e| format!("{:.2e}", e))
                .unwrap_or_else(|| "N/A".to_string()),
            result
                .analytic_value
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }
    println!("{:=<96}", "");

    let filename = format!("bench/benchmark_results_{}.csv", timestamp());
    write_results_to_csv(&all_results, &info, &filename)
        .expect("Could not write benchmark results");

    println!("\nResults saved to: {}", filename);
    println!("To reproduce: cargo run --bin benchmark --release [request.json]");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
        assert!(stamp.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_results_header_carries_system_and_date() {
        let filename = env::temp_dir().join(format!("sharkfin_bench_{}.csv", timestamp()));
        let results = [BenchmarkResult {
            name: "European up-out (1k paths)".to_string(),
            paths: 1_000,
            steps: 244,
            time_ms: 12.5,
            throughput_paths_per_sec: 80_000.0,
            value: 0.0123,
            std_error: Some(0.0004),
            analytic_value: None,
        }];
        write_results_to_csv(&results, &system_info(), &filename.to_string_lossy())
            .expect("CSV written");
        let text = fs::read_to_string(&filename).expect("CSV read");
        let _ = fs::remove_file(&filename);

        assert!(text.starts_with("# System Information\n# OS: "));
        assert!(text.contains("# Rayon Threads: "));
        assert!(text
            .lines()
            .any(|line| line.starts_with("# Benchmark Date: ") && line.ends_with(" UTC")));
        assert!(text.contains("European up-out (1k paths),1000,244,12.50,80000,0.012300,"));
        assert!(text.trim_end().ends_with(",N/A"));
    }
}
