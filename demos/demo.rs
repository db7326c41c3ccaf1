// demos/demo.rs
use sharkfin_mc::analytics::bs_analytic::TerminalSharkfin;
use sharkfin_mc::config::{Greek, SharkfinConfig, SharkfinRequest};
use sharkfin_mc::math_utils::Timer;
use sharkfin_mc::mc::greeks::{GreeksConfig, SensitivityEngine};
use sharkfin_mc::mc::mc_engine::SharkfinPricer;
use sharkfin_mc::output;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 && args[1] == "--bench" && args[2] == "canonical" {
        run_canonical_benchmark();
    } else {
        run_demo_mode();
    }
}

/// European up-out call on one year of daily closes, compared with its closed form.
fn canonical_request(paths: usize) -> SharkfinRequest {
    SharkfinRequest {
        rand_rows: 0,
        rand_cols: 0,
        rand_seed: vec![42],
        runs_size: paths,
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

fn run_canonical_benchmark() {
    let paths = 200_000;
    let config =
        SharkfinConfig::from_request(&canonical_request(paths)).expect("Valid configuration");

    let mut timer = Timer::new();
    timer.start();
    let pricer = SharkfinPricer::new(config).expect("Paths simulated");
    let estimate = pricer.estimate_at(100.0, 0).expect("Price");
    let elapsed = timer.elapsed_ms() / 1000.0;

    let current_dir = std::env::current_dir().expect("Failed to get current directory");
    std::fs::create_dir_all(current_dir.join("bench"))
        .expect("Could not create bench directory");
    let output_filename = current_dir.join("bench").join("rust_canonical.csv");
    let elapsed_str = format!("{:.6}", paths as f64 / elapsed);
    let price_str = format!("{:.8}", estimate.mean);
    let stderr_str = format!("{:.6}", estimate.std_error);
    let paths_str = paths.to_string();
    output::write_summary_to_csv(
        &output_filename.to_string_lossy(),
        &[
            ("paths", paths_str.as_str()),
            ("price", price_str.as_str()),
            ("stderr", stderr_str.as_str()),
            ("paths_per_sec", elapsed_str.as_str()),
        ],
    )
    .expect("Could not write benchmark file");

    println!("Rust benchmark results written to {}", output_filename.display());
}

fn run_demo_mode() {
    println!("Running sharkfin-mc Monte Carlo Demo\n");
    std::fs::create_dir_all("results").expect("Could not create results directory");

    // --- European up-out against the closed form ---
    println!("--- European Up-Out Shark-Fin ---");
    let config = SharkfinConfig::from_request(&SharkfinRequest {
        calc_price: vec![95.0, 100.0, 105.0],
        ..canonical_request(100_000)
    })
    .expect("Valid configuration");

    let mut timer = Timer::new();
    timer.start();
    let pricer = SharkfinPricer::new(config).expect("Paths simulated");
    let estimates = pricer.price_estimates().expect("Prices");
    let european_time = timer.elapsed_ms();
    let analytic =
        TerminalSharkfin::from_config(pricer.config(), 0).expect("European closed form");

    for entry in estimates.entries() {
        let expected = analytic.value(entry.calc_price);
        println!(
            "S={:>6.1}  MC={:.6} ± {:.6}  analytic={:.6}  error={:.2e}",
            entry.calc_price,
            entry.value.mean,
            entry.value.std_error,
            expected,
            (entry.value.mean - expected).abs()
        );
    }
    println!("({:.0} ms)\n", european_time);

    // --- American double shark-fin, short book ---
    println!("--- American Double Shark-Fin (short book) ---");
    let request = SharkfinRequest::double_sharkfin_example();
    let config = SharkfinConfig::from_request(&request).expect("Valid configuration");

    timer.start();
    let pricer = SharkfinPricer::new(config).expect("Paths simulated");
    let sim_time = timer.elapsed_ms();
    println!(
        "Simulated {} paths x {} steps in {:.0} ms",
        pricer.paths().runs(),
        pricer.paths().steps(),
        sim_time
    );

    timer.start();
    let prices = pricer.price_estimates().expect("Prices");
    let price_time = timer.elapsed_ms();
    for entry in prices.entries().iter().step_by(5) {
        println!(
            "S={:>6.1}  value={:>12.2} ± {:.2}",
            entry.calc_price, entry.value.mean, entry.value.std_error
        );
    }
    println!("({:.0} ms)\n", price_time);

    // --- Cash-flow breakdown ---
    println!("--- Payoff Breakdown ---");
    timer.start();
    let payoff = pricer.payoff().expect("Payoff");
    let payoff_time = timer.elapsed_ms();
    if let Some(at_the_money) = payoff.get(100.0) {
        for (leg, mean) in at_the_money.leg_means() {
            println!("{:<14} {:>12.2}", leg.name(), mean);
        }
        println!("{:<14} {:>12.2}", "net", at_the_money.mean_net());
        println!("{:<14} {:>12.4}", "knock-out", at_the_money.knock_out_ratio());
    }
    println!("({:.0} ms)\n", payoff_time);

    // --- Greeks ---
    println!("--- Greeks ---");
    timer.start();
    let engine = SensitivityEngine::new(&pricer);
    let surfaces = engine
        .surfaces(GreeksConfig::DELTA | GreeksConfig::GAMMA | GreeksConfig::VEGA)
        .expect("Greeks");
    let greeks_time = timer.elapsed_ms();
    for (greek, grid) in &surfaces {
        if let Some(row) = grid.get(100.0) {
            println!("{:<6} at 100: {:.4}", greek.name(), row[0]);
        }
    }
    println!("({:.0} ms)\n", greeks_time);

    // --- CSV Output ---
    let prices_csv = "results/prices.csv";
    match output::write_estimates_to_csv(prices_csv, &prices) {
        Ok(_) => println!("Price grid written to {}", prices_csv),
        Err(e) => eprintln!("Error writing price grid: {}", e),
    }
    let payoff_csv = "results/payoff.csv";
    match output::write_payoff_summary_to_csv(payoff_csv, &payoff) {
        Ok(_) => println!("Payoff summary written to {}", payoff_csv),
        Err(e) => eprintln!("Error writing payoff summary: {}", e),
    }
    for (greek, grid) in &surfaces {
        let filename = format!("results/{}.csv", greek.name());
        match output::write_surface_to_csv(&filename, request.run_from, grid) {
            Ok(_) => println!("{} surface written to {}", greek.name(), filename),
            Err(e) => eprintln!("Error writing {} surface: {}", greek.name(), e),
        }
    }

    let delta = surfaces
        .iter()
        .find(|(g, _)| *g == Greek::Delta)
        .and_then(|(_, grid)| grid.get(100.0))
        .map(|row| row[0])
        .unwrap_or(f64::NAN);
    let european_str = estimates.entries()[1].value.mean.to_string();
    let european_analytic_str = analytic.value(100.0).to_string();
    let price_str = prices.get(100.0).map(|e| e.mean).unwrap_or(f64::NAN).to_string();
    let delta_str = delta.to_string();
    let price_time_str = price_time.to_string();
    let greeks_time_str = greeks_time.to_string();

    let summary_data = vec![
        ("metric", "value"),
        ("mc_price_european_up_out", european_str.as_str()),
        ("analytic_price_european_up_out", european_analytic_str.as_str()),
        ("mc_price_double_sharkfin", price_str.as_str()),
        ("mc_delta_double_sharkfin", delta_str.as_str()),
        ("price_time_ms", price_time_str.as_str()),
        ("greeks_time_ms", greeks_time_str.as_str()),
    ];
    let summary_csv = "results/summary.csv";
    match output::write_summary_to_csv(summary_csv, &summary_data) {
        Ok(_) => println!("Summary data written to {}", summary_csv),
        Err(e) => eprintln!("Error writing summary data: {}", e),
    }
}
