// demos/error_handling_demo.rs
use sharkfin_mc::analytics::bs_analytic::TerminalSharkfin;
use sharkfin_mc::config::{SharkfinConfig, SharkfinRequest};
use sharkfin_mc::dispatch::{Kernel, Method, Tasker};
use sharkfin_mc::error::SharkfinError;
use sharkfin_mc::mc::mc_engine::SharkfinPricer;

fn small_request() -> SharkfinRequest {
    SharkfinRequest {
        rand_rows: 0,
        rand_cols: 0,
        runs_size: 2_000,
        runs_step: 20,
        ..SharkfinRequest::double_sharkfin_example()
    }
}

fn report(label: &str, request: &SharkfinRequest) {
    match SharkfinConfig::from_request(request) {
        Ok(_) => println!("   Unexpected: {} should have failed!", label),
        Err(e) => println!("   ✓ Caught error (code {}): {}", e.return_code(), e),
    }
}

fn main() {
    println!("Error Handling Demo for sharkfin-mc");
    println!("===================================\n");

    // Test 1: Barriers that do not straddle the start
    println!("1. Testing double-out barriers on one side of the start...");
    report(
        "barriers above the start",
        &SharkfinRequest {
            h_l: 1.02,
            h_h: 1.05,
            ..small_request()
        },
    );

    // Test 2: Too few deviate rows
    println!("\n2. Testing a deviate matrix smaller than the path count...");
    report(
        "undersized deviate matrix",
        &SharkfinRequest {
            rand_rows: 100,
            ..small_request()
        },
    );

    // Test 3: Quasi-random generation with several seeds
    println!("\n3. Testing quasi-random generation with several seeds...");
    report(
        "quasi with many seeds",
        &SharkfinRequest {
            rand_quasi: true,
            ..small_request()
        },
    );

    // Test 4: Run window past maturity
    println!("\n4. Testing a run window past maturity...");
    report(
        "run window past maturity",
        &SharkfinRequest {
            run_from: 15,
            run_days: 10,
            ..small_request()
        },
    );

    // Test 5: Closed form for an American structure
    println!("\n5. Testing the closed form on an American structure...");
    let config = SharkfinConfig::from_request(&small_request()).expect("Valid configuration");
    match TerminalSharkfin::from_config(&config, 0) {
        Ok(_) => println!("   Unexpected: Should have failed!"),
        Err(e) => println!("   ✓ Caught error (code {}): {}", e.return_code(), e),
    }

    // Test 6: Valid configuration should work
    println!("\n6. Testing valid configuration...");
    match SharkfinPricer::new(config).and_then(|pricer| pricer.estimate_at(100.0, 0)) {
        Ok(estimate) => println!(
            "   ✓ Success: Price = {:.4}, Std Error = {:.4}",
            estimate.mean, estimate.std_error
        ),
        Err(e) => println!("   Unexpected error: {}", e),
    }

    // Test 7: Failures through the dispatch envelope
    println!("\n7. Testing failures through task dispatch...");
    let kernel = Kernel::new();
    let garbled = kernel.assign_task(&Tasker::new(Method::Price, "{\"runs_size\": "));
    println!(
        "   ✓ Garbled request: code {} ({})",
        garbled.return_code, garbled.return_info
    );
    let greeks = kernel.assign_task(&Tasker::new(
        Method::Greeks,
        small_request().to_json().expect("json"),
    ));
    println!(
        "   ✓ Greeks without calc_greek: code {} ({})",
        greeks.return_code, greeks.return_info
    );

    // Test 8: Error type matching
    println!("\n8. Testing error type matching...");
    match SharkfinConfig::from_request(&SharkfinRequest {
        sigma: -0.16,
        ..small_request()
    }) {
        Ok(_) => println!("   Unexpected: Should have failed!"),
        Err(SharkfinError::InvalidParameters {
            parameter,
            value,
            constraint,
        }) => {
            println!(
                "   ✓ Caught InvalidParameters: {} = {} ({})",
                parameter, value, constraint
            );
        }
        Err(other) => println!("   Unexpected error type: {}", other),
    }

    println!("\n✓ Error handling demo complete!");
    println!("All error cases were properly caught and handled.");
}
