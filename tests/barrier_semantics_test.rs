// tests/barrier_semantics_test.rs
use approx::assert_relative_eq;
use sharkfin_mc::config::{SharkfinConfig, SharkfinRequest};
use sharkfin_mc::mc::mc_engine::SharkfinPricer;

/// Long up-out call on a 50-day calendar with `year_days` 250 and unit notional.
fn up_out() -> SharkfinRequest {
    SharkfinRequest {
        rand_rows: 0,
        rand_cols: 0,
        rand_seed: vec![3, 5, 7],
        runs_size: 2_000,
        runs_step: 50,
        year_days: 250,
        sigma: 0.2,
        basis_rate: 0.0,
        risk_free_rate: 0.0,
        price_limit_ratio: 0.0,
        notional: 1.0,
        trade_long: true,
        option_type: 1,
        barrier_type: 1,
        strike_payoff_abs: true,
        is_kop_delay: true,
        h_l: 0.8,
        h_h: 1.25,
        k_l: 1.0,
        k_h: 1.0,
        x_l: 0.03,
        x_h: 0.02,
        calc_price: vec![100.0],
        ..SharkfinRequest::double_sharkfin_example()
    }
}

/// Flat paths: no volatility and zero carry.
fn frozen(request: SharkfinRequest) -> SharkfinRequest {
    SharkfinRequest {
        sigma: 0.0,
        basis_rate: request.risk_free_rate,
        runs_size: 4,
        ..request
    }
}

fn pricer(request: &SharkfinRequest) -> SharkfinPricer {
    let config = SharkfinConfig::from_request(request).expect("Valid configuration");
    SharkfinPricer::new(config).expect("Paths simulated")
}

fn value(request: &SharkfinRequest, calc_price: f64) -> f64 {
    pricer(request).value_at(calc_price, 0).expect("Price")
}

#[test]
fn test_results_independent_of_thread_count() {
    let request = SharkfinRequest {
        option_type: 2,
        barrier_type: 3,
        h_l: 0.9,
        h_h: 1.1,
        price_limit_ratio: 0.02,
        price_limit_style: 1,
        calc_price: vec![96.0, 100.0, 104.0],
        ..up_out()
    };
    let run = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("Thread pool");
        pool.install(|| {
            let pricer = pricer(&request);
            (
                pricer.price_estimates().expect("Prices"),
                pricer.payoff().expect("Payoff").to_json().expect("json"),
            )
        })
    };
    let (single, single_payoff) = run(1);
    let (many, many_payoff) = run(4);
    assert_eq!(single, many);
    assert_eq!(single_payoff, many_payoff);
}

#[test]
fn test_antithetic_pairs_mirror_drift() {
    let pricer = pricer(&SharkfinRequest {
        runs_size: 6,
        ..up_out()
    });
    let paths = pricer.paths();
    let gbm_drift = -0.5 * 0.2 * 0.2 / 250.0;
    for pair in 0..3 {
        let a = paths.path(2 * pair);
        let b = paths.path(2 * pair + 1);
        for step in 0..=50 {
            let log_sum = a[step].ln() + b[step].ln();
            assert_relative_eq!(log_sum, 2.0 * gbm_drift * step as f64, epsilon = 1e-10);
        }
    }
}

#[test]
fn test_barrier_level_is_inclusive() {
    // Paths stay at the starting price, so the start decides the outcome.
    let european = frozen(up_out());
    assert_relative_eq!(value(&european, 125.0), 0.02, epsilon = 1e-15);
    assert_relative_eq!(value(&european, 124.0), 0.24, epsilon = 1e-12);

    let american = SharkfinRequest {
        option_type: 2,
        ..european.clone()
    };
    assert_relative_eq!(value(&american, 125.0), 0.02, epsilon = 1e-15);

    let down = SharkfinRequest {
        barrier_type: 2,
        ..european
    };
    assert_relative_eq!(value(&down, 80.0), 0.03, epsilon = 1e-15);
    assert_relative_eq!(value(&down, 81.0), 0.19, epsilon = 1e-12);
}

#[test]
fn test_strike_level_is_inclusive() {
    let european = frozen(SharkfinRequest {
        k_h: 1.0,
        p_h: 1.0,
        ..up_out()
    });
    // At the strike the exercise return is exactly zero either way.
    assert_eq!(value(&european, 100.0), 0.0);
    assert!(value(&european, 100.5) > 0.0);
}

#[test]
fn test_higher_barrier_trades_rebate_for_upside() {
    let values = |x_h: f64| -> Vec<f64> {
        [1.05, 1.1, 1.2]
            .iter()
            .map(|&h_h| {
                let request = SharkfinRequest {
                    option_type: 2,
                    h_h,
                    x_h,
                    p_h: 1.0,
                    ..up_out()
                };
                value(&request, 100.0)
            })
            .collect()
    };

    // A rebate above every reachable exercise return makes knocking out the better outcome.
    let rich = values(0.5);
    assert!(rich.windows(2).all(|w| w[0] >= w[1]), "{:?}", rich);

    // With no rebate, a knock-out only removes upside.
    let bare = values(0.0);
    assert!(bare.windows(2).all(|w| w[0] <= w[1]), "{:?}", bare);
}

#[test]
fn test_price_limits_reduce_knock_outs() {
    let request = SharkfinRequest {
        option_type: 2,
        barrier_type: 3,
        h_l: 0.95,
        h_h: 1.05,
        calc_price: vec![100.0],
        ..up_out()
    };
    let ratio = |style: u8, limit: f64| {
        let request = SharkfinRequest {
            price_limit_ratio: limit,
            price_limit_style: style,
            ..request.clone()
        };
        let payoff = pricer(&request).payoff().expect("Payoff");
        payoff.entries()[0].value.knock_out_ratio()
    };

    let free = ratio(0, 0.0);
    let carried = ratio(1, 0.003);
    let clipped = ratio(2, 0.003);
    println!("knock-out ratio free={} carry={} clip={}", free, carried, clipped);

    assert!(carried <= free);
    assert!(clipped < free);
}

#[test]
fn test_reverse_knock_out_watches_opposite_barrier() {
    let plain = frozen(up_out());
    let reverse = SharkfinRequest {
        reverse_knock_out: true,
        ..plain.clone()
    };

    // Below the lower barrier: only the reverse structure knocks out, and pays x_l.
    assert_eq!(value(&plain, 78.0), 0.0);
    assert_relative_eq!(value(&reverse, 78.0), 0.03, epsilon = 1e-15);

    // Above the upper barrier: the reverse structure keeps its call payoff.
    assert_relative_eq!(value(&plain, 130.0), 0.02, epsilon = 1e-15);
    assert_relative_eq!(value(&reverse, 130.0), 0.3, epsilon = 1e-12);
}

#[test]
fn test_recorded_knock_out_pays_rebate_regardless_of_paths() {
    let request = SharkfinRequest {
        option_type: 2,
        risk_free_rate: 0.03,
        knock_o_occur: true,
        knock_o_point: 127.0,
        calc_price: vec![90.0, 100.0, 110.0],
        ..up_out()
    };
    let expected = 0.02 * (-0.03f64 * 50.0 / 250.0).exp();
    for entry in pricer(&request).price().expect("Prices").entries() {
        assert_relative_eq!(entry.value, expected, epsilon = 1e-14);
    }
}

#[test]
fn test_recorded_knock_out_on_single_barrier_pays_watched_side() {
    let request = SharkfinRequest {
        x_l: 0.0,
        knock_o_occur: true,
        ..frozen(up_out())
    };
    for point in [0.0, 90.0, 100.0, 106.0] {
        let recorded = SharkfinRequest {
            knock_o_point: point,
            ..request.clone()
        };
        assert_relative_eq!(value(&recorded, 100.0), 0.02, epsilon = 1e-15);
    }
}

#[test]
fn test_extend_end_days_delays_deferred_payment() {
    let base = frozen(SharkfinRequest {
        risk_free_rate: 0.05,
        ..up_out()
    });
    let extended = SharkfinRequest {
        extend_end_days: 10,
        ..base.clone()
    };
    assert_relative_eq!(
        value(&base, 125.0),
        0.02 * (-0.05f64 * 50.0 / 250.0).exp(),
        epsilon = 1e-15
    );
    assert_relative_eq!(
        value(&extended, 125.0),
        0.02 * (-0.05f64 * 60.0 / 250.0).exp(),
        epsilon = 1e-15
    );

    // Annualised knock-out rates accrue up to the payment day as well.
    let annualised = SharkfinRequest {
        strike_payoff_abs: false,
        ..extended
    };
    assert_relative_eq!(
        value(&annualised, 125.0),
        0.02 * 60.0 / 250.0 * (-0.05f64 * 60.0 / 250.0).exp(),
        epsilon = 1e-15
    );
}

#[test]
fn test_market_close_shifts_window() {
    let open = frozen(SharkfinRequest {
        option_type: 2,
        is_kop_delay: false,
        risk_free_rate: 0.05,
        ..up_out()
    });
    let closed = SharkfinRequest {
        market_close: true,
        ..open.clone()
    };

    // Open market: the first observation is tomorrow's close.
    assert_relative_eq!(
        value(&open, 125.0),
        0.02 * (-0.05f64 / 250.0).exp(),
        epsilon = 1e-15
    );
    // Closed market: today's close is observed and the knock-out settles today.
    assert_relative_eq!(value(&closed, 125.0), 0.02, epsilon = 1e-15);

    // Deferred European payment is discounted from the next trading day.
    let european = SharkfinRequest {
        option_type: 1,
        ..closed
    };
    assert_relative_eq!(
        value(&european, 125.0),
        0.02 * (-0.05f64 * 49.0 / 250.0).exp(),
        epsilon = 1e-15
    );
}

#[test]
fn test_short_book_pays_knock_out_rebate() {
    let long = frozen(up_out());
    let short = SharkfinRequest {
        trade_long: false,
        ..long.clone()
    };
    assert_relative_eq!(value(&short, 125.0), -value(&long, 125.0));
}
