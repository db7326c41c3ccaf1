// tests/dispatch_test.rs
use serde_json::Value;
use sharkfin_mc::config::SharkfinRequest;
use sharkfin_mc::dispatch::{CancelToken, DistributeType, Kernel, Method, Tasker, WaitError};
use std::time::Duration;

fn small_request() -> SharkfinRequest {
    SharkfinRequest {
        rand_rows: 0,
        rand_cols: 0,
        rand_seed: vec![1, 2],
        runs_size: 500,
        runs_step: 20,
        year_days: 244,
        calc_price: vec![98.0, 100.0, 102.0],
        ..SharkfinRequest::double_sharkfin_example()
    }
}

fn tasker(method: Method, request: &SharkfinRequest) -> Tasker {
    Tasker::new(method, request.to_json().expect("json"))
}

fn parse(data: &str) -> Vec<Value> {
    match serde_json::from_str(data).expect("result is JSON") {
        Value::Array(items) => items,
        other => panic!("expected an array, got {}", other),
    }
}

#[test]
fn test_price_task_succeeds() {
    let kernel = Kernel::new();
    let task = tasker(Method::Price, &small_request());
    assert_eq!(task.plugin_id, "derivx_barrier_sharkfin");
    let response = kernel.assign_task(&task);
    assert!(response.is_success(), "{}", response.return_info);
    assert_eq!(response.tasker_id, 1);

    let items = parse(&response.result_data);
    assert_eq!(items.len(), 3);
    assert_eq!(items[1]["calc_price"], 100.0);
    assert!(items[1]["value"].is_f64());
}

#[test]
fn test_tasker_ids() {
    let kernel = Kernel::new();
    let request = small_request();
    let first = kernel.assign_task(&tasker(Method::Price, &request));
    let second = kernel.assign_task(&tasker(Method::Price, &request));
    assert_eq!((first.tasker_id, second.tasker_id), (1, 2));

    let explicit = Tasker {
        tasker_id: 77,
        ..tasker(Method::Price, &request)
    };
    assert_eq!(kernel.assign_task(&explicit).tasker_id, 77);
}

#[test]
fn test_run_window_returns_rows() {
    let request = SharkfinRequest {
        run_from: 2,
        run_days: 3,
        ..small_request()
    };
    let response = Kernel::new().assign_task(&tasker(Method::Price, &request));
    assert!(response.is_success(), "{}", response.return_info);
    for item in parse(&response.result_data) {
        assert_eq!(item["value"].as_array().map(Vec::len), Some(3));
    }
}

#[test]
fn test_payoff_task_itemises_paths() {
    let response = Kernel::new().assign_task(&tasker(Method::Payoff, &small_request()));
    assert!(response.is_success(), "{}", response.return_info);
    let items = parse(&response.result_data);
    let paths = items[0]["value"]["paths"].as_array().expect("paths");
    assert_eq!(paths.len(), 500);
    assert!(paths[0]["legs"].as_array().map_or(false, |legs| !legs.is_empty()));
}

#[test]
fn test_payoff_run_window_returns_rows() {
    let request = SharkfinRequest {
        run_from: 2,
        run_days: 3,
        ..small_request()
    };
    let response = Kernel::new().assign_task(&tasker(Method::Payoff, &request));
    assert!(response.is_success(), "{}", response.return_info);
    let items = parse(&response.result_data);
    assert_eq!(items.len(), 3);
    for item in items {
        let row = item["value"].as_array().expect("one value per day");
        assert_eq!(row.len(), 3);
        assert!(row.iter().all(Value::is_f64));
    }
}

#[test]
fn test_greeks_task() {
    let kernel = Kernel::new();
    let missing = kernel.assign_task(&tasker(Method::Greeks, &small_request()));
    assert_eq!(missing.return_code, 1);
    assert!(missing.result_data.is_empty());

    let request = SharkfinRequest {
        calc_greek: "d".to_string(),
        ..small_request()
    };
    let response = kernel.assign_task(&tasker(Method::Greeks, &request));
    assert!(response.is_success(), "{}", response.return_info);
    assert_eq!(parse(&response.result_data).len(), 3);
}

#[test]
fn test_failures_map_to_return_codes() {
    let kernel = Kernel::new();
    let request = small_request();

    let plugin = Tasker {
        plugin_id: "barrier_snowball".to_string(),
        ..tasker(Method::Price, &request)
    };
    assert_eq!(kernel.assign_task(&plugin).return_code, 3);

    let unprefixed = Tasker {
        plugin_id: "barrier_sharkfin".to_string(),
        ..tasker(Method::Price, &request)
    };
    assert_eq!(kernel.assign_task(&unprefixed).return_code, 3);

    let remote = Tasker {
        distribute_type: DistributeType::Remote as u8,
        ..tasker(Method::Price, &request)
    };
    assert_eq!(kernel.assign_task(&remote).return_code, 3);

    let method = Tasker {
        method_id: 9,
        ..tasker(Method::Price, &request)
    };
    assert_eq!(kernel.assign_task(&method).return_code, 3);

    let garbled = Tasker::new(Method::Price, "{not json");
    assert_eq!(kernel.assign_task(&garbled).return_code, 4);

    let invalid = SharkfinRequest {
        runs_size: 0,
        ..request
    };
    let response = kernel.assign_task(&tasker(Method::Price, &invalid));
    assert_eq!(response.return_code, 1);
    assert!(response.return_info.contains("runs_size"));
}

#[test]
fn test_async_task_completes() {
    let kernel = Kernel::new();
    let handle = kernel.assign_task_async(tasker(Method::Price, &small_request()));
    let response = handle
        .wait(Duration::from_secs(60), &CancelToken::new())
        .expect("Result before timeout");
    assert_eq!(response.tasker_id, handle.tasker_id());
    assert!(response.is_success(), "{}", response.return_info);

    let sync = kernel.assign_task(&tasker(Method::Price, &small_request()));
    assert_eq!(response.result_data, sync.result_data);
}

#[test]
fn test_async_wait_cancel_and_timeout() {
    let kernel = Kernel::new();
    let handle = kernel.assign_task_async(tasker(Method::Price, &small_request()));
    assert_eq!(handle.timeout(), Duration::from_secs(3600));

    assert_eq!(
        handle.wait(Duration::ZERO, &CancelToken::new()).err(),
        Some(WaitError::Timeout)
    );

    let token = CancelToken::new();
    token.cancel();
    assert_eq!(
        handle.wait(Duration::from_secs(60), &token).err(),
        Some(WaitError::Cancelled)
    );
}
