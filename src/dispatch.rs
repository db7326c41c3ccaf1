//! Task dispatch
//!
//! A request arrives as a [`Tasker`]: routing metadata plus the JSON pricing request
//! in `common_args`. The [`Kernel`] runs it either synchronously or on the rayon pool
//! and always answers with a [`Response`] envelope; failures become a non-zero
//! `return_code` with the error text in `return_info`.
//!
//! Asynchronous tasks hand back a [`TaskHandle`]. Waiting on it is bounded by a
//! timeout and can be abandoned through a [`CancelToken`]; abandoning a wait does
//! not stop the computation, and its result is dropped when it arrives.

use crate::config::SharkfinConfig;
use crate::error::{SharkfinError, SharkfinResult};
use crate::mc::mc_engine::SharkfinPricer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const PLUGIN_ID: &str = "derivx_barrier_sharkfin";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Price = 1,
    Payoff = 2,
    Greeks = 3,
}

impl Method {
    pub fn from_id(id: u8) -> Option<Method> {
        match id {
            1 => Some(Method::Price),
            2 => Some(Method::Payoff),
            3 => Some(Method::Greeks),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributeType {
    Local = 0,
    Remote = 1,
}

impl DistributeType {
    pub fn from_id(id: u8) -> Option<DistributeType> {
        match id {
            0 => Some(DistributeType::Local),
            1 => Some(DistributeType::Remote),
            _ => None,
        }
    }
}

/// Routing metadata and payload of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tasker {
    pub tasker_id: u64,
    pub plugin_id: String,
    /// Seconds an asynchronous caller is willing to wait.
    pub timeout_wait: u64,
    pub distribute_type: u8,
    pub method_id: u8,
    /// JSON pricing request.
    pub common_args: String,
}

impl Default for Tasker {
    fn default() -> Self {
        Tasker {
            tasker_id: 0,
            plugin_id: PLUGIN_ID.to_string(),
            timeout_wait: 3600,
            distribute_type: DistributeType::Local as u8,
            method_id: Method::Price as u8,
            common_args: String::new(),
        }
    }
}

impl Tasker {
    pub fn new(method: Method, common_args: impl Into<String>) -> Self {
        Tasker {
            method_id: method as u8,
            common_args: common_args.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> SharkfinResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SharkfinResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result envelope; `return_code` 0 means success and `result_data` holds JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub tasker_id: u64,
    pub return_code: i32,
    pub return_info: String,
    pub result_data: String,
}

impl Response {
    fn success(tasker_id: u64, result_data: String) -> Self {
        Response {
            tasker_id,
            return_code: 0,
            return_info: "success".to_string(),
            result_data,
        }
    }

    fn failure(tasker_id: u64, err: &SharkfinError) -> Self {
        Response {
            tasker_id,
            return_code: err.return_code(),
            return_info: err.to_string(),
            result_data: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out waiting for task result")]
    Timeout,
    #[error("wait cancelled")]
    Cancelled,
    #[error("task worker disconnected without a result")]
    Disconnected,
}

/// Shared flag that abandons pending waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Pending result of an asynchronous task.
pub struct TaskHandle {
    tasker_id: u64,
    timeout: Duration,
    receiver: Receiver<Response>,
}

impl TaskHandle {
    pub fn tasker_id(&self) -> u64 {
        self.tasker_id
    }

    /// Timeout requested by the task's `timeout_wait`.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn wait(&self, timeout: Duration, cancel: &CancelToken) -> Result<Response, WaitError> {
        let deadline = Instant::now() + timeout;
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(tasker_id = self.tasker_id, "wait cancelled");
                return Err(WaitError::Cancelled);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(tasker_id = self.tasker_id, "wait timed out");
                return Err(WaitError::Timeout);
            }
            match self.receiver.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(response) => return Ok(response),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(WaitError::Disconnected),
            }
        }
    }
}

/// Engine handle; create one and pass it where tasks are assigned.
#[derive(Debug)]
pub struct Kernel {
    next_id: AtomicU64,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Kernel {
            next_id: AtomicU64::new(1),
        }
    }

    fn resolve_id(&self, tasker: &Tasker) -> u64 {
        if tasker.tasker_id != 0 {
            tasker.tasker_id
        } else {
            self.next_id.fetch_add(1, Ordering::Relaxed)
        }
    }

    /// Runs `tasker` on the calling thread.
    pub fn assign_task(&self, tasker: &Tasker) -> Response {
        let id = self.resolve_id(tasker);
        execute(id, tasker)
    }

    /// Runs `tasker` on the rayon pool.
    pub fn assign_task_async(&self, tasker: Tasker) -> TaskHandle {
        let id = self.resolve_id(&tasker);
        let timeout = Duration::from_secs(tasker.timeout_wait);
        let (sender, receiver) = mpsc::channel();
        rayon::spawn(move || {
            let response = execute(id, &tasker);
            if sender.send(response).is_err() {
                tracing::debug!(tasker_id = id, "result dropped, nobody is waiting");
            }
        });
        TaskHandle {
            tasker_id: id,
            timeout,
            receiver,
        }
    }
}

fn execute(tasker_id: u64, tasker: &Tasker) -> Response {
    tracing::info!(
        tasker_id,
        method_id = tasker.method_id,
        plugin_id = %tasker.plugin_id,
        "task assigned"
    );
    match route(tasker) {
        Ok(data) => Response::success(tasker_id, data),
        Err(err) => {
            tracing::warn!(tasker_id, error = %err, "task failed");
            Response::failure(tasker_id, &err)
        }
    }
}

fn route(tasker: &Tasker) -> SharkfinResult<String> {
    if tasker.plugin_id != PLUGIN_ID {
        return Err(SharkfinError::UnsupportedOperation {
            operation: format!("plugin '{}'", tasker.plugin_id),
            context: format!("this kernel serves '{}'", PLUGIN_ID),
        });
    }
    match DistributeType::from_id(tasker.distribute_type) {
        Some(DistributeType::Local) => {}
        _ => {
            return Err(SharkfinError::UnsupportedOperation {
                operation: format!("distribute_type {}", tasker.distribute_type),
                context: "only local computation is available".to_string(),
            })
        }
    }
    let method = Method::from_id(tasker.method_id).ok_or_else(|| {
        SharkfinError::UnsupportedOperation {
            operation: format!("method_id {}", tasker.method_id),
            context: "expected 1 (price), 2 (payoff) or 3 (greeks)".to_string(),
        }
    })?;
    let config = SharkfinConfig::from_json(&tasker.common_args)?;
    run_method(method, config)
}

/// Runs `method` and serialises its result grid.
///
/// Requests over a single valuation day return one value per starting price, or the
/// itemised cash flows for payoff requests. Wider run windows return one row of
/// values per starting price; payoff rows hold the mean net payoff of each day.
pub fn run_method(method: Method, config: SharkfinConfig) -> SharkfinResult<String> {
    let greek = config.greek;
    let surface = config.grid.run_days > 1;
    let pricer = SharkfinPricer::new(config)?;
    match method {
        Method::Price if surface => pricer.price_surface()?.to_json(),
        Method::Price => pricer.price()?.to_json(),
        Method::Payoff if surface => pricer.payoff_surface()?.to_json(),
        Method::Payoff => pricer.payoff()?.to_json(),
        Method::Greeks => {
            let greek = greek.ok_or_else(|| {
                SharkfinError::invalid_config("calc_greek", "required for the greeks method")
            })?;
            if surface {
                pricer.greek_surface(greek)?.to_json()
            } else {
                pricer.greeks(greek)?.to_json()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_ids() {
        assert_eq!(Method::from_id(1), Some(Method::Price));
        assert_eq!(Method::from_id(3), Some(Method::Greeks));
        assert_eq!(Method::from_id(0), None);
        assert_eq!(DistributeType::from_id(1), Some(DistributeType::Remote));
    }

    #[test]
    fn test_tasker_json_defaults() {
        let tasker = Tasker::from_json(r#"{"method_id": 2}"#).expect("parses");
        assert_eq!(tasker.plugin_id, PLUGIN_ID);
        assert_eq!(tasker.method_id, 2);
        assert_eq!(tasker.timeout_wait, 3600);
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
