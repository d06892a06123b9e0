#![allow(dead_code)]
use alert_handler::{script::ScriptError, Invocation, ScriptRunner};
use async_trait::async_trait;
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use tokio::sync::Semaphore;

/// A mock ScriptRunner that records every invocation and when it started.
#[derive(Clone, Debug)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<(Invocation, Instant)>>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    /// Every run blocks until `gate` hands out a permit.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().iter().map(|(i, _)| i.clone()).collect()
    }

    pub fn start_times(&self) -> Vec<Instant> {
        let mut times: Vec<_> = self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect();
        times.sort();
        times
    }
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<String, ScriptError> {
        self.calls
            .lock()
            .unwrap()
            .push((invocation.clone(), Instant::now()));
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        Ok(format!("ran {}\n", invocation.script_path()))
    }
}
