use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::record::{Record, Schema};

use super::{SinkAdapter, SinkError, SinkKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Retryable,
    Fatal,
    Hang,
}

#[derive(Debug, Default)]
struct ScriptState {
    provision: VecDeque<Outcome>,
    opens: VecDeque<Outcome>,
    writes: VecDeque<Outcome>,
    committed: Vec<Record>,
    calls: Vec<&'static str>,
    open_handles: usize,
}

/// In-memory adapter that plays back scripted outcomes. Unscripted calls
/// succeed.
pub struct ScriptedSink {
    kind: SinkKind,
    state: Arc<Mutex<ScriptState>>,
}

/// Shared view of what a `ScriptedSink` saw, usable after the sink has moved
/// into a manager.
#[derive(Clone)]
pub struct ScriptStore {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedSink {
    pub fn new() -> ScriptedSink {
        ScriptedSink::of_kind(SinkKind::LineRecordFile)
    }

    pub fn of_kind(kind: SinkKind) -> ScriptedSink {
        ScriptedSink {
            kind,
            state: Arc::default(),
        }
    }

    pub fn store(&self) -> ScriptStore {
        ScriptStore {
            state: self.state.clone(),
        }
    }

    pub fn script_provision(&mut self, outcome: Outcome) {
        self.store().script_provision(outcome);
    }

    pub fn script_writes(&mut self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.store().script_writes(outcomes);
    }

    async fn play(&self, outcome: Option<Outcome>, what: &str) -> Result<(), SinkError> {
        match outcome.unwrap_or(Outcome::Ok) {
            Outcome::Ok => Ok(()),
            Outcome::Retryable => Err(SinkError::retryable(self.kind, format!("{what} refused"))),
            Outcome::Fatal => Err(SinkError::fatal(self.kind, format!("{what} rejected"))),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    fn next(&self, call: &'static str) -> Option<Outcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        match call {
            "provision" => state.provision.pop_front(),
            "open" => state.opens.pop_front(),
            "write" => state.writes.pop_front(),
            _ => None,
        }
    }
}

impl ScriptStore {
    pub fn script_provision(&self, outcome: Outcome) {
        self.state.lock().unwrap().provision.push_back(outcome);
    }

    pub fn script_opens(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state.lock().unwrap().opens.extend(outcomes);
    }

    pub fn script_writes(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.state.lock().unwrap().writes.extend(outcomes);
    }

    pub fn committed(&self) -> Vec<Record> {
        self.state.lock().unwrap().committed.clone()
    }

    /// First value of each committed record, as text.
    pub fn committed_tags(&self) -> Vec<String> {
        self.committed()
            .iter()
            .map(|record| record.values()[0].to_field())
            .collect()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles
    }
}

#[async_trait]
impl SinkAdapter for ScriptedSink {
    type Handle = ();

    fn kind(&self) -> SinkKind {
        self.kind
    }

    async fn provision(&mut self, _schema: &Schema) -> Result<(), SinkError> {
        let outcome = self.next("provision");
        self.play(outcome, "provision").await
    }

    async fn open(&mut self) -> Result<(), SinkError> {
        let outcome = self.next("open");
        self.play(outcome, "open").await?;
        self.state.lock().unwrap().open_handles += 1;
        Ok(())
    }

    async fn write_one(&mut self, _handle: &mut (), record: &Record) -> Result<(), SinkError> {
        let outcome = self.next("write");
        self.play(outcome, "write").await?;
        self.state.lock().unwrap().committed.push(record.clone());
        Ok(())
    }

    async fn close(&mut self, _handle: ()) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("close");
        state.open_handles -= 1;
    }
}
