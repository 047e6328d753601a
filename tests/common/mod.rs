//! Shared test support: a scripted in-memory driver and a log capture layer.

#![allow(dead_code)]

use resilient_db::db::{Cursor, Driver, DriverConnection, DriverFault};
use resilient_db::models::{ConnectParams, QueryParam};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Default)]
struct Script {
    /// Outcomes of upcoming connect attempts; `connect_default` once drained.
    connects: VecDeque<bool>,
    connect_default: bool,
    /// Outcomes of upcoming executions; `execute_default` once drained.
    executes: VecDeque<Result<(), DriverFault>>,
    execute_default: Option<DriverFault>,

    connect_attempts: usize,
    executions: Vec<String>,
    closes: usize,
}

/// Driver whose connect and execute outcomes are scripted up front.
#[derive(Clone)]
pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDriver {
    /// Every connect succeeds and every execution succeeds.
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                connect_default: true,
                ..Script::default()
            })),
        }
    }

    /// Every connect fails.
    pub fn unreachable() -> Self {
        let driver = Self::new();
        driver.script.lock().unwrap().connect_default = false;
        driver
    }

    /// Script the next connect attempts.
    pub fn then_connect(self, outcomes: &[bool]) -> Self {
        self.script
            .lock()
            .unwrap()
            .connects
            .extend(outcomes.iter().copied());
        self
    }

    /// Script the next executions.
    pub fn then_execute(self, outcomes: Vec<Result<(), DriverFault>>) -> Self {
        self.script.lock().unwrap().executes.extend(outcomes);
        self
    }

    /// Fail every unscripted execution with `fault`.
    pub fn otherwise_fail_with(self, fault: DriverFault) -> Self {
        self.script.lock().unwrap().execute_default = Some(fault);
        self
    }

    pub fn connect_attempts(&self) -> usize {
        self.script.lock().unwrap().connect_attempts
    }

    pub fn executions(&self) -> usize {
        self.script.lock().unwrap().executions.len()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.script.lock().unwrap().executions.clone()
    }

    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

impl Driver for ScriptedDriver {
    type Connection = ScriptedConnection;

    async fn connect(&self, _params: &ConnectParams) -> Result<ScriptedConnection, DriverFault> {
        let mut script = self.script.lock().unwrap();
        script.connect_attempts += 1;
        let ok = script.connects.pop_front().unwrap_or(script.connect_default);
        if ok {
            Ok(ScriptedConnection {
                script: Arc::clone(&self.script),
                closed: Arc::new(AtomicBool::new(false)),
            })
        } else {
            Err(DriverFault::operational(Some(2003), "Can't connect to MySQL server"))
        }
    }
}

pub struct ScriptedConnection {
    script: Arc<Mutex<Script>>,
    closed: Arc<AtomicBool>,
}

impl DriverConnection for ScriptedConnection {
    type Cursor = ScriptedCursor;

    fn cursor(&self) -> Result<ScriptedCursor, DriverFault> {
        Ok(ScriptedCursor {
            script: Arc::clone(&self.script),
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) -> Result<(), DriverFault> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(DriverFault::unusable("Connection already closed"));
        }
        self.script.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub struct ScriptedCursor {
    script: Arc<Mutex<Script>>,
    closed: Arc<AtomicBool>,
}

impl Cursor for ScriptedCursor {
    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> Result<(), DriverFault> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverFault::unusable("Connection is closed"));
        }
        let mut script = self.script.lock().unwrap();
        script.executions.push(sql.to_string());
        match script.executes.pop_front() {
            Some(outcome) => outcome,
            None => match &script.execute_default {
                Some(fault) => Err(fault.clone()),
                None => Ok(()),
            },
        }
    }
}

pub fn params(database: &str) -> ConnectParams {
    ConnectParams::new(database, "localhost", 3306, "test", "secret")
}

pub fn server_lost() -> DriverFault {
    DriverFault::operational(Some(2013), "Lost connection to MySQL server during query")
}

/// Records every event emitted while installed.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Install as the default subscriber for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<(Level, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}
