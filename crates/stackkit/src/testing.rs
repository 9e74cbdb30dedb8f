//! In-memory doubles shared by the unit tests

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{Provider, StackDescription, StackEvent, StackRequest};
use crate::retry::Sleeper;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Records requested delays instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Queue of scripted responses; the last one repeats forever
#[derive(Debug)]
struct Script<T> {
    queue: VecDeque<ProviderResult<T>>,
}

impl<T: Clone> Script<T> {
    fn new(default: ProviderResult<T>) -> Self {
        Self {
            queue: VecDeque::from([default]),
        }
    }

    fn set(&mut self, responses: Vec<ProviderResult<T>>) {
        self.queue = responses.into();
    }

    fn next(&mut self) -> ProviderResult<T> {
        if self.queue.len() > 1 {
            self.queue.pop_front().unwrap()
        } else {
            self.queue.front().cloned().unwrap()
        }
    }
}

/// Provider answering from scripted responses and recording every call
#[derive(Debug)]
pub struct ScriptedProvider {
    describe: Mutex<Script<StackDescription>>,
    template: Mutex<Script<String>>,
    create: Mutex<Script<()>>,
    update: Mutex<Script<()>>,
    delete: Mutex<Script<()>>,
    events: Mutex<Vec<StackEvent>>,
    calls: Mutex<Vec<String>>,
    requests: Mutex<Vec<StackRequest>>,
}

impl ScriptedProvider {
    /// Provider where the stack does not exist and every mutation is accepted
    pub fn new() -> Self {
        Self {
            describe: Mutex::new(Script::new(Err(ProviderError::stack_missing("stack")))),
            template: Mutex::new(Script::new(Ok("{}".to_string()))),
            create: Mutex::new(Script::new(Ok(()))),
            update: Mutex::new(Script::new(Ok(()))),
            delete: Mutex::new(Script::new(Ok(()))),
            events: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on_describe(self, responses: Vec<ProviderResult<StackDescription>>) -> Self {
        self.describe.lock().unwrap().set(responses);
        self
    }

    pub fn on_template(self, responses: Vec<ProviderResult<String>>) -> Self {
        self.template.lock().unwrap().set(responses);
        self
    }

    pub fn on_create(self, responses: Vec<ProviderResult<()>>) -> Self {
        self.create.lock().unwrap().set(responses);
        self
    }

    pub fn on_update(self, responses: Vec<ProviderResult<()>>) -> Self {
        self.update.lock().unwrap().set(responses);
        self
    }

    pub fn on_delete(self, responses: Vec<ProviderResult<()>>) -> Self {
        self.delete.lock().unwrap().set(responses);
        self
    }

    pub fn with_events(self, events: Vec<StackEvent>) -> Self {
        *self.events.lock().unwrap() = events;
        self
    }

    /// Names of the provider methods called, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls to one method
    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| *c == method).count()
    }

    /// Create and update payloads received
    pub fn requests(&self) -> Vec<StackRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ScriptedProvider {
    fn describe_stack(&self, _name: &str) -> ProviderResult<StackDescription> {
        self.record("describe");
        self.describe.lock().unwrap().next()
    }

    fn get_template(&self, _name: &str) -> ProviderResult<String> {
        self.record("template");
        self.template.lock().unwrap().next()
    }

    fn describe_events(&self, _stack_id: &str) -> ProviderResult<Vec<StackEvent>> {
        self.record("events");
        Ok(self.events.lock().unwrap().clone())
    }

    fn create_stack(&self, request: &StackRequest) -> ProviderResult<()> {
        self.record("create");
        self.requests.lock().unwrap().push(request.clone());
        self.create.lock().unwrap().next()
    }

    fn update_stack(&self, request: &StackRequest) -> ProviderResult<()> {
        self.record("update");
        self.requests.lock().unwrap().push(request.clone());
        self.update.lock().unwrap().next()
    }

    fn delete_stack(&self, _name: &str) -> ProviderResult<()> {
        self.record("delete");
        self.delete.lock().unwrap().next()
    }
}

/// Describe record for a stack in the given status
pub fn stack(name: &str, status: &str) -> StackDescription {
    StackDescription {
        stack_id: format!("arn:stack/{name}/1"),
        name: name.to_string(),
        status: status.to_string(),
        status_reason: None,
        parameters: BTreeMap::new(),
        outputs: BTreeMap::new(),
    }
}

/// Event with the given logical id and status
pub fn event(logical_id: &str, status: &str) -> StackEvent {
    StackEvent {
        timestamp: "2024-01-01T00:00:00Z".to_string(),
        resource_type: "AWS::CloudFormation::Stack".to_string(),
        logical_id: logical_id.to_string(),
        status: status.to_string(),
        reason: None,
    }
}
