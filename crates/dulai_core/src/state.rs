use crate::{AgentPersona, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPhase {
    #[default]
    Created,
    Validating,
    Running,
    Succeeded,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskPhase::Succeeded | TaskPhase::Failed)
    }
}

/// Lifecycle of one task on one connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskState {
    id: TaskId,
    phase: TaskPhase,
    task: Option<Task>,
    credential_verified: bool,
    persona: Option<AgentPersona>,
}

impl TaskState {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn persona(&self) -> Option<&AgentPersona> {
        self.persona.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub(crate) fn begin_validation(&mut self, task: Option<Task>) {
        self.phase = TaskPhase::Validating;
        self.task = task;
    }

    pub(crate) fn mark_credential_verified(&mut self) {
        self.credential_verified = true;
    }

    pub(crate) fn credential_verified(&self) -> bool {
        self.credential_verified
    }

    pub(crate) fn start_running(&mut self, persona: AgentPersona) {
        self.phase = TaskPhase::Running;
        self.persona = Some(persona);
    }

    pub(crate) fn succeed(&mut self) {
        self.phase = TaskPhase::Succeeded;
    }

    pub(crate) fn fail(&mut self) {
        self.phase = TaskPhase::Failed;
    }
}
