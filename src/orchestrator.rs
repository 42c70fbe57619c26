/// Workflow orchestrator — owns session state and sequences pick → embed → find.
///
/// Every action runs on its own spawned task and reports back through a
/// `Settlement` on an unbounded channel. The event loop drains that channel and
/// hands each settlement to `Orchestrator::apply`, so state is only ever
/// mutated from one place.
///
/// Request ids are shared across lanes and strictly increasing. A settlement
/// lands only if it is still the newest request of its lane and, for backend
/// lanes, no newer-triggered outcome is already on screen.
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::gateway::{Command, Gateway};
use crate::picker::{self, FilePicker};
use crate::policy::{Outcome, SurfaceToState};

pub type RequestId = u64;

// ── Lanes ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Picking,
    Embedding,
    Searching,
    /// `db_fun` capability probe
    Probing,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Picking, Lane::Embedding, Lane::Searching, Lane::Probing];

    fn index(self) -> usize {
        match self {
            Lane::Picking => 0,
            Lane::Embedding => 1,
            Lane::Searching => 2,
            Lane::Probing => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Lane::Picking => "picking",
            Lane::Embedding => "embedding",
            Lane::Searching => "searching",
            Lane::Probing => "probing db",
        }
    }
}

#[derive(Default)]
struct LaneSlot {
    latest: Option<RequestId>,
    pending: bool,
    task: Option<JoinHandle<()>>,
}

// ── Session state ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub selected_path: Option<String>,
    pub query_text: String,
    /// Stringified payload or error of the last applied backend outcome
    pub result_text: String,
}

/// Metadata about whatever currently occupies the result slot.
#[derive(Debug, Clone)]
pub struct ShownOutcome {
    pub id: RequestId,
    pub lane: Lane,
    pub failed: bool,
    pub at: DateTime<Local>,
}

// ── Settlements ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Settlement {
    Picked { id: RequestId, selection: Option<String> },
    Completed { id: RequestId, lane: Lane, outcome: Outcome },
}

impl Settlement {
    pub fn id(&self) -> RequestId {
        match self {
            Settlement::Picked { id, .. } | Settlement::Completed { id, .. } => *id,
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            Settlement::Picked { .. } => Lane::Picking,
            Settlement::Completed { lane, .. } => *lane,
        }
    }
}

/// What `apply` did with a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    /// A newer request on the same lane was issued after this one
    Superseded,
    /// A newer-triggered outcome from another lane is already displayed
    Outdated,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Orchestrator {
    state: SessionState,
    gateway: Arc<dyn Gateway>,
    picker: Arc<dyn FilePicker>,
    settle_tx: mpsc::UnboundedSender<Settlement>,
    next_id: RequestId,
    lanes: [LaneSlot; 4],
    shown: Option<ShownOutcome>,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        picker: Arc<dyn FilePicker>,
    ) -> (Self, mpsc::UnboundedReceiver<Settlement>) {
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();
        let orch = Self {
            state: SessionState::default(),
            gateway,
            picker,
            settle_tx,
            next_id: 1,
            lanes: Default::default(),
            shown: None,
        };
        (orch, settle_rx)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn shown(&self) -> Option<&ShownOutcome> {
        self.shown.as_ref()
    }

    pub fn is_busy(&self, lane: Lane) -> bool {
        self.lanes[lane.index()].pending
    }

    pub fn any_busy(&self) -> bool {
        self.lanes.iter().any(|l| l.pending)
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    /// Replace the query text. Never touches the backend.
    pub fn set_query(&mut self, text: impl Into<String>) {
        self.state.query_text = text.into();
    }

    pub fn pick_file(&mut self) -> RequestId {
        let id = self.begin(Lane::Picking);
        let picker = self.picker.clone();
        let tx = self.settle_tx.clone();
        let handle = tokio::spawn(async move {
            let selection = picker::select_file(picker.as_ref()).await;
            let _ = tx.send(Settlement::Picked { id, selection });
        });
        self.lanes[Lane::Picking.index()].task = Some(handle);
        id
    }

    /// Submit the selected file. An unset path goes out as an empty string;
    /// rejecting it is the backend's job.
    pub fn embed(&mut self) -> RequestId {
        let file_path = self.state.selected_path.clone().unwrap_or_default();
        tracing::info!(path = %file_path, "embed requested");
        self.dispatch(Lane::Embedding, Command::EmbedFile { file_path })
    }

    pub fn find(&mut self) -> RequestId {
        let query = self.state.query_text.clone();
        self.dispatch(Lane::Searching, Command::FindFile { query })
    }

    pub fn test_sql(&mut self) -> RequestId {
        self.dispatch(Lane::Probing, Command::DbFun)
    }

    fn dispatch(&mut self, lane: Lane, command: Command) -> RequestId {
        let id = self.begin(lane);
        tracing::info!(id, command = command.name(), "request issued");

        let gateway = self.gateway.clone();
        let tx = self.settle_tx.clone();
        let policy = SurfaceToState::new(command.name());
        let handle = tokio::spawn(async move {
            let outcome = policy.apply(gateway.invoke(&command).await);
            let _ = tx.send(Settlement::Completed { id, lane, outcome });
        });
        self.lanes[lane.index()].task = Some(handle);
        id
    }

    /// Allocate the next id for `lane`, cancelling whatever it had in flight.
    fn begin(&mut self, lane: Lane) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;

        let slot = &mut self.lanes[lane.index()];
        if let Some(prev) = slot.task.take() {
            if !prev.is_finished() {
                tracing::debug!(lane = lane.label(), superseded_by = id, "cancelling in-flight request");
            }
            prev.abort();
        }
        slot.latest = Some(id);
        slot.pending = true;
        id
    }

    // ── Settlement ────────────────────────────────────────────────────────────

    pub fn apply(&mut self, settlement: Settlement) -> Applied {
        let id = settlement.id();
        let lane = settlement.lane();

        let slot = &mut self.lanes[lane.index()];
        if slot.latest != Some(id) {
            tracing::debug!(id, lane = lane.label(), "discarding superseded settlement");
            return Applied::Superseded;
        }
        slot.pending = false;
        slot.task = None;

        match settlement {
            Settlement::Picked { selection, .. } => {
                if let Some(path) = selection {
                    self.state.selected_path = Some(path);
                }
                Applied::Applied
            }
            Settlement::Completed { outcome, .. } => {
                if self.shown.as_ref().is_some_and(|s| s.id > id) {
                    tracing::debug!(id, lane = lane.label(), "discarding outdated settlement");
                    return Applied::Outdated;
                }
                self.state.result_text = outcome.text().to_string();
                self.shown = Some(ShownOutcome {
                    id,
                    lane,
                    failed: outcome.is_failure(),
                    at: Local::now(),
                });
                Applied::Applied
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for slot in &mut self.lanes {
            if let Some(task) = slot.task.take() {
                task.abort();
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
