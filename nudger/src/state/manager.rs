//! StateManager - actor that owns the JsonStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{CompanionSnapshot, DailyPlan, UserProfile};
use crate::scheduler::ScheduleConfig;
use crate::store::JsonStore;

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor for one user
    pub fn spawn(data_dir: impl AsRef<Path>, user_id: &str) -> eyre::Result<Self> {
        debug!(data_dir = %data_dir.as_ref().display(), %user_id, "spawn: called");
        let store = JsonStore::open(data_dir, user_id)?;
        Ok(Self::with_store(store))
    }

    /// Spawn around an already opened store
    pub fn with_store(store: JsonStore) -> Self {
        debug!(root = %store.root().display(), "with_store: called");
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Load the profile, if one has been saved
    pub async fn load_profile(&self) -> StateResponse<Option<UserProfile>> {
        debug!("load_profile: called");
        self.request(|reply| StateCommand::LoadProfile { reply }).await
    }

    pub async fn save_profile(&self, profile: UserProfile) -> StateResponse<()> {
        debug!(user_id = %profile.user_id, "save_profile: called");
        self.request(|reply| StateCommand::SaveProfile {
            profile: Box::new(profile),
            reply,
        })
        .await
    }

    /// Load the companion snapshot, if one has been saved
    pub async fn load_snapshot(&self) -> StateResponse<Option<CompanionSnapshot>> {
        debug!("load_snapshot: called");
        self.request(|reply| StateCommand::LoadSnapshot { reply }).await
    }

    pub async fn save_snapshot(&self, snapshot: CompanionSnapshot) -> StateResponse<()> {
        debug!(phase = %snapshot.phase, interrupted = snapshot.interrupt.is_some(), "save_snapshot: called");
        self.request(|reply| StateCommand::SaveSnapshot {
            snapshot: Box::new(snapshot),
            reply,
        })
        .await
    }

    pub async fn load_schedule(&self) -> StateResponse<Option<ScheduleConfig>> {
        debug!("load_schedule: called");
        self.request(|reply| StateCommand::LoadSchedule { reply }).await
    }

    pub async fn save_schedule(&self, schedule: ScheduleConfig) -> StateResponse<()> {
        debug!("save_schedule: called");
        self.request(|reply| StateCommand::SaveSchedule { schedule, reply }).await
    }

    /// Move a retired plan into history
    pub async fn archive_plan(&self, plan: DailyPlan) -> StateResponse<()> {
        debug!(date = %plan.date, "archive_plan: called");
        self.request(|reply| StateCommand::ArchivePlan {
            plan: Box::new(plan),
            reply,
        })
        .await
    }

    /// Archived plans, newest first
    pub async fn plan_history(&self, limit: usize) -> StateResponse<Vec<DailyPlan>> {
        debug!(limit, "plan_history: called");
        self.request(|reply| StateCommand::PlanHistory { limit, reply }).await
    }

    /// Stop the actor after pending commands drain
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }
}

async fn actor_loop(store: JsonStore, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::LoadProfile { reply } => {
                debug!("actor_loop: LoadProfile command");
                let _ = reply.send(store.load().map_err(StateError::from));
            }

            StateCommand::SaveProfile { profile, reply } => {
                debug!(user_id = %profile.user_id, "actor_loop: SaveProfile command");
                let _ = reply.send(store.save(&*profile).map_err(StateError::from));
            }

            StateCommand::LoadSnapshot { reply } => {
                debug!("actor_loop: LoadSnapshot command");
                let _ = reply.send(store.load().map_err(StateError::from));
            }

            StateCommand::SaveSnapshot { snapshot, reply } => {
                debug!(phase = %snapshot.phase, "actor_loop: SaveSnapshot command");
                let _ = reply.send(store.save(&*snapshot).map_err(StateError::from));
            }

            StateCommand::LoadSchedule { reply } => {
                debug!("actor_loop: LoadSchedule command");
                let _ = reply.send(store.load().map_err(StateError::from));
            }

            StateCommand::SaveSchedule { schedule, reply } => {
                debug!("actor_loop: SaveSchedule command");
                let _ = reply.send(store.save(&schedule).map_err(StateError::from));
            }

            StateCommand::ArchivePlan { plan, reply } => {
                debug!(date = %plan.date, "actor_loop: ArchivePlan command");
                let _ = reply.send(store.archive_plan(&plan).map_err(StateError::from));
            }

            StateCommand::PlanHistory { limit, reply } => {
                debug!(limit, "actor_loop: PlanHistory command");
                let _ = reply.send(store.plan_history(limit).map_err(StateError::from));
            }

            StateCommand::Shutdown { reply } => {
                info!("StateManager shutting down");
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("actor_loop: exited");
}
