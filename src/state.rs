use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::services::api::SpaApi;
use crate::services::availability::AvailabilityClient;
use crate::services::lifecycle::AppointmentManager;
use crate::services::payment::PaymentOrchestrator;
use crate::services::wizard::BookingWizard;
use crate::store::SessionStore;

pub type SharedWizard = Arc<tokio::sync::Mutex<BookingWizard>>;

pub struct WizardSession {
    wizard: SharedWizard,
    touched: Instant,
}

pub struct AppState {
    pub config: AppConfig,
    pub api: Arc<dyn SpaApi>,
    pub store: Arc<dyn SessionStore>,
    pub availability: AvailabilityClient,
    pub appointments: AppointmentManager,
    pub payments: PaymentOrchestrator,
    pub wizards: Mutex<HashMap<Uuid, WizardSession>>,
}

impl AppState {
    pub fn new(config: AppConfig, api: Arc<dyn SpaApi>, store: Arc<dyn SessionStore>) -> Self {
        let availability = AvailabilityClient::new(api.clone(), config.availability_debounce);
        let appointments = AppointmentManager::new(api.clone());
        let payments = PaymentOrchestrator::new(
            api.clone(),
            store.clone(),
            &config.public_origin,
            config.default_bank_code.clone(),
        );
        Self {
            config,
            api,
            store,
            availability,
            appointments,
            payments,
            wizards: Mutex::new(HashMap::new()),
        }
    }

    pub fn start_wizard(&self) -> (Uuid, SharedWizard) {
        let wizard = BookingWizard::new(self.config.resend_cooldown);
        let id = wizard.id();
        let shared = Arc::new(tokio::sync::Mutex::new(wizard));
        self.wizards.lock().unwrap().insert(
            id,
            WizardSession {
                wizard: shared.clone(),
                touched: Instant::now(),
            },
        );
        (id, shared)
    }

    /// Every lookup counts as activity and keeps the session alive.
    pub fn wizard(&self, id: Uuid) -> AppResult<SharedWizard> {
        let mut wizards = self.wizards.lock().unwrap();
        let session = wizards
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("booking session {id} not found")))?;
        session.touched = Instant::now();
        Ok(session.wizard.clone())
    }

    /// Returns whether a session was dropped.
    pub fn abandon_wizard(&self, id: Uuid) -> bool {
        self.availability.forget(&id.to_string());
        self.wizards.lock().unwrap().remove(&id).is_some()
    }

    /// Drops wizard sessions and cached appointments untouched for
    /// `max_idle`. Returns the number of wizards evicted.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let evicted: Vec<Uuid> = {
            let mut wizards = self.wizards.lock().unwrap();
            let idle: Vec<Uuid> = wizards
                .iter()
                .filter(|(_, s)| s.touched.elapsed() >= max_idle)
                .map(|(id, _)| *id)
                .collect();
            for id in &idle {
                wizards.remove(id);
            }
            idle
        };
        for id in &evicted {
            self.availability.forget(&id.to_string());
        }

        let pruned = self.appointments.prune(max_idle);
        if !evicted.is_empty() || pruned > 0 {
            tracing::info!(wizards = evicted.len(), appointments = pruned, "evicted idle sessions");
        }
        evicted.len()
    }

    /// Runs [`AppState::sweep_idle`] every `sweep_interval` until the task is
    /// aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(state.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                state.sweep_idle(state.config.session_idle_timeout);
            }
        })
    }
}
