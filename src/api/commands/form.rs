//! Task-product form command module
//!
//! Forms are kept open as sessions keyed by id between UI events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::core::reconciler::fields::{Field, FieldSet};
use crate::core::reconciler::{CycleReport, FormSession, TaskContext};
use crate::shared::error::{AppError, AppResult};
use crate::shared::settings::FarmSettings;
use crate::shared::types::{
    FormSnapshot, OpenFormRequest, SetDiscriminantRequest, TaskProductValues, UpdateFieldRequest,
};

/// Open form sessions
#[derive(Clone)]
pub struct FormSessions {
    sessions: Arc<Mutex<HashMap<Uuid, FormSession>>>,
    settings: FarmSettings,
}

impl FormSessions {
    pub fn new(settings: FarmSettings) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, FormSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("form sessions mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut FormSession) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::Session(format!("No open form with id {}", id)))?;
        f(session)
    }

    fn take(&self, id: Uuid) -> AppResult<FormSession> {
        self.lock()
            .remove(&id)
            .ok_or_else(|| AppError::Session(format!("No open form with id {}", id)))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mount a form and return its initial state
    pub fn open(&self, request: OpenFormRequest) -> AppResult<FormSnapshot> {
        let system = request.system.unwrap_or(self.settings.measurement);
        let context = TaskContext::new(
            request.total_area,
            &request.total_area_unit,
            system,
            request.is_weight,
        )?;

        let store = request
            .values
            .into_iter()
            .fold(FieldSet::new(), |store, (field, value)| store.with(field, value));

        let session = FormSession::mount(context, store)?;
        let snapshot = session.snapshot();
        self.lock().insert(session.id(), session);
        Ok(snapshot)
    }

    pub fn update_field(&self, request: UpdateFieldRequest) -> AppResult<CycleReport> {
        self.with_session(request.session_id, |session| {
            Ok(session.update_field(request.field, request.value)?)
        })
    }

    pub fn clear_field(&self, session_id: Uuid, field: Field) -> AppResult<CycleReport> {
        self.with_session(session_id, |session| Ok(session.clear_field(field)?))
    }

    pub fn set_is_weight(&self, request: SetDiscriminantRequest) -> AppResult<CycleReport> {
        self.with_session(request.session_id, |session| {
            Ok(session.set_is_weight(request.is_weight)?)
        })
    }

    pub fn snapshot(&self, session_id: Uuid) -> AppResult<FormSnapshot> {
        self.with_session(session_id, |session| Ok(session.snapshot()))
    }

    /// Preview label formatted with the configured decimals
    pub fn preview_label(&self, session_id: Uuid) -> AppResult<Option<String>> {
        let decimals = self.settings.preview_decimals;
        self.with_session(session_id, |session| {
            Ok(session.preview().map(|preview| preview.label_with(decimals)))
        })
    }

    /// Submit the form; the session is closed
    pub fn commit(&self, session_id: Uuid) -> AppResult<TaskProductValues> {
        Ok(self.take(session_id)?.commit())
    }

    /// Discard the form
    pub fn close(&self, session_id: Uuid) -> AppResult<()> {
        self.take(session_id)?.unmount();
        Ok(())
    }
}
