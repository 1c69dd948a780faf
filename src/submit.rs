use serde_json::Map;

use crate::actions::FormActions;
use crate::controller::{FormController, FormResult, write_lock};

/// A UI-event-like argument accepted by `submit_with_event`. Its default
/// action is suppressed and the event is otherwise ignored.
pub trait SubmitEvent {
    fn prevent_default(&mut self);
}

impl FormController {
    /// Drives one submission: touch every field, validate, apply the merged
    /// error tree, and invoke the submit handler only when the applied errors
    /// are empty. Re-entrant calls while a submission is outstanding are
    /// no-ops.
    pub async fn submit(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "entering submit")?;
            if state.is_submitting {
                log::debug!("submit ignored: a submission is already in flight");
                return Ok(());
            }
            state.is_submitting = true;
            state.submit_count = state.submit_count.saturating_add(1);
            // Touch-all is not awaited on blur semantics: flags flip here and
            // validation runs once, below.
            for record in state.fields.values_mut() {
                record.touched = true;
            }
        }

        let outcome = self.run_validations()?;
        let errors = outcome.settle().await;

        self.set_errors(&errors, false, true)?;
        {
            let mut state = write_lock(&self.state, "settling submit validation")?;
            state.is_validating = false;
        }

        // Validity comes from the freshly applied registry errors, not the
        // raw tree: entries for unregistered paths never block submission.
        let applied = self.get_errors()?;
        let is_valid = applied.as_object().is_none_or(Map::is_empty);
        if !is_valid {
            log::debug!("submit blocked by validation errors");
            let mut state = write_lock(&self.state, "recovering submit flag")?;
            state.is_submitting = false;
            return Ok(());
        }

        let values = self.get_values()?;
        let outcome = (self.handle_submit)(values, FormActions::new(self.clone()));
        let result = outcome.settle().await;

        // Cleared whether the handler succeeded or not; its failure still
        // propagates to the caller.
        let mut state = write_lock(&self.state, "recovering submit flag")?;
        state.is_submitting = false;
        result
    }

    pub async fn submit_with_event(
        &self,
        event: Option<&mut dyn SubmitEvent>,
    ) -> FormResult<()> {
        if let Some(event) = event {
            event.prevent_default();
        }
        self.submit().await
    }
}
