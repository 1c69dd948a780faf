use futures::future::join_all;
use serde_json::Value;

use crate::controller::{FormController, FormError, FormResult, FormState, read_lock, write_lock};
use crate::path;

impl FormController {
    /// Fans one `set_field_value` out per registered field that has a
    /// matching entry in `values`. When `merge` is false every field is
    /// written, missing entries becoming `Null`. All updates are issued in
    /// registry order before any settles.
    pub async fn set_values(
        &self,
        values: &Value,
        merge: bool,
        should_validate: bool,
    ) -> FormResult<()> {
        let targets: Vec<(String, Value)> = {
            let state = read_lock(&self.state, "collecting value targets")?;
            state
                .fields
                .keys()
                .filter_map(|field_path| {
                    let incoming = path::get(values, field_path);
                    if !merge || incoming.is_some() {
                        Some((field_path.clone(), incoming.cloned().unwrap_or(Value::Null)))
                    } else {
                        None
                    }
                })
                .collect()
        };

        let updates = targets
            .into_iter()
            .map(|(field_path, value)| async move {
                self.set_field_value(&field_path, value, should_validate).await
            })
            .collect::<Vec<_>>();
        join_all(updates).await.into_iter().collect()
    }

    pub async fn set_field_value(
        &self,
        field_path: &str,
        value: Value,
        should_validate: bool,
    ) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "writing field value")?;
            let Some(record) = state.fields.get_mut(field_path) else {
                return Err(FormError::UnknownField(field_path.to_string()));
            };
            record.value = value;
        }
        if should_validate {
            self.validate_single_field(field_path).await?;
        }
        Ok(())
    }

    /// Overwrites every field's error with the entry at its path, `Null` when
    /// absent. With `merge` set, only null entries are applied — existing
    /// errors are kept wherever the incoming tree carries one.
    pub fn set_errors(&self, errors: &Value, merge: bool, should_touch: bool) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing field errors")?;
        for (field_path, record) in state.fields.iter_mut() {
            let error = path::get(errors, field_path).cloned().unwrap_or(Value::Null);
            if merge && !error.is_null() {
                continue;
            }
            record.error = error;
            if should_touch {
                record.touched = true;
            }
        }
        Ok(())
    }

    pub fn set_field_error(
        &self,
        field_path: &str,
        error: Value,
        should_touch: bool,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing single field error")?;
        let Some(record) = state.fields.get_mut(field_path) else {
            return Err(FormError::UnknownField(field_path.to_string()));
        };
        record.error = error;
        if should_touch {
            record.touched = true;
        }
        Ok(())
    }

    pub fn set_touched(&self, touched: &Value) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing touched flags")?;
        for (field_path, record) in state.fields.iter_mut() {
            record.touched = matches!(path::get(touched, field_path), Some(Value::Bool(true)));
        }
        Ok(())
    }

    pub fn set_field_touched(&self, field_path: &str, touched: bool) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing single touched flag")?;
        let Some(record) = state.fields.get_mut(field_path) else {
            return Err(FormError::UnknownField(field_path.to_string()));
        };
        record.touched = touched;
        Ok(())
    }

    pub fn set_status(&self, status: Value) -> FormResult<()> {
        let mut state = write_lock(&self.state, "writing form status")?;
        state.status = status;
        Ok(())
    }

    pub fn reset_field(&self, field_path: &str, value: Option<Value>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting field")?;
        if !state.fields.contains_key(field_path) {
            return Err(FormError::UnknownField(field_path.to_string()));
        }
        reset_one(&mut state, field_path, value);
        Ok(())
    }

    /// Resets every field to the incoming value at its path, falling back to
    /// its baseline value. The baseline is rewritten to the reset value, so a
    /// freshly reset form is never dirty.
    pub fn reset_form(&self, values: Option<&Value>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        let field_paths: Vec<String> = state.fields.keys().cloned().collect();
        for field_path in field_paths {
            let incoming = values.and_then(|tree| path::get(tree, &field_path)).cloned();
            reset_one(&mut state, &field_path, incoming);
        }
        Ok(())
    }
}

fn reset_one(state: &mut FormState, field_path: &str, incoming: Option<Value>) {
    let baseline = incoming.unwrap_or_else(|| {
        path::get(&state.initial_values, field_path)
            .cloned()
            .unwrap_or(Value::Null)
    });
    let Some(record) = state.fields.get_mut(field_path) else {
        return;
    };
    record.value = baseline.clone();
    record.touched = false;
    record.error = Value::Null;
    path::set(&mut state.initial_values, field_path, baseline);
}

/// The capability bundle handed to the submit handler and to external
/// callers: exactly the bulk setters, the single-field setters, status,
/// reset, and re-submission.
#[derive(Clone)]
pub struct FormActions {
    controller: FormController,
}

impl FormActions {
    pub(crate) fn new(controller: FormController) -> Self {
        Self { controller }
    }

    pub async fn set_values(
        &self,
        values: &Value,
        merge: bool,
        should_validate: bool,
    ) -> FormResult<()> {
        self.controller.set_values(values, merge, should_validate).await
    }

    pub async fn set_field_value(
        &self,
        field_path: &str,
        value: Value,
        should_validate: bool,
    ) -> FormResult<()> {
        self.controller
            .set_field_value(field_path, value, should_validate)
            .await
    }

    pub fn set_errors(&self, errors: &Value, merge: bool, should_touch: bool) -> FormResult<()> {
        self.controller.set_errors(errors, merge, should_touch)
    }

    pub fn set_field_error(
        &self,
        field_path: &str,
        error: Value,
        should_touch: bool,
    ) -> FormResult<()> {
        self.controller.set_field_error(field_path, error, should_touch)
    }

    pub fn set_touched(&self, touched: &Value) -> FormResult<()> {
        self.controller.set_touched(touched)
    }

    pub fn set_field_touched(&self, field_path: &str, touched: bool) -> FormResult<()> {
        self.controller.set_field_touched(field_path, touched)
    }

    pub fn set_status(&self, status: Value) -> FormResult<()> {
        self.controller.set_status(status)
    }

    pub fn reset_form(&self, values: Option<&Value>) -> FormResult<()> {
        self.controller.reset_form(values)
    }

    pub async fn submit_form(&self) -> FormResult<()> {
        self.controller.submit().await
    }
}
