use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::actions::FormActions;
use crate::controller::{FieldHandle, FormController, FormResult, read_lock, write_lock};
use crate::path;

pub type BoxedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A result that may already be settled or still in flight. Validators, the
/// submit handler, and `run_validations` itself all produce one of these.
pub enum Eventual<T> {
    Ready(T),
    Pending(BoxedFuture<T>),
}

impl<T> Eventual<T> {
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    pub fn pending(future: impl Future<Output = T> + Send + 'static) -> Self {
        Self::Pending(Box::pin(future))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub async fn settle(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }
}

/// Field validators receive the field's current value and yield an error
/// value, `Null` meaning no error.
pub type FieldValidatorFn = Arc<dyn Fn(&Value) -> Eventual<Value> + Send + Sync>;

/// Whole-form validators receive the aggregated values tree and yield a full
/// error tree, potentially covering several paths.
pub type FormValidatorFn = Arc<dyn Fn(&Value) -> Eventual<Value> + Send + Sync>;

pub type SubmitHandlerFn =
    Arc<dyn Fn(Value, FormActions) -> Eventual<FormResult<()>> + Send + Sync>;

impl FormController {
    /// Runs every field validator and the whole-form validator, merging the
    /// results into one path-keyed error tree. Field results land in registry
    /// order with the whole-form tree last, so for an overlapping path the
    /// form-level error wins. When any validator is asynchronous the merged
    /// tree comes back as a pending result: the synchronous snapshot overlaid
    /// by the asynchronous completions, which always take precedence because
    /// they settle last.
    pub fn run_validations(&self) -> FormResult<Eventual<Value>> {
        let (jobs, values) = {
            let state = read_lock(&self.state, "collecting validators")?;
            let jobs: Vec<(String, Option<FieldValidatorFn>, Value)> = state
                .fields
                .iter()
                .map(|(field_path, record)| {
                    (field_path.clone(), record.validator.clone(), record.value.clone())
                })
                .collect();
            (jobs, state.aggregate_values())
        };

        let mut sync_tree = Value::Object(Map::new());
        let mut pending: Vec<(Option<String>, BoxedFuture<Value>)> = Vec::new();

        for (field_path, validator, value) in jobs {
            // A field without a validator still contributes, so every path is
            // accounted for in the merged tree.
            let outcome = match validator {
                Some(validator) => validator(&value),
                None => Eventual::Ready(Value::Null),
            };
            match outcome {
                Eventual::Ready(error) => {
                    if !error.is_null() {
                        path::set(&mut sync_tree, &field_path, error);
                    }
                }
                Eventual::Pending(future) => pending.push((Some(field_path), future)),
            }
        }

        if let Some(validator) = &self.validate {
            match validator(&values) {
                Eventual::Ready(tree) => overlay_errors(&mut sync_tree, &tree, ""),
                Eventual::Pending(future) => pending.push((None, future)),
            }
        }

        if pending.is_empty() {
            return Ok(Eventual::Ready(sync_tree));
        }

        log::trace!("validation pending for {} entries", pending.len());
        {
            let mut state = write_lock(&self.state, "marking validation in flight")?;
            state.is_validating = true;
        }

        let tagged = pending
            .into_iter()
            .map(|(tag, future)| async move { (tag, future.await) })
            .collect::<Vec<_>>();
        let join = futures::future::join_all(tagged);
        Ok(Eventual::pending(async move {
            let mut tree = sync_tree;
            for (tag, error) in join.await {
                match tag {
                    Some(field_path) => {
                        if error.is_null() {
                            path::delete(&mut tree, &field_path);
                        } else {
                            path::set(&mut tree, &field_path, error);
                        }
                    }
                    None => overlay_errors(&mut tree, &error, ""),
                }
            }
            tree
        }))
    }

    /// Validates one field with its own validator, applying the result only
    /// if the same registration still occupies the path once an asynchronous
    /// validator settles.
    pub(crate) async fn validate_single_field(&self, field_path: &str) -> FormResult<()> {
        let (handle, validator, value) = {
            let state = read_lock(&self.state, "reading field for validation")?;
            let Some(record) = state.fields.get(field_path) else {
                return Ok(());
            };
            (record.handle, record.validator.clone(), record.value.clone())
        };
        let Some(validator) = validator else {
            return Ok(());
        };

        match validator(&value) {
            Eventual::Ready(error) => self.apply_field_validation(field_path, handle, error),
            Eventual::Pending(future) => {
                {
                    let mut state =
                        write_lock(&self.state, "marking field validation in flight")?;
                    state.is_validating = true;
                }
                let error = future.await;
                let applied = self.apply_field_validation(field_path, handle, error);
                let mut state = write_lock(&self.state, "settling field validation")?;
                state.is_validating = false;
                applied
            }
        }
    }

    fn apply_field_validation(
        &self,
        field_path: &str,
        handle: FieldHandle,
        error: Value,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "applying field validation result")?;
        if let Some(record) = state.fields.get_mut(field_path) {
            if record.handle == handle {
                record.error = error;
            }
        }
        Ok(())
    }
}

/// Merges an error tree into `acc`. Objects are walked as subtrees, non-null
/// leaves overwrite, and an explicit `Null` leaf clears the path.
fn overlay_errors(acc: &mut Value, incoming: &Value, prefix: &str) {
    let Some(map) = incoming.as_object() else {
        return;
    };
    for (key, entry) in map {
        let at = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match entry {
            Value::Null => path::delete(acc, &at),
            Value::Object(_) => overlay_errors(acc, entry, &at),
            other => path::set(acc, &at, other.clone()),
        }
    }
}
