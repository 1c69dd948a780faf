use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::path;
use crate::validation::{Eventual, FieldValidatorFn, FormValidatorFn, SubmitHandlerFn};

static FIELD_HANDLE_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

/// Identity of one field registration, distinct from its path. A remount can
/// claim a path before the previous owner unregisters; the handle is what
/// disambiguates the teardown.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldHandle(pub u64);

impl FieldHandle {
    pub fn next() -> Self {
        Self(FIELD_HANDLE_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_on_change: bool,
    pub validate_on_blur: bool,
    pub validate_on_mount: bool,
    pub touch_on_change: bool,
    pub touch_on_blur: bool,
    pub should_unregister: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_on_change: false,
            validate_on_blur: true,
            validate_on_mount: false,
            touch_on_change: true,
            touch_on_blur: true,
            should_unregister: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    UnknownField(String),
    SubmitFailed(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::UnknownField(field_path) => {
                write!(f, "no field registered at {field_path}")
            }
            FormError::SubmitFailed(error) => write!(f, "submit handler failed: {error}"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Clone, Default)]
pub struct FieldConfig {
    pub initial_value: Value,
    pub initial_touched: bool,
    pub initial_error: Value,
    pub validator: Option<FieldValidatorFn>,
}

impl FieldConfig {
    pub fn new(initial_value: impl Into<Value>) -> Self {
        Self {
            initial_value: initial_value.into(),
            initial_touched: false,
            initial_error: Value::Null,
            validator: None,
        }
    }

    pub fn touched(mut self, touched: bool) -> Self {
        self.initial_touched = touched;
        self
    }

    pub fn error(mut self, error: impl Into<Value>) -> Self {
        self.initial_error = error.into();
        self
    }

    pub fn validator(
        mut self,
        validator: impl Fn(&Value) -> Eventual<Value> + Send + Sync + 'static,
    ) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }
}

pub(crate) struct FieldRecord {
    pub(crate) handle: FieldHandle,
    pub(crate) value: Value,
    pub(crate) touched: bool,
    pub(crate) error: Value,
    pub(crate) validator: Option<FieldValidatorFn>,
}

pub(crate) struct FormState {
    pub(crate) fields: BTreeMap<String, FieldRecord>,
    pub(crate) initial_values: Value,
    pub(crate) status: Value,
    pub(crate) submit_count: u32,
    pub(crate) is_submitting: bool,
    pub(crate) is_validating: bool,
}

impl FormState {
    pub(crate) fn aggregate_values(&self) -> Value {
        let mut tree = Value::Object(Map::new());
        for (field_path, record) in &self.fields {
            path::set(&mut tree, field_path, record.value.clone());
        }
        tree
    }

    pub(crate) fn aggregate_touched(&self) -> Value {
        let mut tree = Value::Object(Map::new());
        for (field_path, record) in &self.fields {
            path::set(&mut tree, field_path, Value::Bool(record.touched));
        }
        tree
    }

    // Absence of a path means "no error"; null errors never appear.
    pub(crate) fn aggregate_errors(&self) -> Value {
        let mut tree = Value::Object(Map::new());
        for (field_path, record) in &self.fields {
            if !record.error.is_null() {
                path::set(&mut tree, field_path, record.error.clone());
            }
        }
        tree
    }
}

#[derive(Clone, Debug)]
pub struct FormSnapshot {
    pub values: Value,
    pub touched: Value,
    pub errors: Value,
    pub status: Value,
    pub submit_count: u32,
    pub is_submitting: bool,
    pub is_validating: bool,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub initial_values: Value,
    pub options: FormOptions,
}

#[derive(Clone)]
pub struct FormController {
    pub(crate) options: FormOptions,
    pub(crate) initial_values: Value,
    pub(crate) state: Arc<RwLock<FormState>>,
    pub(crate) validate: Option<FormValidatorFn>,
    pub(crate) handle_submit: SubmitHandlerFn,
}

impl FormController {
    pub fn new(initial_values: Value, options: FormOptions) -> Self {
        Self {
            options,
            initial_values,
            state: Arc::new(RwLock::new(FormState {
                fields: BTreeMap::new(),
                initial_values: Value::Object(Map::new()),
                status: Value::Null,
                submit_count: 0,
                is_submitting: false,
                is_validating: false,
            })),
            validate: None,
            handle_submit: Arc::new(|_, _| Eventual::Ready(Ok(()))),
        }
    }

    pub fn with_form_validator(
        mut self,
        validator: impl Fn(&Value) -> Eventual<Value> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validator));
        self
    }

    pub fn with_submit_handler(
        mut self,
        handler: impl Fn(Value, crate::actions::FormActions) -> Eventual<FormResult<()>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.handle_submit = Arc::new(handler);
        self
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    /// Inserts or replaces the field at `field_path` and records its initial
    /// value into the dirtiness baseline.
    pub fn register(&self, field_path: &str, config: FieldConfig) -> FormResult<FieldHandle> {
        let handle = FieldHandle::next();
        let mut state = write_lock(&self.state, "registering field")?;
        path::set(
            &mut state.initial_values,
            field_path,
            config.initial_value.clone(),
        );
        state.fields.insert(
            field_path.to_string(),
            FieldRecord {
                handle,
                value: config.initial_value,
                touched: config.initial_touched,
                error: config.initial_error,
                validator: config.validator,
            },
        );
        Ok(handle)
    }

    /// Removes the field owning `handle` along with its baseline entry. A
    /// remount may have already claimed the path, so a stale handle is a
    /// silent no-op rather than an error.
    pub fn unregister(&self, handle: FieldHandle) -> FormResult<()> {
        let mut state = write_lock(&self.state, "unregistering field")?;
        let found = state
            .fields
            .iter()
            .find_map(|(field_path, record)| {
                (record.handle == handle).then(|| field_path.clone())
            });
        let Some(field_path) = found else {
            return Ok(());
        };
        state.fields.remove(&field_path);
        path::delete(&mut state.initial_values, &field_path);
        Ok(())
    }

    pub fn get_values(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "aggregating values")?.aggregate_values())
    }

    pub fn get_touched(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "aggregating touched flags")?.aggregate_touched())
    }

    pub fn get_errors(&self) -> FormResult<Value> {
        Ok(read_lock(&self.state, "aggregating errors")?.aggregate_errors())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        let values = state.aggregate_values();
        let errors = state.aggregate_errors();
        let is_dirty = values != state.initial_values;
        let is_valid = errors.as_object().is_none_or(Map::is_empty);
        Ok(FormSnapshot {
            touched: state.aggregate_touched(),
            status: state.status.clone(),
            submit_count: state.submit_count,
            is_submitting: state.is_submitting,
            is_validating: state.is_validating,
            is_dirty,
            is_valid,
            initial_values: self.initial_values.clone(),
            options: self.options,
            values,
            errors,
        })
    }
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
