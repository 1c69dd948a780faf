pub mod path;

mod actions;
mod controller;
mod submit;
mod validation;


pub use actions::FormActions;
pub use controller::{
    FieldConfig, FieldHandle, FormController, FormError, FormOptions, FormResult, FormSnapshot,
};
pub use submit::SubmitEvent;
pub use validation::{BoxedFuture, Eventual, FieldValidatorFn, FormValidatorFn, SubmitHandlerFn};
