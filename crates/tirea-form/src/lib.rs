//! Reactive form state with race-safe async validation.
//!
//! A [`FormEngine`] owns a values [`Tree`], four parallel metadata trees
//! (errors, touched, dirty, validating) and a registry of per-path
//! [`FieldRules`]. Every mutation produces a new copy-on-write snapshot;
//! the UI layer reads it back through queries or a [`subscribe`] channel.
//!
//! Async rules are debounced per field and guarded by per-path sequence
//! numbers: only the attempt minted last for a path may write its result, so
//! a slow check for an old value can never overwrite the answer for the
//! current one, and structural list edits invalidate work whose index moved.
//!
//! [`subscribe`]: FormEngine::subscribe
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tirea_form::{FieldRules, FormEngine};
//!
//! # tokio_test_block(async {
//! let form = FormEngine::new(json!({"email": "", "tags": ["a", "b"]}));
//! form.register("email", FieldRules::new().required("Email is required")).unwrap();
//!
//! form.remove("tags", 0).unwrap();
//! assert_eq!(form.values(), json!({"email": "", "tags": ["b"]}));
//!
//! let outcome = form
//!     .submit(|_values| unreachable!(), |errors| {
//!         assert_eq!(errors, json!({"email": "Email is required"}));
//!     })
//!     .await
//!     .unwrap();
//! assert!(!outcome.is_valid());
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod options;
pub mod rules;
pub mod scheduler;

pub use engine::{FieldState, FormEngine, FormSnapshot, SubmitOutcome};
pub use error::{FormError, FormResult};
pub use evaluator::{evaluate_sync, is_orphaned, validate_all};
pub use options::{FormOptions, ResetOptions, RevalidateMode, ValidationMode};
pub use rules::{AsyncRule, Check, FieldRules, FormValues, SyncRule};
pub use scheduler::AsyncScheduler;

pub use tirea_form_state::{ArrayOp, Path, StateError, Tree};
