//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When live validation runs before the first submit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Every value change and every blur.
    #[default]
    OnChange,
    /// Blur only.
    OnBlur,
    /// Blur, then every change of a touched field.
    OnTouched,
    /// Nothing runs live; only submit validates.
    OnSubmit,
}

/// When live validation runs after the first submit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidateMode {
    /// Every value change and every blur.
    #[default]
    OnChange,
    /// Blur only.
    OnBlur,
    OnSubmit,
}

/// Options fixed at engine construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
    /// Debounce applied to async rules that do not set their own.
    pub default_debounce_ms: u64,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            mode: ValidationMode::OnChange,
            revalidate_mode: RevalidateMode::OnChange,
            default_debounce_ms: 0,
        }
    }
}

impl FormOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_revalidate_mode(mut self, mode: RevalidateMode) -> Self {
        self.revalidate_mode = mode;
        self
    }

    #[must_use]
    pub fn with_default_debounce(mut self, window: Duration) -> Self {
        self.default_debounce_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.default_debounce_ms)
    }

    /// Whether a value change should validate the field now.
    pub(crate) fn validates_on_change(&self, submitted: bool, touched: bool) -> bool {
        if submitted {
            return self.revalidate_mode == RevalidateMode::OnChange;
        }
        match self.mode {
            ValidationMode::OnChange => true,
            ValidationMode::OnTouched => touched,
            ValidationMode::OnBlur | ValidationMode::OnSubmit => false,
        }
    }

    /// Whether a blur should validate the field now.
    pub(crate) fn validates_on_blur(&self, submitted: bool) -> bool {
        if submitted {
            return self.revalidate_mode != RevalidateMode::OnSubmit;
        }
        self.mode != ValidationMode::OnSubmit
    }
}

/// What `reset` and `reset_field` keep instead of clearing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetOptions {
    pub keep_errors: bool,
    pub keep_touched: bool,
    pub keep_dirty: bool,
    /// Keeps validating flags and lets pending async work finish.
    pub keep_validating: bool,
    /// Ignored by `reset_field`.
    pub keep_submit_count: bool,
}

impl ResetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keep_errors(mut self) -> Self {
        self.keep_errors = true;
        self
    }

    #[must_use]
    pub fn keep_touched(mut self) -> Self {
        self.keep_touched = true;
        self
    }

    #[must_use]
    pub fn keep_dirty(mut self) -> Self {
        self.keep_dirty = true;
        self
    }

    #[must_use]
    pub fn keep_validating(mut self) -> Self {
        self.keep_validating = true;
        self
    }

    #[must_use]
    pub fn keep_submit_count(mut self) -> Self {
        self.keep_submit_count = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: FormOptions = serde_json::from_value(json!({"mode": "on_blur"})).unwrap();
        assert_eq!(opts.mode, ValidationMode::OnBlur);
        assert_eq!(opts.revalidate_mode, RevalidateMode::OnChange);
        assert_eq!(opts.default_debounce(), Duration::ZERO);

        let opts: FormOptions =
            serde_json::from_value(json!({"default_debounce_ms": 250})).unwrap();
        assert_eq!(opts.default_debounce(), Duration::from_millis(250));
    }

    #[test]
    fn test_mode_gates() {
        let on_touched = FormOptions::new().with_mode(ValidationMode::OnTouched);
        assert!(!on_touched.validates_on_change(false, false));
        assert!(on_touched.validates_on_change(false, true));
        assert!(on_touched.validates_on_blur(false));

        let on_change = FormOptions::new();
        assert!(on_change.validates_on_change(false, false));
        assert!(on_change.validates_on_blur(false));

        let on_submit = FormOptions::new()
            .with_mode(ValidationMode::OnSubmit)
            .with_revalidate_mode(RevalidateMode::OnBlur);
        assert!(!on_submit.validates_on_change(false, true));
        assert!(!on_submit.validates_on_blur(false));
        assert!(!on_submit.validates_on_change(true, true));
        assert!(on_submit.validates_on_blur(true));

        let never = FormOptions::new()
            .with_mode(ValidationMode::OnSubmit)
            .with_revalidate_mode(RevalidateMode::OnSubmit);
        assert!(!never.validates_on_blur(true));
    }

    #[test]
    fn test_reset_options_builder() {
        let opts = ResetOptions::new().keep_errors().keep_submit_count();
        assert!(opts.keep_errors && opts.keep_submit_count);
        assert!(!opts.keep_touched && !opts.keep_dirty && !opts.keep_validating);
    }
}
