//! User-supplied nonlinear models.
//!
//! A custom model binds the response to the aggregated day-of-year mean and the
//! predictor to the day-of-year ordinal. It is an opaque callable over a
//! parameter vector plus the names of those parameters and a starting value for
//! each of them.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::BuiltinModel;

/// Model callable: `f(t, params) -> y`, with `params` in declared order.
pub type ModelFn = Arc<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>;

#[derive(Clone)]
pub struct CustomModel {
    pub name: String,
    pub param_names: Vec<String>,
    pub start: BTreeMap<String, f64>,
    /// Human-readable formula for reports.
    pub formula: Option<String>,
    eval: ModelFn,
}

impl CustomModel {
    pub fn new<F>(name: impl Into<String>, param_names: &[&str], eval: F) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            param_names: param_names.iter().map(|s| s.to_string()).collect(),
            start: BTreeMap::new(),
            formula: None,
            eval: Arc::new(eval),
        }
    }

    pub fn with_start(mut self, param: impl Into<String>, value: f64) -> Self {
        self.start.insert(param.into(), value);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// Starting values in declared order.
    ///
    /// Every declared parameter needs a starting value; the error names the
    /// ones that are missing.
    pub fn start_vector(&self) -> Result<Vec<f64>, AppError> {
        let missing: Vec<&str> = self
            .param_names
            .iter()
            .filter(|p| !self.start.contains_key(p.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::input(format!(
                "missing starting values for parameter(s): {}",
                missing.join(", ")
            )));
        }
        Ok(self.param_names.iter().map(|p| self.start[p.as_str()]).collect())
    }

    pub fn predict(&self, t: f64, params: &[f64]) -> f64 {
        (self.eval)(t, params)
    }
}

impl std::fmt::Debug for CustomModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomModel")
            .field("name", &self.name)
            .field("param_names", &self.param_names)
            .field("start", &self.start)
            .field("formula", &self.formula)
            .finish_non_exhaustive()
    }
}

/// A model to fit: either a registry entry or a user-supplied form.
#[derive(Debug, Clone)]
pub enum ModelForm {
    Builtin(BuiltinModel),
    Custom(CustomModel),
}

impl ModelForm {
    pub fn name(&self) -> &str {
        match self {
            ModelForm::Builtin(m) => m.name(),
            ModelForm::Custom(m) => &m.name,
        }
    }

    pub fn param_names(&self) -> Vec<String> {
        match self {
            ModelForm::Builtin(m) => m.param_names().iter().map(|s| s.to_string()).collect(),
            ModelForm::Custom(m) => m.param_names.clone(),
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match self {
            ModelForm::Builtin(m) => Some(m.formula()),
            ModelForm::Custom(m) => m.formula.as_deref(),
        }
    }

    pub fn predict(&self, t: f64, params: &[f64]) -> f64 {
        match self {
            ModelForm::Builtin(m) => m.predict(t, params),
            ModelForm::Custom(m) => m.predict(t, params),
        }
    }

    /// Starting values: derived from the data for built-ins, user-supplied for custom models.
    pub fn start_values(&self, t: &[f64], y: &[f64]) -> Result<Vec<f64>, AppError> {
        match self {
            ModelForm::Builtin(m) => Ok(m.start_values(t, y)),
            ModelForm::Custom(m) => m.start_vector(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_vector_follows_declared_order() {
        let m = CustomModel::new("lin", &["b", "a"], |t, p| p[1] + p[0] * t)
            .with_start("a", 1.0)
            .with_start("b", 2.0);
        assert_eq!(m.start_vector().unwrap(), vec![2.0, 1.0]);
        assert_eq!(m.predict(3.0, &[2.0, 1.0]), 7.0);
    }

    #[test]
    fn missing_start_names_the_parameter() {
        let m = CustomModel::new("bad", &["a", "b", "c"], |t, p| p[0] + p[1] * t + p[2]).with_start("a", 0.0);
        let err = m.start_vector().unwrap_err();
        assert!(err.to_string().contains("b, c"), "{err}");
    }

    #[test]
    fn model_form_dispatches() {
        let f = ModelForm::Builtin(BuiltinModel::Harmonic);
        assert_eq!(f.name(), "harmonic");
        assert_eq!(f.param_names(), vec!["a", "b1", "b2"]);
        assert_eq!(f.predict(10.0, &[3.0, 0.0, 0.0]), 3.0);
    }
}
