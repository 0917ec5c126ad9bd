//! Shared helpers for validating project files

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ProjectError, Result};

/// Accumulates validation errors for one file; warnings are logged as they occur
pub(crate) struct Problems {
    origin: String,
    errors: Vec<String>,
}

impl Problems {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.to_string(),
            errors: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&self, message: impl std::fmt::Display) {
        warn!("{}: {}", self.origin, message);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish<T>(self, value: T) -> Result<T> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.into_error())
        }
    }

    pub fn into_error(self) -> ProjectError {
        ProjectError::Invalid {
            path: self.origin,
            problems: self.errors,
        }
    }

    /// String-typed key
    pub fn string(&mut self, key: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.error(format!("{key} must be a string"));
                None
            }
        }
    }

    pub fn boolean(&mut self, key: &str, value: &Value) -> Option<bool> {
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.error(format!("{key} must be a boolean"));
                None
            }
        }
    }

    pub fn object(&mut self, key: &str, value: &Value) -> Option<Map<String, Value>> {
        match value.as_object() {
            Some(map) => Some(map.clone()),
            None => {
                self.error(format!("{key} must be an object"));
                None
            }
        }
    }

    /// Property table; array-valued properties carry at most one element
    pub fn properties(&mut self, key: &str, value: &Value) -> Option<Map<String, Value>> {
        let map = self.object(key, value)?;
        let mut valid = true;
        for (property, value) in &map {
            if value.as_array().is_some_and(|array| array.len() > 1) {
                self.error(format!(
                    "property {property} is an array with size > 1; check property syntax"
                ));
                valid = false;
            }
        }
        valid.then_some(map)
    }

    pub fn tags(&mut self, key: &str, value: &Value) -> Option<Vec<String>> {
        let Some(array) = value.as_array() else {
            self.error(format!("{key} must be an array"));
            return None;
        };
        let tags: Option<Vec<String>> = array.iter().map(|tag| tag.as_str().map(str::to_string)).collect();
        if tags.is_none() {
            self.error(format!("{key} must contain only strings"));
        }
        tags
    }
}
