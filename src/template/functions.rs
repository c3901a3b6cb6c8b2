//! # Template Functions
//!
//! Custom functions made available to templates.
//!
//! A [`TemplateFunctions`] value is built once and handed to the renderer's
//! constructor, so renderers with different function sets can coexist.
//! The helpers `to_yaml`, `b64encode` and `b64decode` are always available,
//! both as functions (`{{ b64encode(Password) }}`) and as filters
//! (`{{ Password | b64encode }}`); user functions registered under the same
//! name replace the function form.

use base64::{engine::general_purpose, Engine as _};
use minijinja::functions::Function;
use minijinja::value::{FunctionArgs, FunctionResult};
use minijinja::{Environment, Error, ErrorKind, Value};
use std::collections::BTreeMap;

/// Immutable registry of named template functions
#[derive(Debug, Clone, Default)]
pub struct TemplateFunctions {
    functions: BTreeMap<String, Value>,
}

impl TemplateFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function callable from templates as `name(...)`
    #[must_use]
    pub fn with_function<F, Rv, Args>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Function<Rv, Args>,
        Rv: FunctionResult,
        Args: for<'a> FunctionArgs<'a>,
    {
        self.functions
            .insert(name.into(), Value::from_function(function));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Install the built-in helpers, then the user functions, into `env`
    pub(crate) fn install(&self, env: &mut Environment<'static>) {
        env.add_filter("to_yaml", to_yaml);
        env.add_filter("b64encode", b64encode);
        env.add_filter("b64decode", b64decode);
        env.add_function("to_yaml", to_yaml);
        env.add_function("b64encode", b64encode);
        env.add_function("b64decode", b64decode);

        for (name, function) in &self.functions {
            env.add_global(name.clone(), function.clone());
        }
    }
}

/// Serialize a value as YAML, without the trailing newline
fn to_yaml(value: Value) -> Result<String, Error> {
    serde_yaml::to_string(&value)
        .map(|yaml| yaml.trim_end().to_string())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("to_yaml failed: {e}")))
}

fn b64encode(value: String) -> String {
    general_purpose::STANDARD.encode(value.as_bytes())
}

fn b64decode(value: String) -> Result<String, Error> {
    let decoded = general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("b64decode failed: {e}")))?;
    String::from_utf8(decoded).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("b64decode produced invalid UTF-8: {e}"),
        )
    })
}
