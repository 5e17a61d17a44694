//! Identifier → factory tables.
//!
//! The same [`Registry`] shape backs every backend role and the job factory, so a new
//! transport or job type is added by registering it, never by touching the control code.
use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} identifier '{id}' is already registered")]
    Duplicate { kind: &'static str, id: String },

    #[error("unknown {kind} identifier '{id}'")]
    Unknown { kind: &'static str, id: String },
}

/// Table of factories keyed by identifier.
///
/// `F` is usually a trait object (`dyn BackendFactory<dyn Queue>`, `dyn JobFactory`).
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use relay_core::registry::{Registry, RegistryError};
///
/// let mut reg: Registry<str> = Registry::new("greeting");
/// reg.register("en", Arc::from("hello")).unwrap();
///
/// assert_eq!(&*reg.lookup("en").unwrap(), "hello");
/// assert_eq!(
///     reg.lookup("fr").unwrap_err(),
///     RegistryError::Unknown { kind: "greeting", id: "fr".into() }
/// );
/// ```
pub struct Registry<F: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Arc<F>>,
}

impl<F: ?Sized> Registry<F> {
    /// Create an empty registry; `kind` names the role in error messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Bind `id` to `factory`. Rebinding an existing identifier fails.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use relay_core::registry::Registry;
    ///
    /// let mut reg: Registry<str> = Registry::new("greeting");
    /// reg.register("en", Arc::from("hello")).unwrap();
    ///
    /// let err = reg.register("en", Arc::from("hi")).unwrap_err();
    /// assert_eq!(err.to_string(), "greeting identifier 'en' is already registered");
    /// assert_eq!(&*reg.lookup("en").unwrap(), "hello");
    /// ```
    pub fn register(&mut self, id: impl Into<String>, factory: Arc<F>) -> Result<(), RegistryError> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::Duplicate {
                kind: self.kind,
                id,
            });
        }
        self.entries.insert(id, factory);
        Ok(())
    }

    /// Remove a binding, returning the factory if there was one.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<F>> {
        self.entries.remove(id)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<F>, RegistryError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::Unknown {
                kind: self.kind,
                id: id.to_string(),
            })
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered identifiers in sorted order.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use relay_core::registry::Registry;
    ///
    /// let mut reg: Registry<str> = Registry::new("greeting");
    /// reg.register("fr", Arc::from("bonjour")).unwrap();
    /// reg.register("de", Arc::from("hallo")).unwrap();
    /// assert_eq!(reg.identifiers(), ["de", "fr"]);
    /// ```
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl<F: ?Sized> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("identifiers", &self.identifiers())
            .finish()
    }
}
