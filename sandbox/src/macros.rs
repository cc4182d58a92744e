//! Named extensions attached to [`FileSystem`](crate::FileSystem) and
//! [`Assert`](crate::Assert) after the fact.
//!
//! A registry is an ordinary value shared through an `Arc`; whoever builds the
//! filesystem or assert decides which registry it sees, and `clear` resets it
//! between runs. Nothing here is process-global.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::Result;

#[async_trait]
pub trait Macro<T>: Send + Sync {
    async fn call(&self, target: &T, args: Vec<Value>) -> Result<Value>;
}

pub type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Adapts a synchronous closure into a [`Macro`].
pub struct FnMacro<F>(F);

#[async_trait]
impl<T, F> Macro<T> for FnMacro<F>
where
    T: Sync,
    F: Fn(&T, Vec<Value>) -> Result<Value> + Send + Sync,
{
    async fn call(&self, target: &T, args: Vec<Value>) -> Result<Value> {
        (self.0)(target, args)
    }
}

pub struct MacroRegistry<T> {
    macros: RwLock<HashMap<String, Arc<dyn Macro<T>>>>,
    getters: RwLock<HashMap<String, Getter<T>>>,
}

impl<T> MacroRegistry<T> {
    pub fn new() -> Self {
        Self {
            macros: RwLock::new(HashMap::new()),
            getters: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `method` under `name`, replacing any previous entry.
    pub fn register_macro<M>(&self, name: impl Into<String>, method: M)
    where
        M: Macro<T> + 'static,
    {
        self.macros.write().insert(name.into(), Arc::new(method));
    }

    pub fn register_fn<F>(&self, name: impl Into<String>, method: F)
    where
        T: Sync + 'static,
        F: Fn(&T, Vec<Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.register_macro(name, FnMacro(method));
    }

    pub fn register_getter<F>(&self, name: impl Into<String>, getter: F)
    where
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.getters.write().insert(name.into(), Arc::new(getter));
    }

    pub fn get_macro(&self, name: &str) -> Option<Arc<dyn Macro<T>>> {
        self.macros.read().get(name).cloned()
    }

    pub fn get_getter(&self, name: &str) -> Option<Getter<T>> {
        self.getters.read().get(name).cloned()
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.read().contains_key(name)
    }

    pub fn has_getter(&self, name: &str) -> bool {
        self.getters.read().contains_key(name)
    }

    /// Sorted names of every macro and getter.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .macros
            .read()
            .keys()
            .chain(self.getters.read().keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn clear(&self) {
        self.macros.write().clear();
        self.getters.write().clear();
    }
}

impl<T> Default for MacroRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MacroRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter {
        start: i64,
    }

    struct AddMacro;

    #[async_trait]
    impl Macro<Counter> for AddMacro {
        async fn call(&self, target: &Counter, args: Vec<Value>) -> Result<Value> {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(target.start + sum))
        }
    }

    #[tokio::test]
    async fn dispatches_registered_macros() {
        let registry = MacroRegistry::<Counter>::new();
        registry.register_macro("add", AddMacro);
        registry.register_fn("double", |target: &Counter, _| Ok(json!(target.start * 2)));

        let counter = Counter { start: 5 };
        let add = registry.get_macro("add").unwrap();
        assert_eq!(add.call(&counter, vec![json!(1), json!(2)]).await.unwrap(), json!(8));
        let double = registry.get_macro("double").unwrap();
        assert_eq!(double.call(&counter, Vec::new()).await.unwrap(), json!(10));
    }

    #[test]
    fn clear_resets_everything() {
        let registry = MacroRegistry::<Counter>::new();
        registry.register_getter("start", |target: &Counter| json!(target.start));
        registry.register_fn("noop", |_: &Counter, _| Ok(Value::Null));
        assert_eq!(registry.names(), vec!["noop".to_string(), "start".to_string()]);

        registry.clear();
        assert!(!registry.has_getter("start"));
        assert!(!registry.has_macro("noop"));
        assert!(registry.names().is_empty());
    }
}
