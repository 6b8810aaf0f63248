use std::collections::BTreeMap;
use std::sync::Arc;

use crate::personas::builtin_personas;
use crate::specialist::{PromptSpecialist, Specialist};

/// Name -> specialist lookup used by the orchestrator.
#[derive(Clone, Default)]
pub struct SpecialistRegistry {
    specialists: BTreeMap<String, Arc<dyn Specialist>>,
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in Jota specialists.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for persona in builtin_personas() {
            registry.register(PromptSpecialist::new(persona));
        }
        registry
    }

    pub fn register<S>(&mut self, specialist: S)
    where
        S: Specialist + 'static,
    {
        self.register_arc(Arc::new(specialist));
    }

    pub fn register_arc(&mut self, specialist: Arc<dyn Specialist>) {
        self.specialists.insert(specialist.id().to_string(), specialist);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Specialist>> {
        self.specialists.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specialists.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specialists.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specialists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specialists.is_empty()
    }
}

impl std::fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.names().collect::<Vec<_>>();
        f.debug_struct("SpecialistRegistry").field("names", &names).finish()
    }
}
