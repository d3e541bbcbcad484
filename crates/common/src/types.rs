use serde::{Deserialize, Serialize};

/// Identity of one saga instance.
///
/// Pairs a caller-supplied saga name with the entity key of the hosting
/// durable-execution invocation. The pairing must be globally unique for
/// the lifetime of the saga; the entity key alone is not enough because
/// one invocation may host differently-named sagas over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SagaId {
    name: String,
    instance_key: String,
}

impl SagaId {
    /// Creates a saga identity from a saga name and an instance key.
    pub fn new(name: impl Into<String>, instance_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_key: instance_key.into(),
        }
    }

    /// Returns the caller-supplied saga name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the entity key of the hosting invocation.
    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.instance_key)
    }
}
