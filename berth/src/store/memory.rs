use crate::allocation::AllocationState;
use crate::error::{Error, Result};

use super::AllocationStore;

/// In-process store. Nothing survives the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: AllocationState,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current record.
    #[must_use]
    pub const fn snapshot(&self) -> &AllocationState {
        &self.state
    }
}

impl AllocationStore for MemoryStore {
    fn load(&mut self) -> Result<AllocationState> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &mut AllocationState) -> Result<()> {
        if state.revision != self.state.revision {
            return Err(Error::ConcurrentModification {
                expected: state.revision,
                found: self.state.revision,
            });
        }
        state.revision += 1;
        self.state = state.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
