// Session-scoped id generation. Ids only need to be unique within one project,
// so each migration or editing session owns its own counter.

use std::collections::HashSet;

/// Deterministic `"{kind}-{n}"` generator that never returns a reserved id.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u64,
    taken: HashSet<String>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that will never produce any of `ids`.
    pub fn reserving<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IdGenerator {
            next: 0,
            taken: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Mark an id as used. Returns false if it was already taken.
    pub fn claim(&mut self, id: &str) -> bool {
        self.taken.insert(id.to_string())
    }

    /// Next unused id for `kind`.
    pub fn fresh(&mut self, kind: &str) -> String {
        loop {
            self.next += 1;
            let candidate = format!("{}-{}", kind, self.next);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
