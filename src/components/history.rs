use std::collections::VecDeque;

use crate::canvas::LayerStack;
use crate::error::Result;

// ============================================================================
// SNAPSHOT: full deep copy of the layer stack
// ============================================================================

/// Immutable copy of every layer's pixels and metadata plus the active index.
#[derive(Clone, Debug)]
pub struct LayerStackSnapshot {
    stack: LayerStack,
}

impl LayerStackSnapshot {
    /// Deep-copy `stack`.  Fails with `Allocation` instead of aborting.
    pub fn capture(stack: &LayerStack) -> Result<Self> {
        Ok(Self { stack: stack.try_clone()? })
    }

    /// Replace `stack` with a copy of this snapshot.  On error `stack` is untouched.
    ///
    /// Layer ids handed out after the snapshot was taken are never reused.
    pub fn restore_into(&self, stack: &mut LayerStack) -> Result<()> {
        let mut restored = self.stack.try_clone()?;
        restored.next_layer_id = restored.next_layer_id.max(stack.next_layer_id);
        restored.repair();
        *stack = restored;
        Ok(())
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn memory_bytes(&self) -> usize {
        self.stack.memory_bytes()
    }
}

struct HistoryEntry {
    description: String,
    snapshot: LayerStackSnapshot,
}

// ============================================================================
// HISTORY MANAGER - bounded snapshot list with a cursor
// ============================================================================

/// Undo/redo history of full snapshots.
///
/// `entries[cursor]` always mirrors the live stack after the last commit,
/// undo, or redo.  Committing after an undo drops the redo branch.
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across all entries.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_history_size: max_history_size.max(1),
            max_memory_bytes: None,
            total_memory: 0,
        }
    }

    pub fn with_memory_limit(mut self, max_memory_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    /// Snapshot `stack` and append it after the cursor.
    ///
    /// The snapshot is taken before anything is discarded, so a failed
    /// allocation leaves the history exactly as it was.
    pub fn commit(&mut self, stack: &LayerStack, description: impl Into<String>) -> Result<()> {
        let snapshot = LayerStackSnapshot::capture(stack)?;
        let description = description.into();

        // Drop the redo branch
        if !self.entries.is_empty() {
            for entry in self.entries.drain(self.cursor + 1..) {
                self.total_memory = self.total_memory.saturating_sub(entry.snapshot.memory_bytes());
            }
        }

        log::debug!("history: commit '{}' ({} entries)", description, self.entries.len() + 1);
        self.total_memory += snapshot.memory_bytes();
        self.entries.push_back(HistoryEntry { description, snapshot });
        self.cursor = self.entries.len() - 1;

        self.prune();
        Ok(())
    }

    /// Step back one snapshot.  `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, stack: &mut LayerStack) -> Result<bool> {
        if !self.can_undo() {
            return Ok(false);
        }
        self.entries[self.cursor - 1].snapshot.restore_into(stack)?;
        self.cursor -= 1;
        Ok(true)
    }

    /// Step forward one snapshot.  `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, stack: &mut LayerStack) -> Result<bool> {
        if !self.can_redo() {
            return Ok(false);
        }
        self.entries[self.cursor + 1].snapshot.restore_into(stack)?;
        self.cursor += 1;
        Ok(true)
    }

    /// Put the snapshot at the cursor back into `stack`, discarding any
    /// uncommitted changes.  `Ok(false)` if the history is empty.
    pub fn restore_current(&self, stack: &mut LayerStack) -> Result<bool> {
        match self.entries.get(self.cursor) {
            Some(entry) => {
                entry.snapshot.restore_into(stack)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Description of the operation an `undo` would revert.
    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.entries.get(self.cursor).map(|e| e.description.as_str())
        } else {
            None
        }
    }

    /// Description of the operation a `redo` would re-apply.
    pub fn redo_description(&self) -> Option<&str> {
        self.entries.get(self.cursor + 1).map(|e| e.description.as_str())
    }

    /// All undoable descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.entries
            .iter()
            .take(self.cursor + 1)
            .skip(1)
            .rev()
            .map(|e| e.description.clone())
            .collect()
    }

    /// Undo `count` steps, stopping early at the oldest snapshot.
    pub fn undo_to(&mut self, count: usize, stack: &mut LayerStack) -> Result<usize> {
        let mut done = 0;
        while done < count && self.undo(stack)? {
            done += 1;
        }
        Ok(done)
    }

    pub fn undo_count(&self) -> usize {
        if self.entries.is_empty() { 0 } else { self.cursor }
    }

    pub fn redo_count(&self) -> usize {
        self.entries.len().saturating_sub(self.cursor + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Bytes held by all snapshots (cached running total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.total_memory = 0;
    }

    /// Evict the oldest snapshots to stay within limits.  The cursor entry survives.
    fn prune(&mut self) {
        while self.entries.len() > self.max_history_size {
            self.evict_oldest();
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.entries.len() > 1 && self.cursor > 0 {
                self.evict_oldest();
            }
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(removed) = self.entries.pop_front() {
            self.total_memory = self.total_memory.saturating_sub(removed.snapshot.memory_bytes());
            self.cursor = self.cursor.saturating_sub(1);
        }
    }
}
