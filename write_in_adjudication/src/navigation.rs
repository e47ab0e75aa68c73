//! Position of a reviewer in an adjudication queue.
//!
//! The state is a plain value. Every transition returns a new state and
//! takes the queue it moves in as an argument, so it can be checked
//! without any store or image at hand.

use crate::config::WriteInId;
use crate::viewer::ZoomLevel;

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct NavigationState {
    /// Zero-based position in the queue.
    pub offset: usize,
    pub zoom_level: ZoomLevel,
    /// Write-ins of the current window whose image view has been loaded.
    pub prefetched_ids: Vec<WriteInId>,
}

impl NavigationState {
    pub fn new() -> NavigationState {
        NavigationState::default()
    }

    pub fn current_id<'a>(&self, queue: &'a [WriteInId]) -> Option<&'a WriteInId> {
        queue.get(self.offset)
    }

    pub fn can_go_previous(&self) -> bool {
        self.offset > 0
    }

    pub fn can_go_next(&self, queue: &[WriteInId]) -> bool {
        self.offset + 1 < queue.len()
    }

    /// Moves to `offset`. The zoom goes back to its default and prefetched
    /// views outside the new window are forgotten.
    fn move_to(&self, queue: &[WriteInId], offset: usize) -> NavigationState {
        let moved = NavigationState {
            offset,
            zoom_level: ZoomLevel::default(),
            prefetched_ids: vec![],
        };
        let window = moved.prefetch_window(queue);
        NavigationState {
            prefetched_ids: self
                .prefetched_ids
                .iter()
                .filter(|id| window.contains(*id))
                .cloned()
                .collect(),
            ..moved
        }
    }

    /// One step forward. Stays in place at the end of the queue.
    pub fn next(&self, queue: &[WriteInId]) -> NavigationState {
        if self.can_go_next(queue) {
            self.move_to(queue, self.offset + 1)
        } else {
            self.clone()
        }
    }

    /// One step back. Stays in place at the start of the queue.
    pub fn previous(&self, queue: &[WriteInId]) -> NavigationState {
        if self.can_go_previous() {
            self.move_to(queue, self.offset - 1)
        } else {
            self.clone()
        }
    }

    /// Moves to the position of `write_in_id`, if it is in the queue.
    pub fn jump_to(&self, queue: &[WriteInId], write_in_id: &str) -> Option<NavigationState> {
        let offset = queue.iter().position(|id| id == write_in_id)?;
        if offset == self.offset {
            return Some(self.clone());
        }
        Some(self.move_to(queue, offset))
    }

    pub fn with_zoom(&self, zoom_level: ZoomLevel) -> NavigationState {
        NavigationState {
            zoom_level,
            ..self.clone()
        }
    }

    /// The write-ins whose image views are wanted at this position: the
    /// current one, then the next, then the previous.
    pub fn prefetch_window(&self, queue: &[WriteInId]) -> Vec<WriteInId> {
        let mut res = Vec::new();
        if let Some(id) = queue.get(self.offset) {
            res.push(id.clone());
        }
        if let Some(id) = queue.get(self.offset + 1) {
            res.push(id.clone());
        }
        if self.offset > 0 {
            if let Some(id) = queue.get(self.offset - 1) {
                res.push(id.clone());
            }
        }
        res
    }

    /// The part of the window not loaded yet, in window order.
    pub fn missing_prefetches(&self, queue: &[WriteInId]) -> Vec<WriteInId> {
        self.prefetch_window(queue)
            .into_iter()
            .filter(|id| !self.prefetched_ids.contains(id))
            .collect()
    }

    /// Records a loaded image view. Views that arrive for write-ins outside
    /// the current window are dropped.
    pub fn record_prefetched(&self, queue: &[WriteInId], write_in_id: &str) -> NavigationState {
        let in_window = self.prefetch_window(queue).iter().any(|id| id == write_in_id);
        let known = self.prefetched_ids.iter().any(|id| id == write_in_id);
        if !in_window || known {
            return self.clone();
        }
        let mut prefetched_ids = self.prefetched_ids.clone();
        prefetched_ids.push(write_in_id.to_string());
        NavigationState {
            prefetched_ids,
            ..self.clone()
        }
    }
}
