//! Physical keyboard matrix model with ghost-key classification.
//!
//! A key position appears pressed to the scanner when the three other
//! corners of a rectangle sharing its row and column are pressed. The
//! firmware blocks such positions; this model predicts the blocking and
//! the demotions that happen when a blocking key is released.
//!
//! Cell states carry stable numeric codes: released 0, pressed 1,
//! direct-ghost 2, indirect-ghost 3, double-ghost 4. Unpopulated cells
//! have no state at all.

use std::collections::VecDeque;

use crate::error::MatrixError;

/// State of one populated matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum CellState {
    /// Key up.
    Released = 0,
    /// Key down and reported.
    Pressed = 1,
    /// Blocked: completes a rectangle whose other corners are pressed.
    DirectGhost = 2,
    /// Blocked through a chain of three or more pressed cells.
    IndirectGhost = 3,
    /// Two ghosts sharing a line collapsed into an ambiguous pair.
    DoubleGhost = 4,
}

impl CellState {
    /// True for any of the ghost classifications.
    #[must_use]
    pub const fn is_ghost(self) -> bool {
        matches!(self, Self::DirectGhost | Self::IndirectGhost | Self::DoubleGhost)
    }
}

/// Ghost classification attached to a blocked press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhostKind {
    /// Rectangle with pressed corners on the shared row and column.
    Direct,
    /// Chain of three or more pressed cells connecting row and column.
    Indirect,
    /// The blocked press collapsed with an earlier ghost.
    Double,
}

/// Outcome of a key press against the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// The key is reported normally.
    Pressed,
    /// The key is blocked; no report is generated.
    Ghosted(GhostKind),
}

/// Outcome of a key release against the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The released cell was itself a ghost; no report is generated.
    GhostReleased,
    /// A real key release, possibly unmasking previously blocked cells.
    Released {
        /// Cell demoted from indirect-ghost; its synthetic make is
        /// reported before the release.
        immediate: Option<(u8, u8)>,
        /// Cell demoted from direct-ghost; its synthetic make is
        /// reported after the release.
        delayed: Option<(u8, u8)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Line {
    Row(u8),
    Col(u8),
}

/// Row/column keyboard matrix with unpopulated intersections.
#[derive(Debug, Clone)]
pub struct GhostMatrix {
    cells: Vec<Vec<Option<CellState>>>,
}

impl GhostMatrix {
    /// Creates a matrix with every intersection unpopulated.
    #[must_use]
    pub fn new(rows: u8, cols: u8) -> Self {
        Self { cells: vec![vec![None; usize::from(cols)]; usize::from(rows)] }
    }

    /// Creates a matrix populating the listed intersections.
    #[must_use]
    pub fn from_populated(rows: u8, cols: u8, populated: &[(u8, u8)]) -> Self {
        let mut matrix = Self::new(rows, cols);
        for &(row, col) in populated {
            matrix.populate(row, col);
        }
        matrix
    }

    /// Marks one intersection as populated and released.
    pub fn populate(&mut self, row: u8, col: u8) {
        if let Some(cell) =
            self.cells.get_mut(usize::from(row)).and_then(|row| row.get_mut(usize::from(col)))
        {
            *cell = Some(CellState::Released);
        }
    }

    /// Number of matrix rows.
    #[must_use]
    pub fn rows(&self) -> u8 {
        u8::try_from(self.cells.len()).unwrap_or(u8::MAX)
    }

    /// Number of matrix columns.
    #[must_use]
    pub fn cols(&self) -> u8 {
        u8::try_from(self.cells.first().map_or(0, Vec::len)).unwrap_or(u8::MAX)
    }

    /// State of a populated cell, `None` when unpopulated.
    #[must_use]
    pub fn state(&self, row: u8, col: u8) -> Option<CellState> {
        *self.cells.get(usize::from(row))?.get(usize::from(col))?
    }

    /// Releases every cell, keeping the populated layout.
    pub fn reset(&mut self) {
        for row in &mut self.cells {
            for cell in row.iter_mut().flatten() {
                *cell = CellState::Released;
            }
        }
    }

    fn get(&self, row: u8, col: u8) -> Result<CellState, MatrixError> {
        let cell = self
            .cells
            .get(usize::from(row))
            .and_then(|cells| cells.get(usize::from(col)))
            .ok_or(MatrixError::OutOfBounds { row, col })?;
        cell.ok_or(MatrixError::AbsentCell { row, col })
    }

    fn set(&mut self, row: u8, col: u8, state: CellState) {
        if let Some(cell) =
            self.cells.get_mut(usize::from(row)).and_then(|cells| cells.get_mut(usize::from(col)))
        {
            *cell = Some(state);
        }
    }

    fn first_on_row(&self, row: u8, want: impl Fn(CellState) -> bool) -> Option<u8> {
        let cells = self.cells.get(usize::from(row))?;
        cells.iter().enumerate().find_map(|(col, cell)| {
            cell.filter(|state| want(*state))
                .map(|_| u8::try_from(col).unwrap_or(u8::MAX))
        })
    }

    fn first_on_col(&self, col: u8, want: impl Fn(CellState) -> bool) -> Option<u8> {
        self.cells.iter().enumerate().find_map(|(row, cells)| {
            cells
                .get(usize::from(col))
                .copied()
                .flatten()
                .filter(|state| want(*state))
                .map(|_| u8::try_from(row).unwrap_or(u8::MAX))
        })
    }

    fn pressed_count_on_row(&self, row: u8) -> usize {
        self.cells
            .get(usize::from(row))
            .map_or(0, |cells| {
                cells
                    .iter()
                    .flatten()
                    .filter(|state| **state == CellState::Pressed)
                    .count()
            })
    }

    fn pressed_count_on_col(&self, col: u8) -> usize {
        self.cells
            .iter()
            .filter_map(|cells| cells.get(usize::from(col)).copied().flatten())
            .filter(|state| *state == CellState::Pressed)
            .count()
    }

    /// Registers a key press and classifies the cell.
    ///
    /// # Errors
    ///
    /// Returns a [`MatrixError`] for out-of-bounds or unpopulated cells
    /// and for a press against a cell that is not released.
    pub fn press(&mut self, row: u8, col: u8) -> Result<PressOutcome, MatrixError> {
        if self.get(row, col)? != CellState::Released {
            return Err(MatrixError::InvalidTransition { row, col });
        }

        let pressed = |state: CellState| state == CellState::Pressed;
        let half_ghost =
            |state: CellState| matches!(state, CellState::DirectGhost | CellState::IndirectGhost);

        let other_col = self.first_on_row(row, pressed);
        let other_row = self.first_on_col(col, pressed);

        // A ghost already sits on the same line: the new press makes the
        // pair ambiguous.
        if let Some(ghost_col) = self.first_on_row(row, half_ghost) {
            if other_row.is_some() {
                self.set(row, col, CellState::DoubleGhost);
                self.set(row, ghost_col, CellState::DoubleGhost);
                return Ok(PressOutcome::Ghosted(GhostKind::Double));
            }
        }
        if let Some(ghost_row) = self.first_on_col(col, half_ghost) {
            if other_col.is_some() {
                self.set(row, col, CellState::DoubleGhost);
                self.set(ghost_row, col, CellState::DoubleGhost);
                return Ok(PressOutcome::Ghosted(GhostKind::Double));
            }
        }

        if let (Some(corner_row), Some(corner_col)) = (other_row, other_col) {
            // Row and column both occupied: the fourth rectangle corner
            // decides.
            if let Some(corner) = self.state(corner_row, corner_col) {
                if corner.is_ghost() {
                    self.set(row, col, CellState::DoubleGhost);
                    self.set(corner_row, corner_col, CellState::DoubleGhost);
                    return Ok(PressOutcome::Ghosted(GhostKind::Double));
                }
                self.set(row, col, CellState::DirectGhost);
                return Ok(PressOutcome::Ghosted(GhostKind::Direct));
            }
        } else if other_col.is_some() || other_row.is_some() {
            // One direction occupied: look for a rectangle reachable
            // through a third pressed key.
            let corner = if let Some(shared_col) = other_col {
                (self.pressed_count_on_col(shared_col) > 1)
                    .then(|| {
                        self.cells.iter().enumerate().find_map(|(corner_row, cells)| {
                            let state = cells.get(usize::from(shared_col)).copied().flatten()?;
                            let corner_row = u8::try_from(corner_row).unwrap_or(u8::MAX);
                            (state == CellState::Pressed && corner_row != row)
                                .then_some((corner_row, col))
                        })
                    })
                    .flatten()
            } else {
                other_row.and_then(|shared_row| {
                    (self.pressed_count_on_row(shared_row) > 1)
                        .then(|| {
                            (0..self.cols()).find_map(|corner_col| {
                                (corner_col != col
                                    && self.state(shared_row, corner_col)
                                        == Some(CellState::Pressed))
                                .then_some((row, corner_col))
                            })
                        })
                        .flatten()
                })
            };

            if let Some((corner_row, corner_col)) = corner {
                if let Some(corner_state) = self.state(corner_row, corner_col) {
                    if corner_state.is_ghost() {
                        self.set(row, col, CellState::DoubleGhost);
                        self.set(corner_row, corner_col, CellState::DoubleGhost);
                        return Ok(PressOutcome::Ghosted(GhostKind::Double));
                    }
                    self.set(row, col, CellState::IndirectGhost);
                    return Ok(PressOutcome::Ghosted(GhostKind::Indirect));
                }
            }
        }

        self.set(row, col, CellState::Pressed);
        Ok(PressOutcome::Pressed)
    }

    /// Registers a key release and computes demotions.
    ///
    /// # Errors
    ///
    /// Returns a [`MatrixError`] for out-of-bounds or unpopulated cells
    /// and for a release against a released cell.
    pub fn release(&mut self, row: u8, col: u8) -> Result<ReleaseOutcome, MatrixError> {
        let state = self.get(row, col)?;
        if state == CellState::Released {
            return Err(MatrixError::InvalidTransition { row, col });
        }
        if state.is_ghost() {
            self.set(row, col, CellState::Released);
            return Ok(ReleaseOutcome::GhostReleased);
        }

        self.set(row, col, CellState::Released);

        let candidates = self.reachable_ghosts(row, col);
        let mut immediate = None;
        let mut delayed = None;

        if candidates
            .iter()
            .any(|&(ghost_row, ghost_col)| {
                self.state(ghost_row, ghost_col) == Some(CellState::DoubleGhost)
            })
        {
            // An ambiguous pair cannot be resolved by this release:
            // both members drop back to plain blocked state.
            for cells_row in 0..self.rows() {
                for cells_col in 0..self.cols() {
                    if self.state(cells_row, cells_col) == Some(CellState::DoubleGhost) {
                        self.set(cells_row, cells_col, CellState::DirectGhost);
                    }
                }
            }
        } else {
            for &(ghost_row, ghost_col) in &candidates {
                match self.state(ghost_row, ghost_col) {
                    Some(CellState::DirectGhost) if delayed.is_none() => {
                        self.set(ghost_row, ghost_col, CellState::Pressed);
                        delayed = Some((ghost_row, ghost_col));
                    }
                    Some(CellState::IndirectGhost) if immediate.is_none() => {
                        self.set(ghost_row, ghost_col, CellState::Pressed);
                        immediate = Some((ghost_row, ghost_col));
                    }
                    _ => {}
                }
            }
        }

        Ok(ReleaseOutcome::Released { immediate, delayed })
    }

    /// Collects ghost cells reachable from the released cell through
    /// chains of pressed cells, in deterministic order: direct ghosts
    /// first, then indirect, each sorted by (row, col).
    fn reachable_ghosts(&self, row: u8, col: u8) -> Vec<(u8, u8)> {
        let mut queue: VecDeque<Line> = VecDeque::new();
        let mut visited: Vec<Line> = Vec::new();
        let mut found: Vec<(u8, u8)> = Vec::new();
        queue.push_back(Line::Row(row));
        queue.push_back(Line::Col(col));

        while let Some(line) = queue.pop_front() {
            if visited.contains(&line) {
                continue;
            }
            visited.push(line);

            let cells: Vec<(u8, u8, CellState)> = match line {
                Line::Row(line_row) => (0..self.cols())
                    .filter_map(|line_col| {
                        self.state(line_row, line_col).map(|state| (line_row, line_col, state))
                    })
                    .collect(),
                Line::Col(line_col) => (0..self.rows())
                    .filter_map(|line_row| {
                        self.state(line_row, line_col).map(|state| (line_row, line_col, state))
                    })
                    .collect(),
            };

            for (cell_row, cell_col, state) in cells {
                if state.is_ghost() && !found.contains(&(cell_row, cell_col)) {
                    found.push((cell_row, cell_col));
                }
                if state == CellState::Pressed {
                    queue.push_back(Line::Row(cell_row));
                    queue.push_back(Line::Col(cell_col));
                }
            }
        }

        found.sort_by_key(|&(ghost_row, ghost_col)| {
            let direct = self.state(ghost_row, ghost_col) != Some(CellState::DirectGhost);
            (direct, ghost_row, ghost_col)
        });
        found
    }
}
