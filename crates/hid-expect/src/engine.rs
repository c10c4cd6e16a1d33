//! Deterministic HID report expectation engine.
//!
//! Given the full keystroke trace since reset, the engine predicts the
//! exact report bytes the DUT must emit next. The per-keystroke pipeline:
//!
//! 1. ghost-key classification against the bound matrix, when present;
//! 2. deghosting side effects of a release (synthetic makes);
//! 3. forced release of a pending virtual switch key;
//! 4. consumer-slot admission control (two slots);
//! 5. OS-variant behavior resolution;
//! 6. report synthesis from the per-class last-report snapshots;
//! 7. field normalization (dedup, breaks to the tail of the ordering).
//!
//! Expectation mismatches never raise: they are counted and retained for
//! late-arriving report reconciliation.

use crate::error::ExpectError;
use crate::keys::{KeyAction, KeyId};
use crate::matrix::{GhostMatrix, PressOutcome, ReleaseOutcome};
use crate::report::{ConsumerReport, KeyboardReport, MouseReport, Report, ReportClass};
use crate::variants::{self, Field, KeyBehavior, OsVariant};

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// OS detected by the DUT firmware.
    pub os: OsVariant,
    /// Simultaneously held consumer usages before drops begin.
    pub consumer_quota: usize,
    /// Retained mismatched reports before the oldest is evicted.
    pub mismatch_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { os: OsVariant::Windows, consumer_quota: 2, mismatch_capacity: 16 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldOp {
    field: Field,
    press: bool,
}

#[derive(Debug, Clone)]
struct PlannedReport {
    class: ReportClass,
    ops: Vec<FieldOp>,
}

fn planned_reports(behavior: &KeyBehavior, action: KeyAction) -> Vec<PlannedReport> {
    let mut make: Vec<PlannedReport> = behavior
        .fields
        .iter()
        .map(|field| PlannedReport {
            class: field.class(),
            ops: vec![FieldOp { field: *field, press: true }],
        })
        .collect();
    let mut brk: Vec<PlannedReport> = behavior
        .fields
        .iter()
        .rev()
        .map(|field| PlannedReport {
            class: field.class(),
            ops: vec![FieldOp { field: *field, press: false }],
        })
        .collect();

    // Switch keys tap their trailing field within the make sequence and
    // keep only the leading field held for the grace window.
    if behavior.switch_key && !brk.is_empty() {
        let tap = brk.remove(0);
        make.push(tap);
    }

    match action {
        KeyAction::Make => make,
        KeyAction::Break => brk,
    }
}

fn signed_value(op: FieldOp) -> i32 {
    let value = i32::from(op.field.value());
    if op.press {
        value
    } else {
        -value
    }
}

fn normalize_ops(ops: &mut Vec<FieldOp>) {
    // Duplicate set entries for the same slot collapse into one.
    let mut index = 0;
    while index < ops.len() {
        let op = ops[index];
        if op.press && ops[..index].contains(&op) {
            ops.remove(index);
        } else {
            index += 1;
        }
    }

    // Slot ordering is ascending by value with releases at the tail,
    // unless the whole report is a release.
    ops.sort_by_key(|op| signed_value(*op));
    if ops.last().is_some_and(|op| signed_value(*op) > 0) {
        while ops.first().is_some_and(|op| signed_value(*op) < 0) {
            let op = ops.remove(0);
            ops.push(op);
        }
    }
}

#[derive(Debug, Clone)]
struct MatrixBinding {
    matrix: GhostMatrix,
    layout: Vec<(KeyId, (u8, u8))>,
}

impl MatrixBinding {
    fn cell_of(&self, key: KeyId) -> Option<(u8, u8)> {
        self.layout
            .iter()
            .find_map(|(layout_key, cell)| (*layout_key == key).then_some(*cell))
    }

    fn key_at(&self, cell: (u8, u8)) -> Option<KeyId> {
        self.layout
            .iter()
            .find_map(|(layout_key, layout_cell)| (*layout_cell == cell).then_some(*layout_key))
    }
}

/// Deterministic HID report predictor.
#[derive(Debug, Clone)]
pub struct KeyExpectationEngine {
    config: EngineConfig,
    last_keyboard: KeyboardReport,
    last_consumer: ConsumerReport,
    last_mouse: MouseReport,
    pressed_keys: Vec<KeyId>,
    pressed_switch_key: Option<KeyId>,
    ignored_consumer_keys: Vec<KeyId>,
    matrix: Option<MatrixBinding>,
    missing_reports: u32,
    mismatched: Vec<Report>,
}

impl KeyExpectationEngine {
    /// Creates an engine without a matrix model.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            last_keyboard: KeyboardReport::default(),
            last_consumer: ConsumerReport::default(),
            last_mouse: MouseReport::default(),
            pressed_keys: Vec::new(),
            pressed_switch_key: None,
            ignored_consumer_keys: Vec::new(),
            matrix: None,
            missing_reports: 0,
            mismatched: Vec::new(),
        }
    }

    /// Creates an engine with ghost-key detection over the given matrix
    /// and key layout.
    #[must_use]
    pub fn with_matrix(
        config: EngineConfig,
        matrix: GhostMatrix,
        layout: Vec<(KeyId, (u8, u8))>,
    ) -> Self {
        let mut engine = Self::new(config);
        engine.matrix = Some(MatrixBinding { matrix, layout });
        engine
    }

    /// Restores the post-reset state, keeping the matrix layout.
    pub fn reset(&mut self) {
        self.last_keyboard = KeyboardReport::default();
        self.last_consumer = ConsumerReport::default();
        self.last_mouse = MouseReport::default();
        self.pressed_keys.clear();
        self.pressed_switch_key = None;
        self.ignored_consumer_keys.clear();
        self.missing_reports = 0;
        self.mismatched.clear();
        if let Some(binding) = &mut self.matrix {
            binding.matrix.reset();
        }
    }

    /// Last expected report of one class.
    #[must_use]
    pub const fn last_report(&self, class: ReportClass) -> Report {
        match class {
            ReportClass::Keyboard => Report::Keyboard(self.last_keyboard),
            ReportClass::Consumer => Report::Consumer(self.last_consumer),
            ReportClass::Mouse => Report::Mouse(self.last_mouse),
        }
    }

    /// Currently pressed logical keys in make order.
    #[must_use]
    pub fn pressed_keys(&self) -> &[KeyId] {
        &self.pressed_keys
    }

    /// Predicts the reports the DUT must emit for one keystroke.
    ///
    /// An empty vector means the keystroke is silent: a ghosted press,
    /// the release of a ghosted or force-released key, a dropped
    /// consumer key, or a key without HID translation.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError`] when the keystroke contradicts the
    /// tracked key state or the matrix model.
    pub fn predict(&mut self, key: KeyId, action: KeyAction) -> Result<Vec<Report>, ExpectError> {
        let mut immediate = None;
        let mut delayed = None;

        if let Some(binding) = &mut self.matrix {
            if let Some((row, col)) = binding.cell_of(key) {
                match action {
                    KeyAction::Make => {
                        if let PressOutcome::Ghosted(_) = binding.matrix.press(row, col)? {
                            return Ok(Vec::new());
                        }
                    }
                    KeyAction::Break => match binding.matrix.release(row, col)? {
                        ReleaseOutcome::GhostReleased => return Ok(Vec::new()),
                        ReleaseOutcome::Released { immediate: imm, delayed: del } => {
                            immediate = imm.and_then(|cell| binding.key_at(cell));
                            delayed = del.and_then(|cell| binding.key_at(cell));
                        }
                    },
                }
            }
        }

        let mut reports = Vec::new();
        if let Some(unmasked) = immediate {
            reports.extend(self.expect_for(unmasked, KeyAction::Make)?);
        }
        reports.extend(self.expect_for(key, action)?);
        if let Some(unmasked) = delayed {
            reports.extend(self.expect_for(unmasked, KeyAction::Make)?);
        }
        Ok(reports)
    }

    fn expect_for(&mut self, key: KeyId, action: KeyAction) -> Result<Vec<Report>, ExpectError> {
        let os = self.config.os;
        let Some(behavior) = variants::resolve(key, os) else {
            tracing::warn!(
                target: "hid_expect::engine",
                ?key,
                "key missing from the HID translation table"
            );
            return Ok(Vec::new());
        };

        if behavior.is_consumer() {
            if self.consumer_ignored(key, action) {
                tracing::debug!(target: "hid_expect::engine", ?key, "consumer key dropped");
                return Ok(Vec::new());
            }
            let planned = planned_reports(behavior, action);
            self.update_pressed(key, action)?;
            return Ok(self.apply_planned(planned));
        }

        let mut planned = planned_reports(behavior, action);

        // A pending switch key is forced out by any other make.
        if let Some(switch) = self.pressed_switch_key {
            match action {
                KeyAction::Make if key != switch => {
                    self.update_pressed(switch, KeyAction::Break)?;
                    if let Some(switch_behavior) = variants::resolve(switch, os) {
                        let released = planned_reports(switch_behavior, KeyAction::Break);
                        planned.splice(0..0, released);
                    }
                    self.pressed_switch_key = None;
                }
                KeyAction::Break if key == switch => {
                    self.pressed_switch_key = None;
                }
                _ => {}
            }
        }
        if behavior.switch_key && action == KeyAction::Make {
            self.pressed_switch_key = Some(key);
        }

        if planned.is_empty() {
            self.update_pressed(key, action)?;
            return Ok(Vec::new());
        }

        // The break of a key that is no longer tracked (a force-released
        // switch key) produces nothing.
        if action == KeyAction::Break && !self.pressed_keys.contains(&key) {
            return Ok(Vec::new());
        }

        for report in &mut planned {
            normalize_ops(&mut report.ops);
        }
        self.update_pressed(key, action)?;
        Ok(self.apply_planned(planned))
    }

    fn consumer_ignored(&mut self, key: KeyId, action: KeyAction) -> bool {
        match action {
            KeyAction::Make => {
                let held = self
                    .pressed_keys
                    .iter()
                    .filter(|pressed| {
                        variants::resolve(**pressed, self.config.os)
                            .is_some_and(KeyBehavior::is_consumer)
                    })
                    .count();
                if held >= self.config.consumer_quota {
                    self.ignored_consumer_keys.push(key);
                    return true;
                }
                false
            }
            KeyAction::Break => {
                if let Some(index) =
                    self.ignored_consumer_keys.iter().position(|ignored| *ignored == key)
                {
                    self.ignored_consumer_keys.remove(index);
                    return true;
                }
                false
            }
        }
    }

    fn update_pressed(&mut self, key: KeyId, action: KeyAction) -> Result<(), ExpectError> {
        let index = self.pressed_keys.iter().position(|pressed| *pressed == key);
        match (action, index) {
            (KeyAction::Make, None) => {
                self.pressed_keys.push(key);
                Ok(())
            }
            (KeyAction::Break, Some(index)) => {
                self.pressed_keys.remove(index);
                Ok(())
            }
            _ => Err(ExpectError::InconsistentKeyState { key, action }),
        }
    }

    fn apply_planned(&mut self, planned: Vec<PlannedReport>) -> Vec<Report> {
        planned
            .into_iter()
            .map(|report| match report.class {
                ReportClass::Keyboard => {
                    let mut next = self.last_keyboard;
                    for op in report.ops {
                        match op.field {
                            Field::Modifier(mask) => next.set_modifier(mask, op.press),
                            Field::KeyCode(code) if op.press => next.press_usage(code),
                            Field::KeyCode(code) => next.release_usage(code),
                            Field::Consumer(_) | Field::Button(_) => {}
                        }
                    }
                    self.last_keyboard = next;
                    Report::Keyboard(next)
                }
                ReportClass::Consumer => {
                    let mut next = self.last_consumer;
                    for op in report.ops {
                        match op.field {
                            Field::Consumer(code) if op.press => next.press_usage(code),
                            Field::Consumer(code) => next.release_usage(code),
                            _ => {}
                        }
                    }
                    self.last_consumer = next;
                    Report::Consumer(next)
                }
                ReportClass::Mouse => {
                    let mut next = self.last_mouse;
                    for op in report.ops {
                        if let Field::Button(index) = op.field {
                            next.set_button(index, op.press);
                        }
                    }
                    self.last_mouse = next;
                    Report::Mouse(next)
                }
            })
            .collect()
    }

    /// Checks one expected report against the observed stream.
    ///
    /// While mismatched reports are retained, the expectation is first
    /// reconciled against them; otherwise it is compared byte-exact
    /// against `observed`. Divergences increment the miss counter and
    /// retain the observed report for later reconciliation.
    pub fn check(&mut self, expected: &Report, observed: Option<&Report>) -> bool {
        if !self.mismatched.is_empty() {
            if self.reconcile(expected) {
                return true;
            }
            self.missing_reports += 1;
            return false;
        }
        match observed {
            Some(report) if report == expected => true,
            Some(report) => {
                self.missing_reports += 1;
                tracing::warn!(
                    target: "hid_expect::engine",
                    expected = ?expected.bytes(),
                    observed = ?report.bytes(),
                    "report mismatch"
                );
                self.record_mismatch(*report);
                false
            }
            None => {
                self.missing_reports += 1;
                false
            }
        }
    }

    /// Removes and confirms a retained report matching `expected`.
    pub fn reconcile(&mut self, expected: &Report) -> bool {
        if let Some(index) = self.mismatched.iter().position(|report| report == expected) {
            self.mismatched.remove(index);
            return true;
        }
        false
    }

    /// Retains a divergent observed report, bounded by the configured
    /// capacity (oldest evicted first).
    pub fn record_mismatch(&mut self, observed: Report) {
        if self.mismatched.len() == self.config.mismatch_capacity {
            self.mismatched.remove(0);
        }
        self.mismatched.push(observed);
    }

    /// Number of expectation misses since reset.
    #[must_use]
    pub const fn missing_report_count(&self) -> u32 {
        self.missing_reports
    }

    /// Retained divergent reports awaiting reconciliation.
    #[must_use]
    pub fn mismatched_reports(&self) -> &[Report] {
        &self.mismatched
    }
}
