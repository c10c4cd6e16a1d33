//! Sequencer bridge: buffer flushing, FIFO flow control, and PES events.
//!
//! The bridge owns the host-side staging buffer and talks to the FPGA
//! module through [`FpgaTransport`]. [`SensorModelSim`] is a
//! deterministic transport modelling the hardware contract: one
//! instruction consumed per DUT polling tick, register commit and motion
//! sample on send, FIFO underrun when enabled and empty, and an update
//! counter that moves only on completed sends.

use std::collections::VecDeque;

use crate::error::SequencerError;
use crate::instruction::Instruction;
use crate::regmap::{CmdBinding, RegisterMap, LIFT_LIFTED};
use crate::state::{MaskedRegVal, RegCell, RegVal};

/// Snapshot of the module status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StatusWord {
    /// Instructions waiting in the module buffer.
    pub buffer_count: u16,
    /// Instructions latched into the hardware FIFO.
    pub fifo_count: u16,
    /// FIFO-enable bit.
    pub fifo_en: bool,
    /// Latched FIFO underrun flag.
    pub fifo_underrun: bool,
    /// Latched buffer overrun flag.
    pub buffer_overrun: bool,
    /// Sensor reconfiguration finished.
    pub setup_done: bool,
    /// Completed send-flagged updates.
    pub update_count: u16,
}

/// Control messages accepted by the FPGA module endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Enable FIFO consumption.
    Start,
    /// Disable FIFO consumption.
    Stop,
    /// Soft-reset the module: buffer, FIFO, and flags.
    Reset,
    /// Non-blocking status read.
    Status,
    /// Force one sensor model update outside the FIFO stream.
    ForceUpdate,
}

/// Wire contract between the bridge and the FPGA module.
pub trait FpgaTransport {
    /// Posts a control message and returns the status reply.
    ///
    /// # Errors
    ///
    /// Returns a [`SequencerError`] when the transport cannot complete
    /// the exchange.
    fn control(&mut self, request: ControlRequest) -> Result<StatusWord, SequencerError>;

    /// Uploads encoded instruction words into the module buffer.
    ///
    /// # Errors
    ///
    /// Returns a [`SequencerError`] when the transport cannot complete
    /// the exchange.
    fn write_instructions(&mut self, words: &[u16]) -> Result<StatusWord, SequencerError>;

    /// Advances one DUT sensor-polling interval.
    ///
    /// Hardware-backed transports block until the next interval; the
    /// simulation advances its model instead.
    fn tick(&mut self);
}

/// One motion sample produced by the emulated sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MotionSample {
    /// Sampled delta-X.
    pub dx: i16,
    /// Sampled delta-Y.
    pub dy: i16,
    /// Lift status at sample time.
    pub lift: bool,
}

/// Deterministic in-memory model of the FPGA module and DUT sensor.
#[derive(Debug, Clone)]
pub struct SensorModelSim {
    map: &'static RegisterMap,
    buffer_capacity: usize,
    fifo_capacity: usize,
    buffer: VecDeque<Instruction>,
    fifo: VecDeque<Instruction>,
    fifo_en: bool,
    fifo_underrun: bool,
    buffer_overrun: bool,
    setup_done: bool,
    setup_ticks_remaining: u32,
    update_count: u16,
    registers: Vec<(u8, RegCell)>,
    pending: Vec<(u8, u8)>,
    skip_latch: u8,
    repeat_latch: u8,
    samples: Vec<MotionSample>,
}

/// Default hardware FIFO depth.
pub const DEFAULT_FIFO_SIZE: usize = 31;
/// Default module buffer depth.
pub const DEFAULT_BUFFER_SIZE: usize = 1023;
/// Polling ticks the simulated DUT spends reconfiguring the sensor.
pub const DEFAULT_SETUP_TICKS: u32 = 4;

impl SensorModelSim {
    /// Creates a powered-on model with default depths.
    #[must_use]
    pub fn new(map: &'static RegisterMap) -> Self {
        Self::with_depths(map, DEFAULT_BUFFER_SIZE, DEFAULT_FIFO_SIZE)
    }

    /// Creates a model with explicit buffer and FIFO depths.
    #[must_use]
    pub fn with_depths(map: &'static RegisterMap, buffer: usize, fifo: usize) -> Self {
        Self {
            map,
            buffer_capacity: buffer,
            fifo_capacity: fifo,
            buffer: VecDeque::new(),
            fifo: VecDeque::new(),
            fifo_en: false,
            fifo_underrun: false,
            buffer_overrun: false,
            setup_done: false,
            setup_ticks_remaining: DEFAULT_SETUP_TICKS,
            update_count: 0,
            registers: Self::default_registers(map),
            pending: Vec::new(),
            skip_latch: 0,
            repeat_latch: 0,
            samples: Vec::new(),
        }
    }

    fn default_registers(map: &RegisterMap) -> Vec<(u8, RegCell)> {
        map.registers()
            .iter()
            .map(|reg| {
                let cell = match reg.kind {
                    crate::regmap::RegKind::Direct => {
                        RegCell::Direct(RegVal { value: reg.default })
                    }
                    crate::regmap::RegKind::Masked => RegCell::Masked(MaskedRegVal::default()),
                };
                (reg.addr, cell)
            })
            .collect()
    }

    /// Motion samples produced so far.
    #[must_use]
    pub fn samples(&self) -> &[MotionSample] {
        &self.samples
    }

    /// Reads a sensor-side direct register byte.
    #[must_use]
    pub fn register_value(&self, addr: u8) -> Option<u8> {
        self.registers.iter().find_map(|(reg_addr, cell)| match cell {
            RegCell::Direct(reg_val) if *reg_addr == addr => Some(reg_val.value),
            _ => None,
        })
    }

    /// Emulates a DUT power cycle: the sensor is reconfigured from
    /// scratch while the module buffer and FIFO carry forward.
    pub fn power_cycle(&mut self) {
        self.setup_done = false;
        self.setup_ticks_remaining = DEFAULT_SETUP_TICKS;
        self.registers = Self::default_registers(self.map);
        self.pending.clear();
        self.skip_latch = 0;
        self.repeat_latch = 0;
    }

    fn status(&self) -> StatusWord {
        StatusWord {
            buffer_count: u16::try_from(self.buffer.len()).unwrap_or(u16::MAX),
            fifo_count: u16::try_from(self.fifo.len()).unwrap_or(u16::MAX),
            fifo_en: self.fifo_en,
            fifo_underrun: self.fifo_underrun,
            buffer_overrun: self.buffer_overrun,
            setup_done: self.setup_done,
            update_count: self.update_count,
        }
    }

    fn refill_fifo(&mut self) {
        while self.fifo.len() < self.fifo_capacity {
            let Some(instr) = self.buffer.pop_front() else {
                break;
            };
            self.fifo.push_back(instr);
        }
    }

    fn apply_command(&mut self, cmd_idx: u8, cmd_val: u8) {
        if cmd_idx == self.map.skip_cmd {
            self.skip_latch = cmd_val;
            return;
        }
        if cmd_idx == self.map.repeat_cmd {
            self.repeat_latch = cmd_val;
            return;
        }
        let map = self.map;
        for reg in map.registers() {
            let Ok(binding) = map.reg2cmd(reg.addr) else {
                continue;
            };
            let slot = self
                .registers
                .iter_mut()
                .find(|(addr, _)| *addr == reg.addr)
                .map(|(_, cell)| cell);
            let Some(cell) = slot else { continue };
            match (binding, cell) {
                (CmdBinding::Direct(idx), RegCell::Direct(reg_val)) if idx == cmd_idx => {
                    reg_val.value = cmd_val;
                    return;
                }
                (CmdBinding::Masked { set, .. }, RegCell::Masked(masked)) if set == cmd_idx => {
                    masked.set_mask = cmd_val;
                    return;
                }
                (CmdBinding::Masked { clr, .. }, RegCell::Masked(masked)) if clr == cmd_idx => {
                    masked.clr_mask = cmd_val;
                    return;
                }
                _ => {}
            }
        }
    }

    fn lift_status(&self) -> bool {
        self.registers
            .iter()
            .find_map(|(addr, cell)| match cell {
                RegCell::Masked(masked) if *addr == self.map.lift_addr => {
                    Some(masked.set_mask & LIFT_LIFTED != 0)
                }
                _ => None,
            })
            .unwrap_or(false)
    }

    fn commit_and_sample(&mut self) {
        let pending = core::mem::take(&mut self.pending);
        for (cmd_idx, cmd_val) in pending {
            self.apply_command(cmd_idx, cmd_val);
        }

        let (dx, dy) = self
            .map
            .delta
            .decode(|addr| self.register_value(addr).unwrap_or(0));
        let sample = MotionSample { dx, dy, lift: self.lift_status() };
        for _ in 0..=self.repeat_latch {
            self.samples.push(sample);
        }
        self.skip_latch = 0;
        self.repeat_latch = 0;
        self.update_count = self.update_count.wrapping_add(1);
    }

    fn apply_deltas(&mut self, dx: i16, dy: i16) {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (dx, dy) = (dx as u16, dy as u16);
        match self.map.delta {
            crate::regmap::DeltaLayout::SharedHigh { x_low, y_low, xy_high } => {
                self.write_direct(x_low, (dx & 0xFF) as u8);
                self.write_direct(y_low, (dy & 0xFF) as u8);
                self.write_direct(xy_high, (((dx >> 4) & 0xF0) | ((dy >> 8) & 0x0F)) as u8);
            }
            crate::regmap::DeltaLayout::SplitHigh { x_high, x_low, y_high, y_low } => {
                self.write_direct(x_high, (dx >> 8) as u8);
                self.write_direct(x_low, (dx & 0xFF) as u8);
                self.write_direct(y_high, (dy >> 8) as u8);
                self.write_direct(y_low, (dy & 0xFF) as u8);
            }
        }
    }

    fn write_direct(&mut self, addr: u8, value: u8) {
        for (reg_addr, cell) in &mut self.registers {
            if *reg_addr == addr {
                if let RegCell::Direct(reg_val) = cell {
                    reg_val.value = value;
                }
                return;
            }
        }
    }

    fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Nop { send } => {
                if send {
                    self.commit_and_sample();
                }
            }
            Instruction::Raw { cmd_idx, cmd_val, send } => {
                self.pending.push((cmd_idx, cmd_val));
                if send {
                    self.commit_and_sample();
                }
            }
            Instruction::Compressed { dx, dy, lift, skip, repeat } => {
                self.apply_deltas(i16::from(dx), i16::from(dy));
                let lift_addr = self.map.lift_addr;
                for (reg_addr, cell) in &mut self.registers {
                    if *reg_addr == lift_addr {
                        if let RegCell::Masked(masked) = cell {
                            if lift {
                                masked.set_mask |= LIFT_LIFTED;
                            } else {
                                masked.set_mask &= !LIFT_LIFTED;
                            }
                        }
                    }
                }
                self.skip_latch = skip;
                self.repeat_latch = repeat;
                self.commit_and_sample();
            }
        }
    }
}

impl FpgaTransport for SensorModelSim {
    fn control(&mut self, request: ControlRequest) -> Result<StatusWord, SequencerError> {
        match request {
            ControlRequest::Start => self.fifo_en = true,
            ControlRequest::Stop => self.fifo_en = false,
            ControlRequest::Reset => {
                self.buffer.clear();
                self.fifo.clear();
                self.pending.clear();
                self.fifo_en = false;
                self.fifo_underrun = false;
                self.buffer_overrun = false;
                self.update_count = 0;
                self.skip_latch = 0;
                self.repeat_latch = 0;
                self.registers = Self::default_registers(self.map);
            }
            ControlRequest::Status => {}
            ControlRequest::ForceUpdate => self.commit_and_sample(),
        }
        Ok(self.status())
    }

    fn write_instructions(&mut self, words: &[u16]) -> Result<StatusWord, SequencerError> {
        for word in words {
            if self.buffer.len() >= self.buffer_capacity {
                self.buffer_overrun = true;
                break;
            }
            self.buffer.push_back(Instruction::decode(*word)?);
        }
        Ok(self.status())
    }

    fn tick(&mut self) {
        if !self.setup_done {
            self.setup_ticks_remaining = self.setup_ticks_remaining.saturating_sub(1);
            if self.setup_ticks_remaining == 0 {
                self.setup_done = true;
            }
            return;
        }

        self.refill_fifo();
        if !self.fifo_en {
            return;
        }

        if let Some(instr) = self.fifo.pop_front() {
            self.execute(instr);
        } else {
            // Consume attempt against an empty FIFO while enabled:
            // underrun latches, consumption stops, and the partially
            // staged update is lost.
            self.fifo_underrun = true;
            self.fifo_en = false;
            self.pending.clear();
        }
    }
}

/// PES action events bound to the emulator module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    /// Enable FIFO consumption.
    Start,
    /// Disable FIFO consumption.
    Stop,
    /// Soft-reset the module.
    Reset,
}

/// PES resume events published by the emulator module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeEvent {
    /// Sensor reconfiguration finished.
    SetupDone,
    /// FIFO underrun latched.
    FifoUnderrun,
    /// Hardware FIFO drained.
    FifoEmpty,
}

impl ResumeEvent {
    /// Stable event name used in timeouts and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SetupDone => "SETUP_DONE",
            Self::FifoUnderrun => "FIFO_UNDERRUN",
            Self::FifoEmpty => "FIFO_EMPTY",
        }
    }

    /// Returns true when the status word satisfies this event.
    #[must_use]
    pub const fn is_met(self, status: &StatusWord) -> bool {
        match self {
            Self::SetupDone => status.setup_done,
            Self::FifoUnderrun => status.fifo_underrun,
            Self::FifoEmpty => status.fifo_count == 0,
        }
    }
}

/// One PES program step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PesOp {
    /// Fire an action event.
    Execute(ActionEvent),
    /// Block until a resume event.
    Wait(ResumeEvent),
    /// Idle for a fixed number of polling ticks.
    Delay {
        /// Number of polling ticks to idle.
        ticks: u32,
    },
}

/// Pre-built sequence of PES operations.
#[derive(Debug, Clone, Default)]
pub struct PesSequence {
    ops: Vec<PesOp>,
}

impl PesSequence {
    /// Creates an empty sequence.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Appends an action-event step.
    pub fn execute(&mut self, event: ActionEvent) -> &mut Self {
        self.ops.push(PesOp::Execute(event));
        self
    }

    /// Appends a wait step.
    pub fn wait(&mut self, event: ResumeEvent) -> &mut Self {
        self.ops.push(PesOp::Wait(event));
        self
    }

    /// Appends a fixed delay step.
    pub fn delay(&mut self, ticks: u32) -> &mut Self {
        self.ops.push(PesOp::Delay { ticks });
        self
    }

    /// Program steps in execution order.
    #[must_use]
    pub fn ops(&self) -> &[PesOp] {
        &self.ops
    }
}

/// Host-side bridge between controllers and the FPGA module.
#[derive(Debug)]
pub struct SequencerBridge<T> {
    transport: T,
    staged: Vec<Instruction>,
    capacity: usize,
}

impl<T: FpgaTransport> SequencerBridge<T> {
    /// Creates a bridge with the default staging capacity.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self::with_capacity(transport, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a bridge with an explicit staging capacity.
    #[must_use]
    pub fn with_capacity(transport: T, capacity: usize) -> Self {
        Self { transport, staged: Vec::new(), capacity }
    }

    /// Shared access to the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    #[must_use]
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Instructions currently staged for upload.
    #[must_use]
    pub fn staged(&self) -> &[Instruction] {
        &self.staged
    }

    /// Appends committed instructions to the staging buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::BufferFull`] when the staging capacity
    /// would be exceeded; no instruction is staged in that case.
    pub fn extend(&mut self, instructions: Vec<Instruction>) -> Result<(), SequencerError> {
        if self.staged.len() + instructions.len() > self.capacity {
            return Err(SequencerError::BufferFull { capacity: self.capacity });
        }
        for instr in &instructions {
            tracing::trace!(target: "optemu::sequencer", %instr, "stage");
        }
        self.staged.extend(instructions);
        Ok(())
    }

    /// Flushes the staging buffer to the hardware module.
    ///
    /// With `clear` set the staging buffer is emptied after the upload;
    /// otherwise it is kept for replay.
    ///
    /// # Errors
    ///
    /// Propagates transport and encode failures.
    pub fn send(&mut self, clear: bool) -> Result<StatusWord, SequencerError> {
        let words = self
            .staged
            .iter()
            .map(Instruction::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let status = self.transport.write_instructions(&words)?;
        tracing::debug!(
            target: "optemu::sequencer",
            count = words.len(),
            buffer_count = status.buffer_count,
            "flush"
        );
        if clear {
            self.staged.clear();
        }
        Ok(status)
    }

    /// Enables FIFO consumption and sanity-checks the status reply.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::StatusCheck`] when the module does not
    /// report an enabled FIFO. An already-drained FIFO is accepted since
    /// very short sequences can disable the FIFO within a few cycles.
    pub fn start_emulator(&mut self) -> Result<StatusWord, SequencerError> {
        let status = self.transport.control(ControlRequest::Start)?;
        if !(status.fifo_en || status.fifo_count == 0) {
            return Err(SequencerError::StatusCheck {
                operation: "start",
                detail: "fifo_en not asserted",
            });
        }
        Ok(status)
    }

    /// Disables FIFO consumption and sanity-checks the status reply.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::StatusCheck`] when the FIFO is still
    /// enabled afterwards.
    pub fn stop_emulator(&mut self) -> Result<StatusWord, SequencerError> {
        let status = self.transport.control(ControlRequest::Stop)?;
        if status.fifo_en {
            return Err(SequencerError::StatusCheck {
                operation: "stop",
                detail: "fifo_en still asserted",
            });
        }
        Ok(status)
    }

    /// Soft-resets the module and drops the staging buffer.
    ///
    /// Instructions already latched into the hardware FIFO are
    /// discarded; one latched instruction may still execute for the
    /// current tick on real hardware.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn reset_module(&mut self) -> Result<StatusWord, SequencerError> {
        self.staged.clear();
        self.transport.control(ControlRequest::Reset)
    }

    /// Non-blocking status snapshot.
    ///
    /// # Errors
    ///
    /// Propagates transport failures.
    pub fn status(&mut self) -> Result<StatusWord, SequencerError> {
        self.transport.control(ControlRequest::Status)
    }

    /// Fires a PES action event.
    ///
    /// # Errors
    ///
    /// Propagates transport failures and status check failures.
    pub fn execute(&mut self, event: ActionEvent) -> Result<StatusWord, SequencerError> {
        match event {
            ActionEvent::Start => self.start_emulator(),
            ActionEvent::Stop => self.stop_emulator(),
            ActionEvent::Reset => self.reset_module(),
        }
    }

    /// Blocks until the resume event occurs, ticking the transport.
    ///
    /// Returns the number of ticks consumed.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::WaitTimeout`] when the event is not
    /// observed within `timeout_ticks`.
    pub fn wait(
        &mut self,
        event: ResumeEvent,
        timeout_ticks: u32,
    ) -> Result<u32, SequencerError> {
        let mut ticks = 0_u32;
        loop {
            let status = self.status()?;
            if event.is_met(&status) {
                if matches!(event, ResumeEvent::FifoUnderrun) {
                    tracing::warn!(
                        target: "optemu::sequencer",
                        update_count = status.update_count,
                        "fifo underrun observed"
                    );
                }
                return Ok(ticks);
            }
            if ticks >= timeout_ticks {
                return Err(SequencerError::WaitTimeout { event: event.name(), ticks });
            }
            self.transport.tick();
            ticks += 1;
        }
    }

    /// Executes a pre-built PES sequence within one tick budget.
    ///
    /// # Errors
    ///
    /// Propagates wait timeouts and transport failures; the remaining
    /// budget shrinks with every tick spent.
    pub fn play_sequence(
        &mut self,
        sequence: &PesSequence,
        timeout_ticks: u32,
    ) -> Result<(), SequencerError> {
        let mut remaining = timeout_ticks;
        for op in sequence.ops() {
            match *op {
                PesOp::Execute(event) => {
                    self.execute(event)?;
                }
                PesOp::Wait(event) => {
                    let spent = self.wait(event, remaining)?;
                    remaining = remaining.saturating_sub(spent);
                }
                PesOp::Delay { ticks } => {
                    for _ in 0..ticks {
                        self.transport.tick();
                    }
                    remaining = remaining.saturating_sub(ticks);
                }
            }
        }
        Ok(())
    }
}
