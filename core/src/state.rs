//! A serializable snapshot of an entire [`crate::Machine`]: a plain, serde-derived value that can
//! be built from a live machine, diffed against another snapshot, and used to seed a fresh
//! machine for a test case.
//!
//! This family has no public single-step-test corpus to load via `serde_json` from an external
//! submodule, so `MachineState` fixtures are authored in this crate as Rust literals. `serde` is
//! still load-bearing here: a `MachineState` is also the payload a cold-path save/restore
//! (distinct from the window-store interrupt save area in `interrupt.rs`, which is a fixed
//! in-machine region, not a serializable snapshot an external collaborator could persist to disk)
//! would serialize.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::memory::Memory;
use crate::model::{Config, EmulationBits, Model};
use crate::registers::{Flags, Registers};
use crate::Machine;

/// Snapshot of the register file outside the accumulator window store, mirroring every field in
/// [`Registers`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RegisterState {
    pub ic: u32,
    pub flags: u16,
    pub sw: u8,
    pub sl: u8,
    pub stop_flags: u16,
    pub spc: u16,
    pub spcb: u16,
    pub selreg: u16,
    pub selreg2: u16,
    pub indflag: bool,
    pub intmode: bool,
    pub intprog: bool,
    pub bkcmp: bool,
    pub mac: u32,
    pub mac2: u32,
    pub chwait: Option<u8>,
}

impl From<&Registers> for RegisterState {
    fn from(regs: &Registers) -> Self {
        Self {
            ic: regs.ic,
            flags: regs.flags.0,
            sw: regs.sw,
            sl: regs.sl,
            stop_flags: regs.stop_flags,
            spc: regs.spc,
            spcb: regs.spcb,
            selreg: regs.selreg,
            selreg2: regs.selreg2,
            indflag: regs.indflag,
            intmode: regs.intmode,
            intprog: regs.intprog,
            bkcmp: regs.bkcmp,
            mac: regs.mac,
            mac2: regs.mac2,
            chwait: regs.chwait,
        }
    }
}

impl From<&RegisterState> for Registers {
    fn from(state: &RegisterState) -> Self {
        Registers {
            ic: state.ic,
            flags: Flags(state.flags),
            sw: state.sw,
            sl: state.sl,
            stop_flags: state.stop_flags,
            spc: state.spc,
            spcb: state.spcb,
            selreg: state.selreg,
            selreg2: state.selreg2,
            indflag: state.indflag,
            intmode: state.intmode,
            intprog: state.intprog,
            bkcmp: state.bkcmp,
            mac: state.mac,
            mac2: state.mac2,
            chwait: state.chwait,
        }
    }
}

/// Snapshot of the persistent model configuration (§6's "CPU configuration knobs").
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConfigState {
    pub model: ModelTag,
    pub installed: u32,
    pub emulation: u8,
    pub non_stop: bool,
    pub sense_switches: u8,
    pub stop_flags: u16,
}

/// Serializable tag for [`Model`] (`Model` itself carries no data to serialize through, but
/// deriving `Serialize`/`Deserialize` directly on it would be one more place the ISA's four
/// sizes are spelled out; this keeps that spelling in one place).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ModelTag {
    Model10K,
    ModelMid,
    ModelSeriesIii,
    ModelTop,
}

impl From<Model> for ModelTag {
    fn from(model: Model) -> Self {
        match model {
            Model::Model10K => ModelTag::Model10K,
            Model::ModelMid => ModelTag::ModelMid,
            Model::ModelSeriesIii => ModelTag::ModelSeriesIii,
            Model::ModelTop => ModelTag::ModelTop,
        }
    }
}

impl From<ModelTag> for Model {
    fn from(tag: ModelTag) -> Self {
        match tag {
            ModelTag::Model10K => Model::Model10K,
            ModelTag::ModelMid => Model::ModelMid,
            ModelTag::ModelSeriesIii => Model::ModelSeriesIii,
            ModelTag::ModelTop => Model::ModelTop,
        }
    }
}

impl From<&Config> for ConfigState {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.into(),
            installed: config.installed,
            emulation: config.emulation.0,
            non_stop: config.non_stop,
            sense_switches: config.sense_switches,
            stop_flags: config.stop_flags,
        }
    }
}

impl From<&ConfigState> for Config {
    fn from(state: &ConfigState) -> Self {
        Config {
            model: state.model.into(),
            installed: state.installed,
            emulation: EmulationBits(state.emulation),
            non_stop: state.non_stop,
            sense_switches: state.sense_switches,
            stop_flags: state.stop_flags,
        }
    }
}

/// A full machine snapshot: registers, configuration, and two sparse memory diffs (main store and
/// accumulator window store), sampled as `(address, value)` pairs rather than dumping the full
/// (up to 160,000-character) address space on every snapshot.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MachineState {
    pub registers: RegisterState,
    pub config: ConfigState,
    /// `(address, value)` pairs; only the addresses a test cares about need to be listed.
    pub memory: Vec<(u32, u8)>,
    /// `(address, value)` pairs within the accumulator window store.
    pub store: Vec<(u32, u8)>,
}

impl MachineState {
    /// Capture the register file, configuration, and the given memory/store addresses from a
    /// live machine. Full state is cheap (registers/config), but memory is sampled at
    /// caller-chosen addresses rather than dumped whole.
    pub fn capture(machine: &Machine, memory_addrs: &[u32], store_addrs: &[u32]) -> Self {
        Self {
            registers: RegisterState::from(&machine.regs),
            config: ConfigState::from(&machine.config),
            memory: memory_addrs
                .iter()
                .map(|&a| (a, machine.memory.peek(a)))
                .collect(),
            store: store_addrs.iter().map(|&a| (a, machine.store.get(a))).collect(),
        }
    }

    /// Build a fresh [`Machine`] from this snapshot: construct it with the recorded model and
    /// installed size, then overwrite registers and the listed memory/store cells.
    pub fn restore(&self) -> Machine {
        let mut machine = Machine::new(self.config.model.into(), self.config.installed);
        machine.config = Config::from(&self.config);
        machine.regs = Registers::from(&self.registers);
        for &(addr, value) in &self.memory {
            machine.memory.write_char(addr, value);
        }
        for &(addr, value) in &self.store {
            machine.store.set(addr, value);
        }
        machine
    }
}

impl Memory {
    /// Read a character without threading a fault class through (used only by snapshotting,
    /// which must not perturb the flag word as a side effect of inspecting state).
    pub fn peek(&self, addr: u32) -> u8 {
        let mut scratch = Flags(0);
        self.read_char(addr, 0, &mut scratch)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Model;

    #[test]
    fn register_state_round_trips() {
        let mut regs = Registers::new();
        regs.ic = 1234;
        regs.flags.latch(1 << 8);
        regs.spc = 0x200;
        regs.chwait = Some(3);

        let state = RegisterState::from(&regs);
        let back = Registers::from(&state);
        assert_eq!(back.ic, regs.ic);
        assert_eq!(back.flags.0, regs.flags.0);
        assert_eq!(back.spc, regs.spc);
        assert_eq!(back.chwait, regs.chwait);
    }

    #[test]
    fn config_state_round_trips_through_model_tag() {
        let mut config = Config::new(Model::ModelTop, 160_000);
        config.emulation.set_emu_series_iii(true);
        config.non_stop = true;

        let state = ConfigState::from(&config);
        let back = Config::from(&state);
        assert_eq!(back.model, config.model);
        assert_eq!(back.emulation.0, config.emulation.0);
        assert_eq!(back.non_stop, config.non_stop);
    }

    #[test]
    fn machine_state_capture_and_restore_round_trips_sampled_cells() {
        let mut machine = Machine::new(Model::ModelMid, 40_000);
        machine.memory.write_char(100, 7);
        machine.memory.write_char(101, 3);
        machine.store.set(0, 9);
        machine.regs.ic = 104;
        machine.regs.spc = 0x100;

        let snapshot = MachineState::capture(&machine, &[100, 101], &[0]);
        let restored = snapshot.restore();

        assert_eq!(restored.memory.peek(100), 7);
        assert_eq!(restored.memory.peek(101), 3);
        assert_eq!(restored.store.get(0), 9);
        assert_eq!(restored.regs.ic, 104);
        assert_eq!(restored.regs.spc, 0x100);
    }

    #[test]
    fn machine_state_serializes_through_json() {
        let machine = Machine::new(Model::ModelMid, 40_000);
        let snapshot = MachineState::capture(&machine, &[0], &[0]);
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: MachineState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, snapshot);
    }
}
