//! CPU configuration: model, installed memory, and the emulation bits that let a larger machine
//! impersonate a smaller one. These are persistent knobs (§6) that may only change while halted.

use proc_bitfield::bitfield;

/// Which of the four machine sizes this instance is configured as.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Model {
    /// The small 10,000-character machine. No ASUs; two fixed 512-character accumulator windows.
    Model10K,
    /// The 20/40K expansion machine.
    ModelMid,
    /// The 80K "Series III" machine: zone-bit address extension plus one-level indirect.
    ModelSeriesIii,
    /// The 160K top-end "eight-mode" machine: full zone-driven address extension, no indirect
    /// flag (indirect is a one-shot register set by a prior verb instead).
    ModelTop,
}

bitfield! {
    /// Emulation-mode bits (§6): let a larger model impersonate a smaller one's address decoding
    /// and feature set.
    #[derive(Clone, Copy, Eq, PartialEq)]
    pub struct EmulationBits(u8): Debug, FromRaw, IntoRaw, DerefRaw {
        /// Enables 40K-style addressing on a 20K-class model.
        pub emu_mid: bool @ 0,
        /// Enables Series-III features (indirect addressing, AAM high digits) on the top model.
        pub emu_series_iii: bool @ 1,
    }
}

/// The full, persistent CPU configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub model: Model,
    /// Memory installed, in multiples of 10,000, from 10,000 to 160,000.
    pub installed: u32,
    pub emulation: EmulationBits,
    /// Non-stop mode: trap-class flags divert to the interrupt handler instead of halting.
    pub non_stop: bool,
    pub sense_switches: u8,
    /// One bit per trap class (see `crate::registers::Flags`).
    pub stop_flags: u16,
}

impl Config {
    pub fn new(model: Model, installed: u32) -> Self {
        Self {
            model,
            installed,
            emulation: EmulationBits(0),
            non_stop: false,
            sense_switches: 0,
            stop_flags: 0,
        }
    }

    /// EFFECTIVE_MEMORY per §3: the addressable range, collapsing larger-model low modes down to
    /// a smaller geometry when the emulation bits or installed size call for it.
    pub fn effective_memory(&self) -> u32 {
        match self.model {
            Model::Model10K => 10_000,
            Model::ModelMid => self.installed.clamp(10_000, 40_000),
            Model::ModelSeriesIii => {
                if self.emulation.emu_mid() {
                    self.installed.clamp(10_000, 40_000)
                } else {
                    self.installed.clamp(10_000, 80_000)
                }
            }
            Model::ModelTop => {
                if self.emulation.emu_series_iii() {
                    self.installed.clamp(10_000, 80_000)
                } else {
                    self.installed.clamp(10_000, 160_000)
                }
            }
        }
    }

    /// Whether the address decoder's one-level indirect (Series III) is active.
    pub fn indirect_enabled(&self) -> bool {
        matches!(self.model, Model::ModelSeriesIii)
            || (matches!(self.model, Model::ModelTop) && self.emulation.emu_series_iii())
    }

    /// Whether this configuration exposes numbered ASUs (all but the 10K machine).
    pub fn has_asus(&self) -> bool {
        !matches!(self.model, Model::Model10K)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ten_k_is_fixed_size() {
        let cfg = Config::new(Model::Model10K, 160_000);
        assert_eq!(cfg.effective_memory(), 10_000);
    }

    #[test]
    fn top_model_collapses_under_series_iii_emulation() {
        let mut cfg = Config::new(Model::ModelTop, 160_000);
        cfg.emulation.set_emu_series_iii(true);
        assert_eq!(cfg.effective_memory(), 80_000);
    }

    #[test]
    fn top_model_full_size_without_emulation() {
        let cfg = Config::new(Model::ModelTop, 160_000);
        assert_eq!(cfg.effective_memory(), 160_000);
    }
}
