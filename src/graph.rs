use log::{debug, info};
use std::fmt;

use crate::dsp::Stage;
use crate::dsp::balance::StereoBalance;
use crate::dsp::dynamics::DynamicsStage;
use crate::dsp::equalizer::EqualizerBank;
use crate::dsp::gain::GainStage;
use crate::dsp::reverb::ReverbStage;
use crate::dsp::tone::ToneShaping;
use crate::error::{Error, Result};
use crate::ir::ReverbKernel;
use crate::params::{BalanceState, EQ_FREQUENCIES, MIN_SAMPLE_RATE, ParameterState, ReverbParams};
use crate::visualizer::Visualizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Routing {
    #[default]
    Normal,
    /// Input goes straight to output; no stage runs.
    FullBypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressorMode {
    #[default]
    Inline,
    /// The compressor is taken out of the path entirely.
    Bypassed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Topology {
    pub routing: Routing,
    pub compressor: CompressorMode,
}

impl Topology {
    pub const fn from_flags(bypass: bool, compressor_enabled: bool) -> Self {
        Self {
            routing: if bypass {
                Routing::FullBypass
            } else {
                Routing::Normal
            },
            compressor: if compressor_enabled {
                CompressorMode::Inline
            } else {
                CompressorMode::Bypassed
            },
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.routing {
            Routing::FullBypass => write!(f, "bypass"),
            Routing::Normal => match self.compressor {
                CompressorMode::Inline => write!(f, "normal"),
                CompressorMode::Bypassed => write!(f, "normal (no compressor)"),
            },
        }
    }
}

/// The complete effect chain in its fixed order:
///
/// pre-amp → EQ → tone → reverb → balance → [compressor] → trim → visualizer
///
/// Stages always exist; topology only decides whether the compressor is part
/// of the path and whether the path runs at all. Topology is read once per
/// block, so a block is never processed by a half-switched chain.
pub struct SignalGraph {
    preamp: GainStage,
    equalizer: EqualizerBank,
    tone: ToneShaping,
    reverb: ReverbStage,
    balance: StereoBalance,
    dynamics: DynamicsStage,
    trim: GainStage,
    visualizer: Visualizer,
    topology: Topology,
}

impl SignalGraph {
    pub fn new(
        state: &ParameterState,
        kernel: Box<ReverbKernel>,
        visualizer: Visualizer,
        sample_rate: f32,
        smoothing_ms: f32,
    ) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate < MIN_SAMPLE_RATE as f32 {
            return Err(Error::FatalConfig(format!(
                "invalid sample rate: {sample_rate} (minimum {MIN_SAMPLE_RATE} Hz)"
            )));
        }

        let mut equalizer = EqualizerBank::with_frequencies(&EQ_FREQUENCIES, sample_rate)?;
        equalizer.set_gains(&state.eq_gains);

        Ok(Self {
            preamp: GainStage::new(state.preamp_db, smoothing_ms, sample_rate),
            equalizer,
            tone: ToneShaping::new(&state.tone, sample_rate),
            reverb: ReverbStage::new(&state.reverb, kernel, smoothing_ms, sample_rate),
            balance: StereoBalance::new(state.balance.pan, smoothing_ms, sample_rate),
            dynamics: DynamicsStage::new(&state.dynamics, sample_rate),
            trim: GainStage::new(state.trim_db, smoothing_ms, sample_rate),
            visualizer,
            topology: Topology::from_flags(state.bypass, state.dynamics.enabled),
        })
    }

    pub const fn topology(&self) -> Topology {
        self.topology
    }

    /// Switch routing. Must only be called between blocks.
    pub fn configure(&mut self, topology: Topology) {
        if topology == self.topology {
            return;
        }

        let previous = self.topology;
        self.topology = topology;

        if previous.routing == Routing::FullBypass && topology.routing == Routing::Normal {
            // Filter memory is from before the bypass; start clean
            self.reset();
        } else if previous.compressor == CompressorMode::Bypassed
            && topology.compressor == CompressorMode::Inline
        {
            self.dynamics.reset();
        }

        info!("Signal graph topology: {previous} -> {topology}");
    }

    pub fn set_bypass(&mut self, bypass: bool) {
        self.configure(Topology::from_flags(
            bypass,
            self.topology.compressor == CompressorMode::Inline,
        ));
    }

    pub fn set_compressor_enabled(&mut self, enabled: bool) {
        self.configure(Topology::from_flags(
            self.topology.routing == Routing::FullBypass,
            enabled,
        ));
    }

    /// Process one stereo block in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());

        if self.topology.routing == Routing::FullBypass {
            return;
        }

        self.preamp.process_block(left, right);
        self.equalizer.process_block(left, right);
        self.tone.process_block(left, right);
        self.reverb.process_block(left, right);
        self.balance.process_block(left, right);
        if self.topology.compressor == CompressorMode::Inline {
            self.dynamics.process_block(left, right);
        }
        self.trim.process_block(left, right);

        self.visualizer.process(left, right);
    }

    /// Apply a complete parameter set, topology included. The reverb kernel
    /// is not touched; decay changes arrive as a prepared kernel.
    pub fn apply_state(&mut self, state: &ParameterState) {
        self.preamp.set_gain_db(state.preamp_db);
        self.trim.set_gain_db(state.trim_db);
        self.equalizer.set_gains(&state.eq_gains);
        self.tone
            .set_bass_shelf(state.tone.bass_enabled, state.tone.bass_gain_db);
        self.tone.set_presence(state.tone.presence_gain_db);
        self.dynamics.set_params(&state.dynamics);
        self.reverb.set_mix(state.reverb.mix);
        self.reverb.set_enabled(state.reverb.enabled);
        self.balance.set_pan(state.balance.pan);
        self.configure(Topology::from_flags(state.bypass, state.dynamics.enabled));
        debug!("Applied full parameter state");
    }

    /// Parameters as the stages currently hold them.
    pub fn state(&self) -> ParameterState {
        ParameterState {
            preamp_db: self.preamp.gain_db(),
            trim_db: self.trim.gain_db(),
            eq_gains: self.equalizer.gains(),
            tone: self.tone.state(),
            dynamics: self
                .dynamics
                .params(self.topology.compressor == CompressorMode::Inline),
            reverb: ReverbParams {
                enabled: self.reverb.is_enabled(),
                mix: self.reverb.mix(),
                decay_secs: self.reverb.kernel().impulse().decay_secs(),
            },
            balance: BalanceState {
                pan: self.balance.pan(),
            },
            bypass: self.topology.routing == Routing::FullBypass,
        }
    }

    pub fn reset(&mut self) {
        self.preamp.reset();
        self.equalizer.reset();
        self.tone.reset();
        self.reverb.reset();
        self.balance.reset();
        self.dynamics.reset();
        self.trim.reset();
        self.visualizer.reset();
    }

    pub fn preamp_mut(&mut self) -> &mut GainStage {
        &mut self.preamp
    }

    pub fn trim_mut(&mut self) -> &mut GainStage {
        &mut self.trim
    }

    pub fn equalizer(&self) -> &EqualizerBank {
        &self.equalizer
    }

    pub fn equalizer_mut(&mut self) -> &mut EqualizerBank {
        &mut self.equalizer
    }

    pub fn tone_mut(&mut self) -> &mut ToneShaping {
        &mut self.tone
    }

    pub fn reverb(&self) -> &ReverbStage {
        &self.reverb
    }

    pub fn reverb_mut(&mut self) -> &mut ReverbStage {
        &mut self.reverb
    }

    pub fn balance_mut(&mut self) -> &mut StereoBalance {
        &mut self.balance
    }

    pub fn dynamics(&self) -> &DynamicsStage {
        &self.dynamics
    }

    pub fn dynamics_mut(&mut self) -> &mut DynamicsStage {
        &mut self.dynamics
    }
}
