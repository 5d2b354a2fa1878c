use anyhow::{Context, bail};
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::SignalGraph;
use crate::ir::ReverbKernel;
use crate::params::{
    BAND_COUNT, DECAY_MAX_SECS, DECAY_MIN_SECS, DynamicsParams, EQ_GAIN_MAX_DB, EQ_GAIN_MIN_DB,
    GAIN_MAX_DB, GAIN_MIN_DB, MIN_SAMPLE_RATE, ParameterState, clamp_param,
};
use crate::preset::{EqCurve, Preset, PresetPatch};
use crate::settings::Settings;
use crate::visualizer::{Visualizer, VisualizerHandle};

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Commands from the controller, applied by the audio side at the start of
/// the next block. Values are already clamped by the handle.
pub enum EngineMessage {
    SetPreamp(f32),
    SetTrim(f32),
    SetEqBand(usize, f32),
    SetEqGains([f32; BAND_COUNT]),
    SetBassShelf { enabled: bool, gain_db: f32 },
    SetPresence(f32),
    SetCompressor(DynamicsParams),
    SetReverb {
        enabled: bool,
        mix: f32,
        kernel: Option<Box<ReverbKernel>>,
    },
    SetBalance(f32),
    SetBypass(bool),
    /// Replace every parameter at once, as a preset load or reset does.
    ApplyState {
        state: Box<ParameterState>,
        kernel: Option<Box<ReverbKernel>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Frames per block; interleaved buffers hold twice as many samples.
    pub block_size: usize,
    pub smoothing_ms: f32,
    pub visualizer_window: usize,
    pub reverb_seed: Option<u64>,
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            sample_rate: settings.audio.sample_rate,
            block_size: settings.audio.block_size,
            smoothing_ms: settings.smoothing_ms,
            visualizer_window: settings.visualizer_window,
            reverb_seed: settings.reverb_seed,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Audio-side owner of the signal graph.
pub struct Engine {
    graph: SignalGraph,
    rx_updates: Receiver<EngineMessage>,
    block_size: usize,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<(Self, EngineHandle)> {
        if config.sample_rate < MIN_SAMPLE_RATE {
            return Err(Error::FatalConfig(format!(
                "sample rate {} Hz is below the {MIN_SAMPLE_RATE} Hz minimum",
                config.sample_rate
            )));
        }
        if config.block_size == 0 {
            return Err(Error::FatalConfig("block size must be non-zero".to_string()));
        }

        let sample_rate = config.sample_rate as f32;
        let state = ParameterState::default();

        let kernel = build_kernel(state.reverb.decay_secs, sample_rate, config.reverb_seed)?;
        let (visualizer, visualizer_handle) = Visualizer::new(config.visualizer_window)?;
        let graph = SignalGraph::new(
            &state,
            kernel,
            visualizer,
            sample_rate,
            config.smoothing_ms,
        )?;

        let (tx_updates, rx_updates) = bounded::<EngineMessage>(config.queue_capacity.max(1));

        debug!(
            "Engine created: {} Hz, {} frames per block",
            config.sample_rate, config.block_size
        );

        Ok((
            Self {
                graph,
                rx_updates,
                block_size: config.block_size,
                left: vec![0.0; config.block_size],
                right: vec![0.0; config.block_size],
            },
            EngineHandle {
                tx_updates,
                state,
                visualizer: visualizer_handle,
                sample_rate,
                reverb_seed: config.reverb_seed,
            },
        ))
    }

    /// Process one block of interleaved stereo. Both buffers must hold
    /// exactly `block_size * 2` samples.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) -> anyhow::Result<()> {
        let expected = self.block_size * 2;
        if input.len() != expected || output.len() != expected {
            bail!(
                "block size mismatch: expected {expected} interleaved samples, got input {} / output {}",
                input.len(),
                output.len()
            );
        }

        self.handle_messages();

        for ((frame, l), r) in input
            .chunks_exact(2)
            .zip(self.left.iter_mut())
            .zip(self.right.iter_mut())
        {
            *l = frame[0];
            *r = frame[1];
        }

        self.graph.process_block(&mut self.left, &mut self.right);

        for ((frame, l), r) in output
            .chunks_exact_mut(2)
            .zip(self.left.iter())
            .zip(self.right.iter())
        {
            frame[0] = *l;
            frame[1] = *r;
        }

        Ok(())
    }

    pub fn update_block_size(&mut self, new_size: usize) -> anyhow::Result<()> {
        if new_size == 0 {
            bail!("block size must be non-zero");
        }
        self.block_size = new_size;
        self.left.resize(new_size, 0.0);
        self.right.resize(new_size, 0.0);
        debug!("Block size changed to {new_size}");
        Ok(())
    }

    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    /// Drain every pending command. Runs at block boundaries only.
    pub fn handle_messages(&mut self) {
        while let Ok(message) = self.rx_updates.try_recv() {
            self.apply(message);
        }
    }

    fn apply(&mut self, message: EngineMessage) {
        let graph = &mut self.graph;
        match message {
            EngineMessage::SetPreamp(db) => {
                graph.preamp_mut().set_gain_db(db);
                debug!("Pre-amp: {db} dB");
            }
            EngineMessage::SetTrim(db) => {
                graph.trim_mut().set_gain_db(db);
                debug!("Trim: {db} dB");
            }
            EngineMessage::SetEqBand(index, db) => {
                if graph.equalizer_mut().set_band_gain(index, db) {
                    debug!("EQ band {index}: {db} dB");
                } else {
                    warn!("Ignoring gain for unknown EQ band {index}");
                }
            }
            EngineMessage::SetEqGains(gains) => {
                graph.equalizer_mut().set_gains(&gains);
                debug!("EQ gains: {gains:?}");
            }
            EngineMessage::SetBassShelf { enabled, gain_db } => {
                graph.tone_mut().set_bass_shelf(enabled, gain_db);
                debug!("Bass shelf: enabled={enabled}, {gain_db} dB");
            }
            EngineMessage::SetPresence(db) => {
                graph.tone_mut().set_presence(db);
                debug!("Presence: {db} dB");
            }
            EngineMessage::SetCompressor(params) => {
                graph.dynamics_mut().set_params(&params);
                graph.set_compressor_enabled(params.enabled);
                debug!("Compressor: {params:?}");
            }
            EngineMessage::SetReverb {
                enabled,
                mix,
                kernel,
            } => {
                let reverb = graph.reverb_mut();
                if let Some(kernel) = kernel {
                    // Anything displaced is freed here, at the block boundary
                    drop(reverb.swap_kernel(kernel));
                }
                reverb.set_mix(mix);
                reverb.set_enabled(enabled);
                debug!("Reverb: enabled={enabled}, mix={mix}");
            }
            EngineMessage::SetBalance(pan) => {
                graph.balance_mut().set_pan(pan);
                debug!("Balance: {pan}");
            }
            EngineMessage::SetBypass(bypass) => {
                graph.set_bypass(bypass);
            }
            EngineMessage::ApplyState { state, kernel } => {
                if let Some(kernel) = kernel {
                    drop(graph.reverb_mut().swap_kernel(kernel));
                }
                graph.apply_state(&state);
            }
        }
    }
}

fn build_kernel(decay_secs: f32, sample_rate: f32, seed: Option<u64>) -> Result<Box<ReverbKernel>> {
    ReverbKernel::build(decay_secs, sample_rate, seed)
        .context("failed to prepare reverb kernel")
        .map(Box::new)
        .map_err(|e| Error::FatalConfig(format!("{e:#}")))
}

/// Controller-side command surface.
///
/// Keeps a mirror of the parameters it has successfully queued, so reads
/// never touch the audio side. A command that cannot be queued leaves the
/// mirror unchanged.
pub struct EngineHandle {
    tx_updates: Sender<EngineMessage>,
    state: ParameterState,
    visualizer: VisualizerHandle,
    sample_rate: f32,
    reverb_seed: Option<u64>,
}

impl EngineHandle {
    fn send(&self, message: EngineMessage) -> Result<()> {
        self.tx_updates.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => {
                warn!("Engine command queue is full, dropping command");
                Error::QueueFull
            }
            TrySendError::Disconnected(_) => Error::Disconnected,
        })
    }

    pub fn set_preamp(&mut self, db: f32) -> Result<()> {
        let Some(db) = checked("pre-amp", db, GAIN_MIN_DB, GAIN_MAX_DB) else {
            return Ok(());
        };
        self.send(EngineMessage::SetPreamp(db))?;
        self.state.preamp_db = db;
        Ok(())
    }

    pub fn set_trim(&mut self, db: f32) -> Result<()> {
        let Some(db) = checked("trim", db, GAIN_MIN_DB, GAIN_MAX_DB) else {
            return Ok(());
        };
        self.send(EngineMessage::SetTrim(db))?;
        self.state.trim_db = db;
        Ok(())
    }

    pub fn set_eq_band(&mut self, index: usize, db: f32) -> Result<()> {
        if index >= BAND_COUNT {
            warn!("Ignoring gain for unknown EQ band {index}");
            return Ok(());
        }
        let Some(db) = checked("EQ band", db, EQ_GAIN_MIN_DB, EQ_GAIN_MAX_DB) else {
            return Ok(());
        };
        self.send(EngineMessage::SetEqBand(index, db))?;
        self.state.eq_gains[index] = db;
        Ok(())
    }

    /// Select a named curve. Unknown names select the flat curve.
    pub fn apply_curve(&mut self, name: &str) -> Result<()> {
        self.apply_eq_curve(EqCurve::from_name_or_flat(name))
    }

    pub fn apply_eq_curve(&mut self, curve: EqCurve) -> Result<()> {
        let gains = curve.gains();
        self.send(EngineMessage::SetEqGains(gains))?;
        self.state.eq_gains = gains;
        debug!("Applied EQ curve {curve}");
        Ok(())
    }

    pub fn set_bass_shelf(&mut self, enabled: bool, db: f32) -> Result<()> {
        let Some(db) = checked("bass shelf", db, GAIN_MIN_DB, GAIN_MAX_DB) else {
            return Ok(());
        };
        self.send(EngineMessage::SetBassShelf {
            enabled,
            gain_db: db,
        })?;
        self.state.tone.bass_enabled = enabled;
        self.state.tone.bass_gain_db = db;
        Ok(())
    }

    pub fn set_presence(&mut self, db: f32) -> Result<()> {
        let Some(db) = checked("presence", db, GAIN_MIN_DB, GAIN_MAX_DB) else {
            return Ok(());
        };
        self.send(EngineMessage::SetPresence(db))?;
        self.state.tone.presence_gain_db = db;
        Ok(())
    }

    pub fn set_compressor(&mut self, params: DynamicsParams) -> Result<()> {
        let params = params.clamped(&self.state.dynamics);
        self.send(EngineMessage::SetCompressor(params))?;
        self.state.dynamics = params;
        Ok(())
    }

    /// Put the compressor in or out of the chain, keeping its settings.
    pub fn set_compressor_enabled(&mut self, enabled: bool) -> Result<()> {
        self.set_compressor(DynamicsParams {
            enabled,
            ..self.state.dynamics
        })
    }

    /// Update the reverb. A changed decay time synthesizes and prepares a new
    /// impulse on the calling thread before anything is queued.
    pub fn set_reverb(&mut self, enabled: bool, mix: f32, decay_secs: f32) -> Result<()> {
        let current = self.state.reverb;
        let mix = checked("reverb mix", mix, 0.0, 1.0).unwrap_or(current.mix);
        let decay_secs = checked("reverb decay", decay_secs, DECAY_MIN_SECS, DECAY_MAX_SECS)
            .unwrap_or(current.decay_secs);

        let kernel = if decay_secs == current.decay_secs {
            None
        } else {
            Some(build_kernel(decay_secs, self.sample_rate, self.reverb_seed)?)
        };

        self.send(EngineMessage::SetReverb {
            enabled,
            mix,
            kernel,
        })?;
        self.state.reverb.enabled = enabled;
        self.state.reverb.mix = mix;
        self.state.reverb.decay_secs = decay_secs;
        Ok(())
    }

    pub fn set_balance(&mut self, pan: f32) -> Result<()> {
        let Some(pan) = checked("balance", pan, -1.0, 1.0) else {
            return Ok(());
        };
        self.send(EngineMessage::SetBalance(pan))?;
        self.state.balance.pan = pan;
        Ok(())
    }

    pub fn set_bypass(&mut self, bypass: bool) -> Result<()> {
        self.send(EngineMessage::SetBypass(bypass))?;
        self.state.bypass = bypass;
        Ok(())
    }

    /// Capture EQ gains, pre-amp and trim.
    pub fn save_preset(&self) -> Preset {
        Preset::capture(&self.state)
    }

    /// Apply a typed preset. A non-finite field rejects the whole preset.
    pub fn load_preset(&mut self, preset: &Preset) -> Result<()> {
        self.apply_patch(&PresetPatch::try_from(*preset)?)
    }

    /// Validate and apply a preset document. On `InvalidFormat` nothing
    /// has been changed.
    pub fn load_preset_json(&mut self, json: &str) -> Result<()> {
        let patch = PresetPatch::parse(json)?;
        self.apply_patch(&patch)
    }

    fn apply_patch(&mut self, patch: &PresetPatch) -> Result<()> {
        let mut next = self.state.clone();
        patch.apply_to(&mut next);
        self.send(EngineMessage::ApplyState {
            state: Box::new(next.clone()),
            kernel: None,
        })?;
        self.state = next;
        debug!("Preset loaded");
        Ok(())
    }

    /// Restore every default, including a fresh impulse.
    pub fn reset(&mut self) -> Result<()> {
        let defaults = ParameterState::default();
        let kernel = build_kernel(
            defaults.reverb.decay_secs,
            self.sample_rate,
            self.reverb_seed,
        )?;
        self.send(EngineMessage::ApplyState {
            state: Box::new(defaults.clone()),
            kernel: Some(kernel),
        })?;
        self.state = defaults;
        debug!("Parameters reset to defaults");
        Ok(())
    }

    pub fn params(&self) -> &ParameterState {
        &self.state
    }

    pub fn visualizer(&self) -> &VisualizerHandle {
        &self.visualizer
    }
}

// Clamp a controller value; NaN is dropped with a warning.
fn checked(name: &str, value: f32, min: f32, max: f32) -> Option<f32> {
    let clamped = clamp_param(value, min, max);
    if clamped.is_none() {
        warn!("Ignoring non-numeric {name} value");
    }
    clamped
}
