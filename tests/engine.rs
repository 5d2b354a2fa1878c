use anyhow::Result;
use rusteq::engine::{Engine, EngineConfig, EngineHandle};
use rusteq::error::Error;
use rusteq::params::{DynamicsParams, ParameterState};
use rusteq::preset::EqCurve;

const SAMPLE_RATE: u32 = 48_000;
const BLOCK_SIZE: usize = 128;

fn config() -> EngineConfig {
    EngineConfig {
        sample_rate: SAMPLE_RATE,
        block_size: BLOCK_SIZE,
        smoothing_ms: 0.0,
        visualizer_window: 512,
        reverb_seed: Some(1),
        queue_capacity: 64,
    }
}

fn engine() -> Result<(Engine, EngineHandle)> {
    Ok(Engine::new(&config())?)
}

fn run_block(engine: &mut Engine, value: f32) -> Result<Vec<f32>> {
    let input = vec![value; BLOCK_SIZE * 2];
    let mut output = vec![0.0f32; BLOCK_SIZE * 2];
    engine.process(&input, &mut output)?;
    Ok(output)
}

#[test]
fn engine_processes_non_zero_signal() -> Result<()> {
    let (mut engine, _) = engine()?;

    let mut output = Vec::new();
    for _ in 0..10 {
        output = run_block(&mut engine, 0.5)?;
    }

    assert!(output.iter().any(|&x| x != 0.0), "expected non-zero output");
    assert!(output.iter().all(|x| x.is_finite()));
    Ok(())
}

#[test]
fn engine_rejects_mismatched_buffer_sizes() -> Result<()> {
    let (mut engine, _) = engine()?;

    let small_input = vec![0.5f32; BLOCK_SIZE];
    let mut small_output = vec![0.0f32; BLOCK_SIZE];
    assert!(
        engine.process(&small_input, &mut small_output).is_err(),
        "expected error when buffers are smaller than one block"
    );

    let input = vec![0.5f32; BLOCK_SIZE * 2];
    let mut large_output = vec![0.0f32; BLOCK_SIZE * 4];
    assert!(
        engine.process(&input, &mut large_output).is_err(),
        "expected error when output does not match input"
    );

    Ok(())
}

#[test]
fn engine_handles_block_size_change() -> Result<()> {
    let (mut engine, _) = engine()?;
    run_block(&mut engine, 0.5)?;

    engine.update_block_size(BLOCK_SIZE * 2)?;
    assert_eq!(engine.block_size(), BLOCK_SIZE * 2);

    let input = vec![0.5f32; BLOCK_SIZE * 4];
    let mut output = vec![0.0f32; BLOCK_SIZE * 4];
    engine.process(&input, &mut output)?;
    assert!(output.iter().any(|&x| x != 0.0));

    assert!(engine.update_block_size(0).is_err());
    Ok(())
}

#[test]
fn invalid_configuration_is_fatal() {
    let mut bad = config();
    bad.block_size = 0;
    assert!(matches!(Engine::new(&bad), Err(Error::FatalConfig(_))));

    let mut bad = config();
    bad.sample_rate = 3;
    assert!(matches!(Engine::new(&bad), Err(Error::FatalConfig(_))));

    let mut bad = config();
    bad.visualizer_window = 1000;
    assert!(matches!(Engine::new(&bad), Err(Error::FatalConfig(_))));
}

#[test]
fn commands_apply_at_next_block() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_compressor_enabled(false)?;
    let baseline = run_block(&mut engine, 0.5)?;

    handle.set_preamp(-6.0)?;
    assert_eq!(engine.graph().state().preamp_db, 0.0, "not applied before the block");

    let quieter = run_block(&mut engine, 0.5)?;
    assert_eq!(engine.graph().state().preamp_db, -6.0);

    let ratio = quieter[BLOCK_SIZE] / baseline[BLOCK_SIZE];
    assert!((ratio - 0.501).abs() < 0.01, "expected ~-6 dB, got ratio {ratio}");
    Ok(())
}

#[test]
fn balance_pans_hard_left() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_compressor_enabled(false)?;
    handle.set_balance(-1.0)?;

    let output = run_block(&mut engine, 0.25)?;
    for frame in output.chunks_exact(2).skip(8) {
        assert!((frame[0] - 0.25).abs() < 1e-3, "left {}", frame[0]);
        assert!(frame[1].abs() < 1e-6, "right {}", frame[1]);
    }
    Ok(())
}

#[test]
fn bypass_round_trip_preserves_parameters() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_preamp(4.0)?;
    handle.set_eq_band(3, -5.0)?;
    handle.set_bass_shelf(true, 9.0)?;
    handle.set_presence(2.5)?;
    handle.set_balance(0.3)?;
    handle.set_reverb(true, 0.4, 2.5)?;
    run_block(&mut engine, 0.1)?;
    let before = engine.graph().state();
    assert_eq!(&before, handle.params());

    handle.set_bypass(true)?;
    let bypassed = run_block(&mut engine, 0.1)?;
    assert!(bypassed.iter().all(|&x| x == 0.1), "bypass must pass input through");
    assert!(engine.graph().state().bypass);

    handle.set_bypass(false)?;
    run_block(&mut engine, 0.1)?;
    assert_eq!(engine.graph().state(), before);
    Ok(())
}

#[test]
fn compressor_toggle_preserves_settings() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    let custom = DynamicsParams {
        enabled: true,
        threshold_db: -18.0,
        ratio: 6.0,
        attack_secs: 0.01,
        release_secs: 0.4,
    };
    handle.set_compressor(custom)?;
    handle.set_compressor_enabled(false)?;
    run_block(&mut engine, 0.5)?;
    assert!(!engine.graph().state().dynamics.enabled);

    handle.set_compressor_enabled(true)?;
    run_block(&mut engine, 0.5)?;
    assert_eq!(engine.graph().state().dynamics, custom);
    assert_eq!(handle.params().dynamics, custom);
    Ok(())
}

#[test]
fn out_of_range_values_are_clamped_and_nan_ignored() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_eq_band(0, 30.0)?;
    handle.set_preamp(-100.0)?;
    handle.set_balance(f32::NAN)?;
    handle.set_eq_band(42, 1.0)?;
    run_block(&mut engine, 0.0)?;

    let state = engine.graph().state();
    assert_eq!(state.eq_gains[0], 12.0);
    assert_eq!(state.preamp_db, -24.0);
    assert_eq!(state.balance.pan, 0.0);
    Ok(())
}

#[test]
fn unknown_curve_falls_back_to_flat() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.apply_curve("bass")?;
    run_block(&mut engine, 0.0)?;
    assert_eq!(engine.graph().equalizer().gains(), EqCurve::Bass.gains());

    handle.apply_curve("cathedral")?;
    run_block(&mut engine, 0.0)?;
    assert_eq!(engine.graph().equalizer().gains(), [0.0; 10]);
    Ok(())
}

#[test]
fn reverb_decay_change_swaps_kernel() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_reverb(true, 0.5, 0.3)?;
    let output = run_block(&mut engine, 0.2)?;

    let reverb = engine.graph().reverb();
    assert_eq!(reverb.kernel().impulse().decay_secs(), 0.3);
    assert_eq!(reverb.kernel().impulse().len(), 14_400);
    assert_eq!(reverb.wet_gain(), 0.5);
    assert!(output.iter().all(|x| x.is_finite()));
    Ok(())
}

#[test]
fn reset_restores_defaults() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.apply_eq_curve(EqCurve::Loudness)?;
    handle.set_trim(-3.0)?;
    handle.set_reverb(true, 0.9, 1.0)?;
    handle.set_compressor_enabled(false)?;
    handle.set_bypass(true)?;
    run_block(&mut engine, 0.1)?;

    handle.reset()?;
    run_block(&mut engine, 0.1)?;

    assert_eq!(handle.params(), &ParameterState::default());
    assert_eq!(engine.graph().state(), ParameterState::default());
    Ok(())
}

#[test]
fn full_queue_rejects_command_without_touching_state() -> Result<()> {
    let mut cfg = config();
    cfg.queue_capacity = 1;
    let (mut engine, mut handle) = Engine::new(&cfg)?;

    handle.set_trim(-2.0)?;
    assert_eq!(handle.set_trim(-8.0), Err(Error::QueueFull));
    assert_eq!(handle.params().trim_db, -2.0);

    run_block(&mut engine, 0.0)?;
    assert_eq!(engine.graph().state().trim_db, -2.0);
    handle.set_trim(-8.0)?;
    Ok(())
}

#[test]
fn dropped_engine_disconnects_handle() -> Result<()> {
    let (engine, mut handle) = engine()?;
    drop(engine);
    assert_eq!(handle.set_preamp(1.0), Err(Error::Disconnected));
    assert_eq!(handle.params().preamp_db, 0.0);
    Ok(())
}

#[test]
fn visualizer_tracks_processed_output() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_compressor_enabled(false)?;
    handle.set_trim(-6.0)?;

    assert_eq!(handle.visualizer().snapshot().sequence, 0);
    let output = run_block(&mut engine, 0.4)?;

    let snapshot = handle.visualizer().snapshot();
    assert_eq!(snapshot.sequence, 1);
    assert_eq!(snapshot.samples.len(), handle.visualizer().window());

    let newest = snapshot.samples[snapshot.samples.len() - 1];
    let last_out = output[output.len() - 1];
    assert!((newest - last_out).abs() < 1e-6);

    let bytes = handle.visualizer().byte_time_domain();
    assert_eq!(bytes[0], 128, "untouched history is silence");
    Ok(())
}
