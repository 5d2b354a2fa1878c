use anyhow::Result;
use rusteq::engine::{Engine, EngineConfig, EngineHandle};
use rusteq::error::Error;
use rusteq::preset::{EqCurve, Manager, Preset, StoredPreset};
use tempfile::TempDir;

const BLOCK_SIZE: usize = 64;

fn engine() -> Result<(Engine, EngineHandle)> {
    let config = EngineConfig {
        sample_rate: 48_000,
        block_size: BLOCK_SIZE,
        smoothing_ms: 0.0,
        visualizer_window: 256,
        reverb_seed: Some(9),
        queue_capacity: 16,
    };
    Ok(Engine::new(&config)?)
}

fn tick(engine: &mut Engine) -> Result<()> {
    let input = vec![0.0f32; BLOCK_SIZE * 2];
    let mut output = vec![0.0f32; BLOCK_SIZE * 2];
    engine.process(&input, &mut output)
}

#[test]
fn save_then_load_restores_tonal_balance() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    for (band, db) in [(0, 3.5), (4, -2.0), (9, 11.0)] {
        handle.set_eq_band(band, db)?;
    }
    handle.set_preamp(5.0)?;
    handle.set_trim(-7.5)?;
    tick(&mut engine)?;

    let json = handle.save_preset().to_json()?;

    handle.reset()?;
    tick(&mut engine)?;
    assert_eq!(engine.graph().equalizer().gains(), [0.0; 10]);

    handle.load_preset_json(&json)?;
    tick(&mut engine)?;

    let state = engine.graph().state();
    assert_eq!(state.eq_gains, [3.5, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0, 0.0, 11.0]);
    assert_eq!(state.preamp_db, 5.0);
    assert_eq!(state.trim_db, -7.5);
    assert_eq!(handle.save_preset(), Preset::capture(&state));
    Ok(())
}

#[test]
fn wrong_length_preset_changes_nothing() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.apply_eq_curve(EqCurve::VShape)?;
    handle.set_preamp(2.0)?;
    tick(&mut engine)?;
    let before = engine.graph().state();

    let result = handle.load_preset_json(r#"{"eq":[1,2,3],"preamp":-10}"#);
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
    tick(&mut engine)?;

    assert_eq!(engine.graph().state(), before);
    assert_eq!(handle.params(), &before);
    Ok(())
}

#[test]
fn nan_band_in_typed_preset_changes_nothing() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_eq_band(0, 5.0)?;
    tick(&mut engine)?;
    let before = engine.graph().state();

    let mut eq = [1.0; 10];
    eq[0] = f32::NAN;
    let result = handle.load_preset(&Preset {
        eq,
        preamp: 2.0,
        trim: 0.0,
    });
    assert!(matches!(result, Err(Error::InvalidFormat(_))));
    tick(&mut engine)?;

    assert_eq!(engine.graph().state(), before);
    assert_eq!(handle.params(), &before);
    assert_eq!(engine.graph().equalizer().band_gain(0), Some(5.0));
    Ok(())
}

#[test]
fn absent_gain_fields_keep_current_values() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    handle.set_preamp(6.0)?;
    handle.set_trim(-1.0)?;

    handle.load_preset_json(r#"{"eq":[1,1,1,1,1,1,1,1,1,1]}"#)?;
    tick(&mut engine)?;

    let state = engine.graph().state();
    assert_eq!(state.eq_gains, [1.0; 10]);
    assert_eq!(state.preamp_db, 6.0);
    assert_eq!(state.trim_db, -1.0);
    Ok(())
}

#[test]
fn every_named_curve_applies_exactly() -> Result<()> {
    let (mut engine, mut handle) = engine()?;
    for curve in EqCurve::ALL {
        handle.apply_curve(curve.name())?;
        tick(&mut engine)?;
        assert_eq!(engine.graph().equalizer().gains(), curve.gains(), "{curve}");
    }

    handle.apply_curve("vocal")?;
    tick(&mut engine)?;
    let eq = engine.graph().equalizer();
    assert_eq!(eq.band_gain(0), Some(-3.0));
    assert_eq!(eq.band_gain(4), Some(2.0));
    Ok(())
}

#[test]
fn stored_preset_loads_into_engine() -> Result<()> {
    let dir = TempDir::new()?;
    let mut manager = Manager::new(dir.path())?;
    let preset = Preset {
        preamp: -3.0,
        trim: 1.0,
        ..Preset::from_curve(EqCurve::Treble)
    };
    manager.save_preset(&StoredPreset::new("Bright", preset))?;

    let (mut engine, mut handle) = engine()?;
    let stored = manager
        .get_preset_by_name("Bright")
        .expect("preset should be listed");
    handle.load_preset(&stored.preset)?;
    tick(&mut engine)?;

    assert_eq!(Preset::capture(&engine.graph().state()), preset);
    Ok(())
}
