// Enable pedantic lints globally, then allow the noisy ones we're not fixing.
#![warn(clippy::pedantic, clippy::nursery)]
// --- Intentionally allowed ---
// Adding #[must_use] to every accessor is noise
#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]
// Filter variable names (b0/b1, a1/a2, etc.) are intentionally similar
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
// Audio code performs intentional casts
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
// Style/pedantic lints that add noise without value here
#![allow(
    clippy::module_name_repetitions,
    clippy::items_after_statements,
    clippy::option_if_let_else,
    clippy::doc_markdown,
    clippy::float_cmp,
    clippy::match_same_arms,
    clippy::struct_field_names,
    clippy::needless_pass_by_value,
    clippy::unnecessary_wraps,
    clippy::trivially_copy_pass_by_ref
)]
#![allow(clippy::redundant_pub_crate, clippy::significant_drop_tightening)]

pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ir;
pub mod params;
pub mod preset;
pub mod settings;
pub mod visualizer;

pub use engine::{Engine, EngineConfig, EngineHandle, EngineMessage};
pub use error::{Error, Result};
pub use graph::{CompressorMode, Routing, SignalGraph, Topology};
pub use params::ParameterState;
pub use preset::{EqCurve, Preset};
