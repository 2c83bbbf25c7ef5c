pub mod source_params;
pub mod world_desc;

pub use source_params::{GlobalDefaults, ParamValue, SourceParams};
pub use world_desc::{AuralisWorldDesc, SampleRate};
