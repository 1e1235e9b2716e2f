use thiserror::Error;

/// Conditions that abort a bake before anything is written back
#[derive(Debug, Error)]
pub enum BakeError {
    #[error("mission has no render params")]
    MissingRenderParams,

    #[error("mission has no lightmap params")]
    MissingLightmapParams,

    #[error("mission has no world geometry")]
    MissingWorld,

    #[error("cell {cell}: {reason}")]
    InvalidCell { cell: usize, reason: String },
}
