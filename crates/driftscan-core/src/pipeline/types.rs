use crate::field::DisplacementField;
use crate::raster::RasterGrid;

/// The five pipeline stages, in dependency order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    OrbitCorrect,
    Coregister,
    Subset,
    OffsetTrack,
    TerrainCorrect,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [
        Self::OrbitCorrect,
        Self::Coregister,
        Self::Subset,
        Self::OffsetTrack,
        Self::TerrainCorrect,
    ];

    /// Stable identifier used in artifact file names.
    pub fn id(&self) -> &'static str {
        match self {
            Self::OrbitCorrect => "orbit",
            Self::Coregister => "coreg",
            Self::Subset => "subset",
            Self::OffsetTrack => "tracking",
            Self::TerrainCorrect => "terrain",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrbitCorrect => write!(f, "orbit correction"),
            Self::Coregister => write!(f, "coregistration"),
            Self::Subset => write!(f, "subsetting"),
            Self::OffsetTrack => write!(f, "offset tracking"),
            Self::TerrainCorrect => write!(f, "terrain correction"),
        }
    }
}

/// Master/slave scene pair; role order is load-bearing, master first.
#[derive(Clone, Debug)]
pub struct ScenePair {
    pub master: RasterGrid,
    pub slave: RasterGrid,
}

impl ScenePair {
    pub fn new(master: RasterGrid, slave: RasterGrid) -> Self {
        Self { master, slave }
    }
}

/// Payload of a persisted stage artifact.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Product {
    Scene(RasterGrid),
    Stack(ScenePair),
    Field(DisplacementField),
}

impl Product {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scene(_) => "scene",
            Self::Stack(_) => "stack",
            Self::Field(_) => "field",
        }
    }
}

/// A stage output: produced once, persisted, immutable thereafter.
#[derive(Clone, Debug)]
pub struct StageArtifact {
    pub stage: StageKind,
    pub name: String,
    pub product: Product,
}

/// Orchestrator state; transitions are strictly linear and any failure is
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running(StageKind),
    Succeeded(StageKind),
    Failed(StageKind),
}

/// Structured pipeline event stream.
///
/// Implementors can drive progress bars or logging; all methods default to
/// no-ops.
pub trait PipelineObserver: Send + Sync {
    /// A stage has started running.
    fn stage_started(&self, _stage: StageKind) {}

    /// A stage finished and its artifact was persisted.
    fn stage_succeeded(&self, _stage: StageKind, _artifact: &str) {}

    /// A stage failed; the pipeline halts after this event.
    fn stage_failed(&self, _stage: StageKind, _error: &str) {}
}

/// Observer used when the caller does not care about events.
pub struct NoOpObserver;
impl PipelineObserver for NoOpObserver {}
