use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::coregister::{CoregistrationService, XcorrCoregistration};
use crate::error::{DriftscanError, Result};
use crate::geo::GeoRegion;
use crate::io::ProductStore;
use crate::orbit::{OrbitService, ResidualOrbit};
use crate::raster::RasterGrid;
use crate::subset::subset;
use crate::terrain::{GroundProjection, TerrainCorrectionService};
use crate::track::OffsetTracker;

use super::config::PipelineConfig;
use super::types::{NoOpObserver, PipelineObserver, PipelineState, Product, StageKind};

/// Outcome of a completed pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    /// Persisted artifacts in production order.
    pub artifacts: Vec<(StageKind, PathBuf)>,
    /// The terrain-corrected velocity product.
    pub final_product: PathBuf,
}

/// Runs the five stages in strict dependency order.
///
/// Each stage consumes the preceding stage's product plus config and its
/// artifact is persisted before the next stage starts, so a partial run
/// leaves inspectable intermediate state. A stage failure is terminal: no
/// later stage runs and the error carries the failing stage's name. There
/// are no automatic retries; a caller restarts the whole run.
pub struct StageOrchestrator {
    config: PipelineConfig,
    region: GeoRegion,
    orbit: Box<dyn OrbitService>,
    coregistration: Box<dyn CoregistrationService>,
    terrain: Box<dyn TerrainCorrectionService>,
    store: ProductStore,
    observer: Arc<dyn PipelineObserver>,
    state: PipelineState,
    artifacts: Vec<(StageKind, PathBuf)>,
}

impl StageOrchestrator {
    /// Orchestrator with the stock stage services.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_services(
            config,
            Box::new(ResidualOrbit::new((0.0, 0.0))),
            Box::new(XcorrCoregistration::new()),
            Box::new(GroundProjection::new()),
        )
    }

    /// Orchestrator with caller-supplied stage services; every external
    /// stage is substitutable behind its trait for testing.
    pub fn with_services(
        config: PipelineConfig,
        orbit: Box<dyn OrbitService>,
        coregistration: Box<dyn CoregistrationService>,
        terrain: Box<dyn TerrainCorrectionService>,
    ) -> Result<Self> {
        config.validate()?;
        let region = GeoRegion::from_wkt(&config.region)?;
        Ok(Self {
            config,
            region,
            orbit,
            coregistration,
            terrain,
            store: ProductStore::new(),
            observer: Arc::new(NoOpObserver),
            state: PipelineState::Pending,
            artifacts: Vec::new(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Paths of every artifact persisted so far, in production order.
    pub fn artifacts(&self) -> &[(StageKind, PathBuf)] {
        &self.artifacts
    }

    pub fn run(&mut self) -> Result<PipelineOutcome> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        info!(run_id = %self.config.run_id, "pipeline run starting");

        let master = self.store.read_scene(&self.config.master)?;
        let slave = self.store.read_scene(&self.config.slave)?;

        // Orbit refinement applies per scene, one artifact each.
        self.begin(StageKind::OrbitCorrect);
        let refine = |scene: &RasterGrid| {
            if self.config.orbit.apply {
                self.orbit.apply(scene)
            } else {
                Ok(scene.clone())
            }
        };
        let refined = refine(&master).and_then(|m| refine(&slave).map(|s| (m, s)));
        let (master, slave) = match refined {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(StageKind::OrbitCorrect, e)),
        };
        self.persist(
            StageKind::OrbitCorrect,
            Some("master"),
            Product::Scene(master.clone()),
        )?;
        self.persist(
            StageKind::OrbitCorrect,
            Some("slave"),
            Product::Scene(slave.clone()),
        )?;
        self.succeed(StageKind::OrbitCorrect);

        // Coregistration takes exactly two inputs, master role first; the
        // downstream offset sign depends on that order.
        self.begin(StageKind::Coregister);
        let pair = match self
            .coregistration
            .align(&master, &slave, &self.config.coregistration)
        {
            Ok(pair) => pair,
            Err(e) => return Err(self.fail(StageKind::Coregister, e)),
        };
        self.persist(StageKind::Coregister, None, Product::Stack(pair.clone()))?;
        self.succeed(StageKind::Coregister);

        self.begin(StageKind::Subset);
        let clipped = match subset(&pair, &self.region, self.config.subset.copy_metadata) {
            Ok(clipped) => clipped,
            Err(e) => return Err(self.fail(StageKind::Subset, e)),
        };
        self.persist(StageKind::Subset, None, Product::Stack(clipped.clone()))?;
        self.succeed(StageKind::Subset);

        self.begin(StageKind::OffsetTrack);
        let tracked = OffsetTracker::new(&self.config.tracking)
            .and_then(|tracker| tracker.track(&clipped.master, &clipped.slave));
        let field = match tracked {
            Ok(field) => field,
            Err(e) => return Err(self.fail(StageKind::OffsetTrack, e)),
        };
        self.persist(StageKind::OffsetTrack, None, Product::Field(field.clone()))?;
        self.succeed(StageKind::OffsetTrack);

        self.begin(StageKind::TerrainCorrect);
        let corrected = match self.terrain.correct(&field, &self.config.terrain) {
            Ok(raster) => raster,
            Err(e) => return Err(self.fail(StageKind::TerrainCorrect, e)),
        };
        let final_product =
            self.persist(StageKind::TerrainCorrect, None, Product::Scene(corrected))?;
        self.succeed(StageKind::TerrainCorrect);

        info!(
            artifacts = self.artifacts.len(),
            final_product = %final_product.display(),
            "pipeline run complete"
        );
        Ok(PipelineOutcome {
            artifacts: self.artifacts.clone(),
            final_product,
        })
    }

    fn begin(&mut self, stage: StageKind) {
        self.state = PipelineState::Running(stage);
        self.observer.stage_started(stage);
        info!(stage = %stage, "stage started");
    }

    fn succeed(&mut self, stage: StageKind) {
        self.state = PipelineState::Succeeded(stage);
    }

    /// Persist a stage product under its deterministic artifact name.
    /// A write failure fails the stage like any other stage error.
    fn persist(
        &mut self,
        stage: StageKind,
        role: Option<&str>,
        product: Product,
    ) -> Result<PathBuf> {
        let name = match role {
            Some(role) => format!("{}_{}_{}", self.config.run_id, stage.id(), role),
            None => format!("{}_{}", self.config.run_id, stage.id()),
        };
        let path = self.config.output_dir.join(format!("{}.dsp", name));
        if let Err(e) = self.store.write(&product, &path) {
            return Err(self.fail(stage, e));
        }
        self.artifacts.push((stage, path.clone()));
        self.observer.stage_succeeded(stage, &name);
        info!(stage = %stage, artifact = %path.display(), "artifact persisted");
        Ok(path)
    }

    fn fail(&mut self, stage: StageKind, source: DriftscanError) -> DriftscanError {
        self.state = PipelineState::Failed(stage);
        self.observer.stage_failed(stage, &source.to_string());
        error!(stage = %stage, cause = %source, "stage failed");
        DriftscanError::Stage {
            stage,
            source: Box::new(source),
        }
    }
}
