use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::entities::{Layer, LayerSnapshot, Model, skirt_radius};
use crate::io::export::{MeshExport, export_mesh, layer_bit_views};
use crate::io::ext_repr::ExtMesh;
use crate::io::import::import_mesh;
use crate::pipeline::{
    CompletionTracker, EventBus, EventPayload, Exporter, MeshError, MeshMessage, MeshState,
    ModelLoader, OptimizationReport, Scheduler, Slicer,
};
use crate::strategy::{OptimizeOutcome, PatternStrategy};
use crate::util::{CraftConfig, ExecutorConfig, lock};

/// Aggregate root: the stack of layers of a sliced model and the operations running on them.
///
/// Importing and slicing run on the caller's thread.
/// Paving, optimizing, scheduling and exporting are submitted to a worker pool and return immediately,
/// their progress and completion are published on [`Mesh::events`].
/// Only one operation runs at a time, starting another one fails with [`MeshError::Busy`].
pub struct Mesh {
    config: CraftConfig,
    pool: Arc<ThreadPool>,
    shared: Shared,
    model: Option<Model>,
    layers: Vec<Arc<Mutex<Layer>>>,
    skirt_radius: f64,
    strategy: Mutex<Option<Box<dyn PatternStrategy>>>,
    optimization: Arc<Mutex<Option<Arc<OptimizationReport>>>>,
}

impl Mesh {
    /// Creates an empty mesh with its own worker pool
    pub fn new(config: CraftConfig, executor: ExecutorConfig) -> Result<Self, MeshError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(executor.n_workers)
            .thread_name(|i| format!("paver-{i}"))
            .build()?;
        Ok(Mesh::with_pool(config, Arc::new(pool)))
    }

    /// Creates an empty mesh submitting its tasks to `pool`
    pub fn with_pool(config: CraftConfig, pool: Arc<ThreadPool>) -> Self {
        Self {
            config,
            pool,
            shared: Shared::new(),
            model: None,
            layers: vec![],
            skirt_radius: 0.0,
            strategy: Mutex::new(None),
            optimization: Arc::new(Mutex::new(None)),
        }
    }

    /// Reopens a persisted mesh
    pub fn open(
        ext_mesh: &ExtMesh,
        config: CraftConfig,
        executor: ExecutorConfig,
    ) -> Result<Self, MeshError> {
        let (layers, skirt_radius) = import_mesh(ext_mesh, config)?;
        let mut mesh = Mesh::new(config, executor)?;
        mesh.layers = layers
            .into_iter()
            .map(|l| Arc::new(Mutex::new(l)))
            .collect_vec();
        mesh.skirt_radius = skirt_radius;
        mesh.shared.finish(MeshState::Opened, EventPayload::None);
        Ok(mesh)
    }

    /// Loads the model. Layers of a previous model are discarded.
    pub fn import(&mut self, loader: &dyn ModelLoader) -> Result<(), MeshError> {
        self.shared.begin(MeshState::Importing)?;
        self.layers.clear();
        self.skirt_radius = 0.0;
        match loader.load() {
            Ok(model) => {
                info!(
                    "[MESH] imported model {:?} with {} triangles",
                    model.name,
                    model.triangles.len()
                );
                self.model = Some(model);
                self.shared.finish(MeshState::Imported, EventPayload::None);
                Ok(())
            }
            Err(e) => {
                self.model = None;
                self.shared.fail(MeshState::ImportFailed, &e);
                Err(e.into())
            }
        }
    }

    /// Cuts the model into layers, one per slice
    pub fn slice(&mut self, slicer: &dyn Slicer) -> Result<(), MeshError> {
        self.ensure_idle()?;
        let Some(model) = self.model.as_ref() else {
            return Err(MeshError::MissingPrerequisite {
                required: MeshState::Imported,
                current: self.state(),
            });
        };
        self.shared.begin(MeshState::Slicing)?;
        self.layers.clear();

        let slices = slicer.slice(model, &self.config).and_then(|slices| {
            match slices.is_empty() {
                true => Err(anyhow!("slicer produced no layer")),
                false => Ok(slices),
            }
        });
        match slices {
            Ok(slices) => {
                self.skirt_radius = skirt_radius(&slices);
                self.layers = slices
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| Arc::new(Mutex::new(Layer::new(i, s, self.config))))
                    .collect_vec();
                info!(
                    "[MESH] sliced into {} layers, skirt radius {:.3}",
                    self.layers.len(),
                    self.skirt_radius
                );
                self.shared.finish(MeshState::Sliced, EventPayload::None);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(MeshState::SliceFailed, &e);
                Err(e.into())
            }
        }
    }

    /// Paves every layer with `strategy`.
    ///
    /// Interdependent strategies pave the layers one after the other, in index order.
    /// Otherwise every layer gets its own copy of the strategy and layers are paved in parallel.
    /// [`MeshState::PavedMesh`] is published once, after all [`MeshState::PavedLayer`] events.
    /// If any layer fails, all layers are restored and the mesh ends up in [`MeshState::PaveFailed`].
    pub fn pave(&self, mut strategy: Box<dyn PatternStrategy>) -> Result<(), MeshError> {
        self.ensure_idle()?;
        self.require_layers()?;
        let previous = self.shared.begin(MeshState::PavingMesh)?;
        if let Err(e) = strategy.ready(self) {
            self.shared.fail(MeshState::PaveFailed, &e);
            return Err(e.into());
        }
        info!(
            "[MESH] paving {} layers with {} ({})",
            self.layers.len(),
            strategy.common_name(),
            match strategy.is_interdependent() {
                true => "sequential",
                false => "parallel",
            }
        );
        *lock(&self.strategy) = Some(strategy.clone_box());

        let run = Arc::new(LayerRun::new(
            self.shared.clone(),
            self.layers.clone(),
            previous,
            MeshState::PaveFailed,
        ));
        let conclude = |run: &LayerRun| run.conclude(|_| (MeshState::PavedMesh, EventPayload::None));

        match strategy.is_interdependent() {
            true => {
                self.pool.spawn(move || {
                    for position in 0..run.len() {
                        let finished = run.execute(position, |layer| {
                            pave_task(layer, strategy.as_mut()).map(Some)
                        });
                        if finished {
                            conclude(&run);
                        }
                    }
                });
            }
            false => {
                for position in 0..run.len() {
                    let run = run.clone();
                    let mut strategy = strategy.clone_box();
                    self.pool.spawn(move || {
                        let finished = run.execute(position, |layer| {
                            pave_task(layer, strategy.as_mut()).map(Some)
                        });
                        if finished {
                            conclude(&run);
                        }
                    });
                }
            }
        }
        Ok(())
    }

    /// Paves the layer at `index` with `strategy`
    pub fn pave_layer(
        &self,
        index: usize,
        mut strategy: Box<dyn PatternStrategy>,
    ) -> Result<(), MeshError> {
        self.ensure_idle()?;
        let layer = self.layer_arc(index)?;
        let previous = self.shared.begin(MeshState::PavingLayer)?;
        if let Err(e) = strategy.ready(self) {
            self.shared.fail(MeshState::PaveFailed, &e);
            return Err(e.into());
        }
        *lock(&self.strategy) = Some(strategy.clone_box());

        let run = LayerRun::new(
            self.shared.clone(),
            vec![layer],
            previous,
            MeshState::PaveFailed,
        );
        self.pool.spawn(move || {
            let finished = run.execute(0, |layer| pave_task(layer, strategy.as_mut()).map(|_| None));
            if finished {
                run.conclude(|run| {
                    let snapshot = run.snapshot(0);
                    let payload = EventPayload::Layer {
                        index: snapshot.index,
                        snapshot: Arc::new(snapshot),
                    };
                    (MeshState::PavedLayer, payload)
                });
            }
        });
        Ok(())
    }

    /// Lets the strategy given to the last pave repair the irregular bits of every layer, in parallel.
    /// The aggregated [`OptimizationReport`] is published with [`MeshState::OptimizedMesh`].
    pub fn optimize(&self) -> Result<(), MeshError> {
        self.ensure_idle()?;
        self.require_paved()?;
        let strategy = self.paving_strategy()?;
        let previous = self.shared.begin(MeshState::OptimizingMesh)?;
        info!(
            "[OPT] optimizing {} layers with {}",
            self.layers.len(),
            strategy.common_name()
        );

        let run = Arc::new(LayerRun::new(
            self.shared.clone(),
            self.layers.clone(),
            previous,
            previous,
        ));
        let outcomes = Arc::new(Mutex::new(vec![]));
        for position in 0..run.len() {
            let run = run.clone();
            let outcomes = outcomes.clone();
            let report_slot = self.optimization.clone();
            let mut strategy = strategy.clone_box();
            self.pool.spawn(move || {
                let finished = run.execute(position, |layer| {
                    let outcome = optimize_task(layer, strategy.as_mut());
                    lock(&outcomes).push((layer.index(), outcome));
                    Ok(Some(MeshMessage {
                        state: MeshState::OptimizedLayer,
                        payload: EventPayload::LayerOptimized {
                            index: layer.index(),
                            outcome,
                        },
                    }))
                });
                if finished {
                    run.conclude(|_| {
                        let report = Arc::new(OptimizationReport::new(lock(&outcomes).drain(..)));
                        info!("[OPT] {}", report.summary());
                        *lock(&report_slot) = Some(report.clone());
                        (MeshState::OptimizedMesh, EventPayload::Optimization(report))
                    });
                }
            });
        }
        Ok(())
    }

    /// Lets the strategy given to the last pave repair the irregular bits of the layer at `index`
    pub fn optimize_layer(&self, index: usize) -> Result<(), MeshError> {
        self.ensure_idle()?;
        let layer = self.layer_arc(index)?;
        if !lock(&layer).is_paved() {
            return Err(MeshError::MissingPrerequisite {
                required: MeshState::PavedLayer,
                current: self.state(),
            });
        }
        let mut strategy = self.paving_strategy()?;
        let previous = self.shared.begin(MeshState::OptimizingLayer)?;

        let run = LayerRun::new(self.shared.clone(), vec![layer], previous, previous);
        let outcome = Mutex::new(None);
        self.pool.spawn(move || {
            let finished = run.execute(0, |layer| {
                *lock(&outcome) = Some(optimize_task(layer, strategy.as_mut()));
                Ok(None)
            });
            if finished {
                run.conclude(|run| {
                    let outcome = (*lock(&outcome)).unwrap_or(OptimizeOutcome::Failed);
                    let index = run.snapshot(0).index;
                    (
                        MeshState::OptimizedLayer,
                        EventPayload::LayerOptimized { index, outcome },
                    )
                });
            }
        });
        Ok(())
    }

    /// Assigns the production order computed by `scheduler` to the bits of the mesh
    pub fn schedule(&self, scheduler: Arc<dyn Scheduler>) -> Result<(), MeshError> {
        self.ensure_idle()?;
        self.require_paved()?;
        let previous = self.shared.begin(MeshState::Scheduling)?;
        let shared = self.shared.clone();
        let layers = self.layers.clone();
        self.pool.spawn(move || {
            if shared.is_cancelled() {
                shared.finish(previous, EventPayload::Cancelled);
                return;
            }
            let snapshots = layers.iter().map(|l| lock(l).save()).collect_vec();
            match scheduler.schedule(&snapshots) {
                Ok(scheduled) => {
                    let mut n_assigned = 0;
                    for s in &scheduled {
                        let Some(layer) = layers.get(s.layer) else {
                            warn!("[MESH] scheduled bit in unknown layer {}", s.layer);
                            continue;
                        };
                        match lock(layer).bit3d_mut(&s.key) {
                            Some(bit3d) => {
                                bit3d.set_assignment(Some(s.assignment));
                                n_assigned += 1;
                            }
                            None => warn!(
                                "[MESH] scheduled bit {} not found in layer {}",
                                s.key, s.layer
                            ),
                        }
                    }
                    info!("[MESH] scheduled {n_assigned} bits");
                    shared.finish(MeshState::Scheduled, EventPayload::None);
                }
                Err(e) => shared.fail(MeshState::ScheduleFailed, &e),
            }
        });
        Ok(())
    }

    /// Hands the read-only views of every bit to `exporter`
    pub fn export(&self, exporter: Arc<dyn Exporter>) -> Result<(), MeshError> {
        self.ensure_idle()?;
        self.require_paved()?;
        let previous = self.shared.begin(MeshState::Exporting)?;
        let shared = self.shared.clone();
        let layers = self.layers.clone();
        let skirt_radius = self.skirt_radius;
        let report = self.optimization.clone();
        self.pool.spawn(move || {
            if shared.is_cancelled() {
                shared.finish(previous, EventPayload::Cancelled);
                return;
            }
            let export = {
                let guards = layers.iter().map(|l| lock(l)).collect_vec();
                MeshExport {
                    mesh: export_mesh(guards.iter().map(|g| &**g), skirt_radius),
                    bits: guards.iter().flat_map(|g| layer_bit_views(g)).collect_vec(),
                    optimization: lock(&report).as_deref().cloned(),
                }
            };
            match exporter.export(&export) {
                Ok(()) => {
                    info!("[MESH] exported {} bits", export.bits.len());
                    shared.finish(MeshState::Exported, EventPayload::None);
                }
                Err(e) => shared.fail(MeshState::ExportFailed, &e),
            }
        });
        Ok(())
    }

    /// Persistable copy of the mesh
    pub fn save(&self) -> Result<ExtMesh, MeshError> {
        self.ensure_idle()?;
        let guards = self.layers.iter().map(|l| lock(l)).collect_vec();
        let ext_mesh = export_mesh(guards.iter().map(|g| &**g), self.skirt_radius);
        self.shared.notify(MeshMessage {
            state: MeshState::Saved,
            payload: EventPayload::None,
        });
        Ok(ext_mesh)
    }

    /// Requests the running operation to stop.
    /// Layers not started yet are skipped, and the mesh returns to the state it was in before the operation.
    pub fn cancel(&self) {
        if self.state().is_working() {
            info!("[MESH] cancellation requested");
            self.shared.cancelled.store(true, Ordering::SeqCst);
        }
    }

    pub fn state(&self) -> MeshState {
        *lock(&self.shared.state)
    }

    pub fn layers(&self) -> &[Arc<Mutex<Layer>>] {
        &self.layers
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Snapshot of the layer at `index`. Blocks while a task is working on that layer.
    pub fn layer_snapshot(&self, index: usize) -> Result<LayerSnapshot, MeshError> {
        let layer = self.layer_arc(index)?;
        let snapshot = lock(&layer).save();
        Ok(snapshot)
    }

    /// Runs `f` on the layer at `index`, as long as no operation is running.
    /// `f` must not call back into the mesh.
    pub fn with_layer_mut<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut Layer) -> R,
    ) -> Result<R, MeshError> {
        let layer = self.layer_arc(index)?;
        // holding the state lock keeps operations from starting meanwhile
        let state = lock(&self.shared.state);
        if state.is_working() {
            return Err(MeshError::Busy { state: *state });
        }
        let result = f(&mut lock(&layer));
        Ok(result)
    }

    /// Total number of irregular bits over all layers
    pub fn count_irregularities(&self) -> usize {
        self.layers
            .iter()
            .map(|l| lock(l).count_irregularities())
            .sum()
    }

    pub fn skirt_radius(&self) -> f64 {
        self.skirt_radius
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn config(&self) -> &CraftConfig {
        &self.config
    }

    /// Report of the last completed mesh optimization
    pub fn optimization_report(&self) -> Option<Arc<OptimizationReport>> {
        lock(&self.optimization).clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    fn ensure_idle(&self) -> Result<(), MeshError> {
        match self.state() {
            state if state.is_working() => Err(MeshError::Busy { state }),
            _ => Ok(()),
        }
    }

    fn require_layers(&self) -> Result<(), MeshError> {
        match self.layers.is_empty() {
            true => Err(MeshError::MissingPrerequisite {
                required: MeshState::Sliced,
                current: self.state(),
            }),
            false => Ok(()),
        }
    }

    fn require_paved(&self) -> Result<(), MeshError> {
        self.require_layers()?;
        match self.layers.iter().all(|l| lock(l).is_paved()) {
            true => Ok(()),
            false => Err(MeshError::MissingPrerequisite {
                required: MeshState::PavedMesh,
                current: self.state(),
            }),
        }
    }

    fn paving_strategy(&self) -> Result<Box<dyn PatternStrategy>, MeshError> {
        lock(&self.strategy)
            .as_ref()
            .map(|s| s.clone_box())
            .ok_or(MeshError::MissingPrerequisite {
                required: MeshState::PavedMesh,
                current: self.state(),
            })
    }

    fn layer_arc(&self, index: usize) -> Result<Arc<Mutex<Layer>>, MeshError> {
        self.layers
            .get(index)
            .cloned()
            .ok_or(MeshError::LayerOutOfRange {
                index,
                n_layers: self.layers.len(),
            })
    }
}

fn pave_task(layer: &mut Layer, strategy: &mut dyn PatternStrategy) -> anyhow::Result<MeshMessage> {
    layer.start_paver(strategy)?;
    Ok(MeshMessage {
        state: MeshState::PavedLayer,
        payload: EventPayload::Layer {
            index: layer.index(),
            snapshot: Arc::new(layer.save()),
        },
    })
}

fn optimize_task(layer: &mut Layer, strategy: &mut dyn PatternStrategy) -> OptimizeOutcome {
    let before = layer.count_irregularities();
    let outcome = strategy.optimize(layer);
    match outcome {
        OptimizeOutcome::Failed => warn!("[OPT] layer {}: optimization failed", layer.index()),
        _ => debug!(
            "[OPT] layer {}: {before} irregular bits, {outcome}",
            layer.index()
        ),
    }
    outcome
}

/// State shared between the mesh and the tasks it submits
#[derive(Clone)]
struct Shared {
    state: Arc<Mutex<MeshState>>,
    events: Arc<EventBus>,
    cancelled: Arc<AtomicBool>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MeshState::Ready)),
            events: Arc::new(EventBus::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enters the working state `working`, returns the state the mesh was in
    fn begin(&self, working: MeshState) -> Result<MeshState, MeshError> {
        let previous = {
            let mut state = lock(&self.state);
            if state.is_working() {
                return Err(MeshError::Busy { state: *state });
            }
            std::mem::replace(&mut *state, working)
        };
        self.cancelled.store(false, Ordering::SeqCst);
        info!("[MESH] {previous} -> {working}");
        self.events.publish(MeshMessage {
            state: working,
            payload: EventPayload::None,
        });
        Ok(previous)
    }

    /// Enters the stable state `state` and publishes it
    fn finish(&self, state: MeshState, payload: EventPayload) {
        *lock(&self.state) = state;
        info!("[MESH] {state}");
        self.events.publish(MeshMessage { state, payload });
    }

    fn fail(&self, state: MeshState, error: &anyhow::Error) {
        warn!("[MESH] {state}: {error:#}");
        self.finish(
            state,
            EventPayload::Failure {
                reason: format!("{error:#}"),
            },
        );
    }

    /// Publishes a message without changing the state
    fn notify(&self, message: MeshMessage) {
        debug!("[MESH] {}", message.state);
        self.events.publish(message);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One operation running a task per layer
struct LayerRun {
    shared: Shared,
    layers: Vec<Arc<Mutex<Layer>>>,
    snapshots: Vec<LayerSnapshot>,
    previous: MeshState,
    failure: MeshState,
    tracker: CompletionTracker,
    errors: Mutex<Vec<String>>,
    skipped: AtomicBool,
}

impl LayerRun {
    fn new(
        shared: Shared,
        layers: Vec<Arc<Mutex<Layer>>>,
        previous: MeshState,
        failure: MeshState,
    ) -> Self {
        let snapshots = layers.iter().map(|l| lock(l).save()).collect_vec();
        Self {
            shared,
            tracker: CompletionTracker::new(layers.len()),
            layers,
            snapshots,
            previous,
            failure,
            errors: Mutex::new(vec![]),
            skipped: AtomicBool::new(false),
        }
    }

    fn len(&self) -> usize {
        self.layers.len()
    }

    /// Runs `task` on the layer at `position`, unless the operation was cancelled.
    /// Returns true if this was the last task of the operation.
    fn execute(
        &self,
        position: usize,
        task: impl FnOnce(&mut Layer) -> anyhow::Result<Option<MeshMessage>>,
    ) -> bool {
        match self.shared.is_cancelled() {
            true => self.skipped.store(true, Ordering::SeqCst),
            false => {
                let result = {
                    let mut layer = lock(&self.layers[position]);
                    task(&mut layer).map_err(|e| format!("layer {}: {e:#}", layer.index()))
                };
                match result {
                    Ok(Some(message)) => self.shared.notify(message),
                    Ok(None) => {}
                    Err(reason) => {
                        warn!("[MESH] {reason}");
                        lock(&self.errors).push(reason);
                    }
                }
            }
        }
        self.tracker.complete_one()
    }

    /// Publishes the outcome of the operation.
    /// Failed and cancelled operations restore every layer first.
    fn conclude(&self, success: impl FnOnce(&LayerRun) -> (MeshState, EventPayload)) {
        let errors = lock(&self.errors).drain(..).collect_vec();
        if !errors.is_empty() {
            self.rollback();
            self.shared.finish(
                self.failure,
                EventPayload::Failure {
                    reason: errors.join("; "),
                },
            );
        } else if self.skipped.load(Ordering::SeqCst) {
            self.rollback();
            self.shared.finish(self.previous, EventPayload::Cancelled);
        } else {
            let (state, payload) = success(self);
            self.shared.finish(state, payload);
        }
    }

    fn snapshot(&self, position: usize) -> LayerSnapshot {
        lock(&self.layers[position]).save()
    }

    fn rollback(&self) {
        for (layer, snapshot) in self.layers.iter().zip_eq(self.snapshots.iter()) {
            lock(layer).restore(snapshot);
        }
        debug!("[MESH] {} layers restored", self.layers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Condvar;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use anyhow::{Context, Result, bail};

    use crate::entities::{Bit, Pavement, Slice};
    use crate::geometry::Region;
    use crate::geometry::primitives::{Point, Rect};

    fn config() -> CraftConfig {
        CraftConfig {
            bit_length: 20.0,
            bit_width: 10.0,
            gripper_diameter: 4.0,
            ..CraftConfig::default()
        }
    }

    /// Covers the bounding box of a layer with a plain grid of full bits
    #[derive(Clone, Default)]
    struct GridStrategy {
        fail_on: Option<usize>,
        gate: Option<Arc<(Mutex<bool>, Condvar)>>,
    }

    impl PatternStrategy for GridStrategy {
        fn ready(&mut self, _mesh: &Mesh) -> Result<()> {
            Ok(())
        }

        fn pave(&mut self, layer: &Layer) -> Result<Pavement> {
            if let Some(gate) = &self.gate {
                let (open, cvar) = &**gate;
                let mut open = open.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
            }
            if self.fail_on == Some(layer.index()) {
                bail!("cannot pave layer {}", layer.index());
            }
            let config = *layer.config();
            let bbox = layer.region().bbox().context("empty layer")?;
            let n_x = (bbox.width() / config.bit_length).ceil() as usize;
            let n_y = (bbox.height() / config.bit_width).ceil() as usize;
            let bits = (0..n_x)
                .cartesian_product(0..n_y)
                .map(|(i, j)| {
                    let x = bbox.x_min + (i as f64 + 0.5) * config.bit_length;
                    let y = bbox.y_min + (j as f64 + 0.5) * config.bit_width;
                    Bit::new(Point(x, y), Point(1.0, 0.0), config)
                })
                .collect::<Result<Vec<_>>>()?;
            Pavement::from_bits(bits, Point(1.0, 0.0), config)
        }

        fn pave_region(&mut self, layer: &Layer, _region: &Region) -> Result<Pavement> {
            self.pave(layer)
        }

        fn optimize(&mut self, layer: &mut Layer) -> OptimizeOutcome {
            let irregular = layer.irregular_keys().iter().copied().collect_vec();
            layer.remove_bits(&irregular);
            OptimizeOutcome::from_remaining(layer.count_irregularities())
        }

        fn is_interdependent(&self) -> bool {
            false
        }

        fn clone_box(&self) -> Box<dyn PatternStrategy> {
            Box::new(self.clone())
        }

        fn common_name(&self) -> &str {
            "grid"
        }
    }

    struct Stack(Vec<Slice>);

    impl ModelLoader for Stack {
        fn load(&self) -> Result<Model> {
            Ok(Model {
                name: "stack".into(),
                triangles: vec![],
            })
        }
    }

    impl Slicer for Stack {
        fn slice(&self, _model: &Model, _config: &CraftConfig) -> Result<Vec<Slice>> {
            Ok(self.0.clone())
        }
    }

    /// `n` squares of side 31, so every layer has a row of bits too thin to grip
    fn stack(n: usize) -> Stack {
        let ring = Rect::try_new(0.0, 0.0, 31.0, 31.0).unwrap().corners().to_vec();
        Stack(
            (0..n)
                .map(|i| Slice::new(4.0 + 8.0 * i as f64, vec![ring.clone()]))
                .collect_vec(),
        )
    }

    fn sliced_mesh(n_layers: usize, n_workers: usize) -> Mesh {
        let mut mesh = Mesh::new(config(), ExecutorConfig { n_workers }).unwrap();
        let stack = stack(n_layers);
        mesh.import(&stack).unwrap();
        mesh.slice(&stack).unwrap();
        mesh
    }

    /// Collects messages until a stable state is published
    fn wait_for_stable(rx: &Receiver<MeshMessage>) -> Vec<MeshMessage> {
        let mut messages = vec![];
        loop {
            let message = rx.recv_timeout(Duration::from_secs(60)).unwrap();
            let stable = !message.state.is_working()
                && !matches!(
                    message.state,
                    MeshState::PavedLayer | MeshState::OptimizedLayer
                );
            messages.push(message);
            if stable {
                return messages;
            }
        }
    }

    #[test]
    fn slicing_builds_layers() {
        let mesh = sliced_mesh(3, 1);
        assert_eq!(mesh.state(), MeshState::Sliced);
        assert_eq!(mesh.n_layers(), 3);
        assert!((mesh.skirt_radius() - 31.0 * 2f64.sqrt()).abs() < 1e-9);
        assert!(mesh.layers().iter().all(|l| !lock(l).is_paved()));
    }

    #[test]
    fn paving_requires_layers() {
        let mesh = Mesh::new(config(), ExecutorConfig { n_workers: 1 }).unwrap();
        assert!(matches!(
            mesh.pave(Box::new(GridStrategy::default())),
            Err(MeshError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            mesh.optimize(),
            Err(MeshError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            mesh.layer_snapshot(4),
            Err(MeshError::LayerOutOfRange {
                index: 4,
                n_layers: 0
            })
        ));
    }

    #[test]
    fn parallel_pave_publishes_one_aggregate_event() {
        let mesh = sliced_mesh(10, 4);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(GridStrategy::default())).unwrap();

        let messages = wait_for_stable(&rx);
        let states = messages.iter().map(|m| m.state).collect_vec();
        assert_eq!(states.first(), Some(&MeshState::PavingMesh));
        assert_eq!(states.last(), Some(&MeshState::PavedMesh));
        assert_eq!(
            states.iter().filter(|s| **s == MeshState::PavedLayer).count(),
            10
        );
        assert_eq!(
            states.iter().filter(|s| **s == MeshState::PavedMesh).count(),
            1
        );
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        assert_eq!(mesh.state(), MeshState::PavedMesh);
        // top row of every layer is 1 high
        assert_eq!(mesh.count_irregularities(), 20);
        let per_layer: usize = (0..10)
            .map(|i| mesh.layer_snapshot(i).unwrap().count_irregularities())
            .sum();
        assert_eq!(per_layer, mesh.count_irregularities());
    }

    #[test]
    fn optimize_reports_per_layer() {
        let mesh = sliced_mesh(4, 2);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(GridStrategy::default())).unwrap();
        wait_for_stable(&rx);

        mesh.optimize().unwrap();
        let messages = wait_for_stable(&rx);
        let last = messages.last().unwrap();
        assert_eq!(last.state, MeshState::OptimizedMesh);
        let EventPayload::Optimization(report) = &last.payload else {
            panic!("missing report");
        };
        assert_eq!(report.clean, vec![0, 1, 2, 3]);
        assert_eq!(
            report.summary(),
            "Auto-optimization complete. Still has 0 not solved yet."
        );
        assert_eq!(mesh.count_irregularities(), 0);
        assert_eq!(mesh.optimization_report().as_deref(), Some(&**report));
    }

    #[test]
    fn failed_layer_rolls_back_every_layer() {
        let mesh = sliced_mesh(6, 3);
        let rx = mesh.events().subscribe_channel();
        let strategy = GridStrategy {
            fail_on: Some(4),
            ..Default::default()
        };
        mesh.pave(Box::new(strategy)).unwrap();

        let messages = wait_for_stable(&rx);
        let last = messages.last().unwrap();
        assert_eq!(last.state, MeshState::PaveFailed);
        assert!(matches!(&last.payload, EventPayload::Failure { reason } if reason.contains("layer 4")));
        assert_eq!(mesh.state(), MeshState::PaveFailed);
        assert!(mesh.layers().iter().all(|l| !lock(l).is_paved()));
    }

    #[test]
    fn busy_mesh_rejects_operations() {
        let mesh = sliced_mesh(3, 1);
        let rx = mesh.events().subscribe_channel();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let strategy = GridStrategy {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        mesh.pave(Box::new(strategy)).unwrap();

        assert!(matches!(
            mesh.pave(Box::new(GridStrategy::default())),
            Err(MeshError::Busy {
                state: MeshState::PavingMesh
            })
        ));
        assert!(matches!(
            mesh.with_layer_mut(0, |l| l.is_paved()),
            Err(MeshError::Busy { .. })
        ));

        {
            let (open, cvar) = &*gate;
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }
        let messages = wait_for_stable(&rx);
        assert_eq!(messages.last().unwrap().state, MeshState::PavedMesh);
        assert!(mesh.with_layer_mut(0, |l| l.is_paved()).unwrap());
    }

    #[test]
    fn cancelled_pave_restores_previous_state() {
        let mesh = sliced_mesh(3, 1);
        let rx = mesh.events().subscribe_channel();
        let gate = Arc::new((Mutex::new(false), Condvar::new()));
        let strategy = GridStrategy {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        mesh.pave(Box::new(strategy)).unwrap();
        mesh.cancel();
        {
            let (open, cvar) = &*gate;
            *open.lock().unwrap() = true;
            cvar.notify_all();
        }

        let messages = wait_for_stable(&rx);
        let last = messages.last().unwrap();
        assert_eq!(last.state, MeshState::Sliced);
        assert!(matches!(last.payload, EventPayload::Cancelled));
        assert_eq!(mesh.state(), MeshState::Sliced);
        assert!(mesh.layers().iter().all(|l| !lock(l).is_paved()));
    }

    #[test]
    fn save_and_open() {
        let mesh = sliced_mesh(2, 2);
        let rx = mesh.events().subscribe_channel();
        mesh.pave(Box::new(GridStrategy::default())).unwrap();
        wait_for_stable(&rx);

        let ext = mesh.save().unwrap();
        let reopened = Mesh::open(&ext, config(), ExecutorConfig { n_workers: 1 }).unwrap();
        assert_eq!(reopened.state(), MeshState::Opened);
        assert_eq!(reopened.n_layers(), 2);
        assert_eq!(reopened.count_irregularities(), mesh.count_irregularities());
    }
}
