use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use meshbits::pipeline::{EventPayload, Mesh, MeshMessage, MeshState};

use crate::classic_brick::ClassicBrick;
use crate::config::BrickConfig;
use crate::io::input::PreSliced;
use crate::io::output::JsonExporter;
use crate::scheduler::SequentialScheduler;

/// Receives messages until the mesh reaches a stable state, and returns that message.
/// Per-layer notifications are skipped.
pub fn await_stable(rx: &Receiver<MeshMessage>) -> Result<MeshMessage> {
    loop {
        let message = rx.recv().context("mesh event channel closed")?;
        match message.state {
            MeshState::PavedLayer | MeshState::OptimizedLayer => {
                debug!("[MAIN] {}", message.state)
            }
            state if state.is_working() => debug!("[MAIN] {state}"),
            _ => return Ok(message),
        }
    }
}

/// Waits for the running operation to end in `expected`.
/// Failures and cancellations are turned into errors.
pub fn await_state(rx: &Receiver<MeshMessage>, expected: MeshState) -> Result<MeshMessage> {
    let message = await_stable(rx)?;
    match (&message.payload, message.state) {
        (_, state) if state == expected => Ok(message),
        (EventPayload::Failure { reason }, state) => bail!("{state}: {reason}"),
        (EventPayload::Cancelled, state) => bail!("operation cancelled, mesh back to {state}"),
        (_, state) => bail!("expected {expected}, mesh reached {state}"),
    }
}

/// Runs the whole pipeline on a pre-sliced model: slicing, paving with [`ClassicBrick`],
/// optionally optimizing and scheduling, and exporting to `solution_path`.
pub fn run(input: &PreSliced, config: BrickConfig, solution_path: PathBuf) -> Result<Mesh> {
    let mut mesh = Mesh::new(config.craft, config.executor)?;
    let rx = mesh.events().subscribe_channel();

    mesh.import(input)?;
    mesh.slice(input)?;
    info!("[MAIN] {} layers, skirt radius {:.3}", mesh.n_layers(), mesh.skirt_radius());

    mesh.pave(Box::new(ClassicBrick::new(config.bits_offset)))?;
    await_state(&rx, MeshState::PavedMesh)?;
    info!("[MAIN] paved, {} irregular bits", mesh.count_irregularities());

    if config.optimize {
        mesh.optimize()?;
        await_state(&rx, MeshState::OptimizedMesh)?;
    }
    if config.schedule {
        mesh.schedule(Arc::new(SequentialScheduler::default()))?;
        await_state(&rx, MeshState::Scheduled)?;
    }

    mesh.export(Arc::new(JsonExporter::new(solution_path, config)))?;
    await_state(&rx, MeshState::Exported)?;
    Ok(mesh)
}
