use std::sync::Arc;

use dag_factory::{
    memory::MonotonicMemory, AnyNode, CreateRequest, Creator, DagError, DagFactory, Intercepter,
    Memory,
};
use tracing::info;

use crate::oop::{CarSimulatorBlueprint, CvtTransmission, I4Engine, Standard};

/// Announces every I4 engine before it is created
pub struct CarSimCreator;
impl Creator for CarSimCreator {
    fn create(&self, memory: &Memory, request: CreateRequest<'_>) -> Result<AnyNode, DagError> {
        if request.info().is::<I4Engine>() {
            info!("[Creator] Before create I4Engine");
        }
        request.construct_in(memory)
    }
}

/// Observes every CVT transmission once it is built
pub struct CarSimIntercepter;
impl Intercepter for CarSimIntercepter {
    fn after_create(&self, _memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        if node.is::<CvtTransmission>() {
            info!("[Intercepter] Intercepted CvtTransmission creation");
        }
        Ok(node)
    }
}

fn factory() -> DagFactory<Standard> {
    DagFactory::new()
        .with_memory(Arc::new(MonotonicMemory::default()))
        .with_creator(CarSimCreator)
        .with_intercepter(CarSimIntercepter)
}

pub fn run_sim() -> Result<(), DagError> {
    info!("=========== Running simulation with extensions ===========");
    let simulator = factory().create(|bp| bp.car_simulator())?;
    simulator.start();
    drop(simulator);
    info!("=========== Ending simulation with extensions ===========");
    Ok(())
}
