use dag_factory::{selection, Bind, Blueprint, DagContext, DagError, DagFactory, Node};
use tracing::info;

pub trait Engine: Send + Sync {
    fn name(&self) -> &'static str;
}

pub trait Transmission: Send + Sync {
    fn name(&self) -> &'static str;
}

pub struct V6Engine;
impl Engine for V6Engine {
    fn name(&self) -> &'static str {
        "V6 Engine"
    }
}
impl Drop for V6Engine {
    fn drop(&mut self) {
        info!("V6 Engine destroyed");
    }
}

pub struct I4Engine;
impl Engine for I4Engine {
    fn name(&self) -> &'static str {
        "I4 Engine"
    }
}
impl Drop for I4Engine {
    fn drop(&mut self) {
        info!("I4 Engine destroyed");
    }
}

pub struct AutoTransmission {
    _engine: Node<dyn Engine>,
}
impl Transmission for AutoTransmission {
    fn name(&self) -> &'static str {
        "Auto Transmission"
    }
}
impl Drop for AutoTransmission {
    fn drop(&mut self) {
        info!("Auto Transmission destroyed");
    }
}

pub struct CvtTransmission {
    _engine: Node<dyn Engine>,
}
impl Transmission for CvtTransmission {
    fn name(&self) -> &'static str {
        "CVT Transmission"
    }
}
impl Drop for CvtTransmission {
    fn drop(&mut self) {
        info!("CVT Transmission destroyed");
    }
}

pub struct CarSimulator {
    engine: Node<dyn Engine>,
    transmission: Node<dyn Transmission>,
}
impl CarSimulator {
    pub fn start(&self) {
        info!(
            "CarSimulator started with {} and {}",
            self.engine.name(),
            self.transmission.name()
        );
    }
}
impl Drop for CarSimulator {
    fn drop(&mut self) {
        info!("CarSimulator destroyed");
    }
}

selection!(pub Engines => dyn Engine { V6Engine, I4Engine });

fn as_engine<E: Engine + 'static>(engine: &E) -> &(dyn Engine + 'static) {
    engine
}

fn as_transmission<T: Transmission + 'static>(transmission: &T) -> &(dyn Transmission + 'static) {
    transmission
}

/// Small car with an I4 engine and a CVT transmission.
///
/// `engine` and `transmission` pick the parts, implementors override them
/// to build a different car from the same wiring.
pub trait CarSimulatorBlueprint: Blueprint {
    fn car_simulator(&self) -> Result<Node<CarSimulator>, DagError> {
        let engine = self.engine()?;
        let transmission = self.transmission()?;
        self.dag().make_node(|| CarSimulator {
            engine,
            transmission,
        })
    }

    fn engine(&self) -> Result<Node<dyn Engine>, DagError> {
        Ok(Node::upcast(self.i4_engine()?, as_engine))
    }

    fn i4_engine(&self) -> Result<Node<I4Engine>, DagError> {
        self.dag().shared(|| self.dag().make_node(|| I4Engine))
    }

    fn transmission(&self) -> Result<Node<dyn Transmission>, DagError> {
        Ok(Node::upcast(self.cvt_transmission()?, as_transmission))
    }

    fn cvt_transmission(&self) -> Result<Node<CvtTransmission>, DagError> {
        self.dag().shared(|| {
            let engine = self.engine()?;
            self.dag().make_node(|| CvtTransmission { _engine: engine })
        })
    }
}

pub struct Standard {
    dag: DagContext,
}
impl Blueprint for Standard {
    fn dag(&self) -> &DagContext {
        &self.dag
    }
}
impl Bind for Standard {
    type Args = ();
    fn bind(dag: DagContext, _args: ()) -> Self {
        Standard { dag }
    }
}
impl CarSimulatorBlueprint for Standard {}

/// Same car with a V6 engine and an automatic transmission
pub struct Powerful {
    dag: DagContext,
}
impl Blueprint for Powerful {
    fn dag(&self) -> &DagContext {
        &self.dag
    }
}
impl Bind for Powerful {
    type Args = ();
    fn bind(dag: DagContext, _args: ()) -> Self {
        Powerful { dag }
    }
}
impl Powerful {
    fn v6_engine(&self) -> Result<Node<V6Engine>, DagError> {
        self.dag().shared(|| self.dag().make_node(|| V6Engine))
    }

    fn auto_transmission(&self) -> Result<Node<AutoTransmission>, DagError> {
        self.dag().shared(|| {
            let engine = self.engine()?;
            self.dag().make_node(|| AutoTransmission { _engine: engine })
        })
    }
}
impl CarSimulatorBlueprint for Powerful {
    fn engine(&self) -> Result<Node<dyn Engine>, DagError> {
        Ok(Node::upcast(self.v6_engine()?, as_engine))
    }

    fn transmission(&self) -> Result<Node<dyn Transmission>, DagError> {
        Ok(Node::upcast(self.auto_transmission()?, as_transmission))
    }
}

/// Builds and starts a simulator through the blueprint's trait object
fn simulate(blueprint: &dyn CarSimulatorBlueprint) -> Result<Node<CarSimulator>, DagError> {
    blueprint.car_simulator()
}

pub fn run_sim() -> Result<(), DagError> {
    info!("=========== Running OOP simulation ===========");
    let simulator = DagFactory::<Standard>::new().create(|bp| simulate(bp))?;
    simulator.start();
    drop(simulator);
    info!("=========== Ending OOP simulation ===========");
    Ok(())
}

pub fn run_powerful_sim() -> Result<(), DagError> {
    info!("=========== Running powerful OOP simulation ===========");
    let simulator = DagFactory::<Powerful>::new()
        .select::<Engines>()
        .create(|bp| simulate(bp))?;
    simulator.start();
    for engine in simulator.entry_points() {
        info!("Engine in the graph: {}", engine.name());
    }
    drop(simulator);
    info!("=========== Ending powerful OOP simulation ===========");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powerful_blueprint_swaps_every_part() {
        let simulator = DagFactory::<Powerful>::new()
            .select::<Engines>()
            .create(|bp| simulate(bp))
            .expect("build");

        assert_eq!(simulator.engine.name(), "V6 Engine");
        assert_eq!(simulator.transmission.name(), "Auto Transmission");
        assert_eq!(simulator.entry_points().len(), 1);
        // engine, transmission, simulator
        assert_eq!(simulator.len(), 3);
    }

    #[test]
    fn standard_blueprint_shares_its_engine() {
        let simulator = DagFactory::<Standard>::new()
            .select::<Engines>()
            .create(|bp| bp.car_simulator())
            .expect("build");

        assert_eq!(simulator.engine.name(), "I4 Engine");
        assert!(Node::ptr_eq(&simulator.engine, &simulator.entry_points()[0]));
        assert_eq!(simulator.len(), 3);
    }
}
