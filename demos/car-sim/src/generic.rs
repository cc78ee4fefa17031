//! The simulator without trait objects: parts are generic parameters and
//! the blueprint picks them through associated types, so every call is
//! bound statically.

use std::sync::atomic::{AtomicU32, Ordering};

use dag_factory::{Bind, Blueprint, DagContext, DagError, DagFactory, Node};
use tracing::info;

pub trait SimEngine: Send + Sync + 'static {
    fn start(&self);
    fn speed(&self) -> u32;
    fn set_speed(&self, speed: u32);
}

pub trait Shift: Send + Sync + 'static {
    fn shift(&self, gear: u32);
}

macro_rules! engine {
    ($name:ident, $label:literal, $speed:literal) => {
        pub struct $name {
            speed: AtomicU32,
        }
        impl Default for $name {
            fn default() -> Self {
                $name {
                    speed: AtomicU32::new($speed),
                }
            }
        }
        impl SimEngine for $name {
            fn start(&self) {
                info!("{} started", $label);
            }
            fn speed(&self) -> u32 {
                self.speed.load(Ordering::Relaxed)
            }
            fn set_speed(&self, speed: u32) {
                info!("{} speed set to {}", $label, speed);
                self.speed.store(speed, Ordering::Relaxed);
            }
        }
        impl Drop for $name {
            fn drop(&mut self) {
                info!("{} destroyed", $label);
            }
        }
    };
}

engine!(V6Engine, "V6 Engine", 180);
engine!(I4Engine, "I4 Engine", 120);

pub struct AutoTransmission<E> {
    engine: Node<E>,
}
impl<E: SimEngine> Shift for AutoTransmission<E> {
    fn shift(&self, gear: u32) {
        info!("Auto Transmission shifted to {}", gear);
        self.engine.set_speed(gear * 1000);
    }
}

pub struct CvtTransmission<E> {
    engine: Node<E>,
}
impl<E: SimEngine> Shift for CvtTransmission<E> {
    fn shift(&self, gear: u32) {
        info!("CVT Transmission shifted to {}", gear);
        self.engine.set_speed(gear * 800);
    }
}

pub struct CarSimulator<E, T> {
    engine: Node<E>,
    transmission: Node<T>,
}
impl<E: SimEngine, T: Shift> CarSimulator<E, T> {
    pub fn start(&self) {
        self.engine.start();
        self.transmission.shift(1);
    }

    pub fn speed(&self) -> u32 {
        self.engine.speed()
    }
}

pub trait CarSimulatorBlueprint: Blueprint {
    type Engine: SimEngine;
    type Transmission: Shift;

    fn engine(&self) -> Result<Node<Self::Engine>, DagError>;

    fn transmission(&self) -> Result<Node<Self::Transmission>, DagError>;

    #[allow(clippy::type_complexity)]
    fn car_simulator(
        &self,
    ) -> Result<Node<CarSimulator<Self::Engine, Self::Transmission>>, DagError> {
        let engine = self.engine()?;
        let transmission = self.transmission()?;
        self.dag().make_node(|| CarSimulator {
            engine,
            transmission,
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
impl CarSimulatorBlueprint for Standard {
    type Engine = I4Engine;
    type Transmission = CvtTransmission<I4Engine>;

    fn engine(&self) -> Result<Node<I4Engine>, DagError> {
        self.dag().shared(|| self.dag().make_node(I4Engine::default))
    }

    fn transmission(&self) -> Result<Node<CvtTransmission<I4Engine>>, DagError> {
        self.dag().shared(|| {
            let engine = self.engine()?;
            self.dag().make_node(|| CvtTransmission { engine })
        })
    }
}

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
impl CarSimulatorBlueprint for Powerful {
    type Engine = V6Engine;
    type Transmission = AutoTransmission<V6Engine>;

    fn engine(&self) -> Result<Node<V6Engine>, DagError> {
        self.dag().shared(|| self.dag().make_node(V6Engine::default))
    }

    fn transmission(&self) -> Result<Node<AutoTransmission<V6Engine>>, DagError> {
        self.dag().shared(|| {
            let engine = self.engine()?;
            self.dag().make_node(|| AutoTransmission { engine })
        })
    }
}

fn simulate<B: Bind<Args = ()> + CarSimulatorBlueprint>() -> Result<u32, DagError> {
    let simulator = DagFactory::<B>::new().create(|bp| bp.car_simulator())?;
    simulator.start();
    Ok(simulator.speed())
}

pub fn run_sim() -> Result<(), DagError> {
    info!("=========== Running generic simulation ===========");
    let speed = simulate::<Standard>()?;
    info!("Standard simulator ended at speed {}", speed);
    let speed = simulate::<Powerful>()?;
    info!("Powerful simulator ended at speed {}", speed);
    info!("=========== Ending generic simulation ===========");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transmissions_drive_their_engine() {
        assert_eq!(simulate::<Standard>().expect("standard"), 800);
        assert_eq!(simulate::<Powerful>().expect("powerful"), 1000);
    }

    #[test]
    fn parts_are_shared_within_a_build() {
        let simulator = DagFactory::<Powerful>::new()
            .create(|bp| bp.car_simulator())
            .expect("build");

        assert!(Node::ptr_eq(
            &simulator.engine,
            &simulator.transmission.engine
        ));
        assert_eq!(simulator.speed(), 180);
    }
}
