//! Dag Factory builds directed acyclic graphs of objects from a blueprint.
//!
//! Dag Factory is split into three major parts:
//! 1. Blueprint: user written factory methods describing how each node is built
//!    from the nodes it depends on
//! 2. DagFactory: configures memory, creation strategies and the selection of
//!    entry points, then builds graphs from a blueprint
//! 3. Dag: the finished graph, owning every node and tearing them down in
//!    reverse creation order
//!
//! # Examples
//!
//! ```rust
//! use dag_factory::{selection, Bind, Blueprint, DagContext, DagError, DagFactory, Node};
//!
//! trait Device: Send + Sync {
//!     fn name(&self) -> String;
//! }
//!
//! struct Bus;
//! impl Device for Bus {
//!     fn name(&self) -> String {
//!         "bus".to_string()
//!     }
//! }
//!
//! struct Sensor {
//!     bus: Node<Bus>,
//! }
//! impl Device for Sensor {
//!     fn name(&self) -> String {
//!         format!("sensor on {}", self.bus.name())
//!     }
//! }
//!
//! selection!(Devices => dyn Device { Bus, Sensor });
//!
//! struct Board {
//!     dag: DagContext,
//! }
//! impl Blueprint for Board {
//!     fn dag(&self) -> &DagContext {
//!         &self.dag
//!     }
//! }
//! impl Bind for Board {
//!     type Args = ();
//!     fn bind(dag: DagContext, _args: ()) -> Self {
//!         Board { dag }
//!     }
//! }
//! impl Board {
//!     fn bus(&self) -> Result<Node<Bus>, DagError> {
//!         self.dag().shared(|| self.dag().make_node(|| Bus))
//!     }
//!     fn sensor(&self) -> Result<Node<Sensor>, DagError> {
//!         let bus = self.bus()?;
//!         self.dag().make_node(|| Sensor { bus })
//!     }
//! }
//!
//! fn main() -> Result<(), DagError> {
//!     let dag = DagFactory::<Board>::new()
//!         .select::<Devices>()
//!         .create(|board| {
//!             board.sensor()?;
//!             board.sensor()
//!         })?;
//!
//!     // One shared bus and two sensors
//!     assert_eq!(dag.entry_points().len(), 3);
//!     assert_eq!(dag.name(), "sensor on bus");
//!     Ok(())
//! }
//! ```

mod blueprint;
mod dag;
mod errors;
mod factory;
pub mod memory;
mod node;
mod pipeline;
mod selection;
mod store;
mod strategies;
mod types;

pub use blueprint::{Bind, Blueprint, DagContext};
pub use dag::Dag;
pub use errors::{AllocError, DagError};
pub use factory::DagFactory;
pub use memory::{default_memory, Memory, MemoryResource};
pub use node::{AnyNode, Node};
pub use selection::{Exactly, Nothing, Select, Selection};
pub use strategies::{CreateRequest, Creator, DefaultCreator, DefaultIntercepter, Intercepter};
pub use types::{DynError, Injectable, TypeInfo};
