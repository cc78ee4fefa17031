//! Car simulator built from blueprints, in three flavours:
//! trait object overrides, generic overrides and custom creation strategies.

use dag_factory::DagError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod extensions;
mod generic;
mod oop;

fn main() -> Result<(), DagError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "car_sim=info,dag_factory=debug".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    oop::run_sim()?;
    oop::run_powerful_sim()?;
    generic::run_sim()?;
    extensions::run_sim()?;
    Ok(())
}
