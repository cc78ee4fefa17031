use dag_factory::{Bind, Blueprint, DagContext, DagError, DagFactory, Node};

fn main() -> Result<(), DagError> {
    let dag = DagFactory::<SanityBlueprint>::new().create(|b| b.greeting())?;

    println!("{:?}", dag);
    println!("{}", *dag);
    Ok(())
}

struct SanityBlueprint {
    dag: DagContext,
}
impl Blueprint for SanityBlueprint {
    fn dag(&self) -> &DagContext {
        &self.dag
    }
}
impl Bind for SanityBlueprint {
    type Args = ();
    fn bind(dag: DagContext, _args: ()) -> Self {
        SanityBlueprint { dag }
    }
}
impl SanityBlueprint {
    fn greeting(&self) -> Result<Node<String>, DagError> {
        self.dag().make_node(|| "Hello World".to_string())
    }
}
