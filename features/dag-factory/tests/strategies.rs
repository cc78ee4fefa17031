use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use dag_factory::{
    memory::{CountingMemory, SystemMemory},
    AllocError, AnyNode, Bind, Blueprint, CreateRequest, Creator, DagContext, DagError,
    DagFactory, Intercepter, Memory, MemoryResource, Node, TypeInfo,
};

struct Wheel {
    pressure: u32,
}
struct Axle {
    left: Node<Wheel>,
    right: Node<Wheel>,
}

struct Chassis {
    dag: DagContext,
}
impl Blueprint for Chassis {
    fn dag(&self) -> &DagContext {
        &self.dag
    }
}
impl Bind for Chassis {
    type Args = ();
    fn bind(dag: DagContext, _args: ()) -> Self {
        Chassis { dag }
    }
}
impl Chassis {
    fn wheel(&self) -> Result<Node<Wheel>, DagError> {
        self.dag().make_node(|| Wheel { pressure: 20 })
    }

    fn spare(&self) -> Result<Node<Wheel>, DagError> {
        self.dag().shared(|| self.wheel())
    }

    fn axle(&self) -> Result<Node<Axle>, DagError> {
        let left = self.wheel()?;
        let right = self.wheel()?;
        self.dag().make_node(|| Axle { left, right })
    }
}

#[derive(Default, Clone)]
struct Counting {
    before: Arc<Mutex<Vec<TypeInfo>>>,
    after: Arc<AtomicUsize>,
}
impl Intercepter for Counting {
    fn before_create(&self, node: TypeInfo) {
        self.before.lock().expect("before").push(node);
    }

    fn after_create(&self, _memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        self.after.fetch_add(1, Ordering::SeqCst);
        Ok(node)
    }
}

#[test]
fn hooks_run_once_per_constructed_node() {
    let counting = Counting::default();
    let dag = DagFactory::<Chassis>::new()
        .with_intercepter(counting.clone())
        .create(|c| {
            c.spare()?;
            c.spare()?;
            c.axle()
        })
        .expect("build");

    assert_eq!(dag.len(), 4);
    assert_eq!(counting.after.load(Ordering::SeqCst), 4);
    assert_eq!(
        *counting.before.lock().expect("before"),
        vec![
            TypeInfo::of::<Wheel>(),
            TypeInfo::of::<Wheel>(),
            TypeInfo::of::<Wheel>(),
            TypeInfo::of::<Axle>(),
        ]
    );
}

/// Inflates every wheel before it is registered
struct Inflate;
impl Intercepter for Inflate {
    fn after_create(&self, _memory: &Memory, mut node: AnyNode) -> Result<AnyNode, DagError> {
        if let Some(wheel) = Node::get_mut(&mut node).and_then(|v| v.downcast_mut::<Wheel>()) {
            wheel.pressure = 32;
        }
        Ok(node)
    }
}

#[test]
fn intercepter_can_mutate_fresh_nodes() {
    let dag = DagFactory::<Chassis>::new()
        .with_intercepter(Inflate)
        .create(|c| c.axle())
        .expect("build");

    assert_eq!(dag.left.pressure, 32);
    assert_eq!(dag.right.pressure, 32);
}

/// Swaps every wheel for a brand new one of the same type
struct Retread;
impl Intercepter for Retread {
    fn after_create(&self, memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        if !node.is::<Wheel>() {
            return Ok(node);
        }
        let fresh = Node::new_in(Wheel { pressure: 25 }, memory)?;
        Ok(Node::into_any(fresh))
    }
}

#[test]
fn intercepter_can_replace_nodes_of_the_same_type() {
    let dag = DagFactory::<Chassis>::new()
        .with_intercepter(Retread)
        .create(|c| c.axle())
        .expect("build");

    assert_eq!(dag.left.pressure, 25);
    assert_eq!(dag.len(), 3);
}

/// Replaces wheels with something that is not a wheel
struct Swap;
impl Intercepter for Swap {
    fn after_create(&self, memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        if !node.is::<Wheel>() {
            return Ok(node);
        }
        Ok(Node::into_any(Node::new_in(String::from("not a wheel"), memory)?))
    }
}

#[test]
fn intercepter_cannot_change_the_node_type() {
    let built = DagFactory::<Chassis>::new()
        .with_intercepter(Swap)
        .create(|c| c.wheel());

    match built {
        Err(DagError::NodeReplaced { expected, actual }) => {
            assert_eq!(expected, TypeInfo::of::<Wheel>());
            assert_eq!(actual, TypeInfo::of::<String>());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

/// Refuses to build axles
struct NoAxles;
impl Creator for NoAxles {
    fn create(&self, memory: &Memory, request: CreateRequest<'_>) -> Result<AnyNode, DagError> {
        if request.info().is::<Axle>() {
            return Err(DagError::creator(request.info(), "axles are out of stock"));
        }
        request.construct_in(memory)
    }
}

#[test]
fn creator_failures_keep_their_source() {
    let built = DagFactory::<Chassis>::new()
        .with_creator(NoAxles)
        .create(|c| c.axle());

    let error = built.expect_err("no axles");
    assert!(matches!(error, DagError::CreatorFailed { .. }));
    let source = std::error::Error::source(&error).expect("source");
    assert_eq!(source.to_string(), "axles are out of stock");
}

/// Places wheels in their own memory resource
struct WheelStore {
    wheels: Arc<CountingMemory>,
}
impl Creator for WheelStore {
    fn create(&self, memory: &Memory, request: CreateRequest<'_>) -> Result<AnyNode, DagError> {
        if request.info().is::<Wheel>() {
            let wheels: Memory = self.wheels.clone();
            return request.construct_in(&wheels);
        }
        request.construct_in(memory)
    }
}

#[test]
fn creator_decides_where_nodes_live() {
    let wheels = Arc::new(CountingMemory::new(SystemMemory));
    let everything_else = Arc::new(CountingMemory::new(SystemMemory));

    let dag = DagFactory::<Chassis>::new()
        .with_memory(everything_else.clone())
        .with_creator(WheelStore {
            wheels: wheels.clone(),
        })
        .create(|c| c.axle())
        .expect("build");

    assert_eq!(wheels.allocations(), 2);
    assert_eq!(everything_else.allocations(), 1);

    drop(dag);
    assert_eq!(wheels.live_bytes(), 0);
    assert_eq!(everything_else.live_bytes(), 0);
}

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Records its name when dropped
struct Fitting {
    name: &'static str,
    log: Log,
}
impl Drop for Fitting {
    fn drop(&mut self) {
        self.log.lock().expect("log").push(self.name);
    }
}

struct Dashboard {
    dag: DagContext,
    log: Log,
}
impl Blueprint for Dashboard {
    fn dag(&self) -> &DagContext {
        &self.dag
    }
}
impl Bind for Dashboard {
    type Args = Log;
    fn bind(dag: DagContext, log: Log) -> Self {
        Dashboard { dag, log }
    }
}
impl Dashboard {
    fn fitting(&self, name: &'static str) -> Result<Node<Fitting>, DagError> {
        let log = self.log.clone();
        self.dag().make_node(|| Fitting { name, log })
    }

    fn fitted(&self) -> Result<Node<Fitting>, DagError> {
        self.fitting("gauge")?;
        self.fitting("clock")?;
        self.fitting("radio")
    }
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().expect("log").clone()
}

/// Rejects radios once they are built
struct NoRadios;
impl Intercepter for NoRadios {
    fn after_create(&self, _memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        let radio = node
            .downcast_ref::<Fitting>()
            .is_some_and(|fitting| fitting.name == "radio");
        if radio {
            return Err(DagError::intercepter(Node::info(&node), "radios are not allowed"));
        }
        Ok(node)
    }
}

#[test]
fn intercepter_failures_keep_their_source_and_tear_down() {
    let log = Log::default();
    let built = DagFactory::<Dashboard>::new()
        .with_intercepter(NoRadios)
        .create_with(log.clone(), |d| d.fitted());

    let error = built.expect_err("no radios");
    match &error {
        DagError::IntercepterFailed { node, .. } => assert_eq!(*node, TypeInfo::of::<Fitting>()),
        other => panic!("unexpected error: {:?}", other),
    }
    let source = std::error::Error::source(&error).expect("source");
    assert_eq!(source.to_string(), "radios are not allowed");
    // The rejected radio goes first, then the registered nodes in reverse
    assert_eq!(entries(&log), vec!["radio", "clock", "gauge"]);
}

/// Hands out a fixed number of blocks, then refuses
struct Budget {
    blocks: AtomicUsize,
}
impl MemoryResource for Budget {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let granted = self
            .blocks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if granted.is_err() {
            return Err(AllocError::from(layout));
        }
        SystemMemory.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        SystemMemory.deallocate(ptr, layout)
    }
}

#[test]
fn allocation_failures_keep_their_cause_and_tear_down() {
    let log = Log::default();
    let budget = Arc::new(Budget {
        blocks: AtomicUsize::new(2),
    });
    let built = DagFactory::<Dashboard>::new()
        .with_memory(budget)
        .create_with(log.clone(), |d| d.fitted());

    match built.expect_err("out of memory") {
        DagError::Alloc(cause) => {
            assert!(cause.size >= std::mem::size_of::<Fitting>());
            assert!(cause.align >= std::mem::align_of::<Fitting>());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // The radio was constructed but never placed
    assert_eq!(entries(&log), vec!["radio", "clock", "gauge"]);
}
