/// Property-based tests for graph merging and resolution depth
///
/// Random DAGs are built twice from the same description, so the two copies
/// are structurally equal but share no nodes.

use ferrous_resolver::*;
use proptest::prelude::*;
use proptest::sample::Index;

type Node = DagNode<u8, u8>;

/// Node `i` links to earlier nodes only, so the description is always acyclic.
fn build(spec: &[(u8, Vec<(Index, u8)>)]) -> Node {
    let mut nodes: Vec<Node> = Vec::with_capacity(spec.len());
    for (i, (label, children)) in spec.iter().enumerate() {
        let mut builder = Node::builder(*label);
        if i > 0 {
            for (index, edge) in children {
                builder = builder.add_edge(nodes[index.index(i)].clone(), *edge);
            }
        }
        nodes.push(builder.build());
    }
    nodes.pop().unwrap_or_else(|| Node::singleton(0))
}

fn dag_spec() -> impl Strategy<Value = Vec<(u8, Vec<(Index, u8)>)>> {
    prop::collection::vec(
        (0u8..4, prop::collection::vec((any::<Index>(), 0u8..3), 0..4)),
        1..12,
    )
}

proptest! {
    #[test]
    fn structural_copies_merge_to_one_node(spec in dag_spec()) {
        let first = build(&spec);
        let second = build(&spec);
        prop_assert_eq!(&first, &second);

        let mut pool = MergePool::new();
        let a = pool.merge(&first);
        let b = pool.merge(&second);
        prop_assert!(a.ptr_eq(&b));
        prop_assert_eq!(&a, &first);
    }
}

proptest! {
    #[test]
    fn merging_is_idempotent(spec in dag_spec()) {
        let mut pool = MergePool::new();
        let merged = pool.merge(&build(&spec));
        let size = pool.len();

        let again = pool.merge(&merged);
        prop_assert!(again.ptr_eq(&merged));
        prop_assert_eq!(pool.len(), size);
    }
}

proptest! {
    #[test]
    fn merged_children_are_canonical(spec in dag_spec()) {
        let mut pool = MergePool::new();
        let merged = pool.merge(&build(&spec));
        prop_assert_eq!(pool.len(), merged.sorted_nodes().len());

        for node in merged.sorted_nodes() {
            for (_, child) in node.edges() {
                prop_assert!(pool.merge(child).ptr_eq(child));
            }
        }
    }
}

proptest! {
    #[test]
    fn chain_resolves_within_max_depth(length in 1usize..16, max_depth in 0usize..16) {
        let mut types = TypeCatalog::builder();
        for i in 0..length {
            let mut spec = TypeSpec::class(TypeKey::named(format!("T{i}")));
            if i + 1 < length {
                spec = spec.inject("next", TypeKey::named(format!("T{}", i + 1)));
            }
            types.add(spec);
        }
        let catalog = types.build();
        let rules = BindingFunctionBuilder::new(catalog.clone());
        let mut solver = DependencySolver::builder(catalog.clone())
            .standard_functions(&rules)
            .max_depth(max_depth)
            .build();

        let result = solver.resolve(catalog.root_desire(&TypeKey::named("T0"), None));
        if length - 1 <= max_depth {
            prop_assert!(result.is_ok());
            prop_assert_eq!(solver.graph().sorted_nodes().len(), length + 1);
        } else {
            let is_cyclic = matches!(result, Err(DiError::Cyclic { .. }));
            prop_assert!(is_cyclic);
        }
    }
}
