use crate::core::{Module, ModuleMap};
use crate::utils::{Graph, IResult};
use std::collections::HashSet;

/// Builds the dependency graph for the given root modules by following
/// `lib_list`/`build_list` references transitively, then checks it for
/// cycles. A module that names a dependency not present in the project's
/// module map is an error, as is any cycle among library dependencies.
pub fn build_module_graph(modules: &ModuleMap, roots: &[Module]) -> IResult<Graph<Module>> {
    let mut graph = Graph::new();
    let mut seen = HashSet::new();

    for root in roots {
        add_recursive(modules, root, &mut graph, &mut seen)?;
    }

    let cycles = graph.cycles();
    if !cycles.is_empty() {
        let mut msg = String::from("cyclic module dependency detected:\n");
        for cycle in cycles.iter(&graph) {
            let names: Vec<_> = cycle.map(|m| m.id.name().to_string()).collect();
            msg.push_str(&format!("  {}\n", names.join(" -> ")));
        }
        anyhow::bail!(msg);
    }

    Ok(graph)
}

fn add_recursive(
    modules: &ModuleMap,
    module: &Module,
    graph: &mut Graph<Module>,
    seen: &mut HashSet<crate::core::ModuleId>,
) -> IResult<()> {
    graph.add(module.clone());
    if !seen.insert(module.id) {
        return Ok(());
    }

    let mut deps = Vec::new();
    module.for_each_dep(|name, _public| deps.push(name));

    for name in deps {
        let dep = modules.get(name).ok_or_else(|| {
            anyhow::anyhow!("module `{}` depends on unknown module `{}`", module.id.name(), name)
        })?;
        graph.link(module.clone(), dep.clone());
        add_recursive(modules, dep, graph, seen)?;
    }

    Ok(())
}
