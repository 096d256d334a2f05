//! The asset compiler (`spec.md` §4.5): turns one asset document into a
//! compiled [`Asset`] whose expression follows the check/stage shape.

use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::expr::Expression;
use crate::helpers::HelperBuildError;
use crate::registry::{Registry, RegistryError};

/// The four asset kinds a policy document may declare (`spec.md` §3).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Decoder,
    Rule,
    Output,
    Filter,
}

/// One `(targetField, helperName, rawParameters)` triple as it appears in
/// an asset's check clause or stage entry list.
#[derive(Clone, Debug, Deserialize)]
pub struct HelperInvocation {
    pub target: String,
    pub helper: String,
    pub args: Vec<String>,
}

impl HelperInvocation {
    pub fn new(target: impl Into<String>, helper: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            target: target.into(),
            helper: helper.into(),
            args,
        }
    }
}

/// A named pipeline stage: a list of helper invocations evaluated
/// unconditionally in document order.
#[derive(Clone, Debug, Deserialize)]
pub struct Stage {
    pub name: String,
    pub entries: Vec<HelperInvocation>,
}

/// The raw, uncompiled form of one asset, as read from the store.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AssetDef {
    pub name: String,
    pub kind: AssetKind,
    pub check: Vec<HelperInvocation>,
    pub parents: Vec<String>,
    pub stages: Vec<Stage>,
    /// Populated only for `Filter` assets: the asset names this filter
    /// gates (`spec.md` §3: "Filters additionally carry a set of targets
    /// they gate").
    pub targets: Vec<String>,
}

impl Default for AssetDef {
    fn default() -> Self {
        Self::new(String::new(), AssetKind::Decoder)
    }
}

impl AssetDef {
    pub fn new(name: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            check: Vec::new(),
            parents: Vec::new(),
            stages: Vec::new(),
            targets: Vec::new(),
        }
    }
}

/// A compiled asset: its name/kind/graph metadata plus the single
/// [`Expression`] the policy composer wires into the larger tree.
#[derive(Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub parents: Vec<String>,
    pub targets: Vec<String>,
    pub expression: Expression,
}

#[derive(Debug, Error, Diagnostic)]
pub enum CompilerError {
    #[error("asset \"{asset}\" helper \"{helper}\" failed to build: {source}")]
    #[diagnostic(code(eventcascade::asset::helper_build))]
    HelperBuild {
        asset: String,
        helper: String,
        #[source]
        source: HelperBuildError,
    },
    #[error("asset \"{asset}\" references unknown helper \"{helper}\"")]
    #[diagnostic(
        code(eventcascade::asset::unknown_helper),
        help("register the helper with the builder registry before compiling")
    )]
    UnknownHelper { asset: String, helper: String },
    #[error("decoder \"{child}\" declares missing parent \"{parent}\"")]
    #[diagnostic(code(eventcascade::asset::orphan_parent))]
    OrphanParent { child: String, parent: String },
    #[error("a cycle was detected in the asset graph at \"{0}\"")]
    #[diagnostic(code(eventcascade::asset::cycle))]
    Cycle(String),
    #[error("filter \"{0}\" has no valid targets")]
    #[diagnostic(code(eventcascade::asset::no_valid_targets))]
    NoValidTargets(String),
    #[error("filter \"{filter}\" targets unknown asset \"{target}\"")]
    #[diagnostic(code(eventcascade::asset::unknown_filter_target))]
    UnknownFilterTarget { filter: String, target: String },
    #[error("a stand-alone filter asset (\"{0}\") is not a legal policy leaf")]
    #[diagnostic(code(eventcascade::asset::standalone_filter))]
    StandaloneFilter(String),
}

/// Compile one asset's clauses and stages into its expression.
///
/// Decoders/rules/outputs compile to `Implication(And(check), Chain(stages))`
/// (`spec.md` §4.5). Filters compile to the bare `And(check)` — the policy
/// composer wires them in as gates, not as graph nodes in their own right.
pub fn compile_asset(def: &AssetDef, registry: &Registry) -> Result<Asset, CompilerError> {
    let check_name = format!("{}Check", def.name);
    let check_terms = def
        .check
        .iter()
        .map(|inv| build_term(&def.name, inv, registry))
        .collect::<Result<Vec<_>, _>>()?;
    let check_expr = Expression::and(check_name, check_terms);

    let expression = match def.kind {
        AssetKind::Filter => check_expr,
        AssetKind::Decoder | AssetKind::Rule | AssetKind::Output => {
            let stage_chains = def
                .stages
                .iter()
                .map(|stage| {
                    let entries = stage
                        .entries
                        .iter()
                        .map(|inv| build_term(&def.name, inv, registry))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Expression::chain(stage.name.clone(), entries))
                })
                .collect::<Result<Vec<_>, CompilerError>>()?;
            let stages_expr = Expression::chain(format!("{}Stages", def.name), stage_chains);
            Expression::implication(def.name.clone(), check_expr, stages_expr)
        }
    };

    Ok(Asset {
        name: def.name.clone(),
        kind: def.kind,
        parents: def.parents.clone(),
        targets: def.targets.clone(),
        expression,
    })
}

fn build_term(asset_name: &str, inv: &HelperInvocation, registry: &Registry) -> Result<Expression, CompilerError> {
    let builder = registry.lookup(&inv.helper).map_err(|e| match e {
        RegistryError::NotFound(helper) => CompilerError::UnknownHelper {
            asset: asset_name.to_string(),
            helper,
        },
        RegistryError::AlreadyRegistered(helper) => CompilerError::UnknownHelper {
            asset: asset_name.to_string(),
            helper,
        },
    })?;
    builder(&inv.target, &inv.args).map_err(|source| CompilerError::HelperBuild {
        asset: asset_name.to_string(),
        helper: inv.helper.clone(),
        source,
    })
}
