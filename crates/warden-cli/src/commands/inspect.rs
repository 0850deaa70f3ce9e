//! Inspect command - show what an actor may touch for an action.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use warden_ability::{CompiledRule, RuleMatch};
use warden_core::EngineConfig;

use crate::OutputFormat;
use crate::bundle::{PolicyBundle, actor_context};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the policy bundle
    #[arg(required = true)]
    pub bundle: PathBuf,

    /// Role held by the actor (repeatable)
    #[arg(long = "role", required = true)]
    pub roles: Vec<String>,

    /// Actor id
    #[arg(long)]
    pub actor_id: String,

    /// Action to inspect
    #[arg(long)]
    pub action: String,

    /// Subject (model uid) to inspect
    #[arg(long)]
    pub subject: String,
}

/// Merged view plus the rules behind it.
#[derive(Debug, Serialize)]
struct Inspection {
    action: String,
    subject: String,
    #[serde(flatten)]
    relevant: RuleMatch,
    rules: Vec<Value>,
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let bundle = PolicyBundle::load(&args.bundle)?;
    let inspection = inspect(&bundle, &args, config)?;

    if !super::print_json(&inspection, format)? {
        println!("{} on {}", inspection.action, inspection.subject);
        println!("  Fields: {}", inspection.relevant.fields);
        println!("  Filter: {}", inspection.relevant.filter.to_json());
        println!("  Rules: {}", inspection.rules.len());
        for rule in &inspection.rules {
            println!("    - {rule}");
        }
    }
    Ok(())
}

fn inspect(bundle: &PolicyBundle, args: &InspectArgs, config: EngineConfig) -> Result<Inspection> {
    let context = bundle.context(config)?;
    let rules = bundle.rules_for(&args.roles)?;
    let ability = context.compile(&rules, &actor_context(&args.actor_id, &args.roles));

    Ok(Inspection {
        action: args.action.clone(),
        subject: args.subject.clone(),
        relevant: ability.relevant_rule_for(&args.action, &args.subject),
        rules: ability
            .rules_for(&args.action, &args.subject)
            .into_iter()
            .map(CompiledRule::to_json)
            .collect(),
    })
}
