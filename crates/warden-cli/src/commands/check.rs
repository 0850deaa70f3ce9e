//! Check command - decide one access check against a bundle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use warden_ability::Subject;
use warden_core::EngineConfig;

use crate::OutputFormat;
use crate::bundle::{PolicyBundle, actor_context};

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Path to the policy bundle
    #[arg(required = true)]
    pub bundle: PathBuf,

    /// Role held by the actor (repeatable)
    #[arg(long = "role", required = true)]
    pub roles: Vec<String>,

    /// Actor id
    #[arg(long)]
    pub actor_id: String,

    /// Action to check
    #[arg(long)]
    pub action: String,

    /// Subject (model uid) to check
    #[arg(long)]
    pub subject: String,

    /// JSON file with the record to check against
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Field to check
    #[arg(long)]
    pub field: Option<String>,
}

/// Outcome of one check.
#[derive(Debug, Serialize)]
struct Decision {
    allowed: bool,
    action: String,
    subject: String,
    field: Option<String>,
    record: bool,
    ability: String,
    rules: usize,
}

/// Execute the check command.
pub fn execute(args: CheckArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let bundle = PolicyBundle::load(&args.bundle)?;
    let record = args
        .record
        .as_deref()
        .map(|path| -> Result<Value> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read record {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid record {}", path.display()))
        })
        .transpose()?;

    let decision = decide(&bundle, &args, record.as_ref(), config)?;

    if !super::print_json(&decision, format)? {
        let verdict = if decision.allowed { "ALLOWED" } else { "DENIED" };
        let target = match &decision.field {
            Some(field) => format!("{}.{}", decision.subject, field),
            None => decision.subject.clone(),
        };
        let scope = if decision.record { "record" } else { "type" };
        println!("{verdict}: {} on {target} ({scope} level)", decision.action);
    }
    Ok(())
}

fn decide(
    bundle: &PolicyBundle,
    args: &CheckArgs,
    record: Option<&Value>,
    config: EngineConfig,
) -> Result<Decision> {
    let context = bundle.context(config)?;
    let rules = bundle.rules_for(&args.roles)?;
    let ability = context.compile(&rules, &actor_context(&args.actor_id, &args.roles));

    let subject = match record {
        Some(record) => Subject::record(&args.subject, record),
        None => Subject::Type(&args.subject),
    };
    let allowed = ability.can(&args.action, subject, args.field.as_deref());

    Ok(Decision {
        allowed,
        action: args.action.clone(),
        subject: args.subject.clone(),
        field: args.field.clone(),
        record: record.is_some(),
        ability: ability.id().to_string(),
        rules: ability.len(),
    })
}
