//! Validate command - compile every role of a bundle.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use serde::Serialize;

use warden_ability::DroppedRule;
use warden_core::EngineConfig;

use crate::OutputFormat;
use crate::bundle::PolicyBundle;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the policy bundle
    #[arg(required = true)]
    pub bundle: PathBuf,

    /// Fail when any rule is dropped
    #[arg(long)]
    pub strict: bool,
}

/// Validation result.
#[derive(Debug, Serialize)]
struct ValidationResult {
    valid: bool,
    path: String,
    actions: usize,
    models: usize,
    roles: Vec<RoleReport>,
    warnings: Vec<String>,
}

/// Compile report of one role.
#[derive(Debug, Serialize)]
struct RoleReport {
    role: String,
    rules: usize,
    compiled: usize,
    dropped: Vec<DroppedRule>,
}

/// Execute the validate command.
pub fn execute(args: ValidateArgs, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let bundle = PolicyBundle::load(&args.bundle)?;
    let result = validate(&bundle, &args, config)?;

    if !super::print_json(&result, format)? {
        print_human(&result);
    }

    if result.valid {
        Ok(())
    } else {
        bail!("Validation failed")
    }
}

fn validate(
    bundle: &PolicyBundle,
    args: &ValidateArgs,
    config: EngineConfig,
) -> Result<ValidationResult> {
    let context = bundle.context(config)?;
    let schema = bundle.schema()?;

    let mut warnings = Vec::new();
    let mut roles = Vec::new();
    for (role, rules) in &bundle.roles {
        let prepared = context.prepare(rules);

        if !bundle.models.is_empty() {
            let unknown = rules
                .iter()
                .filter_map(|rule| rule.subject.as_deref())
                .filter(|subject| schema.model(subject).is_none());
            for subject in unknown {
                warnings.push(format!("Role '{role}' names unknown model '{subject}'"));
            }
        }

        roles.push(RoleReport {
            role: role.clone(),
            rules: rules.len(),
            compiled: prepared.len(),
            dropped: prepared.dropped().to_vec(),
        });
    }

    let dropped = roles.iter().any(|r| !r.dropped.is_empty());
    Ok(ValidationResult {
        valid: !(args.strict && dropped),
        path: args.bundle.display().to_string(),
        actions: context.actions().len(),
        models: bundle.models.len(),
        roles,
        warnings,
    })
}

fn print_human(result: &ValidationResult) {
    if result.valid {
        println!("Bundle is valid: {}", result.path);
    } else {
        println!("Bundle is INVALID: {}", result.path);
    }
    println!("  Actions: {}", result.actions);
    println!("  Models: {}", result.models);

    for role in &result.roles {
        println!(
            "\n  Role {}: {}/{} rules compiled",
            role.role, role.compiled, role.rules
        );
        for dropped in &role.dropped {
            println!(
                "    - rule #{} ({} on {}): {}",
                dropped.index,
                dropped.action,
                dropped.subject.as_deref().unwrap_or("all"),
                dropped.reason
            );
        }
    }

    if !result.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
}
