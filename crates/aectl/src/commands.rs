//! aectl command implementations

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use aectl_config::{resolve_config_path, ProfileDocument, ProfileSpec, VertexSettings};
use aectl_engine::{Deployer, InstanceRegistry, ReconcileAction};
use aectl_provider::{SecretManagerClient, VertexProvider};

/// Bearer token passed through to the platform APIs
const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Global flags shared by every command
pub struct Context {
    pub profile: String,
    pub yaml_file: Option<PathBuf>,
    pub modules: Option<PathBuf>,
    pub api_endpoint: Option<String>,
}

/// Load the profile document and wire the deployer to the live services
async fn build_deployer(ctx: &Context) -> Result<Deployer> {
    let path = resolve_config_path(ctx.yaml_file.as_deref())?;
    let document = ProfileDocument::load_from(&path).await?;

    let registry = match &ctx.modules {
        Some(manifest) => InstanceRegistry::load_manifest(manifest).await?,
        None => InstanceRegistry::new(),
    };

    let env = VertexSettings::from_env();
    let vertex = document
        .layered(&ctx.profile)?
        .vertex()
        .with_fallback(env.clone());
    debug!("◆ Using project {:?} in {:?}", vertex.project, vertex.location);

    let token = std::env::var(ACCESS_TOKEN_ENV).ok();
    let mut api = VertexProvider::new(vertex.project.clone(), vertex.location.clone())
        .with_access_token(token.clone());
    if let Some(endpoint) = &ctx.api_endpoint {
        api = api.with_endpoint(endpoint.clone());
    }
    let secrets = SecretManagerClient::new(vertex.project).with_access_token(token);

    Ok(Deployer::new(
        document,
        ctx.profile.clone(),
        Arc::new(api),
        Arc::new(secrets),
        Arc::new(registry),
    )
    .with_env_fallback(env))
}

/// Deploy or update the profile's agent engine
pub async fn deploy_command(ctx: &Context, dry_run: bool) -> Result<()> {
    let deployer = build_deployer(ctx).await?;
    let outcome = deployer
        .create_or_update_from_yaml(dry_run, ProfileSpec::default())
        .await?;

    if outcome.dry_run {
        match &outcome.action {
            ReconcileAction::Create => {
                println!("Would create agent engine '{}'", outcome.display_name)
            }
            ReconcileAction::Update { resource_name } => println!(
                "Would update agent engine '{}' ({})",
                outcome.display_name, resource_name
            ),
        }
        println!("Effective spec: {:#?}", outcome.request);
        println!("Dry run completed for profile '{}'", ctx.profile);
    } else {
        if let Some(resource) = &outcome.resource {
            println!("Resource Name: {}", resource.name);
        }
        println!(
            "Successfully deployed agent engine using profile '{}'",
            ctx.profile
        );
    }
    Ok(())
}

/// List deployed agent engines
pub async fn list_command(ctx: &Context) -> Result<()> {
    let deployer = build_deployer(ctx).await?;
    let resources = deployer.list_agent_engine().await?;

    if resources.is_empty() {
        println!("No agent engines found.");
        return Ok(());
    }

    println!("Found {} agent engine(s):", resources.len());
    println!();
    for resource in resources {
        println!("Display Name: {}", resource.display_name);
        println!("Resource Name: {}", resource.name);
        println!("Create Time: {}", format_time(resource.create_time));
        println!("Update Time: {}", format_time(resource.update_time));
        println!("{}", "-".repeat(50));
    }
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "N/A".to_string())
}

/// Send a message and print the text parts of the reply
pub async fn send_command(
    ctx: &Context,
    message: String,
    display_name: Option<String>,
    session_id: Option<String>,
    user_id: Option<String>,
) -> Result<()> {
    let deployer = build_deployer(ctx).await?;
    let reply = deployer
        .send_message(
            &message,
            display_name.as_deref(),
            session_id.as_deref(),
            user_id.as_deref(),
        )
        .await?;

    for text in reply.response.texts() {
        println!("{}", text);
    }
    if session_id.is_none() {
        eprintln!("Session: {}", reply.session_id);
    }
    Ok(())
}

/// Delete by display name, or the profile's agent engine
pub async fn delete_command(
    ctx: &Context,
    name: Option<String>,
    force: bool,
    dry_run: bool,
) -> Result<()> {
    let deployer = build_deployer(ctx).await?;
    let outcome = match &name {
        Some(name) => deployer.delete_agent_engine(name, force, dry_run).await?,
        None => deployer.delete_agent_engine_from_yaml(force, dry_run).await?,
    };

    let target = match &name {
        Some(name) => format!("'{}'", name),
        None => format!("profile '{}'", ctx.profile),
    };

    if outcome.dry_run {
        println!("Would delete {}", outcome.plan.resource.name);
        for dependent in &outcome.plan.dependents {
            println!("  {}", dependent);
        }
        println!("Dry run completed for {} deletion", target);
    } else if name.is_some() {
        println!("Successfully deleted agent engine {}", target);
    } else {
        println!("Successfully deleted agent engine using {}", target);
    }
    Ok(())
}
