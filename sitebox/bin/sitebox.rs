use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser};
use sitebox::{
    cli::{AnsiStyles, SiteboxArgs, SiteboxSubcommand},
    config::SiteboxConfig,
    export::FileTreeExporter,
    registry::{HttpRegistry, RuntimeRegistry},
    runtime::{ContentSaver, RuntimeCoordinator},
    sandbox::{NativeSandbox, SandboxBoot},
    utils::SANDBOX_ROOT,
    SiteboxError, SiteboxResult,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> SiteboxResult<()> {
    let args = SiteboxArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("sitebox=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so JSON printed on stdout stays parseable.
    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config = SiteboxConfig::from_env()?;
    match args.subcommand {
        Some(SiteboxSubcommand::Sync { root, project }) => {
            tracing::trace!("syncing project: root={root:?}, project={project:?}");
            sync(config, root, project).await?;
        }
        Some(SiteboxSubcommand::Save { root, runtime }) => {
            tracing::trace!("saving project: root={root:?}, runtime={runtime}");
            save(config, root, runtime).await?;
        }
        Some(SiteboxSubcommand::Export { root }) => {
            let sandbox = NativeSandbox::boot(root).await?;
            let snapshot = FileTreeExporter::new().export(&sandbox, SANDBOX_ROOT).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Some(SiteboxSubcommand::Get { id }) => {
            let registry = HttpRegistry::from_config(&config)?;
            let record = registry
                .get(&id)
                .await?
                .ok_or(SiteboxError::RuntimeNotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Some(SiteboxSubcommand::List { project }) => {
            let registry = HttpRegistry::from_config(&config)?;
            let project_id = config.resolve_project_id(project.as_deref());
            let records = registry.list_by_project(&project_id).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Some(SiteboxSubcommand::Delete { id }) => {
            let registry = HttpRegistry::from_config(&config)?;
            registry.delete(&id).await?;
            println!("{} {}", "deleted".valid(), id.literal());
        }
        None => {
            SiteboxArgs::command().print_help()?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

async fn sync(config: SiteboxConfig, root: PathBuf, project: Option<String>) -> SiteboxResult<()> {
    let registry = Arc::new(HttpRegistry::from_config(&config)?);
    let boot = SandboxBoot::spawn(NativeSandbox::boot(root));
    let coordinator = RuntimeCoordinator::new(registry, boot, config);
    coordinator.watch_boot();

    let id = coordinator
        .ensure_registered(project.as_deref())
        .await
        .ok_or(SiteboxError::NotRegistered)?;
    println!("{} {}", "registered".header(), id.literal());

    finish_save(ContentSaver::new(coordinator), project.as_deref()).await
}

async fn save(config: SiteboxConfig, root: PathBuf, runtime: String) -> SiteboxResult<()> {
    let registry = Arc::new(HttpRegistry::from_config(&config)?);
    let boot = SandboxBoot::spawn(NativeSandbox::boot(root));
    let coordinator = RuntimeCoordinator::new(registry, boot, config);
    coordinator.attach(&runtime).await?;

    finish_save(ContentSaver::new(coordinator), None).await
}

async fn finish_save(saver: ContentSaver, project: Option<&str>) -> SiteboxResult<()> {
    if !saver.save_content(project).await {
        eprintln!("{}", "save failed, see logs for details".error());
        return Err(SiteboxError::custom(anyhow::anyhow!("failed to save runtime content")));
    }

    println!("{}", "saved".valid());
    Ok(())
}
