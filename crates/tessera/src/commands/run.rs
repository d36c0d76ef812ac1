//! Running tasks, services included.

use std::path::Path;

use anyhow::{Context, Result};
use tessera_server::{DevServer, ServerConfig, WatchSession};
use tessera_tasks::{Project, RunSummary, TaskKind, TaskName, TaskRunner};

/// Load the project and run `names`.
pub async fn run(config: &Path, names: &[TaskName]) -> Result<()> {
    let project = Project::load(config)
        .with_context(|| format!("Failed to load {}", config.display()))?;
    execute(project, names).await
}

/// Run build tasks, then start whatever services were requested.
///
/// A one-shot run fails when any task failed. Once a service is involved,
/// failures are logged and the services start anyway.
pub async fn execute(project: Project, names: &[TaskName]) -> Result<()> {
    let runner = TaskRunner::new(project);

    let mut summaries = vec![runner.run(names).await?];

    let started: Vec<TaskName> = names.iter().flat_map(|n| n.starts()).copied().collect();
    if !started.is_empty() {
        summaries.push(runner.run(&started).await?);
    }

    let services: Vec<TaskName> = names
        .iter()
        .chain(&started)
        .copied()
        .filter(|n| n.kind() == TaskKind::Service)
        .collect();

    let failed = failed_tasks(&summaries);
    if services.is_empty() {
        if !failed.is_empty() {
            anyhow::bail!("{} task(s) failed: {}", failed.len(), failed.join(", "));
        }
        return Ok(());
    }

    if !failed.is_empty() {
        tracing::warn!("Continuing after failed tasks: {}", failed.join(", "));
    }

    start_services(
        runner,
        services.contains(&TaskName::Webserver),
        services.contains(&TaskName::Watch),
    )
    .await
}

fn failed_tasks(summaries: &[RunSummary]) -> Vec<&'static str> {
    summaries
        .iter()
        .flat_map(RunSummary::failed)
        .map(|t| t.as_str())
        .collect()
}

/// Run the dev server and/or the watch session until Ctrl-C.
async fn start_services(runner: TaskRunner, webserver: bool, watch: bool) -> Result<()> {
    let server = webserver.then(|| DevServer::new(ServerConfig::from_project(runner.project())));

    let session = if watch {
        let mut session = WatchSession::new(runner.clone())?;
        if let Some(server) = &server {
            session = session.with_reload(server.hub());
        }
        Some(session)
    } else {
        None
    };

    let services = async {
        match (server, session) {
            (Some(server), Some(session)) => {
                tokio::try_join!(server.start(), session.run())?;
            }
            (Some(server), None) => server.start().await?,
            (None, Some(session)) => session.run().await?,
            (None, None) => {}
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        result = services => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tessera_tasks::Settings;

    #[tokio::test]
    async fn one_shot_failure_is_an_error() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("app/scss")).unwrap();
        fs::write(temp.path().join("app/scss/main.scss"), "a { color: $nope; }").unwrap();

        let project = Project::new(temp.path(), Settings::default());
        let err = execute(project, &[TaskName::CssMain]).await.unwrap_err();

        assert!(err.to_string().contains("css:main"));
    }

    #[tokio::test]
    async fn clean_on_empty_project_succeeds() {
        let temp = tempdir().unwrap();
        let project = Project::new(temp.path(), Settings::default());

        execute(project, &[TaskName::Clean]).await.unwrap();
    }
}
