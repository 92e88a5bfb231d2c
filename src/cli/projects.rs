use anyhow::{Context, Result};
use chrono::Local;
use clap::Subcommand;

use crate::{
    storage::record_store::RecordStore,
    tracking::projects::{create_project, delete_project, edit_project},
    utils::{clock::DefaultClock, time::format_date},
};

use super::{paint_project, resolve_project, Application};

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    #[command(about = "Create a project")]
    Add {
        name: String,
        #[arg(short, long, help = "Display color as #rrggbb")]
        color: Option<String>,
    },
    #[command(about = "List projects")]
    List {},
    #[command(about = "Rename or recolor a project")]
    Edit {
        #[arg(help = "Project name or id")]
        project: String,
        #[arg(long, help = "New name")]
        name: Option<String>,
        #[arg(short, long, help = "New color as #rrggbb")]
        color: Option<String>,
        #[arg(long, conflicts_with = "color", help = "Remove the color")]
        clear_color: bool,
    },
    #[command(about = "Delete a project that no entry refers to")]
    Delete {
        #[arg(help = "Project name or id")]
        project: String,
    },
}

pub async fn process_project_command(app: &Application, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Add { name, color } => {
            let project = create_project(&app.store, &DefaultClock, &name, color.as_deref())
                .await
                .context("Couldn't create the project")?;
            println!(
                "Created {} {}",
                paint_project(&project.name, project.color.as_deref()),
                project.id
            );
        }
        ProjectCommand::List {} => {
            let projects = app.store.projects().await?;
            if projects.is_empty() {
                println!("No projects yet");
            }
            for project in projects {
                println!(
                    "{}\t{}\t{}",
                    project.id,
                    format_date(project.created_at.with_timezone(&Local).date_naive()),
                    paint_project(&project.name, project.color.as_deref()),
                );
            }
        }
        ProjectCommand::Edit {
            project,
            name,
            color,
            clear_color,
        } => {
            let project = resolve_project(&app.store, &project).await?;
            let color = if clear_color {
                Some(None)
            } else {
                color.as_deref().map(Some)
            };
            let project = edit_project(&app.store, project.id, name.as_deref(), color)
                .await
                .context("Couldn't edit the project")?;
            println!(
                "Updated {}",
                paint_project(&project.name, project.color.as_deref())
            );
        }
        ProjectCommand::Delete { project } => {
            let project = resolve_project(&app.store, &project).await?;
            delete_project(&app.store, project.id)
                .await
                .with_context(|| format!("Couldn't delete project '{}'", project.name))?;
            println!("Deleted {}", project.name);
        }
    }
    Ok(())
}
