use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use scoutdeck_common::{
    auth::FilePersistence,
    config::AppConfig,
    lifecycle::team_dashboard,
    models::{RegisterRequest, ReportForm, ReportStatus, Role},
    overview::{ReportQuery, SortDirection, SortField, StatusFilter},
    polling::NotificationPoller,
    ApiClient, ReportEditor, SessionStore,
};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser)]
#[command(name = "scoutdeck")]
#[command(about = "Scouting reports on Premier League opponents", long_about = None)]
struct Cli {
    /// Override the configured API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "analyst")]
        role: Role,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List teams
    Teams,
    /// Report status for every team
    Dashboard,
    /// Reports overview
    Reports {
        /// Match on team name or report id
        #[arg(long)]
        search: Option<String>,
        /// all, not-started, in-progress or completed
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
        /// team-name, last-updated or completion
        #[arg(long, default_value = "last-updated")]
        sort: SortField,
        /// Ascending order (default is descending)
        #[arg(long)]
        asc: bool,
    },
    /// Show one report
    Show { id: i64 },
    /// Create or update your report on a team
    Edit {
        #[arg(long)]
        team: i64,
        /// JSON file holding the report form
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        status: Option<ReportStatus>,
        /// Save with status completed
        #[arg(long, conflicts_with = "status")]
        complete: bool,
    },
    /// Delete a report
    Delete { id: i64 },
    /// Recent activity
    Notifications {
        /// Keep polling until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.client.api_url = url;
    }

    let session = SessionStore::with_persistence(Box::new(FilePersistence::new(config.session_file())))
        .context("failed to open the session file")?;
    let api = Arc::new(ApiClient::from_config(&config, Arc::new(session))?);

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };
            let user = api.login(&username, &password).await?;
            println!("Signed in as {} ({}).", user.display_name(), user.role);
        }
        Commands::Register {
            username,
            email,
            password,
            role,
            first_name,
            last_name,
        } => {
            let user = api
                .register(&RegisterRequest {
                    username,
                    email,
                    password,
                    first_name,
                    last_name,
                    role,
                })
                .await?;
            println!("Registered {} as {}.", user.username, user.role);
        }
        Commands::Logout => {
            api.logout()?;
            println!("Signed out.");
        }
        Commands::Whoami => {
            let user = match api.session().get().and_then(|session| session.user.clone()) {
                Some(user) => user,
                None => api.current_user().await?,
            };
            println!("{} <{}> ({})", user.display_name(), user.email, user.role);
        }
        Commands::Teams => {
            let teams = api.list_teams().await?;
            print!("{}", render::teams(&teams));
        }
        Commands::Dashboard => {
            let rows = team_dashboard(api.as_ref()).await?;
            print!("{}", render::dashboard(&rows));
        }
        Commands::Reports {
            search,
            filter,
            sort,
            asc,
        } => {
            let query = ReportQuery {
                search,
                filter,
                sort,
                direction: if asc { SortDirection::Asc } else { SortDirection::Desc },
            };
            let rows = query.apply(api.list_reports().await?);
            print!("{}", render::overview(&rows));
        }
        Commands::Show { id } => {
            let report = api.get_report(id).await?;
            print!("{}", render::report(&report));
        }
        Commands::Edit {
            team,
            file,
            status,
            complete,
        } => {
            let editor = ReportEditor::new(api.clone());
            editor.open(team).await?;
            if let Some(message) = editor.last_error() {
                tracing::warn!(team, "{}", message);
            }

            if let Some(path) = file {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let mut form: ReportForm = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not a valid report form", path.display()))?;
                // keep the stored status unless the file or a flag sets one
                if !raw_sets_status(&raw) {
                    form.status = editor.form().status;
                }
                editor.set_form(form);
            }
            if let Some(status) = status {
                editor.set_status(status);
            }

            let existed = editor.report_id().is_some();
            let report = if complete {
                editor.mark_complete().await?
            } else {
                editor.save().await?
            };
            println!(
                "{} report #{} ({}% complete).",
                if existed { "Updated" } else { "Created" },
                report.id.unwrap_or_default(),
                editor.completion()
            );
        }
        Commands::Delete { id } => {
            api.delete_report(id).await?;
            println!("Deleted report #{}.", id);
        }
        Commands::Notifications { watch } => {
            if !watch {
                for activity in api.list_activities().await? {
                    println!("{}", render::activity(&activity));
                }
                return Ok(());
            }
            watch_notifications(api, &config).await?;
        }
    }

    Ok(())
}

fn raw_sets_status(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|value| value.get("status").is_some())
        .unwrap_or(false)
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("a password is required");
    }
    Ok(password)
}

async fn watch_notifications(api: Arc<ApiClient>, config: &AppConfig) -> anyhow::Result<()> {
    let handle = NotificationPoller::new(api)
        .with_interval(config.poll_interval())
        .start();
    let mut rx = handle.subscribe();
    let mut seen = HashSet::new();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                if let Some(error) = &state.last_error {
                    eprintln!("poll failed: {}", error);
                }
                // feed is newest first
                for activity in state.activities.iter().rev() {
                    if seen.insert(activity.id) {
                        println!("{}", render::activity(activity));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop();
    Ok(())
}
