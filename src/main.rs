use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, warn};
use uuid::Uuid;

use storyflow::backend::HttpBackend;
use storyflow::config::Config;
use storyflow::error::{FlowError, Result};
use storyflow::filter::engine::{page_window, PageMark};
use storyflow::filter::{AssigneeFilter, FilterCriteria, ListView, PageView};
use storyflow::model::{StoryDraft, StoryUpdate, TaskDraft, TaskUpdate};
use storyflow::store::session::SessionFile;
use storyflow::workflow::registry::{StoryStatus, TaskStatus, Workflow};
use storyflow::workflow::transition::{Confirm, TransitionOutcome};
use storyflow::workspace::Workspace;

#[derive(Parser)]
#[command(
  name = "storyflow",
  about = "Command-line client for the story and task workflow platform"
)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Path to config file
  #[arg(short, long, default_value = "storyflow.yaml")]
  config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
  /// Log in and store the access token
  Login {
    email: String,
    /// Read from stdin when omitted
    #[arg(long)]
    password: Option<String>,
  },
  /// Log out and forget the stored token
  Logout,
  /// Show the logged-in user
  Whoami,
  /// List every status with its label and allowed next statuses
  Statuses,
  /// Show the dashboard summary
  Dashboard,
  /// List users
  Users,
  /// Work with stories
  #[command(subcommand)]
  Stories(StoryCommand),
  /// Work with the tasks of a story
  #[command(subcommand)]
  Tasks(TaskCommand),
}

#[derive(Args)]
struct ListArgs {
  /// Status code, e.g. DEVELOPMENT
  #[arg(long)]
  status: Option<String>,
  /// User id or "unassigned"
  #[arg(long, default_value = "")]
  assignee: AssigneeFilter,
  /// Case-insensitive text in title or description
  #[arg(long, default_value = "")]
  search: String,
  #[arg(long, default_value_t = 1)]
  page: usize,
}

#[derive(Subcommand)]
enum StoryCommand {
  List(ListArgs),
  Show {
    id: Uuid,
  },
  Create {
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    design_url: Option<String>,
  },
  Update {
    id: Uuid,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  Delete {
    id: Uuid,
  },
  Transition {
    id: Uuid,
    status: String,
    /// Skip the confirmation for transitions that generate Gherkin
    #[arg(long)]
    yes: bool,
  },
  Assign {
    id: Uuid,
    user: Uuid,
  },
  /// Set the design image URL
  Design {
    id: Uuid,
    url: String,
  },
  /// Generate a description from the design image
  Analyze {
    id: Uuid,
  },
}

#[derive(Subcommand)]
enum TaskCommand {
  List {
    story: Uuid,
    #[command(flatten)]
    args: ListArgs,
  },
  Create {
    story: Uuid,
    /// One task per title
    #[arg(required = true)]
    titles: Vec<String>,
    #[arg(long, default_value = "")]
    description: String,
  },
  Update {
    story: Uuid,
    id: Uuid,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
  },
  Delete {
    story: Uuid,
    id: Uuid,
  },
  Transition {
    story: Uuid,
    id: Uuid,
    status: String,
  },
  /// Assign to a user, or unassign with "unassigned"
  Assign {
    story: Uuid,
    id: Uuid,
    user: String,
  },
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
  fn confirm(&self, prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
      return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  if let Err(e) = run(cli).await {
    error!("{e}");
    // Configuration problems get their own exit code; anything else only
    // failed the one command.
    std::process::exit(if e.is_recoverable() { 1 } else { 2 });
  }
}

async fn run(cli: Cli) -> Result<()> {
  let config = Config::load(&cli.config)?;

  match cli.command {
    Commands::Login { email, password } => cmd_login(&config, &email, password).await,
    Commands::Logout => cmd_logout(&config).await,
    Commands::Whoami => cmd_whoami(&config).await,
    Commands::Statuses => {
      cmd_statuses();
      Ok(())
    }
    Commands::Dashboard => {
      let summary = workspace(&config)?.dashboard().await?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
      Ok(())
    }
    Commands::Users => cmd_users(&config).await,
    Commands::Stories(cmd) => cmd_stories(&config, cmd).await,
    Commands::Tasks(cmd) => cmd_tasks(&config, cmd).await,
  }
}

/// Environment token wins over the stored session.
fn token(config: &Config) -> Result<Option<String>> {
  if let Some(token) = config.env_token() {
    return Ok(Some(token));
  }
  let session = SessionFile::load(&config.session_file)?;
  Ok(session.token().map(str::to_string))
}

fn http(config: &Config) -> Result<HttpBackend> {
  HttpBackend::new(config, token(config)?.as_deref())
}

fn workspace(config: &Config) -> Result<Workspace> {
  Ok(Workspace::new(Arc::new(http(config)?)))
}

async fn cmd_login(config: &Config, email: &str, password: Option<String>) -> Result<()> {
  let password = match password {
    Some(p) => p,
    None => {
      eprint!("password: ");
      let _ = std::io::stderr().flush();
      let mut line = String::new();
      std::io::stdin().lock().read_line(&mut line)?;
      line.trim_end().to_string()
    }
  };

  let backend = HttpBackend::new(config, None)?;
  let access_token = backend.login(email, &password).await?;
  let mut session = SessionFile::load(&config.session_file)?;
  session.set_token(email, &access_token)?;
  println!("logged in as {email}");
  Ok(())
}

async fn cmd_logout(config: &Config) -> Result<()> {
  let request = match http(config) {
    Ok(backend) => backend.logout().await,
    Err(e) => Err(e),
  };
  if let Err(e) = request {
    warn!("logout request failed: {e}");
  }
  let mut session = SessionFile::load(&config.session_file).unwrap_or_else(|e| {
    warn!("unreadable session file, overwriting: {e}");
    SessionFile::empty(&config.session_file)
  });
  session.clear()?;
  println!("logged out");
  Ok(())
}

async fn cmd_whoami(config: &Config) -> Result<()> {
  let user = http(config)?.current_user().await?;
  println!("{user}");
  println!("  id: {}", user.id);
  Ok(())
}

fn cmd_statuses() {
  println!("Stories:");
  print_statuses(&StoryStatus::all());
  println!();
  println!("Tasks:");
  print_statuses(&TaskStatus::all());
}

fn print_statuses<S: Workflow>(statuses: &[S]) {
  for status in statuses {
    let next: Vec<String> = status.allowed_next().iter().map(|s| s.code().to_string()).collect();
    let description = status.meta().map(|m| m.description).unwrap_or_default();
    println!(
      "  {:<22} {:<22} {:<8} -> {}",
      status.code(),
      status.label(),
      format!("{:?}", status.tone()).to_lowercase(),
      next.join(", ")
    );
    if !description.is_empty() {
      println!("  {:<22} {description}", "");
    }
  }
}

async fn cmd_users(config: &Config) -> Result<()> {
  let ws = workspace(config)?;
  ws.refresh_users().await?;
  for user in ws.users() {
    println!("{}  {user}", user.id);
  }
  Ok(())
}

fn criteria<S>(status: Option<S>, args: &ListArgs) -> FilterCriteria<S> {
  let mut criteria = FilterCriteria::default()
    .with_assignee(args.assignee.clone())
    .with_search(args.search.trim());
  criteria.status = status;
  criteria
}

fn parse_story_status(code: &str) -> Result<StoryStatus> {
  StoryStatus::parse_known(code)
    .ok_or_else(|| FlowError::Validation(format!("unknown story status: {code}")))
}

fn parse_task_status(code: &str) -> Result<TaskStatus> {
  TaskStatus::parse_known(code)
    .ok_or_else(|| FlowError::Validation(format!("unknown task status: {code}")))
}

fn print_page_footer<S: PartialEq, T>(view: &ListView<S>, page: &PageView<T>) {
  let filtered = if view.criteria().is_empty() { "" } else { " (filtered)" };
  if page.total_matches == 0 {
    println!("no matches{filtered}");
    return;
  }
  let marks: Vec<String> = page_window(page.page, page.total_pages, 5)
    .into_iter()
    .map(|mark| match mark {
      PageMark::Page(n) if n == page.page => format!("[{n}]"),
      PageMark::Page(n) => n.to_string(),
      PageMark::Gap => "...".to_string(),
    })
    .collect();
  println!(
    "{} match(es){filtered}, page {} of {} ({} per page)  {}",
    page.total_matches,
    page.page,
    page.total_pages,
    view.page_size(),
    marks.join(" ")
  );
}

async fn cmd_stories(config: &Config, cmd: StoryCommand) -> Result<()> {
  let ws = workspace(config)?;

  match cmd {
    StoryCommand::List(args) => {
      let status = args.status.as_deref().map(parse_story_status).transpose()?;
      let mut view = ListView::new(config.page_size);
      view.set_criteria(criteria(status, &args));
      view.set_page(args.page);

      ws.refresh_stories().await?;
      let page = ws.story_page(&view);
      page.ensure_exists()?;
      for story in &page.items {
        println!("{story}");
      }
      print_page_footer(&view, &page);
    }
    StoryCommand::Show { id } => {
      let story = ws.load_story(id).await?;
      println!("{story}");
      println!("  status: {} ({})", story.status.label(), story.status.code());
      if let Some(assignee) = story.assigned_to {
        match ws.load_user(assignee).await {
          Ok(user) => println!("  assigned to: {user}"),
          Err(_) => println!("  assigned to: {assignee}"),
        }
      }
      if let Some(url) = &story.design_url {
        println!("  design: {url}");
      }
      if !story.description.is_empty() {
        println!("\n{}", story.description);
      }
      if let Some(gherkin) = story.gherkin() {
        println!("\n{gherkin}");
      }
      ws.refresh_tasks(id).await?;
      let tasks = ws.tasks();
      if !tasks.is_empty() {
        println!("\ntasks:");
        for task in tasks {
          println!("  {task}");
        }
      }
    }
    StoryCommand::Create {
      title,
      description,
      design_url,
    } => {
      let draft = StoryDraft {
        title,
        description,
        design_url,
      };
      println!("{}", ws.create_story(&draft).await?);
    }
    StoryCommand::Update {
      id,
      title,
      description,
    } => {
      let update = StoryUpdate { title, description };
      println!("{}", ws.update_story(id, &update).await?);
    }
    StoryCommand::Delete { id } => {
      ws.delete_story(id).await?;
      println!("deleted {id}");
    }
    StoryCommand::Transition { id, status, yes } => {
      let target = parse_story_status(&status)?;
      let transitions = ws.transitions();
      let outcome = if yes {
        transitions.transition_story(id, target, &|_: &str| true).await?
      } else {
        transitions.transition_story(id, target, &StdinConfirm).await?
      };
      match outcome {
        TransitionOutcome::Reconciled(story) => {
          println!("{story}");
          if let Some(gherkin) = story.gherkin() {
            println!("\n{gherkin}");
          }
        }
        TransitionOutcome::Unchanged => println!("already {}", status.to_uppercase()),
        TransitionOutcome::Declined => println!("cancelled"),
      }
    }
    StoryCommand::Assign { id, user } => {
      println!("{}", ws.transitions().assign_story(id, user).await?);
    }
    StoryCommand::Design { id, url } => {
      println!("{}", ws.set_design_url(id, &url).await?);
    }
    StoryCommand::Analyze { id } => {
      let analysis = ws.analyze_design(id).await?;
      match analysis.generated_description {
        Some(description) => println!("{description}"),
        None => println!("no description generated"),
      }
    }
  }
  Ok(())
}

async fn cmd_tasks(config: &Config, cmd: TaskCommand) -> Result<()> {
  let ws = workspace(config)?;

  match cmd {
    TaskCommand::List { story, args } => {
      let status = args.status.as_deref().map(parse_task_status).transpose()?;
      let mut view = ListView::new(config.page_size);
      view.set_criteria(criteria(status, &args));
      view.set_page(args.page);

      ws.refresh_tasks(story).await?;
      let page = ws.task_page(&view);
      page.ensure_exists()?;
      for task in &page.items {
        println!("{task}");
      }
      print_page_footer(&view, &page);
    }
    TaskCommand::Create {
      story,
      titles,
      description,
    } => {
      let drafts: Vec<TaskDraft> = titles
        .into_iter()
        .map(|title| TaskDraft {
          story_id: story,
          title,
          description: description.clone(),
        })
        .collect();
      let outcome = ws.create_tasks(&drafts).await?;
      for task in &outcome.created {
        println!("{task}");
      }
      for (title, e) in &outcome.rejected {
        println!("rejected {title:?}: {e}");
      }
    }
    TaskCommand::Update {
      story,
      id,
      title,
      description,
    } => {
      ws.refresh_tasks(story).await?;
      let update = TaskUpdate { title, description };
      println!("{}", ws.update_task(id, &update).await?);
    }
    TaskCommand::Delete { story, id } => {
      ws.refresh_tasks(story).await?;
      ws.delete_task(id).await?;
      println!("deleted {id}");
    }
    TaskCommand::Transition { story, id, status } => {
      let target = parse_task_status(&status)?;
      ws.refresh_tasks(story).await?;
      match ws.transitions().transition_task(id, target).await? {
        TransitionOutcome::Reconciled(task) => println!("{task}"),
        TransitionOutcome::Unchanged => println!("already {}", status.to_uppercase()),
        TransitionOutcome::Declined => println!("cancelled"),
      }
    }
    TaskCommand::Assign { story, id, user } => {
      let assignee = match user.parse::<AssigneeFilter>().map_err(FlowError::Validation)? {
        AssigneeFilter::User(user) => Some(user),
        AssigneeFilter::Unassigned => None,
        AssigneeFilter::Any => {
          return Err(FlowError::Validation(
            "expected a user id or \"unassigned\"".into(),
          ))
        }
      };
      ws.refresh_tasks(story).await?;
      println!("{}", ws.transitions().assign_task(id, assignee).await?);
    }
  }
  Ok(())
}
