use anyhow::{bail, Context};
use clap::Parser;
use taskdeck::config::defaults::DEFAULT_TASKFILE;
use taskdeck::config::{Command, RunArgs, TaskKind};
use taskdeck::utils::{logger, validation::Validate};
use taskdeck::{Cli, ExecutionPlan, Profile, ProcessRunner, TaskError, TaskFile, TaskSequence};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logger::init_cli_logger(cli.verbose, cli.log_format);
    tracing::debug!("CLI arguments: {:?}", cli);

    let exit_code = match dispatch(&cli).await {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<TaskError>() {
            Some(task_error) => {
                tracing::error!(
                    "❌ {} (Category: {:?})",
                    task_error,
                    task_error.category()
                );
                eprintln!("❌ {}", task_error.user_friendly_message());
                eprintln!("💡 {}", task_error.recovery_suggestion());
                task_error.exit_code()
            }
            None => {
                eprintln!("❌ {:#}", e);
                1
            }
        },
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn dispatch(cli: &Cli) -> anyhow::Result<i32> {
    cli.validate()?;

    match &cli.command {
        Command::Init { force } => init(cli, *force),
        Command::List => {
            let taskfile = load_taskfile(cli)?;
            list(&taskfile);
            Ok(0)
        }
        Command::Check => {
            let taskfile = load_taskfile(cli)?;
            let composites = taskfile
                .tasks
                .values()
                .filter(|task| task.kind() == TaskKind::Composite)
                .count();
            println!(
                "✅ {}: {} task(s), {} composite; profile from ${} (default '{}')",
                cli.file.display(),
                taskfile.tasks.len(),
                composites,
                taskfile.profile.variable,
                taskfile.profile.default
            );
            Ok(0)
        }
        Command::Run(args) => run(cli, args).await,
    }
}

fn load_taskfile(cli: &Cli) -> anyhow::Result<TaskFile> {
    let taskfile = TaskFile::from_file(&cli.file)?;
    taskfile.validate()?;
    tracing::debug!(
        "Loaded {} task(s) from {}",
        taskfile.tasks.len(),
        cli.file.display()
    );
    Ok(taskfile)
}

fn init(cli: &Cli, force: bool) -> anyhow::Result<i32> {
    if cli.file.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            cli.file.display()
        );
    }

    if let Some(parent) = cli.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(&cli.file, DEFAULT_TASKFILE)
        .with_context(|| format!("writing {}", cli.file.display()))?;

    println!("✅ Wrote {}", cli.file.display());
    Ok(0)
}

fn list(taskfile: &TaskFile) {
    let width = taskfile
        .tasks
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0);

    println!("Tasks in {}:", taskfile.project.name);
    for (name, task) in &taskfile.tasks {
        let description = task.description.as_deref().unwrap_or("");
        match &task.steps {
            Some(steps) => println!(
                "  {:width$}  {} ({})",
                name,
                description,
                steps.join(" → "),
                width = width
            ),
            None => println!("  {:width$}  {}", name, description, width = width),
        }
    }
}

async fn run(cli: &Cli, args: &RunArgs) -> anyhow::Result<i32> {
    let taskfile = load_taskfile(cli)?;
    let base_dir = cli.base_dir();

    let profile = Profile::resolve(&taskfile.profile, cli.profile.as_deref(), &base_dir)?;
    let plan = ExecutionPlan::build(&taskfile, &profile, &base_dir, &args.tasks)?;

    if args.dry_run {
        tracing::info!("🔍 Dry run, nothing will be executed");
        print!("{}", plan.render());
        return Ok(0);
    }

    if args.monitor {
        tracing::info!("🔍 Process monitoring enabled");
    }

    let execution_id = args
        .execution_id
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("run_%Y%m%d_%H%M%S").to_string());

    let runner = ProcessRunner::new().with_monitoring(args.monitor);
    let report = TaskSequence::new(runner, execution_id)
        .execute(&plan)
        .await;
    report.log_summary();

    if let Some(path) = &args.summary {
        if let Err(e) = report.export(path).await {
            tracing::warn!("⚠️ Could not write summary to {}: {}", path.display(), e);
        }
    }

    report.into_result()?;
    Ok(0)
}
