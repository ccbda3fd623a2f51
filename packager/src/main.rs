//! Lightning packager CLI entrypoint.
//!
//! This binary loads a recipe, resolves settings and options, and runs the
//! requested pipeline stage against the recipe's work directory.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use lightning_packager::cli::{Cli, Command, CommonArgs};
use lightning_packager::error::{PackagerError, Result};
use lightning_packager::executor::SystemCommandExecutor;
use lightning_packager::fetch::UrlDownloader;
use lightning_packager::options::BuildOptions;
use lightning_packager::output::{DryRunInfo, InspectReport, write_stderr_line};
use lightning_packager::pipeline::{PackageInfo, Pipeline, PipelineContext, WorkLayout};
use lightning_packager::recipe::Recipe;
use lightning_packager::settings::Settings;
use std::io::Write;

struct RunContext {
    recipe: Recipe,
    settings: Settings,
    options: BuildOptions,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.common);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_logging(args: &CommonArgs) {
    let env = env_logger::Env::default().default_filter_or(args.log_level());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let context = resolve_context(&cli.common)?;
    let command = cli.effective_command();

    if let Command::Inspect(args) = &command {
        let report = InspectReport::new(
            &context.recipe,
            &context.settings,
            &context.options,
            PackageInfo::default(),
        );
        let text = if args.json {
            serde_json::to_string_pretty(&report).map_err(std::io::Error::other)
        } else {
            Ok(report.display_text())
        };
        return text
            .and_then(|text| writeln!(stdout, "{text}"))
            .map_err(|source| PackagerError::WriteFailed { source });
    }

    let layout = WorkLayout::new(determine_work_dir(
        cli.common.work_dir.as_deref(),
        &context.recipe,
    )?);

    if cli.common.dry_run {
        let info = DryRunInfo {
            recipe: &context.recipe,
            settings: &context.settings,
            options: &context.options,
            layout: &layout,
            jobs: cli.common.jobs,
        };
        write_stderr_line(stderr, info.display_text());
        return Ok(());
    }

    let downloader = UrlDownloader;
    let executor = SystemCommandExecutor;
    let pipeline = Pipeline::new(
        PipelineContext {
            recipe: &context.recipe,
            settings: &context.settings,
            options: &context.options,
            layout: &layout,
            jobs: cli.common.jobs,
            quiet: cli.common.quiet,
        },
        &downloader,
        &executor,
    );

    match command {
        Command::Create => pipeline.run(stderr).map(drop),
        Command::Source => pipeline.source(stderr).map(drop),
        Command::Build => pipeline.build(stderr).map(drop),
        Command::Package => pipeline.package(stderr).map(drop),
        Command::Inspect(_) => Ok(()),
    }
}

/// Loads the recipe and resolves settings and options against it.
fn resolve_context(args: &CommonArgs) -> Result<RunContext> {
    let recipe = match &args.recipe {
        Some(path) => Recipe::load(path)?,
        None => Recipe::builtin()?,
    };
    let mut settings = Settings::from_env()?;
    if let Some(platform) = args.platform {
        settings = settings.with_platform(platform);
    }
    let options = BuildOptions::resolve(&recipe.options, &args.options)?;
    Ok(RunContext {
        recipe,
        settings,
        options,
    })
}

/// Uses the CLI work directory or falls back to the per-user cache.
fn determine_work_dir(cli_work_dir: Option<&Utf8Path>, recipe: &Recipe) -> Result<Utf8PathBuf> {
    match cli_work_dir {
        Some(dir) => Ok(dir.to_owned()),
        None => WorkLayout::default_root(&recipe.descriptor.slug()),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            let message = err.to_string();
            write_stderr_line(stderr, format!("error: {message}"));
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                let cause_text = cause.to_string();
                if !message.contains(&cause_text) {
                    write_stderr_line(stderr, format!("  caused by: {cause_text}"));
                }
                source = cause.source();
            }
            1
        }
    }
}
