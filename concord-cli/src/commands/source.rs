//! `concord source` — manage the template source configured per space.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use concord_mirror::metadata::{self, TemplateSource};

#[derive(Subcommand, Debug)]
pub enum SourceCommand {
    /// Configure (or replace) the template source for a space.
    Set(SetArgs),
    /// Show the configured source for one space, or all of them.
    Show(ShowArgs),
    /// Remove the configured source for a space.
    Clear(ClearArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// The target space.
    pub space: String,

    /// Clone URL of the template repository.
    #[arg(long)]
    pub url: String,

    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Subdirectory of the repository holding the template.
    #[arg(long)]
    pub subdir: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Limit to one space.
    pub space: Option<String>,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    pub space: String,
}

pub fn run(command: SourceCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        SourceCommand::Set(args) => {
            // Keep fetch history when only the pointer moves.
            let mut source = match metadata::load_at(&home, &args.space) {
                Ok(existing) => existing,
                Err(_) => TemplateSource::new(&args.space, &args.url, &args.branch),
            };
            source.repository = args.url;
            source.branch = args.branch;
            source.subdir = args.subdir;
            source.updated_at = chrono::Utc::now();

            metadata::save_at(&home, &source)
                .with_context(|| format!("failed to save source for '{}'", args.space))?;
            println!(
                "source for '{}' set to {}@{}",
                source.space, source.repository, source.branch
            );
            Ok(())
        }
        SourceCommand::Show(args) => {
            let sources = match args.space {
                Some(space) => vec![metadata::load_at(&home, &space)?],
                None => metadata::list_at(&home)?,
            };
            if sources.is_empty() {
                println!("no template sources configured — run `concord source set`");
                return Ok(());
            }
            for source in sources {
                print_source(&source);
            }
            Ok(())
        }
        SourceCommand::Clear(args) => {
            metadata::clear_at(&home, &args.space)?;
            println!("source for '{}' cleared", args.space);
            Ok(())
        }
    }
}

fn print_source(source: &TemplateSource) {
    println!("{}", source.space);
    println!("  repository: {}@{}", source.repository, source.branch);
    if let Some(subdir) = &source.subdir {
        println!("  subdir:     {subdir}");
    }
    match (&source.last_commit, &source.fetched_at) {
        (Some(commit), Some(at)) => {
            println!("  fetched:    {} at {}", &commit[..commit.len().min(10)], at.to_rfc3339());
        }
        _ => println!("  fetched:    never"),
    }
}
