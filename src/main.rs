use anyhow::Result;
use clap::Parser;
use pastedown::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    pastedown::infra::logging::init(cli.quiet);

    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Apply(args) => pastedown::core::apply::apply_run(args, &ctx),
        Commands::Preview(args) => pastedown::core::apply::preview_run(args, &ctx),
        Commands::Init(args) => pastedown::infra::config::init(args, &ctx),
    }
}
