use clap::Parser;
use miette::Result;
use roster::cli::{Cli, Commands};
use roster::core::{logging, Config};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;

    let config = Config::load();
    logging::init(
        config.log_level.as_deref(),
        config.log_file.as_deref(),
        global.verbose,
        global.quiet,
    );

    match cli.command {
        Commands::Init(args) => roster::cli::commands::init::run(args),
        Commands::Region(cmd) => roster::cli::commands::region::run(cmd, &global),
        Commands::Position(cmd) => roster::cli::commands::position::run(cmd, &global),
        Commands::Member(cmd) => roster::cli::commands::member::run(cmd, &global),
        Commands::Dept(cmd) => roster::cli::commands::dept::run(cmd, &global),
        Commands::Import(args) => roster::cli::commands::import::run(args, &global),
        Commands::Db(cmd) => roster::cli::commands::db::run(cmd, &global),
        Commands::Completions(args) => roster::cli::commands::completions::run(args),
    }
}
