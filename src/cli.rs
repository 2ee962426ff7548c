use clap::{Parser, Subcommand};

/// Energy provider adapter: normalized REST API over the provider
#[derive(Parser, Debug)]
#[command(name = "energy-adapter", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the adapter server
    Serve {
        /// Port to bind
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate,

    /// Provider credential diagnostics
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Perform one client-credentials exchange and report the result
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_help_and_version_need_no_environment() {
        let err = Cli::try_parse_from(["energy-adapter", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);

        let err = Cli::try_parse_from(["energy-adapter", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_serve_port_flag() {
        let cli = Cli::try_parse_from(["energy-adapter", "serve", "--port", "9090"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve { port: Some(9090) })));
    }

    #[test]
    fn test_auth_check_subcommand() {
        let cli = Cli::try_parse_from(["energy-adapter", "auth", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Auth {
                command: AuthCommands::Check
            })
        ));
    }
}
