//! Command-line interface definitions.
//!
//! One subcommand per action. The config file path can also come from
//! `GATOR_CONFIG_PATH`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gator", author, version, about)]
pub struct Cli {
    /// Path to the config file (defaults to ~/.gatorconfig.json)
    #[arg(long, env = "GATOR_CONFIG_PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a user and make it the current user
    Register { name: String },

    /// Switch the current user
    Login { name: String },

    /// List registered users
    Users,

    /// Add a feed and follow it as the current user
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },

    /// List all feeds
    Feeds,

    /// Follow an existing feed by URL
    Follow { url: String },

    /// List feeds the current user follows
    Following,

    /// Stop following a feed by URL
    Unfollow { url: String },

    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = 2, value_parser = clap::value_parser!(i64).range(1..))]
        limit: i64,
    },

    /// Poll followed feeds, one per interval (e.g. `30s`, `1m`, `1h30m`)
    Agg { interval: String },

    /// Delete all users, feeds and posts
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_addfeed() {
        let cli = Cli::parse_from([
            "gator",
            "addfeed",
            "Hacker News",
            "https://news.ycombinator.com/rss",
        ]);
        assert_eq!(
            cli.command,
            Command::AddFeed {
                name: "Hacker News".into(),
                url: "https://news.ycombinator.com/rss".into()
            }
        );
    }

    #[test]
    fn browse_defaults_to_two() {
        let cli = Cli::parse_from(["gator", "browse"]);
        assert_eq!(cli.command, Command::Browse { limit: 2 });
        let cli = Cli::parse_from(["gator", "browse", "10"]);
        assert_eq!(cli.command, Command::Browse { limit: 10 });
    }

    #[test]
    fn browse_rejects_non_positive_limit() {
        assert!(Cli::try_parse_from(["gator", "browse", "0"]).is_err());
        assert!(Cli::try_parse_from(["gator", "browse", "x"]).is_err());
    }

    #[test]
    fn agg_takes_interval_string_verbatim() {
        let cli = Cli::parse_from(["gator", "agg", "1m"]);
        assert_eq!(cli.command, Command::Agg { interval: "1m".into() });
    }

    #[test]
    fn global_config_flag_before_subcommand() {
        let cli = Cli::parse_from(["gator", "--config", "/tmp/g.json", "register", "kahya"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/g.json")));
    }

    #[test]
    fn missing_args_fail() {
        assert!(Cli::try_parse_from(["gator", "login"]).is_err());
        assert!(Cli::try_parse_from(["gator", "agg"]).is_err());
        assert!(Cli::try_parse_from(["gator", "nope"]).is_err());
    }
}
