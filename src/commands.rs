// src/commands.rs
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::config::GatorConfig;
use crate::ingest::fetcher::HttpFetcher;
use crate::ingest::scheduler::run_aggregation_loop;
use crate::ingest::types::{FeedSource, FeedStore};
use crate::storage::{FeedListing, PgStore, Post, User};

const OUTPUT_TIME_FORMAT: &str = "%d-%b-%Y at %H:%M";
const PRINT_DELIMITER: &str = "==============================================================================";

/// Config + database, shared by every command.
pub struct AppState {
    pub cfg: GatorConfig,
    pub store: PgStore,
}

impl AppState {
    pub async fn connect(cli: &Cli) -> Result<Self> {
        let cfg = match &cli.config {
            Some(p) => GatorConfig::load_from(p)?,
            None => GatorConfig::load()?,
        };
        let db_url = cfg.database_url()?;
        let store = PgStore::connect(&db_url)
            .await
            .context("connecting to database")?;
        Ok(Self { cfg, store })
    }

    /// The logged-in user from config, which must exist in the database.
    pub async fn current_user(&self) -> Result<User> {
        let name = self
            .cfg
            .current_user()
            .ok_or_else(|| anyhow!("no user logged in; run `gator login <name>` first"))?;
        self.store
            .get_user(name)
            .await?
            .ok_or_else(|| anyhow!("user {name:?} does not exist"))
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut state = AppState::connect(&cli).await?;
    dispatch(&mut state, cli.command).await
}

pub async fn dispatch(state: &mut AppState, command: Command) -> Result<()> {
    match command {
        Command::Register { name } => register(state, &name).await,
        Command::Login { name } => login(state, &name).await,
        Command::Users => users(state).await,
        Command::Feeds => feeds(state).await,
        Command::Reset => reset(state).await,
        Command::AddFeed { name, url } => {
            let user = state.current_user().await?;
            add_feed(state, &user, &name, &url).await
        }
        Command::Follow { url } => {
            let user = state.current_user().await?;
            follow(state, &user, &url).await
        }
        Command::Following => {
            let user = state.current_user().await?;
            following(state, &user).await
        }
        Command::Unfollow { url } => {
            let user = state.current_user().await?;
            unfollow(state, &user, &url).await
        }
        Command::Browse { limit } => {
            let user = state.current_user().await?;
            browse(state, &user, limit).await
        }
        Command::Agg { interval } => {
            let user = state.current_user().await?;
            agg(state, &user, &interval).await
        }
    }
}

async fn register(state: &mut AppState, name: &str) -> Result<()> {
    let user = state
        .store
        .create_user(name)
        .await
        .with_context(|| format!("couldn't create user {name:?}"))?;
    state
        .cfg
        .set_user(&user.name)
        .context("couldn't set current user")?;
    println!("User {} successfully created", user.name);
    Ok(())
}

async fn login(state: &mut AppState, name: &str) -> Result<()> {
    let user = state
        .store
        .get_user(name)
        .await?
        .ok_or_else(|| anyhow!("user {name:?} does not exist"))?;
    state
        .cfg
        .set_user(&user.name)
        .context("couldn't set current user")?;
    println!("The user has been successfully set to {}", user.name);
    Ok(())
}

async fn users(state: &AppState) -> Result<()> {
    let users = state.store.list_users().await?;
    if users.is_empty() {
        println!("No registered users");
        return Ok(());
    }
    println!("Registered users:");
    for user in users {
        if Some(user.name.as_str()) == state.cfg.current_user() {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

async fn add_feed(state: &AppState, user: &User, name: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("feed URL must not be empty");
    }
    let feed = state
        .store
        .create_feed(name, url, user.id)
        .await
        .context("couldn't create feed")?;
    state
        .store
        .create_feed_follow(user.id, feed.id)
        .await
        .context("couldn't create feed follow")?;

    print_feed(&FeedListing {
        id: feed.id,
        name: feed.name,
        url: feed.url,
        created_at: feed.created_at,
        updated_at: feed.updated_at,
        last_fetched_at: feed.last_fetched_at,
        user_name: user.name.clone(),
    });
    println!("{PRINT_DELIMITER}");
    Ok(())
}

async fn feeds(state: &AppState) -> Result<()> {
    let feeds = state.store.list_feeds().await.context("couldn't get feeds")?;
    if feeds.is_empty() {
        println!("No feeds found");
        return Ok(());
    }
    println!("Found {} feeds:", feeds.len());
    for feed in &feeds {
        print_feed(feed);
        println!("{PRINT_DELIMITER}");
    }
    Ok(())
}

async fn follow(state: &AppState, user: &User, url: &str) -> Result<()> {
    let feed = state
        .store
        .get_feed_by_url(url)
        .await?
        .ok_or_else(|| anyhow!("no feed with URL {url:?}; add it with `gator addfeed`"))?;
    let ff = state
        .store
        .create_feed_follow(user.id, feed.id)
        .await
        .context("couldn't follow feed")?;
    println!("You are now following:");
    println!("Feed: {}", ff.feed_name);
    println!("User: {}", ff.user_name);
    Ok(())
}

async fn following(state: &AppState, user: &User) -> Result<()> {
    let follows = state.store.list_follows_for_user(user.id).await?;
    if follows.is_empty() {
        println!("No following feeds.");
        return Ok(());
    }
    println!("Your followed feeds:");
    for ff in follows {
        println!("* {}", ff.feed_name);
    }
    Ok(())
}

async fn unfollow(state: &AppState, user: &User, url: &str) -> Result<()> {
    let removed = state.store.delete_feed_follow(user.id, url).await?;
    if removed == 0 {
        bail!("you are not following {url:?}");
    }
    println!("Unfollowed {url}");
    Ok(())
}

async fn browse(state: &AppState, user: &User, limit: i64) -> Result<()> {
    let posts = state
        .store
        .posts_for_user(user.id, limit)
        .await
        .context("couldn't get posts for user")?;
    for post in &posts {
        print_post(post);
        println!("{PRINT_DELIMITER}");
    }
    Ok(())
}

async fn agg(state: &AppState, user: &User, interval: &str) -> Result<()> {
    let store: Arc<dyn FeedStore> = Arc::new(state.store.clone());
    let source: Arc<dyn FeedSource> = Arc::new(HttpFetcher::from_env()?);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, stopping"),
            Err(e) => {
                tracing::error!(error = %e, "couldn't listen for ctrl-c; running until killed");
                std::future::pending::<()>().await;
            }
        }
    };

    let ticks = run_aggregation_loop(store, source, interval, user.id, shutdown).await?;
    info!(ticks, "aggregation finished");
    Ok(())
}

async fn reset(state: &AppState) -> Result<()> {
    let removed = state.store.delete_all_users().await?;
    info!(removed, "users table cleared");
    println!("Database was successfully reset");
    Ok(())
}

fn print_feed(feed: &FeedListing) {
    println!("* ID: {}", feed.id);
    println!("* Created: {}", feed.created_at.format(OUTPUT_TIME_FORMAT));
    println!("* Updated: {}", feed.updated_at.format(OUTPUT_TIME_FORMAT));
    println!("* Name: {}", feed.name);
    println!("* URL: {}", feed.url);
    println!("* User: {}", feed.user_name);
    match feed.last_fetched_at {
        Some(ts) => println!("* Last Fetched At: {}", ts.format(OUTPUT_TIME_FORMAT)),
        None => println!("* Last Fetched At: never"),
    }
}

fn print_post(post: &Post) {
    match post.published_at {
        Some(ts) => println!(
            "Title: {} | Published at: {}",
            post.title,
            ts.format(OUTPUT_TIME_FORMAT)
        ),
        None => println!("Title: {}", post.title),
    }
    println!("Link: {}", post.url);
    if let Some(desc) = &post.description {
        println!("Description");
        println!("{desc}");
    }
}
