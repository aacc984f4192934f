use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use games_core::{
    flows::MIN_SEARCH_LEN,
    AppConfig, CatalogSource, DetailOrigin, FavoritesFlow, FetchOutcome, FlowEvent, Game,
    GameDetailsFlow, GameStore, GamesListFlow,
};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc::UnboundedReceiver,
};
use tracing::{debug, info, warn};

const HELP: &str = "commands: list | more | search <text> | show <id> | fav | \
                    favorites | filter <text> | unfav <id> | help | quit";

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    More,
    Search(String),
    Show(i64),
    Favorite,
    Favorites,
    Filter(String),
    Unfavorite(i64),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "more" | "next" => Command::More,
            "search" | "/" => Command::Search(rest.to_string()),
            "show" | "open" => Command::Show(parse_id(rest)?),
            "fav" => Command::Favorite,
            "favorites" | "favs" => Command::Favorites,
            "filter" => Command::Filter(rest.to_string()),
            "unfav" => Command::Unfavorite(parse_id(rest)?),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(anyhow!("unknown command `{other}`, try `help`")),
        };
        Ok(Some(command))
    }
}

fn parse_id(value: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("expected a game id, got `{value}`"))
}

/// Line-oriented driver over the three flows.
pub struct GamesApp {
    source: Arc<dyn CatalogSource>,
    store: GameStore,
    list: GamesListFlow,
    favorites: FavoritesFlow,
    details: Option<GameDetailsFlow>,
    should_quit: bool,
}

impl GamesApp {
    pub fn new(source: Arc<dyn CatalogSource>, store: GameStore, config: &AppConfig) -> Self {
        let list = GamesListFlow::new(source.clone(), store.clone(), config.page_size);
        let favorites = FavoritesFlow::new(store.clone());
        forward_events("list", list.subscribe());
        forward_events("favorites", favorites.subscribe());
        Self {
            source,
            store,
            list,
            favorites,
            details: None,
            should_quit: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        let mut lines = BufReader::new(io::stdin()).lines();

        write_lines(&mut stdout, &self.execute(Command::List).await?).await?;
        while !self.should_quit {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let output = match Command::parse(&line) {
                Ok(Some(command)) => match self.execute(command).await {
                    Ok(output) => output,
                    Err(err) => vec![format!("error: {err:#}")],
                },
                Ok(None) => continue,
                Err(err) => vec![err.to_string()],
            };
            write_lines(&mut stdout, &output).await?;
        }

        info!("Bye");
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> Result<Vec<String>> {
        debug!(?command, "executing");
        let output = match command {
            Command::List => {
                let outcome = self.list.load_first_page().await?;
                self.render_list(outcome)
            }
            Command::More => {
                let last = self.list.len().saturating_sub(1);
                let outcome = self.list.item_will_display(last).await?;
                self.render_list(outcome)
            }
            Command::Search(text) => {
                let outcome = if text.is_empty() {
                    self.list.clear_search().await?
                } else {
                    self.list.set_search_text(&text).await?
                };
                if outcome == FetchOutcome::Skipped {
                    vec![format!("search needs at least {MIN_SEARCH_LEN} characters")]
                } else {
                    self.render_list(outcome)
                }
            }
            Command::Show(id) => self.show(id).await?,
            Command::Favorite => match self.details.as_ref() {
                Some(details) => match details.toggle_favorite()? {
                    Some(true) => vec![format!("#{} added to favorites", details.game_id())],
                    Some(false) => vec![format!("#{} removed from favorites", details.game_id())],
                    None => vec!["nothing loaded".to_string()],
                },
                None => vec!["open a game with `show <id>` first".to_string()],
            },
            Command::Favorites => {
                self.favorites.load()?;
                self.render_favorites()
            }
            Command::Filter(text) => {
                self.favorites.filter(&text);
                self.render_favorites()
            }
            Command::Unfavorite(id) => {
                if self.favorites.unfavorite(id)? {
                    let mut output = vec![format!("#{id} removed from favorites")];
                    output.extend(self.render_favorites());
                    output
                } else {
                    vec![format!("#{id} is not in the favorites list")]
                }
            }
            Command::Help => vec![HELP.to_string()],
            Command::Quit => {
                self.should_quit = true;
                Vec::new()
            }
        };
        Ok(output)
    }

    async fn show(&mut self, id: i64) -> Result<Vec<String>> {
        let index = self.list.games().iter().position(|game| game.id == id);
        if let Some(index) = index {
            self.list.open_game(index);
        }

        let details = GameDetailsFlow::new(self.source.clone(), self.store.clone(), id);
        forward_events("details", details.subscribe());
        let origin = details.load().await?;
        let output = match (origin, details.game()) {
            (DetailOrigin::Missing, _) | (_, None) => {
                vec![format!("#{id} is unavailable offline")]
            }
            (origin, Some(game)) => {
                let mut output = render_details(&game);
                if origin == DetailOrigin::Local {
                    output.push("(offline copy)".to_string());
                }
                output
            }
        };
        self.details = Some(details);
        Ok(output)
    }

    fn render_list(&self, outcome: FetchOutcome) -> Vec<String> {
        let mut output = match outcome {
            FetchOutcome::Offline { cached } => {
                vec![format!("offline, showing {cached} stored games")]
            }
            FetchOutcome::Skipped if !self.list.has_next_page() => {
                vec!["no more pages".to_string()]
            }
            FetchOutcome::Skipped | FetchOutcome::Stale => return Vec::new(),
            FetchOutcome::Loaded { .. } => Vec::new(),
        };

        if let Some(search) = self.list.search_text() {
            output.push(format!("search: {search}"));
        }
        output.extend(
            self.list
                .games()
                .iter()
                .enumerate()
                .map(|(index, game)| format!("{:>3}. {}", index + 1, render_row(game))),
        );
        if self.list.has_next_page() {
            output.push(format!("page {} next, type `more`", self.list.page()));
        }
        output
    }

    fn render_favorites(&self) -> Vec<String> {
        let mut output = vec![self.favorites.title()];
        output.extend(
            self.favorites
                .games()
                .iter()
                .map(|game| format!("  {}", render_row(game))),
        );
        output
    }
}

fn render_row(game: &Game) -> String {
    let mut row = format!("[{}] {}", game.id, game.display_name());
    if let Some(metacritic) = game.metacritic {
        row.push_str(&format!(" ({metacritic:.0})"));
    }
    let genres = game.display_genres(", ");
    if !genres.is_empty() {
        row.push_str(&format!(" - {genres}"));
    }
    if game.favorite {
        row.push_str(" *");
    }
    row
}

fn render_details(game: &Game) -> Vec<String> {
    let mut output = vec![render_row(game)];
    if let Some(date) = game.release_date() {
        output.push(format!("released: {}", date.format("%b %-d, %Y")));
    }
    if let Some(rating) = game.rating {
        output.push(format!("rating: {rating:.2}"));
    }
    if let Some(description) = game.description.as_deref().filter(|text| !text.is_empty()) {
        output.push(description.to_string());
    }
    if let Some(url) = game.reddit_url.as_deref().filter(|url| !url.is_empty()) {
        let name = game.reddit_name.as_deref().unwrap_or("reddit");
        output.push(format!("{name}: {url}"));
    }
    if let Some(website) = game.website.as_deref().filter(|url| !url.is_empty()) {
        output.push(format!("website: {website}"));
    }
    output.push(if game.favorite {
        "favorite: yes".to_string()
    } else {
        "favorite: no (type `fav`)".to_string()
    });
    output
}

async fn write_lines(stdout: &mut io::Stdout, lines: &[String]) -> Result<()> {
    for line in lines {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}

fn forward_events(flow: &'static str, mut receiver: UnboundedReceiver<FlowEvent>) {
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                FlowEvent::NetworkFallback { reason } => {
                    warn!(flow, "Network unavailable, showing stored data: {reason}")
                }
                FlowEvent::StorageFailed { reason } => {
                    warn!(flow, "Local store write failed: {reason}")
                }
                event => debug!(flow, ?event, "Flow changed"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use games_core::{
        error::{ApiError, ApiResult},
        GamePage,
    };

    struct StaticCatalog {
        games: Vec<Game>,
    }

    #[async_trait]
    impl CatalogSource for StaticCatalog {
        async fn list_games(
            &self,
            page: u32,
            page_size: u32,
            _search: Option<&str>,
        ) -> ApiResult<GamePage> {
            let start = ((page - 1) * page_size) as usize;
            Ok(GamePage {
                results: self
                    .games
                    .iter()
                    .skip(start)
                    .take(page_size as usize)
                    .cloned()
                    .collect(),
                count: self.games.len() as u64,
            })
        }

        async fn game_details(&self, game_id: i64) -> ApiResult<Game> {
            self.games
                .iter()
                .find(|game| game.id == game_id)
                .cloned()
                .ok_or(ApiError::EmptyBody)
        }
    }

    fn app(count: i64) -> Result<GamesApp> {
        let games = (1..=count)
            .map(|id| Game {
                id,
                slug: Some(format!("game-{id}")),
                name: Some(format!("Game {id}")),
                released: Some("2013-09-17".to_string()),
                background_image: Some(format!("https://media.example/{id}.jpg")),
                ..Game::default()
            })
            .collect();
        let config = AppConfig {
            page_size: 2,
            ..AppConfig::default()
        };
        Ok(GamesApp::new(
            Arc::new(StaticCatalog { games }),
            GameStore::in_memory()?,
            &config,
        ))
    }

    #[test]
    fn parses_commands() -> Result<()> {
        assert_eq!(Command::parse("  ")?, None);
        assert_eq!(Command::parse("LIST")?, Some(Command::List));
        assert_eq!(
            Command::parse("search  the witcher ")?,
            Some(Command::Search("the witcher".to_string()))
        );
        assert_eq!(Command::parse("search")?, Some(Command::Search(String::new())));
        assert_eq!(Command::parse("show 3498")?, Some(Command::Show(3498)));
        assert_eq!(Command::parse("unfav 7")?, Some(Command::Unfavorite(7)));
        assert!(Command::parse("show portal").is_err());
        assert!(Command::parse("dance").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn pages_through_the_listing() -> Result<()> {
        let mut app = app(3)?;
        let first = app.execute(Command::List).await?;
        assert_eq!(first.len(), 3);
        assert!(first[0].contains("[1] Game 1"));
        assert_eq!(first[2], "page 2 next, type `more`");

        let second = app.execute(Command::More).await?;
        assert_eq!(second.len(), 3);
        assert!(second[2].contains("[3] Game 3"));

        assert_eq!(app.execute(Command::More).await?, vec!["no more pages"]);
        Ok(())
    }

    #[tokio::test]
    async fn favorite_from_detail_lists_under_favorites() -> Result<()> {
        let mut app = app(3)?;
        app.execute(Command::List).await?;

        let shown = app.execute(Command::Show(2)).await?;
        assert!(shown.contains(&"released: Sep 17, 2013".to_string()));
        assert_eq!(
            app.execute(Command::Favorite).await?,
            vec!["#2 added to favorites"]
        );

        let favorites = app.execute(Command::Favorites).await?;
        assert_eq!(favorites[0], "Favorites (1)");
        assert!(favorites[1].contains("[2] Game 2 *"));

        let removed = app.execute(Command::Unfavorite(2)).await?;
        assert_eq!(removed, vec!["#2 removed from favorites", "Favorites"]);
        Ok(())
    }

    #[tokio::test]
    async fn unfavorite_sticks_after_opening_another_game() -> Result<()> {
        let mut app = app(3)?;
        app.execute(Command::List).await?;
        app.execute(Command::Show(2)).await?;
        app.execute(Command::Favorite).await?;
        app.execute(Command::Favorites).await?;
        app.execute(Command::Unfavorite(2)).await?;

        app.execute(Command::Show(3)).await?;
        assert_eq!(app.execute(Command::Favorites).await?, vec!["Favorites"]);
        let stored = app.store.fetch_by_id(2)?.expect("row kept");
        assert!(!stored.favorite);

        app.execute(Command::Quit).await?;
        assert!(app.store.fetch_favorites()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn quit_stops_the_loop() -> Result<()> {
        let mut app = app(1)?;
        assert!(app.execute(Command::Quit).await?.is_empty());
        assert!(app.should_quit);
        Ok(())
    }
}
