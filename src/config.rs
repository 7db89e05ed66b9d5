use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;
use url::Url;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    bot: BotFile,
    redis: RedisFile,
    parser: ParserFile,
    storage: StorageFile,
    #[serde(deserialize_with = "ordered_categories")]
    categories: Vec<(String, CategoryFile)>,
}

#[derive(Deserialize)]
struct BotFile {
    token: String,
    /// Local Bot API server URL; the hosted api.telegram.org is used when unset.
    api_url: Option<String>,
    admin_id: Vec<i64>,
}

#[derive(Deserialize)]
struct RedisFile {
    host: String,
    port: i64,
    password: Option<String>,
    #[serde(default)]
    db: i64,
    key_prefix: String,
}

#[derive(Deserialize)]
struct ParserFile {
    app_id: i64,
    app_hash: String,
    accounts: HashMap<String, Option<serde_json::Value>>,
}

#[derive(Deserialize)]
struct StorageFile {
    url: String,
    base_path: PathBuf,
}

#[derive(Deserialize)]
struct CategoryFile {
    #[serde(default)]
    sources: Vec<SourceFile>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    captions: Vec<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    nsfw: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSourceId {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct SourceFile {
    id: RawSourceId,
    user: Option<String>,
}

/// Deserializes a JSON object into a Vec so declaration order survives.
/// Alias scanning resolves ties by this order, so it must not be lost in a HashMap.
fn ordered_categories<'de, D>(deserializer: D) -> Result<Vec<(String, CategoryFile)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedVisitor;

    impl<'de> Visitor<'de> for OrderedVisitor {
        type Value = Vec<(String, CategoryFile)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of category name to category definition")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, CategoryFile>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor)
}

pub struct Config {
    pub bot: BotSettings,
    pub redis: RedisSettings,
    pub parser: ParserSettings,
    pub storage: StorageSettings,
    pub categories: CategoryRegistry,
}

pub struct BotSettings {
    pub token: String,
    /// Local Bot API server, if any.
    pub api_url: Option<Url>,
    /// Admin chat IDs, everything is allowed from admin chats.
    pub admin_chats: Vec<ChatId>,
}

/// Redis connection settings. Validated here, consumed by the storage layer.
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub key_prefix: String,
}

impl RedisSettings {
    /// Connection URL in `redis://` form.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => {
                format!("redis://:{password}@{}:{}/{}", self.host, self.port, self.db)
            }
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Telegram User API settings for the userbot parser subsystem.
pub struct ParserSettings {
    pub app_id: i64,
    // Read by the parser when it runs under this config, not by the bot itself.
    #[allow(dead_code)]
    pub app_hash: String,
    /// Account name -> extra client options. At least one account is required.
    pub accounts: HashMap<String, Option<serde_json::Value>>,
}

pub struct StorageSettings {
    /// Base URL pictures are served from.
    pub url: Url,
    /// Root directory for pictures, trash, account sessions, etc.
    pub base_path: PathBuf,
}

/// Where a category's pictures come from. Numeric IDs are private channels
/// and need an authorized account to read them, hence the `user` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    Channel(i64),
    Username(String),
}

#[derive(Debug)]
#[allow(dead_code)] // read by the userbot parser, not by the bot itself
pub struct Source {
    pub id: SourceId,
    pub user: Option<String>,
}

#[derive(Debug)]
pub struct Category {
    pub sources: Vec<Source>,
    /// Case-insensitive text triggers, matched as word prefixes.
    pub aliases: Vec<String>,
    /// Picture captions, chosen at random. Empty means "send without caption".
    pub captions: Vec<String>,
    /// Hidden categories are left out of the command menu.
    pub hidden: bool,
    pub nsfw: bool,
}

/// Category name -> definition, in declaration order.
pub struct CategoryRegistry {
    entries: Vec<(String, Category)>,
}

impl CategoryRegistry {
    pub fn from_entries(entries: Vec<(String, Category)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Categories in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Category)> {
        self.entries.iter().map(|(name, category)| (name.as_str(), category))
    }

    /// Non-hidden categories, for discoverability surfaces like the command menu.
    pub fn visible(&self) -> impl Iterator<Item = (&str, &Category)> {
        self.iter().filter(|(_, category)| !category.hidden)
    }

    /// Case-insensitive match of a command token against category names.
    pub fn resolve_command(&self, token: &str) -> Option<(&str, &Category)> {
        let token = token.to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| name.to_lowercase() == token)
            .map(|(name, category)| (name.as_str(), category))
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })?;

        Ok(Self {
            bot: validate_bot(file.bot)?,
            redis: validate_redis(file.redis)?,
            parser: validate_parser(file.parser)?,
            storage: validate_storage(file.storage)?,
            categories: validate_categories(file.categories)?,
        })
    }
}

fn validate_bot(file: BotFile) -> Result<BotSettings, ConfigError> {
    if file.token.is_empty() {
        return Err(ConfigError::Validation("bot.token is required".into()));
    }
    // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
    let token_parts: Vec<&str> = file.token.split(':').collect();
    if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty()
    {
        return Err(ConfigError::Validation(
            "bot.token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
        ));
    }

    let api_url = file
        .api_url
        .map(|raw| {
            Url::parse(&raw)
                .map_err(|e| ConfigError::Validation(format!("bot.api_url is not a valid URL: {e}")))
        })
        .transpose()?;

    Ok(BotSettings {
        token: file.token,
        api_url,
        admin_chats: file.admin_id.into_iter().map(ChatId).collect(),
    })
}

fn validate_redis(file: RedisFile) -> Result<RedisSettings, ConfigError> {
    if !(1..=65535).contains(&file.port) {
        return Err(ConfigError::Validation(format!(
            "redis.port must be between 1 and 65535, got {}",
            file.port
        )));
    }
    if file.db < 0 {
        return Err(ConfigError::Validation(format!(
            "redis.db must be a non-negative integer, got {}",
            file.db
        )));
    }
    Ok(RedisSettings {
        host: file.host,
        port: file.port as u16,
        password: file.password,
        db: file.db as u32,
        key_prefix: file.key_prefix,
    })
}

fn validate_parser(file: ParserFile) -> Result<ParserSettings, ConfigError> {
    if file.accounts.is_empty() {
        return Err(ConfigError::Validation(
            "parser.accounts must list at least one account".into(),
        ));
    }
    Ok(ParserSettings {
        app_id: file.app_id,
        app_hash: file.app_hash,
        accounts: file.accounts,
    })
}

fn validate_storage(file: StorageFile) -> Result<StorageSettings, ConfigError> {
    let url = Url::parse(&file.url)
        .map_err(|e| ConfigError::Validation(format!("storage.url is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https" | "file") {
        return Err(ConfigError::Validation(format!(
            "storage.url must use the http, https or file scheme, got '{}'",
            url.scheme()
        )));
    }
    if !file.base_path.exists() {
        std::fs::create_dir_all(&file.base_path).map_err(|e| {
            ConfigError::Validation(format!(
                "cannot create storage.base_path '{}': {e}",
                file.base_path.display()
            ))
        })?;
    }
    if !file.base_path.is_dir() {
        return Err(ConfigError::Validation(format!(
            "storage.base_path '{}' is not a directory",
            file.base_path.display()
        )));
    }
    Ok(StorageSettings { url, base_path: file.base_path })
}

fn validate_categories(
    entries: Vec<(String, CategoryFile)>,
) -> Result<CategoryRegistry, ConfigError> {
    let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
    let mut validated = Vec::with_capacity(entries.len());
    for (name, file) in entries {
        if !seen.insert(name.clone()) {
            return Err(ConfigError::Validation(format!("duplicate category '{name}'")));
        }
        let sources = file
            .sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| validate_source(&name, index, source))
            .collect::<Result<Vec<_>, _>>()?;
        validated.push((
            name,
            Category {
                sources,
                aliases: file.aliases,
                captions: file.captions,
                hidden: file.hidden,
                nsfw: file.nsfw,
            },
        ));
    }
    Ok(CategoryRegistry::from_entries(validated))
}

fn validate_source(category: &str, index: usize, file: SourceFile) -> Result<Source, ConfigError> {
    let id = match file.id {
        RawSourceId::Number(n) => SourceId::Channel(n),
        // A string that parses as an integer is still a channel ID, not a username.
        RawSourceId::Text(s) => match s.parse::<i64>() {
            Ok(n) => SourceId::Channel(n),
            Err(_) => SourceId::Username(s),
        },
    };
    if matches!(id, SourceId::Channel(_)) && file.user.is_none() {
        return Err(ConfigError::Validation(format!(
            "category '{category}' source #{index}: 'user' must be specified for numeric ids"
        )));
    }
    Ok(Source { id, user: file.user })
}
