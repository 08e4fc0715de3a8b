//! Application-level configuration loading: game rules and the deduction mode topic catalogue.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PARTY_ROOMS_CONFIG_PATH";

/// Tunable game balance and room allocation constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Characters per room code.
    pub room_code_length: usize,
    /// Fresh codes tried before room creation gives up.
    pub room_code_attempts: u32,
    /// Players needed to start either mode.
    pub min_players: usize,
    /// Players a room can hold.
    pub max_players: usize,
    /// From this many players on, the deduction mode deals two imposters.
    pub imposter_threshold: usize,
    /// Topic used when start-round omits one.
    pub default_topic: String,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            room_code_length: 6,
            room_code_attempts: 10,
            min_players: 3,
            max_players: 20,
            imposter_threshold: 8,
            default_topic: "Athletes".into(),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Game rules.
    pub rules: GameRules,
    topics: IndexMap<String, Vec<String>>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        topics = app_config.topics.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Look a topic up case-insensitively, returning its canonical name and words.
    pub fn topic(&self, name: &str) -> Option<(&str, &[String])> {
        let wanted = name.trim();
        self.topics
            .iter()
            .find(|(topic, words)| !words.is_empty() && topic.eq_ignore_ascii_case(wanted))
            .map(|(topic, words)| (topic.as_str(), words.as_slice()))
    }

    /// Names of the configured topics, in catalogue order.
    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            topics: default_topics(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    rules: GameRules,
    #[serde(default)]
    topics: Option<IndexMap<String, Vec<String>>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let topics = value
            .topics
            .filter(|topics| !topics.is_empty())
            .unwrap_or_else(default_topics);
        Self {
            rules: value.rules,
            topics,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in topic catalogue shipped with the binary.
fn default_topics() -> IndexMap<String, Vec<String>> {
    let catalogue: [(&str, [&str; 8]); 8] = [
        (
            "Athletes",
            [
                "LeBron James",
                "Serena Williams",
                "Lionel Messi",
                "Simone Biles",
                "Patrick Mahomes",
                "ShaCarri Richardson",
                "Giannis Antetokounmpo",
                "Megan Rapinoe",
            ],
        ),
        (
            "Foods",
            [
                "Sushi", "Tacos", "Pizza", "Ramen", "Falafel", "Pancakes", "Pad Thai", "Gelato",
            ],
        ),
        (
            "Animals",
            [
                "Red Panda", "Elephant", "Dolphin", "Cheetah", "Hedgehog", "Octopus", "Penguin",
                "Giraffe",
            ],
        ),
        (
            "Countries",
            [
                "Japan",
                "Brazil",
                "France",
                "Nigeria",
                "New Zealand",
                "Canada",
                "India",
                "Iceland",
            ],
        ),
        (
            "Careers",
            [
                "Software Engineer",
                "Chef",
                "Teacher",
                "Nurse",
                "Architect",
                "Pilot",
                "Photographer",
                "Lawyer",
            ],
        ),
        (
            "Movies",
            [
                "Inception",
                "Mean Girls",
                "The Godfather",
                "Spirited Away",
                "Mad Max: Fury Road",
                "Parasite",
                "The Matrix",
                "Finding Nemo",
            ],
        ),
        (
            "Celebrities",
            [
                "Beyonce",
                "Zendaya",
                "Dwayne Johnson",
                "Rihanna",
                "Harry Styles",
                "Taylor Swift",
                "Pedro Pascal",
                "Keanu Reeves",
            ],
        ),
        (
            "Apps/Social media",
            [
                "Instagram",
                "TikTok",
                "Snapchat",
                "Twitter",
                "Reddit",
                "LinkedIn",
                "YouTube",
                "BeReal",
            ],
        ),
    ];

    catalogue
        .into_iter()
        .map(|(topic, words)| {
            (
                topic.to_owned(),
                words.into_iter().map(str::to_owned).collect(),
            )
        })
        .collect()
}
