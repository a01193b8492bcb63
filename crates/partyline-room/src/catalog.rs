//! Game variants: the ten party games as data over one capability trait.
//!
//! The turn engine never looks inside a game. It asks the variant for
//! the next prompt and whether an answer counts, and keeps the opaque
//! [`RoundState`] the variant hands back. Content (cards) comes from a
//! [`DeckSet`], built in or loaded from a JSON deck file.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use partyline_protocol::{Difficulty, GameKind, RoomSettings};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::RoomError;

// ---------------------------------------------------------------------------
// Cards and round state
// ---------------------------------------------------------------------------

/// One prompt in a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// What players see.
    pub text: String,
    /// Accepted answers for kinds that check them. Empty means the card
    /// text itself is the answer.
    #[serde(default)]
    pub answers: Vec<String>,
    /// Extra content such as forbidden words. Not judged.
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl Card {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            answers: Vec::new(),
            hints: Vec::new(),
            category: None,
            difficulty: None,
        }
    }

    pub fn tagged(mut self, category: &str, difficulty: Difficulty) -> Self {
        self.category = Some(category.to_string());
        self.difficulty = Some(difficulty);
        self
    }

    /// Whether the room's deck filters let this card in. A card without
    /// a tag passes the filter on that tag.
    pub fn fits(&self, settings: &RoomSettings) -> bool {
        let difficulty_ok = match (settings.difficulty, self.difficulty) {
            (Some(wanted), Some(level)) => wanted == level,
            _ => true,
        };
        let category_ok = settings.categories.is_empty()
            || self.category.as_deref().is_none_or(|own| {
                settings
                    .categories
                    .iter()
                    .any(|c| normalize(c) == normalize(own))
            });
        difficulty_ok && category_ok
    }
}

/// Game progress owned by one room and opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundState {
    /// Undrawn cards; drawing pops from the back.
    pub remaining: Vec<Card>,
    pub current: Option<Card>,
    /// Accepted answers so far, oldest first.
    pub history: Vec<String>,
}

/// Result of asking for the next prompt.
#[derive(Debug, Clone)]
pub struct Draw {
    /// `None` when the pool is exhausted.
    pub prompt: Option<String>,
    pub state: RoundState,
}

impl Draw {
    pub fn exhausted(&self) -> bool {
        self.prompt.is_none()
    }
}

// ---------------------------------------------------------------------------
// GameVariant
// ---------------------------------------------------------------------------

/// What the turn engine needs from a game.
pub trait GameVariant: Send + Sync + fmt::Debug {
    fn kind(&self) -> GameKind;
    fn min_players(&self) -> usize;
    fn max_players(&self) -> usize;
    /// Turn length when the room does not override it.
    fn default_turn_seconds(&self) -> u32;
    fn supports_teams(&self) -> bool;
    /// Whether the turn passes on after a correct outcome.
    fn rotates_on_correct(&self) -> bool;

    /// Which optional room settings this kind honors, apart from teams.
    fn supported_settings(&self) -> SettingSupport;

    /// Fresh progress for a new game, with the deck narrowed by the
    /// room's difficulty and categories.
    fn new_round_state(&self, settings: &RoomSettings) -> RoundState;

    fn next_prompt(&self, state: &RoundState) -> Draw;

    fn is_answer_accepted(&self, state: &RoundState, answer: &str) -> bool;

    /// Folds an accepted answer into the state.
    fn record_answer(&self, state: &RoundState, answer: &str) -> RoundState {
        let mut next = state.clone();
        next.history.push(answer.trim().to_string());
        next
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// How a kind judges a typed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRule {
    /// Anything non-blank; the group judges out loud.
    Open,
    /// Must match the card's answers (or its text), ignoring case.
    MatchCard,
    /// Must start with the last letter of the previous word and not
    /// repeat an earlier one.
    ChainLetter,
    /// A comma-separated list repeating every earlier item in order plus
    /// exactly one new item.
    Recall,
}

/// Room settings a kind lets players choose. Teams are covered by
/// [`GameVariant::supports_teams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSupport {
    pub score_to_win: bool,
    pub time_limit: bool,
    pub rounds_count: bool,
    pub difficulty: bool,
    pub categories: bool,
}

impl SettingSupport {
    pub const ALL: Self = Self {
        score_to_win: true,
        time_limit: true,
        rounds_count: true,
        difficulty: true,
        categories: true,
    };

    /// The first setting in `settings` this kind does not offer.
    pub fn first_unsupported(&self, settings: &RoomSettings) -> Option<&'static str> {
        [
            (settings.score_to_win.is_some() && !self.score_to_win, "score to win"),
            (settings.time_limit.is_some() && !self.time_limit, "a time limit"),
            (settings.rounds_count.is_some() && !self.rounds_count, "a rounds count"),
            (settings.difficulty.is_some() && !self.difficulty, "a difficulty"),
            (!settings.categories.is_empty() && !self.categories, "categories"),
        ]
        .into_iter()
        .find_map(|(rejected, name)| rejected.then_some(name))
    }
}

/// Static facts about one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantProfile {
    pub kind: GameKind,
    pub min_players: usize,
    pub max_players: usize,
    pub default_turn_seconds: u32,
    pub supports_teams: bool,
    pub rotates_on_correct: bool,
    pub rule: AnswerRule,
    pub settings: SettingSupport,
}

impl VariantProfile {
    pub const fn for_kind(kind: GameKind) -> Self {
        use AnswerRule::*;
        use GameKind::*;
        let (min, max, secs, teams, rotates, rule) = match kind {
            Alias => (2, 20, 60, true, false, MatchCard),
            Taboo => (2, 20, 60, true, false, MatchCard),
            FiveSeconds => (2, 20, 5, true, true, Open),
            WhatAmI => (2, 15, 90, false, false, MatchCard),
            WordChain => (2, 15, 15, false, true, ChainLetter),
            TruthOrDare => (2, 20, 60, false, true, Open),
            GroupMemory => (2, 15, 30, true, true, Recall),
            ChineseWhispers => (3, 20, 45, false, true, Open),
            Trivia => (1, 30, 30, true, true, MatchCard),
            MysteryCase => (1, 20, 120, true, false, MatchCard),
        };
        // score to win, time limit, rounds count, difficulty, categories
        let (score, time, rounds, difficulty, categories) = match kind {
            Alias | Taboo | WhatAmI => (true, true, false, true, true),
            FiveSeconds => (true, false, true, true, true),
            WordChain => (false, true, true, false, false),
            TruthOrDare => (false, false, true, true, true),
            GroupMemory => (false, false, true, true, false),
            ChineseWhispers => (false, false, true, false, true),
            Trivia => (true, true, true, true, true),
            MysteryCase => (false, false, false, true, true),
        };
        Self {
            kind,
            min_players: min,
            max_players: max,
            default_turn_seconds: secs,
            supports_teams: teams,
            rotates_on_correct: rotates,
            rule,
            settings: SettingSupport {
                score_to_win: score,
                time_limit: time,
                rounds_count: rounds,
                difficulty,
                categories,
            },
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// DeckGame
// ---------------------------------------------------------------------------

/// A kind's profile plus its deck. Covers all ten built-in games.
#[derive(Debug, Clone)]
pub struct DeckGame {
    profile: VariantProfile,
    deck: Vec<Card>,
}

impl DeckGame {
    pub fn new(profile: VariantProfile, deck: Vec<Card>) -> Self {
        Self { profile, deck }
    }

    /// The kind with its built-in sample deck.
    pub fn builtin(kind: GameKind) -> Self {
        Self::new(VariantProfile::for_kind(kind), builtin_deck(kind))
    }

    pub fn profile(&self) -> &VariantProfile {
        &self.profile
    }

    /// The word the next chain link must follow.
    fn chain_anchor(state: &RoundState) -> Option<&str> {
        state
            .history
            .last()
            .map(String::as_str)
            .or_else(|| state.current.as_ref().map(|c| c.text.as_str()))
    }

    fn recall_items(answer: &str) -> Vec<String> {
        answer
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl GameVariant for DeckGame {
    fn kind(&self) -> GameKind {
        self.profile.kind
    }

    fn min_players(&self) -> usize {
        self.profile.min_players
    }

    fn max_players(&self) -> usize {
        self.profile.max_players
    }

    fn default_turn_seconds(&self) -> u32 {
        self.profile.default_turn_seconds
    }

    fn supports_teams(&self) -> bool {
        self.profile.supports_teams
    }

    fn rotates_on_correct(&self) -> bool {
        self.profile.rotates_on_correct
    }

    fn supported_settings(&self) -> SettingSupport {
        self.profile.settings
    }

    fn new_round_state(&self, settings: &RoomSettings) -> RoundState {
        let mut remaining: Vec<Card> = self
            .deck
            .iter()
            .filter(|card| card.fits(settings))
            .cloned()
            .collect();
        remaining.shuffle(&mut rand::rng());
        RoundState {
            remaining,
            current: None,
            history: Vec::new(),
        }
    }

    fn next_prompt(&self, state: &RoundState) -> Draw {
        let mut next = state.clone();
        // Chains and recall lists keep building on the same prompt once
        // they have started.
        match self.profile.rule {
            AnswerRule::ChainLetter if !state.history.is_empty() => {
                let prompt = Self::chain_anchor(state).map(str::to_string);
                return Draw { prompt, state: next };
            }
            AnswerRule::Recall if state.current.is_some() => {
                let prompt = state.current.as_ref().map(|c| c.text.clone());
                return Draw { prompt, state: next };
            }
            _ => {}
        }

        let card = next.remaining.pop();
        let prompt = card.as_ref().map(|c| c.text.clone());
        next.current = card;
        Draw { prompt, state: next }
    }

    fn is_answer_accepted(&self, state: &RoundState, answer: &str) -> bool {
        let given = normalize(answer);
        if given.is_empty() {
            return false;
        }
        match self.profile.rule {
            AnswerRule::Open => true,
            AnswerRule::MatchCard => {
                let Some(card) = &state.current else {
                    return false;
                };
                if card.answers.is_empty() {
                    normalize(&card.text) == given
                } else {
                    card.answers.iter().any(|a| normalize(a) == given)
                }
            }
            AnswerRule::ChainLetter => {
                let Some(last) = Self::chain_anchor(state)
                    .and_then(|anchor| normalize(anchor).chars().last())
                else {
                    return false;
                };
                let repeated = state.history.iter().any(|w| normalize(w) == given)
                    || state
                        .current
                        .as_ref()
                        .is_some_and(|c| normalize(&c.text) == given);
                given.starts_with(last) && !repeated
            }
            AnswerRule::Recall => {
                let items = Self::recall_items(answer);
                items.len() == state.history.len() + 1
                    && items
                        .iter()
                        .zip(&state.history)
                        .all(|(item, known)| normalize(item) == normalize(known))
            }
        }
    }

    fn record_answer(&self, state: &RoundState, answer: &str) -> RoundState {
        let mut next = state.clone();
        let entry = match self.profile.rule {
            AnswerRule::Recall => Self::recall_items(answer).pop(),
            _ => Some(answer.trim().to_string()),
        };
        next.history.extend(entry);
        next
    }
}

// ---------------------------------------------------------------------------
// DeckSet
// ---------------------------------------------------------------------------

/// Cards per kind, as loaded from a deck file:
///
/// ```json
/// { "trivia": [{ "text": "Capital of France?", "answers": ["Paris"] }] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeckSet {
    decks: HashMap<GameKind, Vec<Card>>,
}

impl DeckSet {
    /// Parses and validates a deck file. Kinds it leaves out keep their
    /// built-in decks.
    pub fn from_json(json: &str) -> Result<Self, RoomError> {
        let set: Self = serde_json::from_str(json)
            .map_err(|e| RoomError::InvalidDeck(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    /// The sample decks shipped with the server.
    pub fn builtin() -> Self {
        let decks = GameKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin_deck(kind)))
            .collect();
        Self { decks }
    }

    pub fn get(&self, kind: GameKind) -> Option<&[Card]> {
        self.decks.get(&kind).map(Vec::as_slice)
    }

    fn validate(&self) -> Result<(), RoomError> {
        for (kind, cards) in &self.decks {
            if cards.is_empty() {
                return Err(RoomError::InvalidDeck(format!("deck for {kind} is empty")));
            }
            let mut seen = HashSet::new();
            for card in cards {
                let text = normalize(&card.text);
                if text.is_empty() {
                    return Err(RoomError::InvalidDeck(format!(
                        "deck for {kind} has a blank card"
                    )));
                }
                if !seen.insert(text) {
                    return Err(RoomError::InvalidDeck(format!(
                        "deck for {kind} repeats card {:?}",
                        card.text
                    )));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GameCatalog
// ---------------------------------------------------------------------------

/// The variant to use for each kind.
#[derive(Debug, Clone)]
pub struct GameCatalog {
    variants: HashMap<GameKind, Arc<dyn GameVariant>>,
}

impl GameCatalog {
    /// All ten kinds with built-in decks.
    pub fn standard() -> Self {
        Self::with_decks(&DeckSet::builtin())
    }

    /// All ten kinds, taking decks from `decks` where present.
    pub fn with_decks(decks: &DeckSet) -> Self {
        let variants = GameKind::ALL
            .into_iter()
            .map(|kind| {
                let game = match decks.get(kind) {
                    Some(cards) => {
                        DeckGame::new(VariantProfile::for_kind(kind), cards.to_vec())
                    }
                    None => DeckGame::builtin(kind),
                };
                (kind, Arc::new(game) as Arc<dyn GameVariant>)
            })
            .collect();
        Self { variants }
    }

    /// Replaces the variant for its kind.
    pub fn with_variant(mut self, variant: Arc<dyn GameVariant>) -> Self {
        self.variants.insert(variant.kind(), variant);
        self
    }

    pub fn variant(&self, kind: GameKind) -> Arc<dyn GameVariant> {
        self.variants
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(DeckGame::builtin(kind)))
    }
}

impl Default for GameCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Built-in decks
// ---------------------------------------------------------------------------

fn cards(texts: &[&str]) -> Vec<Card> {
    texts.iter().copied().map(Card::new).collect()
}

fn answered(rows: &[(&str, &[&str])]) -> Vec<Card> {
    rows.iter()
        .map(|(text, answers)| Card {
            answers: answers.iter().map(|a| (*a).to_string()).collect(),
            ..Card::new(*text)
        })
        .collect()
}

fn builtin_deck(kind: GameKind) -> Vec<Card> {
    match kind {
        GameKind::Alias => cards(&[
            "lighthouse", "volcano", "passport", "umbrella", "orchestra",
            "snowman", "satellite", "pancake",
        ]),
        GameKind::Taboo => [
            ("pizza", ["cheese", "Italy", "slice"]),
            ("beach", ["sand", "sea", "sun"]),
            ("guitar", ["strings", "music", "play"]),
            ("winter", ["cold", "snow", "season"]),
            ("doctor", ["hospital", "sick", "nurse"]),
            ("rocket", ["space", "launch", "moon"]),
        ]
        .into_iter()
        .map(|(text, forbidden)| Card {
            hints: forbidden.iter().map(|w| (*w).to_string()).collect(),
            ..Card::new(text)
        })
        .collect(),
        GameKind::FiveSeconds => cards(&[
            "Name three fruits",
            "Name three capital cities",
            "Name three things in a kitchen",
            "Name three board games",
            "Name three animals that swim",
            "Name three musical instruments",
        ]),
        GameKind::WhatAmI => answered(&[
            ("I waddle on ice and cannot fly", &["penguin"]),
            ("I have hands but cannot clap", &["clock", "a clock"]),
            ("I am full of keys but open no locks", &["piano", "keyboard"]),
            ("I grow when fed and die when watered", &["fire"]),
            ("I travel the world while staying in a corner", &["stamp", "a stamp"]),
        ]),
        GameKind::WordChain => cards(&[
            "apple", "river", "garden", "tiger", "lemon", "castle",
        ]),
        GameKind::TruthOrDare => cards(&[
            "Truth: what is the strangest food you have enjoyed?",
            "Dare: describe your morning using only three words",
            "Truth: which skill would you learn overnight?",
            "Dare: invent a new holiday and explain its traditions",
            "Truth: what is a rule you would add to this game?",
            "Dare: solve 17 times 6 without paper",
        ]),
        GameKind::GroupMemory => cards(&[
            "Things you pack for a trip",
            "Items at a picnic",
            "Animals at the zoo",
            "Things in a toolbox",
        ]),
        GameKind::ChineseWhispers => cards(&[
            "The purple giraffe borrowed my bicycle on Tuesday",
            "Seven sleepy sailors sang softly by the sea",
            "Grandma hid the cookies inside the piano",
            "A tiny robot learned to bake bread at midnight",
        ]),
        GameKind::Trivia => {
            use Difficulty::*;
            let tags = [
                ("geography", Easy),
                ("nature", Easy),
                ("science", Easy),
                ("geography", Medium),
                ("art", Medium),
                ("science", Hard),
                ("geography", Easy),
                ("science", Medium),
            ];
            answered(&[
                ("What is the capital of France?", &["Paris"]),
                ("How many legs does a spider have?", &["8", "eight"]),
                ("Which planet is known as the red planet?", &["Mars"]),
                ("What is the largest ocean on Earth?", &["Pacific", "Pacific Ocean"]),
                ("Who painted the Mona Lisa?", &["Leonardo da Vinci", "da Vinci", "Leonardo"]),
                ("What gas do plants absorb from the air?", &["carbon dioxide", "CO2"]),
                ("How many continents are there?", &["7", "seven"]),
                ("What is the freezing point of water in Celsius?", &["0", "zero"]),
            ])
            .into_iter()
            .zip(tags)
            .map(|(card, (category, level))| card.tagged(category, level))
            .collect()
        }
        GameKind::MysteryCase => answered(&[
            (
                "The cake vanished from a locked kitchen. Only the cook had a key, the butler was asleep, and the gardener has frosting on his sleeve.",
                &["gardener", "the gardener"],
            ),
            (
                "The museum alarm was switched off from inside at midnight. The guard was on patrol and the curator's badge was used.",
                &["curator", "the curator"],
            ),
            (
                "A letter was posted with no stamp, yet it arrived. The postman, the neighbour, and the sender's sister were the only visitors.",
                &["postman", "the postman"],
            ),
        ]),
    }
}
