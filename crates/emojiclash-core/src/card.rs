use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A card's on-hit effect payload. Closed set; the engine matches exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectSlot {
    /// Damage over time applied to the hit player.
    Burn { dps: u32, duration_ms: u64 },
    /// Slows the hit player's fire rate. `factor` < 1.0 means slower.
    Slow { factor: f32, duration_ms: u64 },
    /// Temporarily raises the hit owner's critical chance.
    LuckyChance { bonus: f32, duration_ms: u64 },
    /// Projectiles pass through players instead of stopping on the first hit.
    Pierce,
}

/// Numeric card stat selectable by synergy rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    Attack,
    Defense,
    Health,
    AttackSpeed,
}

/// A single collectible card's combat-relevant stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    pub family: String,
    pub emoji: String,
    pub attack: u32,
    pub defense: u32,
    pub health: u32,
    pub attack_speed: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub emoji_slots: Vec<String>,
    #[serde(default)]
    pub effect_slots: Vec<EffectSlot>,
}

impl Card {
    /// Read a numeric stat by field selector.
    pub fn stat(&self, field: StatField) -> f32 {
        match field {
            StatField::Attack => self.attack as f32,
            StatField::Defense => self.defense as f32,
            StatField::Health => self.health as f32,
            StatField::AttackSpeed => self.attack_speed,
        }
    }
}

/// An ordered list of cards a player brings into combat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub cards: Vec<Card>,
}

impl Deck {
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn total_attack(&self) -> u32 {
        self.cards.iter().map(|c| c.attack).sum()
    }

    pub fn total_defense(&self) -> u32 {
        self.cards.iter().map(|c| c.defense).sum()
    }

    pub fn total_health(&self) -> u32 {
        self.cards.iter().map(|c| c.health).sum()
    }

    /// Mean attack speed across the deck, or 1.0 for an empty deck.
    pub fn average_attack_speed(&self) -> f32 {
        if self.cards.is_empty() {
            return 1.0;
        }
        self.cards.iter().map(|c| c.attack_speed).sum::<f32>() / self.cards.len() as f32
    }

    /// Sum a numeric stat across all cards.
    pub fn stat_sum(&self, field: StatField) -> f32 {
        self.cards.iter().map(|c| c.stat(field)).sum()
    }

    /// How many cards carry the given tag (case-sensitive).
    pub fn tag_count(&self, tag: &str) -> usize {
        self.cards
            .iter()
            .filter(|c| c.tags.iter().any(|t| t == tag))
            .count()
    }

    /// Card count per family.
    pub fn family_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for card in &self.cards {
            *counts.entry(card.family.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct families in the deck.
    pub fn unique_family_count(&self) -> usize {
        self.family_counts().len()
    }

    /// All effect slots in deck order.
    pub fn effect_slots(&self) -> Vec<EffectSlot> {
        self.cards
            .iter()
            .flat_map(|c| c.effect_slots.iter().cloned())
            .collect()
    }

    /// All emoji slot symbols in deck order, deduplicated.
    pub fn emoji_pool(&self) -> Vec<String> {
        let mut pool: Vec<String> = Vec::new();
        for card in &self.cards {
            for e in &card.emoji_slots {
                if !pool.contains(e) {
                    pool.push(e.clone());
                }
            }
        }
        pool
    }
}
