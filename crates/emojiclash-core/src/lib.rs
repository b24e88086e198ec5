pub mod card;
pub mod events;
pub mod player;
pub mod time;

/// Unique identifier for a combatant.
pub type PlayerId = u64;
/// Unique identifier for a live projectile.
pub type ProjectileId = u64;
/// Unique identifier for an arena obstacle.
pub type ObstacleId = u64;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::PlayerId;
    use crate::card::{Card, Deck, EffectSlot};
    use crate::player::{Difficulty, PlayerProfile};

    /// Create `n` test profiles with sequential IDs starting at 1.
    /// The first profile is human, the rest are medium-difficulty bots.
    pub fn make_profiles(n: usize) -> Vec<PlayerProfile> {
        (0..n)
            .map(|i| PlayerProfile {
                id: i as PlayerId + 1,
                username: format!("Player{}", i + 1),
                is_bot: i > 0,
                difficulty: if i > 0 { Some(Difficulty::Medium) } else { None },
            })
            .collect()
    }

    /// Create a bot profile with the given id and difficulty.
    pub fn bot_profile(id: PlayerId, difficulty: Difficulty) -> PlayerProfile {
        PlayerProfile {
            id,
            username: format!("Bot{id}"),
            is_bot: true,
            difficulty: Some(difficulty),
        }
    }

    /// Create a card with the given family and flat stats.
    pub fn make_card(family: &str, attack: u32, defense: u32, health: u32) -> Card {
        Card {
            name: format!("{family} fighter"),
            family: family.to_string(),
            emoji: "⚔️".to_string(),
            attack,
            defense,
            health,
            attack_speed: 1.0,
            tags: vec![family.to_lowercase()],
            emoji_slots: vec!["⚔️".to_string()],
            effect_slots: Vec::new(),
        }
    }

    /// Create a deck of `n` identical cards of one family.
    pub fn make_deck(family: &str, n: usize) -> Deck {
        Deck {
            cards: (0..n).map(|_| make_card(family, 10, 5, 20)).collect(),
        }
    }

    /// A mixed deck with two families and one burn effect card.
    pub fn balanced_deck() -> Deck {
        let mut fire = make_card("Fire", 12, 4, 18);
        fire.effect_slots.push(EffectSlot::Burn {
            dps: 4,
            duration_ms: 2_000,
        });
        Deck {
            cards: vec![
                fire,
                make_card("Fire", 10, 5, 20),
                make_card("Water", 8, 8, 25),
                make_card("Water", 9, 7, 22),
            ],
        }
    }
}
