use serde::{Deserialize, Serialize};

use emojiclash_core::card::{Deck, StatField};

/// Comparison operator for synergy rule thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl Comparator {
    pub fn passes(&self, value: f32, threshold: f32) -> bool {
        match self {
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => (value - threshold).abs() < 1e-6,
        }
    }
}

/// What a synergy rule measures on a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    TagCount { tag: String },
    StatSum { stat: StatField },
    UniqueFamilyCount,
}

/// One rule inside a synergy rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyRule {
    pub kind: RuleKind,
    pub comparator: Comparator,
    pub threshold: f32,
}

impl SynergyRule {
    fn measure(&self, deck: &Deck) -> f32 {
        match &self.kind {
            RuleKind::TagCount { tag } => deck.tag_count(tag) as f32,
            RuleKind::StatSum { stat } => deck.stat_sum(*stat),
            RuleKind::UniqueFamilyCount => deck.unique_family_count() as f32,
        }
    }

    /// Measured value when the comparator passes, else zero.
    pub fn contribution(&self, deck: &Deck) -> f32 {
        let value = self.measure(deck);
        if self.comparator.passes(value, self.threshold) {
            value
        } else {
            0.0
        }
    }
}

/// Which player stat a synergy bonus touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Damage,
    Health,
    Speed,
    Luck,
    SpecialChance,
}

/// A single stat adjustment granted by an active synergy.
///
/// Percentage bonuses adjust the stat multiplier by `value / 100`;
/// flat bonuses are direct multiplier (or chance) deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyBonus {
    pub stat: StatKind,
    pub value: f32,
    pub is_percentage: bool,
}

/// A named synergy: rules, activation thresholds, and granted bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyRuleSet {
    pub name: String,
    pub rules: Vec<SynergyRule>,
    pub min_threshold: f32,
    pub max_threshold: f32,
    /// Stackable bonuses scale linearly with level; others apply once.
    pub stackable: bool,
    pub bonuses: Vec<SynergyBonus>,
}

/// An activated synergy with its computed level and strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyActivation {
    pub name: String,
    pub contribution: f32,
    pub level: u32,
    pub strength: f32,
}

impl SynergyRuleSet {
    /// Evaluate against a deck. Returns None when inactive.
    pub fn evaluate(&self, deck: &Deck) -> Option<SynergyActivation> {
        if self.min_threshold <= 0.0 {
            return None;
        }
        let contribution: f32 = self.rules.iter().map(|r| r.contribution(deck)).sum();
        if contribution < self.min_threshold {
            return None;
        }
        let level_cap = (self.max_threshold / self.min_threshold).floor() as u32;
        let level = ((contribution / self.min_threshold).floor() as u32).min(level_cap.max(1));
        let strength = (contribution / self.max_threshold).min(1.0);
        Some(SynergyActivation {
            name: self.name.clone(),
            contribution,
            level,
            strength,
        })
    }
}

/// Per-player stat multipliers computed once at initialization and folded
/// into base stats. Never recomputed mid-match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynergyModifier {
    pub damage_mult: f32,
    pub health_mult: f32,
    pub speed_mult: f32,
    pub luck_mult: f32,
    pub special_chance: f32,
}

impl Default for SynergyModifier {
    fn default() -> Self {
        Self {
            damage_mult: 1.0,
            health_mult: 1.0,
            speed_mult: 1.0,
            luck_mult: 1.0,
            special_chance: 0.0,
        }
    }
}

impl SynergyModifier {
    fn fold(&mut self, bonus: &SynergyBonus, scale: f32) {
        let delta = if bonus.is_percentage {
            bonus.value / 100.0
        } else {
            bonus.value
        } * scale;
        match bonus.stat {
            StatKind::Damage => self.damage_mult += delta,
            StatKind::Health => self.health_mult += delta,
            StatKind::Speed => self.speed_mult += delta,
            StatKind::Luck => self.luck_mult += delta,
            StatKind::SpecialChance => self.special_chance += delta,
        }
    }

    pub fn scale_health(&self, base: u32) -> u32 {
        (base as f32 * self.health_mult.max(0.0)).round() as u32
    }

    pub fn scale_damage(&self, base: u32) -> u32 {
        (base as f32 * self.damage_mult.max(0.0)).round() as u32
    }
}

/// Resolve a deck against every rule set. Bonuses from multiple sets hitting
/// the same stat sum; nothing is suppressed.
pub fn resolve_modifier(
    deck: &Deck,
    rule_sets: &[SynergyRuleSet],
) -> (SynergyModifier, Vec<SynergyActivation>) {
    let mut modifier = SynergyModifier::default();
    let mut activations = Vec::new();

    for set in rule_sets {
        let Some(activation) = set.evaluate(deck) else {
            continue;
        };
        let scale = if set.stackable {
            activation.level as f32
        } else {
            1.0
        };
        for bonus in &set.bonuses {
            modifier.fold(bonus, scale);
        }
        activations.push(activation);
    }

    (modifier, activations)
}

/// Built-in synergy library. Families double as lowercase card tags, so
/// family-count synergies are expressed as tag counts.
pub fn default_rule_sets() -> Vec<SynergyRuleSet> {
    vec![
        SynergyRuleSet {
            name: "fire_flood".to_string(),
            rules: vec![SynergyRule {
                kind: RuleKind::TagCount {
                    tag: "fire".to_string(),
                },
                comparator: Comparator::Ge,
                threshold: 3.0,
            }],
            min_threshold: 3.0,
            max_threshold: 9.0,
            stackable: true,
            bonuses: vec![SynergyBonus {
                stat: StatKind::Damage,
                value: 10.0,
                is_percentage: true,
            }],
        },
        SynergyRuleSet {
            name: "rainbow_roster".to_string(),
            rules: vec![SynergyRule {
                kind: RuleKind::UniqueFamilyCount,
                comparator: Comparator::Ge,
                threshold: 4.0,
            }],
            min_threshold: 4.0,
            max_threshold: 8.0,
            stackable: false,
            bonuses: vec![
                SynergyBonus {
                    stat: StatKind::Health,
                    value: 15.0,
                    is_percentage: true,
                },
                SynergyBonus {
                    stat: StatKind::Luck,
                    value: 0.05,
                    is_percentage: false,
                },
            ],
        },
        SynergyRuleSet {
            name: "heavy_arsenal".to_string(),
            rules: vec![SynergyRule {
                kind: RuleKind::StatSum {
                    stat: StatField::Attack,
                },
                comparator: Comparator::Ge,
                threshold: 60.0,
            }],
            min_threshold: 60.0,
            max_threshold: 180.0,
            stackable: true,
            bonuses: vec![
                SynergyBonus {
                    stat: StatKind::Speed,
                    value: 5.0,
                    is_percentage: true,
                },
                SynergyBonus {
                    stat: StatKind::SpecialChance,
                    value: 0.02,
                    is_percentage: false,
                },
            ],
        },
    ]
}
