//! Default stat tables shipped with the engine.

use std::collections::BTreeMap;

use super::kinds::{EnemyKind, HeroKind, SpellKind, TowerKind, TowerTier, TroopKind};
use super::stats::{
    AttackStats, ChainStats, Delivery, EnemyStats, HeroStats, IncomeStats, OnHitEffect,
    ProductionStats, SpellEffect, SpellStats, SplashStats, TauntStats, TowerTierStats, Tuning,
    UnitStats,
};
use super::waves::{Route, Wave, WaveGroup, WavePlan};
use super::GameData;

impl GameData {
    /// The default tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            enemies: enemies(),
            towers: towers(),
            troops: troops(),
            heroes: heroes(),
            spells: spells(),
            wave_templates: wave_templates(),
            tuning: Tuning::default(),
        }
    }
}

fn enemy(hp: u32, speed: u32, armor_pct: u32, bounty: u32) -> EnemyStats {
    EnemyStats {
        hp,
        speed,
        armor_pct,
        bounty,
        lives_cost: 1,
        flying: false,
        attack: None,
        hits_objectives: false,
    }
}

fn enemies() -> BTreeMap<EnemyKind, EnemyStats> {
    BTreeMap::from([
        (EnemyKind::Frosh, enemy(60, 60, 0, 6)),
        (EnemyKind::Sprinter, enemy(40, 110, 0, 7)),
        (
            EnemyKind::Brute,
            EnemyStats {
                attack: Some(AttackStats {
                    damage: 12,
                    range: 24,
                    cooldown_ms: 1200,
                }),
                ..enemy(220, 40, 10, 15)
            },
        ),
        (
            EnemyKind::Gargoyle,
            EnemyStats {
                flying: true,
                ..enemy(90, 75, 0, 12)
            },
        ),
        (EnemyKind::Armored, enemy(180, 45, 50, 18)),
        (
            EnemyKind::Warlord,
            EnemyStats {
                lives_cost: 5,
                attack: Some(AttackStats {
                    damage: 40,
                    range: 32,
                    cooldown_ms: 1500,
                }),
                hits_objectives: true,
                ..enemy(1500, 35, 30, 150)
            },
        ),
    ])
}

fn tier(cost: u32, damage: u32, range: u32, cooldown_ms: u32) -> TowerTierStats {
    TowerTierStats {
        cost,
        damage,
        range,
        cooldown_ms,
        targets_air: false,
        delivery: Delivery::Instant,
        splash: None,
        chain: None,
        on_hit: None,
        production: None,
        income: None,
    }
}

fn tiers(list: [TowerTierStats; 5]) -> BTreeMap<TowerTier, TowerTierStats> {
    TowerTier::ALL.into_iter().zip(list).collect()
}

fn archer() -> BTreeMap<TowerTier, TowerTierStats> {
    let air = |stats: TowerTierStats| TowerTierStats {
        targets_air: true,
        ..stats
    };
    tiers([
        air(tier(70, 6, 240, 800)),
        air(tier(110, 10, 256, 750)),
        air(tier(160, 15, 272, 700)),
        air(tier(230, 30, 320, 800)),
        air(tier(250, 12, 272, 350)),
    ])
}

fn mage() -> BTreeMap<TowerTier, TowerTierStats> {
    let bolt = |stats: TowerTierStats| TowerTierStats {
        targets_air: true,
        delivery: Delivery::Projectile { speed: 360 },
        ..stats
    };
    tiers([
        bolt(tier(100, 16, 220, 1500)),
        bolt(tier(150, 28, 230, 1500)),
        bolt(tier(210, 44, 240, 1400)),
        TowerTierStats {
            on_hit: Some(OnHitEffect::Burn {
                dps: 10,
                duration_ms: 3000,
            }),
            ..bolt(tier(280, 60, 250, 1400))
        },
        bolt(tier(300, 90, 250, 1800)),
    ])
}

fn frost() -> BTreeMap<TowerTier, TowerTierStats> {
    let slow = |pct: u32, stats: TowerTierStats| TowerTierStats {
        on_hit: Some(OnHitEffect::Slow {
            pct,
            duration_ms: 1500,
        }),
        ..stats
    };
    tiers([
        slow(30, tier(90, 3, 200, 1000)),
        slow(35, tier(120, 5, 210, 1000)),
        slow(40, tier(170, 8, 220, 900)),
        slow(55, tier(220, 10, 230, 900)),
        TowerTierStats {
            on_hit: Some(OnHitEffect::Freeze { duration_ms: 900 }),
            ..tier(260, 12, 220, 2500)
        },
    ])
}

fn cannon() -> BTreeMap<TowerTier, TowerTierStats> {
    let shell = |radius: u32, stats: TowerTierStats| TowerTierStats {
        delivery: Delivery::Projectile { speed: 300 },
        splash: Some(SplashStats {
            radius,
            edge_pct: 50,
        }),
        ..stats
    };
    tiers([
        shell(56, tier(120, 20, 200, 2000)),
        shell(60, tier(160, 32, 210, 2000)),
        shell(64, tier(220, 48, 220, 1900)),
        shell(84, tier(300, 70, 230, 2000)),
        TowerTierStats {
            on_hit: Some(OnHitEffect::Stun { duration_ms: 600 }),
            ..shell(64, tier(300, 60, 220, 1800))
        },
    ])
}

fn tesla() -> BTreeMap<TowerTier, TowerTierStats> {
    let arc = |max_hops: u32, stats: TowerTierStats| TowerTierStats {
        targets_air: true,
        chain: Some(ChainStats {
            max_hops,
            hop_radius: 96,
            falloff_pct: 70,
        }),
        ..stats
    };
    tiers([
        arc(2, tier(130, 14, 180, 1600)),
        arc(2, tier(180, 22, 190, 1500)),
        arc(3, tier(240, 32, 200, 1400)),
        arc(5, tier(320, 40, 210, 1400)),
        TowerTierStats {
            on_hit: Some(OnHitEffect::Stun { duration_ms: 400 }),
            ..arc(3, tier(320, 55, 210, 1300))
        },
    ])
}

fn barracks() -> BTreeMap<TowerTier, TowerTierStats> {
    let producing = |troop: TroopKind, squad_size: u32, respawn_ms: u32, cost: u32| {
        TowerTierStats {
            production: Some(ProductionStats {
                troop,
                squad_size,
                cap: squad_size,
                respawn_ms,
            }),
            ..tier(cost, 0, 160, 0)
        }
    };
    tiers([
        producing(TroopKind::Militia, 3, 10_000, 80),
        producing(TroopKind::Militia, 3, 9_000, 110),
        producing(TroopKind::Militia, 3, 8_000, 150),
        producing(TroopKind::Militia, 4, 7_000, 220),
        producing(TroopKind::Ranger, 3, 8_000, 240),
    ])
}

fn mine() -> BTreeMap<TowerTier, TowerTierStats> {
    let paying = |amount: u32, cost: u32| TowerTierStats {
        income: Some(IncomeStats {
            amount,
            interval_ms: 5000,
        }),
        ..tier(cost, 0, 0, 0)
    };
    tiers([
        paying(8, 120),
        paying(12, 120),
        paying(16, 160),
        paying(24, 240),
        paying(20, 180),
    ])
}

fn towers() -> BTreeMap<TowerKind, BTreeMap<TowerTier, TowerTierStats>> {
    BTreeMap::from([
        (TowerKind::Archer, archer()),
        (TowerKind::Mage, mage()),
        (TowerKind::Frost, frost()),
        (TowerKind::Cannon, cannon()),
        (TowerKind::Tesla, tesla()),
        (TowerKind::Barracks, barracks()),
        (TowerKind::Mine, mine()),
    ])
}

fn troops() -> BTreeMap<TroopKind, UnitStats> {
    BTreeMap::from([
        (
            TroopKind::Militia,
            UnitStats {
                hp: 80,
                damage: 6,
                range: 24,
                cooldown_ms: 1000,
                sight: 120,
                speed: 80,
                armor_pct: 10,
                ranged: false,
            },
        ),
        (
            TroopKind::Ranger,
            UnitStats {
                hp: 60,
                damage: 8,
                range: 140,
                cooldown_ms: 1100,
                sight: 160,
                speed: 80,
                armor_pct: 0,
                ranged: true,
            },
        ),
    ])
}

fn heroes() -> BTreeMap<HeroKind, HeroStats> {
    BTreeMap::from([
        (
            HeroKind::Warden,
            HeroStats {
                unit: UnitStats {
                    hp: 400,
                    damage: 18,
                    range: 28,
                    cooldown_ms: 900,
                    sight: 160,
                    speed: 100,
                    armor_pct: 30,
                    ranged: false,
                },
                respawn_ms: 15_000,
                regen_per_sec: 4,
                taunt: TauntStats {
                    radius: 120,
                    duration_ms: 3000,
                    cooldown_ms: 12_000,
                    pull: 32,
                },
            },
        ),
        (
            HeroKind::Huntress,
            HeroStats {
                unit: UnitStats {
                    hp: 260,
                    damage: 22,
                    range: 180,
                    cooldown_ms: 1000,
                    sight: 200,
                    speed: 110,
                    armor_pct: 10,
                    ranged: true,
                },
                respawn_ms: 12_000,
                regen_per_sec: 3,
                taunt: TauntStats {
                    radius: 90,
                    duration_ms: 2000,
                    cooldown_ms: 15_000,
                    pull: 24,
                },
            },
        ),
    ])
}

fn spells() -> BTreeMap<SpellKind, SpellStats> {
    BTreeMap::from([
        (
            SpellKind::Meteor,
            SpellStats {
                cost: 0,
                cooldown_ms: 30_000,
                radius: 72,
                effect: SpellEffect::Damage { amount: 120 },
            },
        ),
        (
            SpellKind::Blizzard,
            SpellStats {
                cost: 50,
                cooldown_ms: 20_000,
                radius: 96,
                effect: SpellEffect::SlowField {
                    pct: 50,
                    duration_ms: 4000,
                },
            },
        ),
        (
            SpellKind::Reinforcements,
            SpellStats {
                cost: 0,
                cooldown_ms: 10_000,
                radius: 24,
                effect: SpellEffect::Summon {
                    troop: TroopKind::Militia,
                    count: 2,
                    lifetime_ms: 15_000,
                },
            },
        ),
    ])
}

fn group(enemy: EnemyKind, count: u32, interval_ms: u32, delay_ms: u32) -> WaveGroup {
    WaveGroup {
        enemy,
        count,
        interval_ms,
        delay_ms,
        route: Route::Primary,
        hp_pct: 100,
        speed_pct: 100,
    }
}

fn wave(groups: Vec<WaveGroup>) -> Wave {
    Wave { groups }
}

fn wave_templates() -> BTreeMap<String, WavePlan> {
    let standard = WavePlan {
        waves: vec![
            wave(vec![group(EnemyKind::Frosh, 6, 900, 0)]),
            wave(vec![
                group(EnemyKind::Frosh, 8, 700, 0),
                group(EnemyKind::Sprinter, 4, 500, 3000),
            ]),
            wave(vec![
                group(EnemyKind::Brute, 3, 1500, 0),
                group(EnemyKind::Gargoyle, 4, 900, 2000),
            ]),
            wave(vec![
                group(EnemyKind::Armored, 4, 1200, 0),
                group(EnemyKind::Frosh, 10, 400, 1000),
            ]),
            wave(vec![
                group(EnemyKind::Sprinter, 8, 400, 0),
                group(EnemyKind::Warlord, 1, 0, 4000),
            ]),
        ],
    };

    let forked = WavePlan {
        waves: vec![
            wave(vec![WaveGroup {
                route: Route::Alternate,
                ..group(EnemyKind::Frosh, 8, 600, 0)
            }]),
            wave(vec![
                WaveGroup {
                    route: Route::Secondary,
                    ..group(EnemyKind::Sprinter, 6, 500, 0)
                },
                group(EnemyKind::Brute, 2, 2000, 1000),
            ]),
            wave(vec![
                WaveGroup {
                    route: Route::Alternate,
                    hp_pct: 150,
                    ..group(EnemyKind::Armored, 6, 900, 0)
                },
                group(EnemyKind::Gargoyle, 6, 700, 1500),
            ]),
        ],
    };

    BTreeMap::from([
        ("standard".to_string(), standard),
        ("forked".to_string(), forked),
    ])
}
