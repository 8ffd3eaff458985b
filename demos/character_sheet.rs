//! Character sheet example: a small registry of damage, life and leech
//! stats, evaluated for one character while gear changes.
//!
//! Run with `RUST_LOG=vstat=trace` to see registry and propagation logs.

use vstat::formula::{LegacyLeech, ModifiedStat};
use vstat::numeric::{apply_scale, divide};
use vstat::*;

// Primitives
const STRENGTH: StatId = StatId::new(0);
const WEAPON_DAMAGE: StatId = StatId::new(1);
const INCREASED_PHYSICAL: StatId = StatId::new(2);
const MORE_MELEE: StatId = StatId::new(3);
const DEAL_NO_PHYSICAL: StatId = StatId::new(4);
const BASE_LIFE: StatId = StatId::new(5);
const INCREASED_LIFE: StatId = StatId::new(6);
const OLD_LIFE_LEECH: StatId = StatId::new(7);

// Derived
const STRENGTH_DAMAGE_BONUS: StatId = StatId::new(8);
const PHYSICAL_DAMAGE: StatId = StatId::new(9);
const MAX_LIFE: StatId = StatId::new(10);
const LIFE_LEECH: StatId = StatId::new(11);
const LIFE_LEECHED_PER_HIT: StatId = StatId::new(12);

const STAT_COUNT: usize = 13;

const NAMES: [&str; STAT_COUNT] = [
    "strength",
    "weapon_damage",
    "increased_physical",
    "more_melee",
    "deal_no_physical",
    "base_life",
    "increased_life",
    "old_life_leech",
    "strength_damage_bonus",
    "physical_damage",
    "max_life",
    "life_leech_permyriad",
    "life_leeched_per_hit",
];

const GAME_DATA: &str = r#"{
    "constants": { "globals": { "legacy_leech_effectiveness": 75 } }
}"#;

fn definitions() -> Vec<StatDefinition> {
    vec![
        // 1% increased physical damage per 5 strength
        StatDefinition::new(STRENGTH_DAMAGE_BONUS, &[STRENGTH, INCREASED_PHYSICAL], |s| {
            s.stat(INCREASED_PHYSICAL) + divide(s.stat(STRENGTH), 5)
        }),
        StatDefinition::declared(
            PHYSICAL_DAMAGE,
            ModifiedStat::base([WEAPON_DAMAGE])
                .increased([STRENGTH_DAMAGE_BONUS])
                .more([MORE_MELEE])
                .unless(DEAL_NO_PHYSICAL),
        ),
        StatDefinition::new(MAX_LIFE, &[BASE_LIFE, INCREASED_LIFE, STRENGTH], |s| {
            let flat = s.stat(BASE_LIFE) + divide(s.stat(STRENGTH), 2);
            apply_scale(flat, 100 + s.stat(INCREASED_LIFE)).max(1)
        }),
        StatDefinition::declared(LIFE_LEECH, LegacyLeech::from_percent(OLD_LIFE_LEECH)),
        StatDefinition::new(
            LIFE_LEECHED_PER_HIT,
            &[PHYSICAL_DAMAGE, LIFE_LEECH, MAX_LIFE],
            |s| {
                let leeched = divide(s.stat(PHYSICAL_DAMAGE) * s.stat(LIFE_LEECH), 10_000);
                leeched.min(divide(s.stat(MAX_LIFE), 10))
            },
        ),
    ]
}

fn print_sheet<P: PrimitiveStore>(title: &str, evaluator: &mut Evaluator<'_, P>) {
    println!("\n=== {title} ===");
    for (id, value) in evaluator.evaluate_all() {
        println!("  {:<24} {value}", NAMES[id.index()]);
    }
    let counters = evaluator.counters();
    println!(
        "  (formulas run: {}, cache hits: {})",
        counters.formula_calls, counters.cache_hits
    );
    evaluator.reset_counters();
}

fn main() -> Result<(), StatError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data = GameData::from_json_str(GAME_DATA)?;
    let registry = Registry::try_from_definitions(STAT_COUNT, definitions())?;

    let report = validate_registry::<MapPrimitives>(&registry, &data, &[]);
    if let Err(errors) = report.into_result() {
        for error in &errors {
            eprintln!("{error}");
        }
        return Err(errors[0].clone());
    }

    let mut character =
        Evaluator::new(&registry, DensePrimitives::new(STAT_COUNT)).with_data(&data);
    character.set_primitive(STRENGTH, 50);
    character.set_primitive(WEAPON_DAMAGE, 120);
    character.set_primitive(INCREASED_PHYSICAL, 40);
    character.set_primitive(MORE_MELEE, 20);
    character.set_primitive(BASE_LIFE, 400);
    character.set_primitive(INCREASED_LIFE, 30);
    character.set_primitive(OLD_LIFE_LEECH, 2);
    print_sheet("Starting gear", &mut character);

    let dirty = character.set_primitive(WEAPON_DAMAGE, 180);
    println!("\nWeapon swap dirtied {} stats", dirty.len());
    print_sheet("After weapon swap", &mut character);

    let dirty = character.set_primitive(DEAL_NO_PHYSICAL, 1);
    println!("\nConversion keystone dirtied {} stats", dirty.len());
    print_sheet("Physical damage disabled", &mut character);

    Ok(())
}
