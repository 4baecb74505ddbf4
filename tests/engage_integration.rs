//! Integration tests for combat: kill counting and target selection

mod common;

use common::Harness;
use proptest::prelude::*;
use steward::command::action::{NameFilter, TargetSpec};
use steward::command::events::AgentEvent;
use steward::controller::{select_targets, ControllerKind, EndReason, Report};
use steward::core::config::{AgentConfig, EngageConfig};
use steward::core::types::{EntityId, Vec3};
use steward::dispatch::Dispatch;
use steward::world::{EntityKind, EntitySnapshot, WorldAction, WorldEvent};

#[test]
fn test_kills_requested_count_then_completes() {
    let mut h = Harness::new();
    h.world.give_item("iron_sword", 1);
    let first = h.world.spawn_mob("zombie", Vec3::new(5.5, 64.0, 0.5), 8.0);
    let second = h.world.spawn_mob("zombie", Vec3::new(9.5, 64.0, 2.5), 8.0);
    let cow = h.world.spawn_mob("cow", Vec3::new(-4.5, 64.0, 0.5), 8.0);

    h.command(r#"engage({"target": {"entityNames": ["zombie"], "count": 2}, "tool": "sword"})"#)
        .unwrap();
    h.run_until_idle(1_000);

    assert!(!h.world.is_alive(first));
    assert!(!h.world.is_alive(second));
    assert!(h.world.is_alive(cow));
    assert_eq!(h.world.equipped(), Some("iron_sword"));
    assert!(!h
        .world
        .actions()
        .iter()
        .any(|a| *a == WorldAction::Strike(cow)));

    let events = h.events();
    let progress: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Progress { detail, .. } => Some(detail.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec!["Killed 1/2", "Killed 2/2"]);

    let outcome = Harness::completion(&events);
    assert!(outcome.success);
    assert_eq!(outcome.report, Report::Engage { kills: 2, desired: 2 });
    assert_eq!(outcome.message(), "Killed all targets!");
}

#[test]
fn test_deaths_of_other_entities_do_not_count() {
    let mut h = Harness::new();
    let zombie = h.world.spawn_mob("zombie", Vec3::new(3.5, 64.0, 0.5), 20.0);
    let bystander = h.world.spawn_mob("skeleton", Vec3::new(30.5, 64.0, 0.5), 20.0);

    h.command(r#"engage({"target": {"entityNames": ["zombie"], "count": 1}})"#)
        .unwrap();
    h.step();
    assert_eq!(h.dispatcher.engager().current_target(), Some(zombie));
    h.world.kill(bystander);
    h.step();

    assert_eq!(h.dispatcher.engager().kills(), 0);
    assert_eq!(h.dispatcher.active(), Some(ControllerKind::Engager));

    h.world.kill(zombie);
    deliver_deaths(&mut h);
    assert_eq!(h.dispatcher.engager().kills(), 1);
    h.step();
    assert_eq!(h.dispatcher.active(), None);
}

/// World step without a controller tick
fn deliver_deaths(h: &mut Harness) {
    for event in h.world.step() {
        if let WorldEvent::EntityDied(id) = event {
            h.dispatcher.on_entity_died(id);
        }
    }
}

#[test]
fn test_stop_after_final_kill_reports_success() {
    let mut h = Harness::new();
    let zombie = h.world.spawn_mob("zombie", Vec3::new(3.5, 64.0, 0.5), 20.0);
    h.command("engage({})").unwrap();
    h.step();

    h.world.kill(zombie);
    deliver_deaths(&mut h);
    h.command("stopAction()").unwrap();

    let outcome = Harness::completion(&h.events());
    assert!(outcome.success);
    assert_eq!(outcome.reason, EndReason::Completed);
}

#[test]
fn test_engage_right_after_final_kill_starts_a_new_fight() {
    let mut h = Harness::new();
    let zombie = h.world.spawn_mob("zombie", Vec3::new(3.5, 64.0, 0.5), 20.0);
    h.world.spawn_mob("skeleton", Vec3::new(6.5, 64.0, 0.5), 20.0);
    h.command(r#"engage({"target": {"entityNames": ["zombie"], "count": 1}})"#)
        .unwrap();
    h.step();

    h.world.kill(zombie);
    deliver_deaths(&mut h);
    h.events();

    let result = h
        .command(r#"engage({"target": {"entityNames": ["skeleton"], "count": 1}})"#)
        .unwrap();
    assert_eq!(result, Dispatch::Started(ControllerKind::Engager));
    assert_eq!(h.dispatcher.engager().kills(), 0);

    let events = h.events();
    let outcome = Harness::completion(&events);
    assert!(outcome.success);
    assert_eq!(outcome.report, Report::Engage { kills: 1, desired: 1 });
    assert!(matches!(events.first(), Some(AgentEvent::Completed { .. })));
    assert!(matches!(events.last(), Some(AgentEvent::Started { .. })));
}

#[test]
fn test_gives_up_without_targets() {
    let mut config = AgentConfig::default();
    config.engage.max_empty_scans = 3;
    let mut h = Harness::with_config(config);
    h.world.spawn_mob("creeper", Vec3::new(4.5, 64.0, 0.5), 20.0);

    h.command("engage({})").unwrap();
    h.run_until_idle(100);

    let outcome = Harness::completion(&h.events());
    assert!(!outcome.success);
    assert_eq!(outcome.reason, EndReason::NoTargets);
    assert_eq!(outcome.message(), "I can't find any valid targets nearby!");
}

const NAMES: [&str; 10] = [
    "zombie", "skeleton", "cow", "pig", "creeper", "enderman", "warden", "villager", "cat",
    "cave_spider",
];

fn entity_strategy() -> impl Strategy<Value = (usize, f64, f64, bool)> {
    (0..NAMES.len(), -80.0f64..80.0, -80.0f64..80.0, any::<bool>())
}

proptest! {
    #[test]
    fn prop_selection_honors_deny_list_and_radius(
        specs in prop::collection::vec(entity_strategy(), 0..24),
        wanted in prop::option::of(0..NAMES.len()),
    ) {
        let config = EngageConfig::default();
        let origin = Vec3::new(0.5, 64.0, 0.5);
        let agent = EntityId(1);
        let entities: Vec<EntitySnapshot> = specs
            .iter()
            .enumerate()
            .map(|(i, (name, x, z, alive))| EntitySnapshot {
                id: EntityId(i as u64 + 2),
                kind: EntityKind::Mob,
                name: NAMES[*name].to_string(),
                display_name: None,
                username: None,
                position: Some(Vec3::new(*x, 64.0, *z)),
                alive: *alive,
            })
            .collect();
        let spec = TargetSpec {
            entity_names: match wanted {
                Some(i) => NameFilter::Names(vec![NAMES[i].to_string()]),
                None => NameFilter::Any,
            },
            count: 1,
        };

        let selected = select_targets(&entities, agent, origin, &spec, &config);

        let mut last = 0.0;
        for target in &selected {
            prop_assert!(target.alive);
            prop_assert!(!config.dangerous.contains(&target.name));
            prop_assert!(config.hostile.contains(&target.name) || config.prey.contains(&target.name));
            if let Some(i) = wanted {
                prop_assert_eq!(target.name.as_str(), NAMES[i]);
            }
            let distance = target.position.map(|p| p.distance(&origin)).unwrap_or(f64::MAX);
            prop_assert!(distance <= config.radius);
            prop_assert!(distance >= last);
            last = distance;
        }

        let eligible = entities
            .iter()
            .filter(|e| {
                e.alive
                    && e.position.is_some_and(|p| p.distance(&origin) <= config.radius)
                    && !config.dangerous.contains(&e.name)
                    && (config.hostile.contains(&e.name) || config.prey.contains(&e.name))
                    && wanted.map_or(true, |i| e.name == NAMES[i])
            })
            .count();
        prop_assert_eq!(selected.len(), eligible);
    }
}
