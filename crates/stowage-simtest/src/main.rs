//! Stowage Headless Harness
//!
//! Runs the stowage logic end to end over the bundled scenario and over
//! seeded random stations, checking layout and lifecycle invariants.
//! Runs entirely in-process; no network, no storage.
//!
//! Usage:
//!   cargo run -p stowage-simtest
//!   cargo run -p stowage-simtest -- --verbose
//!   cargo run -p stowage-simtest -- --seeds 200

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use stowage_logic::catalog::{Catalog, ContainerSpec, ItemSpec, Severity};
use stowage_logic::config::PlannerConfig;
use stowage_logic::geometry::EPSILON;
use stowage_logic::inventory::Inventory;
use stowage_logic::layout::Layout;
use stowage_logic::model::StepAction;
use stowage_logic::placement::{place_item, place_items, ManualPlaceRequest};
use stowage_logic::retrieval::{blockers, plan_retrieval, retrieve, RetrieveRequest};
use stowage_logic::simulation::{simulate, SimulateRequest, UsageEntry};
use stowage_logic::waste::{
    complete_undocking, identify_waste, plan_return, ReturnPlanRequest, UndockingRequest,
};
use stowage_logic::StowageEngine;

// ── Bundled scenario (same JSON the integration tests use) ──────────────
const SCENARIO_JSON: &str = include_str!("../../../data/scenario.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    config: PlannerConfig,
    catalog: Catalog,
    days: u32,
    daily_usage: Vec<UsageEntry>,
    undocking: ReturnPlanRequest,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: impl Into<String>, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let seeds = args
        .iter()
        .position(|a| a == "--seeds")
        .and_then(|i| args.get(i + 1))
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(50);
    println!("=== Stowage Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario catalog
    let scenario = match serde_json::from_str::<Scenario>(SCENARIO_JSON) {
        Ok(s) => Some(s),
        Err(e) => {
            results.push(check("scenario_parse", false, format!("JSON parse error: {e}")));
            None
        }
    };
    if let Some(scenario) = &scenario {
        results.extend(validate_catalog(scenario));

        // 2. Scenario pipeline
        results.extend(validate_scenario_pipeline(scenario, verbose));

        // 3. Retrieval sweep over the scenario layout
        results.extend(validate_retrieval_sweep(scenario));
    }

    // 4. Seeded random stations
    results.extend(validate_random_stations(seeds, verbose));

    // 5. Engine handle
    results.extend(validate_engine_handle());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(scenario: &Scenario) -> Vec<TestResult> {
    println!("--- Catalog ---");
    let mut results = Vec::new();
    let catalog = &scenario.catalog;

    results.push(check(
        "catalog_not_empty",
        !catalog.items.is_empty() && !catalog.containers.is_empty(),
        format!(
            "{} items, {} containers",
            catalog.items.len(),
            catalog.containers.len()
        ),
    ));

    let issues = catalog.issues();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .collect();
    let warnings = issues.len() - errors.len();
    results.push(check(
        "catalog_valid",
        errors.is_empty(),
        if errors.is_empty() {
            format!("no errors, {warnings} warning(s)")
        } else {
            errors
                .iter()
                .map(|i| format!("[{}] {}", i.category, i.message))
                .collect::<Vec<_>>()
                .join("; ")
        },
    ));

    // Every item must fit some container on its own.
    let oversized: Vec<&str> = catalog
        .items
        .iter()
        .filter(|item| {
            !catalog.containers.iter().any(|c| {
                item.dims()
                    .orientations()
                    .iter()
                    .any(|o| o.width <= c.width && o.depth <= c.depth && o.height <= c.height)
            })
        })
        .map(|item| item.item_id.as_str())
        .collect();
    results.push(check(
        "catalog_items_fit_somewhere",
        oversized.is_empty(),
        if oversized.is_empty() {
            "every item fits an empty container".to_string()
        } else {
            format!("oversized: {}", oversized.join(", "))
        },
    ));

    results
}

// ── 2. Scenario pipeline ────────────────────────────────────────────────

fn scenario_inventory(scenario: &Scenario) -> Inventory {
    let start = scenario
        .config
        .start_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    Inventory::new(start)
}

fn validate_scenario_pipeline(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    println!("--- Scenario Pipeline ---");
    let mut results = Vec::new();
    let config = &scenario.config;
    let mut inv = scenario_inventory(scenario);

    let placed = match place_items(&mut inv, &scenario.catalog, config) {
        Ok(r) => r,
        Err(e) => {
            results.push(check("scenario_place", false, e.to_string()));
            return results;
        }
    };
    results.push(check(
        "scenario_all_placed",
        placed.success,
        format!(
            "{} placed, {} moved, {} failed",
            placed.placements.len(),
            placed.rearrangements.len(),
            placed.failures.len()
        ),
    ));
    let violations = inv.layout_violations(config.epsilon);
    results.push(check(
        "scenario_layout_sound",
        violations.is_empty(),
        if violations.is_empty() {
            "no overlaps, every box inside its container".to_string()
        } else {
            violations.join("; ")
        },
    ));

    // Same batch again: nothing new, every item a state conflict.
    let again = place_items(&mut inv, &scenario.catalog, config);
    let all_conflicts = again.as_ref().is_ok_and(|r| {
        r.placements.is_empty()
            && r.failures.len() == scenario.catalog.items.len()
            && r
                .failures
                .iter()
                .all(|f| f.kind == stowage_logic::ErrorKind::StateConflict)
    });
    results.push(check(
        "scenario_replace_is_conflict",
        all_conflicts,
        "re-placing stowed items reports state conflicts",
    ));

    let waste_before = identify_waste(&inv);
    let sim = simulate(
        &mut inv,
        &SimulateRequest {
            num_of_days: Some(scenario.days),
            to_timestamp: None,
            items_to_be_used_per_day: scenario.daily_usage.clone(),
        },
    );
    match sim {
        Ok(sim) => {
            let used: HashSet<&str> = sim.items_used.iter().map(|i| i.item_id.as_str()).collect();
            let expired: HashSet<&str> =
                sim.items_expired.iter().map(|i| i.item_id.as_str()).collect();
            let depleted: HashSet<&str> = sim
                .items_depleted_today
                .iter()
                .map(|i| i.item_id.as_str())
                .collect();
            let disjoint = used.is_disjoint(&expired)
                && used.is_disjoint(&depleted)
                && expired.is_disjoint(&depleted);
            results.push(check(
                "simulation_lists_disjoint",
                disjoint,
                format!(
                    "{} used, {} expired, {} depleted by {}",
                    used.len(),
                    expired.len(),
                    depleted.len(),
                    sim.new_date
                ),
            ));
            if verbose {
                for item in &sim.items_depleted_today {
                    println!("    depleted: {} ({})", item.name, item.item_id);
                }
            }
        }
        Err(e) => results.push(check("simulation_lists_disjoint", false, e.to_string())),
    }

    let waste = identify_waste(&inv);
    results.push(check(
        "waste_grows_with_time",
        waste.len() >= waste_before.len(),
        format!("{} → {} waste item(s)", waste_before.len(), waste.len()),
    ));
    results.push(check(
        "waste_idempotent",
        waste == identify_waste(&inv),
        "classifying twice gives the same list",
    ));

    let limit = scenario.undocking.max_weight;
    match plan_return(&mut inv, &scenario.undocking, config) {
        Ok(plan) => {
            let m = &plan.return_manifest;
            let capacity = inv
                .container(&m.undocking_container_id)
                .map_or(0.0, |c| c.volume());
            results.push(check(
                "return_within_limits",
                m.total_weight <= limit + EPSILON && m.total_volume <= capacity + EPSILON,
                format!(
                    "{} item(s), {:.1}/{:.1} kg, {:.0}/{:.0} cm³",
                    m.return_items.len(),
                    m.total_weight,
                    limit,
                    m.total_volume,
                    capacity
                ),
            ));
            let undocked = complete_undocking(
                &mut inv,
                &UndockingRequest {
                    undocking_container_id: m.undocking_container_id.clone(),
                    timestamp: None,
                },
            );
            results.push(check(
                "undocking_removes_manifest",
                undocked.as_ref().is_ok_and(|u| u.items_removed == m.return_items.len()),
                format!("{:?}", undocked.map(|u| u.items_removed)),
            ));
        }
        Err(e) => results.push(check("return_within_limits", false, e.to_string())),
    }

    results.push(check(
        "scenario_layout_sound_after_undocking",
        inv.layout_violations(config.epsilon).is_empty(),
        "layout still sound",
    ));
    results
}

// ── 3. Retrieval sweep ──────────────────────────────────────────────────

/// Apply a retrieval sequence to a layout and check that every blocker
/// ends up back in its own box.
fn replay_is_reversible(
    inv: &Inventory,
    target: &str,
    config: &PlannerConfig,
) -> Result<(), String> {
    let steps = plan_retrieval(inv, target, config).map_err(|e| e.to_string())?;
    let mut layout = Layout::snapshot(inv);
    let mut held = Vec::new();
    for step in &steps {
        match step.action {
            StepAction::Remove => {
                let (container, position) = layout
                    .remove(&step.item_id)
                    .ok_or_else(|| {
                        format!("step {} removes absent item {}", step.step, step.item_id)
                    })?;
                held.push((step.item_id.clone(), container, position));
            }
            StepAction::Place => {
                let (id, container, position) = held
                    .iter()
                    .find(|(id, ..)| *id == step.item_id)
                    .cloned()
                    .ok_or_else(|| {
                        format!("step {} places unheld item {}", step.step, step.item_id)
                    })?;
                layout.insert(&id, &container, position);
            }
            other => return Err(format!("unexpected action {other:?}")),
        }
    }
    for p in inv.placements().filter(|p| p.item_id != target) {
        if layout.get(&p.item_id).map(|(_, b)| b) != Some(p.position) {
            return Err(format!("item {} not restored", p.item_id));
        }
    }
    Ok(())
}

fn validate_retrieval_sweep(scenario: &Scenario) -> Vec<TestResult> {
    println!("--- Retrieval Sweep ---");
    let mut results = Vec::new();
    let config = &scenario.config;
    let mut inv = scenario_inventory(scenario);
    if let Err(e) = place_items(&mut inv, &scenario.catalog, config) {
        results.push(check("retrieval_setup", false, e.to_string()));
        return results;
    }

    let targets: Vec<String> = inv.placements().map(|p| p.item_id.clone()).collect();
    let failures: Vec<String> = targets
        .iter()
        .filter_map(|id| replay_is_reversible(&inv, id, config).err())
        .collect();
    results.push(check(
        "retrieval_reversible",
        failures.is_empty(),
        if failures.is_empty() {
            format!("{} retrieval sequences replayed", targets.len())
        } else {
            failures.join("; ")
        },
    ));

    // Every blocker must sit in front of its target and share its face.
    let layout = Layout::snapshot(&inv);
    let mut bad = 0;
    for p in inv.placements() {
        for b in blockers(&layout, &p.container_id, &p.item_id, &p.position, config.epsilon) {
            let Some((_, bbox)) = layout.get(&b) else {
                bad += 1;
                continue;
            };
            if bbox.start.depth >= p.position.start.depth
                || !bbox.overlaps_face(&p.position, config.epsilon)
            {
                bad += 1;
            }
        }
    }
    results.push(check(
        "blockers_in_front",
        bad == 0,
        format!("{bad} misclassified blocker(s)"),
    ));
    results
}

// ── 4. Random stations ──────────────────────────────────────────────────

const ZONES: [&str; 4] = ["Crew Quarters", "Lab", "Storage Bay", "Airlock"];

fn random_catalog(rng: &mut StdRng) -> Catalog {
    let containers: Vec<ContainerSpec> = (0..rng.gen_range(1..=4))
        .map(|i| ContainerSpec {
            container_id: format!("cont{i}"),
            zone: ZONES[rng.gen_range(0..ZONES.len())].to_string(),
            width: rng.gen_range(20..=80) as f64,
            depth: rng.gen_range(20..=80) as f64,
            height: rng.gen_range(20..=80) as f64,
        })
        .collect();
    let items: Vec<ItemSpec> = (0..rng.gen_range(5..=30))
        .map(|i| ItemSpec {
            item_id: format!("{i:06}"),
            name: format!("Item {i}"),
            width: rng.gen_range(2..=40) as f64,
            depth: rng.gen_range(2..=40) as f64,
            height: rng.gen_range(2..=40) as f64,
            mass: rng.gen_range(0.1..20.0),
            priority: rng.gen_range(1..=100),
            preferred_zone: rng
                .gen_bool(0.7)
                .then(|| ZONES[rng.gen_range(0..ZONES.len())].to_string()),
            expiry_date: rng
                .gen_bool(0.3)
                .then(|| format!("2025-01-{:02}", rng.gen_range(1..=28))),
            usage_limit: rng.gen_bool(0.5).then(|| rng.gen_range(1..=5)),
        })
        .collect();
    Catalog { items, containers }
}

/// One seeded station: place, shuffle items out and back, age it, return waste.
fn run_station(seed: u64) -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = PlannerConfig::default();
    let start = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).ok_or("bad start date")?;
    let mut inv = Inventory::new(start);
    let catalog = random_catalog(&mut rng);

    let placed = place_items(&mut inv, &catalog, &config).map_err(|e| e.to_string())?;
    let sound = |inv: &Inventory, stage: &str| -> Result<(), String> {
        let v = inv.layout_violations(config.epsilon);
        if v.is_empty() {
            Ok(())
        } else {
            Err(format!("{stage}: {}", v.join("; ")))
        }
    };
    sound(&inv, "after placement")?;
    if placed.placements.len() + placed.failures.len() != catalog.items.len() {
        return Err("placement result does not account for every item".to_string());
    }

    // Pull a few items out and put them back where they were.
    let stowed: Vec<_> = inv.placements().cloned().collect();
    for p in stowed.iter().filter(|_| rng.gen_bool(0.3)) {
        retrieve(
            &mut inv,
            &RetrieveRequest {
                item_id: p.item_id.clone(),
                user_id: Some(format!("crew-{seed}")),
                timestamp: None,
            },
            &config,
        )
        .map_err(|e| format!("retrieve {}: {e}", p.item_id))?;
        place_item(
            &mut inv,
            &ManualPlaceRequest {
                item_id: p.item_id.clone(),
                container_id: p.container_id.clone(),
                position: p.position,
                user_id: Some(format!("crew-{seed}")),
                timestamp: None,
            },
            &config,
        )
        .map_err(|e| format!("place back {}: {e}", p.item_id))?;
    }
    sound(&inv, "after retrieve/place cycle")?;

    let before = inv.clock();
    let usage: Vec<UsageEntry> = stowed
        .iter()
        .filter(|_| rng.gen_bool(0.2))
        .map(|p| UsageEntry {
            item_id: Some(p.item_id.clone()),
            name: None,
        })
        .collect();
    let sim = simulate(
        &mut inv,
        &SimulateRequest {
            num_of_days: Some(rng.gen_range(0..=40)),
            to_timestamp: None,
            items_to_be_used_per_day: usage,
        },
    )
    .map_err(|e| e.to_string())?;
    if sim.new_date < before {
        return Err(format!("clock ran backwards: {before} → {}", sim.new_date));
    }

    let undock = inv.containers().next().map(|c| c.id.clone());
    if let Some(undock) = undock {
        let max_weight = rng.gen_range(0.0..50.0);
        let request = ReturnPlanRequest {
            undocking_container_id: undock.clone(),
            undocking_date: sim.new_date.to_string(),
            max_weight,
        };
        match plan_return(&mut inv, &request, &config) {
            Ok(plan) => {
                if plan.return_manifest.total_weight > max_weight + EPSILON {
                    return Err(format!(
                        "manifest weight {:.2} over limit {max_weight:.2}",
                        plan.return_manifest.total_weight
                    ));
                }
                complete_undocking(
                    &mut inv,
                    &UndockingRequest {
                        undocking_container_id: undock,
                        timestamp: None,
                    },
                )
                .map_err(|e| e.to_string())?;
            }
            Err(e) if e.kind() == stowage_logic::ErrorKind::Infeasible => {}
            Err(e) => return Err(format!("return plan: {e}")),
        }
    }
    sound(&inv, "after undocking")
}

fn validate_random_stations(seeds: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Random Stations ({seeds} seeds) ---");
    let mut failures = Vec::new();
    for seed in 0..seeds {
        match run_station(seed) {
            Ok(()) => {
                if verbose {
                    println!("    seed {seed}: ok");
                }
            }
            Err(e) => failures.push(format!("seed {seed}: {e}")),
        }
    }
    vec![check(
        "random_stations_sound",
        failures.is_empty(),
        if failures.is_empty() {
            format!("{seeds} seeded stations kept every invariant")
        } else {
            failures.join("; ")
        },
    )]
}

// ── 5. Engine handle ────────────────────────────────────────────────────

fn validate_engine_handle() -> Vec<TestResult> {
    println!("--- Engine Handle ---");
    let mut results = Vec::new();
    let engine = match StowageEngine::new(PlannerConfig::default()) {
        Ok(e) => e,
        Err(e) => {
            results.push(check("engine_new", false, e.to_string()));
            return results;
        }
    };

    let reply = engine.search(Some("1"), Some("Wrench"));
    let json = serde_json::to_value(&reply).unwrap_or_default();
    results.push(check(
        "engine_reply_envelope",
        json["success"] == false && json["error"]["kind"] == "ambiguous-identifier",
        json.to_string(),
    ));

    let bad_sim = engine.simulate(&SimulateRequest::default());
    results.push(check(
        "engine_rejects_empty_simulation",
        !bad_sim.success,
        format!("{:?}", bad_sim.error.map(|e| e.kind)),
    ));
    results
}
