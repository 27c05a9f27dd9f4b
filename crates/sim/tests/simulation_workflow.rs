//! End-to-end tests: configuration to finished run.

use virevo_sim::errors::{SelectionError, SimulationError};
use virevo_sim::simulation::{Configuration, Simulation};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const CONFIG: &str = r#"{
    "execution": { "population_size": 40, "total_generations": 30, "seed": 1234 },
    "evolution": {
        "mutation": {
            "rate": 0.01,
            "substitution": { "TransitionBias": { "kappa": 4.0 } },
            "indel": {
                "insertion_probability": 0.02,
                "deletion_probability": 0.02,
                "length": { "Fixed": 3 }
            }
        },
        "fitness": [
            { "Purifying": { "strength": 0.05 } },
            { "FrequencyDependent": { "feature": "epitope", "strength": 0.5 } },
            { "Fluctuating": { "strength": 0.05, "dof": 1.0, "rate": 0.01 } }
        ],
        "selection": "BinarySearch",
        "replication": { "Recombinant": {
            "dual_infection_probability": 0.3,
            "recombination_probability": 0.5,
            "rate": 0.05
        } }
    },
    "initialization": { "Sequences": {
        "founders": ["ATGGCCAAAGGGTTTCCCAAAGGG"],
        "features": [
            { "name": "epitope", "alphabet": "AminoAcid",
              "fragments": [{ "start": 3, "end": 12 }] }
        ]
    } }
}"#;

fn snapshot(sim: &Simulation) -> Vec<String> {
    let population = sim.population();
    (0..population.size())
        .map(|i| population.genome(i).map(|g| g.sequence().to_string()).unwrap_or_default())
        .collect()
}

#[test]
fn test_same_seed_reproduces_run() {
    init_logging();
    let config = Configuration::from_json(CONFIG).unwrap();

    let mut first = Simulation::from_config(&config).unwrap();
    let mut second = Simulation::from_config(&config).unwrap();
    let a = first.run().unwrap().unwrap();
    let b = second.run().unwrap().unwrap();

    assert_eq!(a, b);
    assert_eq!(a.generation, 30);
    assert_eq!(snapshot(&first), snapshot(&second));
    assert_eq!(
        first.population().pool().consensus(),
        second.population().pool().consensus()
    );
    assert_eq!(
        first.population().pool().state_frequencies(),
        second.population().pool().state_frequencies()
    );
    assert_eq!(first.sample_tree(8).unwrap(), second.sample_tree(8).unwrap());
}

#[test]
fn test_gene_pool_stays_consistent() {
    init_logging();
    let config = Configuration::from_json(CONFIG).unwrap();
    let mut sim = Simulation::from_config(&config).unwrap();
    for _ in 0..20 {
        let summary = sim.step().unwrap();
        let pool = sim.population().pool();
        assert_eq!(summary.size, 40);
        assert_eq!(pool.total_frequency(), 40);
        assert_eq!(summary.live_genomes, pool.live_count());
        for (_, genome) in pool.genomes() {
            assert!(genome.is_alive());
            assert_eq!(genome.len() % 3, 0);
        }
    }
}

#[test]
fn test_growth_model_respects_cap() {
    init_logging();
    let mut config = Configuration::from_json(CONFIG).unwrap();
    config.execution.population_size = 10;
    config.execution.max_population_size = Some(60);
    config.evolution.fitness.clear();
    config.evolution.selection = serde_json::from_str(
        r#"{ "Branching": { "split_probability": 0.6, "death_probability": 0.05 } }"#,
    )
    .unwrap();

    let mut sim = Simulation::from_config(&config).unwrap();
    for _ in 0..15 {
        match sim.step() {
            Ok(summary) => {
                assert!(summary.size <= 60);
                assert_eq!(sim.population().pool().total_frequency(), summary.size);
                assert_eq!(sim.population().phylogeny().size(), summary.size);
            }
            Err(SimulationError::Selection(SelectionError::Extinct)) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

#[test]
fn test_lethal_founder_crashes_population() {
    init_logging();
    let config = r#"{
        "execution": { "population_size": 5, "total_generations": 3, "seed": 1 },
        "evolution": {
            "mutation": { "rate": 0.0 },
            "fitness": [
                { "Empirical": { "table": [[0,0,0,0],[0,0,0,0],[0,0,0,0]],
                                 "lethal": [[0, "A"]] } }
            ]
        },
        "initialization": { "Sequences": { "founders": ["ACG"] } }
    }"#;
    let mut sim = Simulation::from_config(&Configuration::from_json(config).unwrap()).unwrap();
    let err = sim.run().unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Selection(SelectionError::PopulationCollapsed { size: 5 })
    ));
    assert!(err.to_string().contains("total fitness"));
}
