//! Simulation parameters and configuration.
//!
//! This module provides the serde model of a simulation setup. Every section
//! validates itself and builds the runtime object it describes; random
//! tables (purifying penalties, permutations, random founders) are drawn from
//! the simulation's RNG so that a seeded configuration reproduces the whole
//! run.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::population::Dynamics;
use crate::base::{Feature, Nucleotide, Sequence};
use crate::errors::{ConfigError, MutationError, RecombinationError};
use crate::evolution::{
    EmpiricalFitness, ExposureMemory, FitnessFactor, FitnessModel, FittestState,
    FluctuatingFitness, FrequencyDependentFitness, IndelLength, IndelModel, MutationGenerator,
    PurifyingFitness, RecombinationModel, Replicator, Selector, SiteSampling, SubstitutionModel,
};

/// The master configuration struct.
/// Can be deserialized from a file to fully reproduce a simulation setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub execution: ExecutionConfig,
    pub evolution: EvolutionConfig,
    pub initialization: InitializationConfig,
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not need the RNG.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.execution.validate()?;
        self.evolution.selection.validate()?;
        Ok(())
    }
}

fn default_prune_interval() -> usize {
    1
}

/// High-level simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of individuals in the founding population; proportional
    /// selectors keep it constant
    pub population_size: usize,
    /// Total number of generations to simulate
    pub total_generations: usize,
    /// Optional RNG seed for reproducibility
    #[serde(default)]
    pub seed: Option<u64>,
    /// Run a full splicing pass over the ancestry graph every this many
    /// generations (0 = never); the graph stays bounded either way
    #[serde(default = "default_prune_interval")]
    pub prune_interval: usize,
    /// Upper bound on the population size under growth models; must not be
    /// below `population_size`
    #[serde(default)]
    pub max_population_size: Option<usize>,
}

impl ExecutionConfig {
    pub fn new(population_size: usize, total_generations: usize, seed: Option<u64>) -> Self {
        Self {
            population_size,
            total_generations,
            seed,
            prune_interval: default_prune_interval(),
            max_population_size: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::Validation(
                "population_size must be at least 1".into(),
            ));
        }
        if let Some(max) = self.max_population_size {
            if max < self.population_size {
                return Err(ConfigError::Validation(format!(
                    "max_population_size ({max}) is below population_size ({})",
                    self.population_size
                )));
            }
        }
        Ok(())
    }
}

/// Grouped evolutionary parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub mutation: MutationConfig,
    #[serde(default)]
    pub fitness: Vec<FitnessFactorConfig>,
    #[serde(default)]
    pub selection: Selector,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

impl EvolutionConfig {
    /// Build the runtime dynamics for genomes like `reference`.
    pub fn build<R: Rng + ?Sized>(
        &self,
        reference: &Sequence,
        features: &[Feature],
        rng: &mut R,
    ) -> Result<Dynamics, ConfigError> {
        self.selection.validate()?;
        let mutator = self.mutation.build(reference.len())?;
        let factors = self
            .fitness
            .iter()
            .map(|f| f.build(reference, features, rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dynamics {
            mutator,
            fitness: FitnessModel::new(factors),
            selector: self.selection.clone(),
            replicator: self.replication.build()?,
        })
    }
}

/// Parameters for mutation processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Per-site substitution probability per replication
    pub rate: f64,
    #[serde(default)]
    pub substitution: SubstitutionModel,
    #[serde(default)]
    pub sampling: SiteSampling,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indel: Option<IndelConfig>,
}

impl MutationConfig {
    /// Jukes-Cantor substitutions at `rate`, no indels.
    pub fn uniform(rate: f64) -> Self {
        Self {
            rate,
            substitution: SubstitutionModel::default(),
            sampling: SiteSampling::default(),
            indel: None,
        }
    }

    pub fn build(&self, genome_length: usize) -> Result<MutationGenerator, MutationError> {
        let indel = self.indel.as_ref().map(IndelConfig::build).transpose()?;
        MutationGenerator::new(
            self.rate,
            self.substitution.clone(),
            self.sampling,
            indel,
            genome_length,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndelConfig {
    pub insertion_probability: f64,
    pub deletion_probability: f64,
    pub length: IndelLength,
}

impl IndelConfig {
    pub fn build(&self) -> Result<IndelModel, MutationError> {
        IndelModel::new(
            self.insertion_probability,
            self.deletion_probability,
            self.length,
        )
    }
}

/// Where a purifying table takes its fittest states from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FittestConfig {
    /// The first founder sequence.
    #[default]
    Founder,
    /// A uniform draw per site.
    Random,
    /// An explicit sequence of the genome's length.
    Sequence(String),
}

impl FittestConfig {
    fn resolve(&self, reference: &Sequence) -> Result<FittestState, ConfigError> {
        Ok(match self {
            Self::Founder => FittestState::Reference(reference.clone()),
            Self::Random => FittestState::Random,
            Self::Sequence(s) => FittestState::Reference(s.parse()?),
        })
    }
}

fn default_dof() -> f64 {
    1.0
}

fn default_memory() -> ExposureMemory {
    ExposureMemory::Current
}

/// One fitness factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitnessFactorConfig {
    Purifying {
        strength: f64,
        #[serde(default = "default_dof")]
        dof: f64,
        #[serde(default)]
        fittest: FittestConfig,
    },
    Empirical {
        /// One row of four log-fitness values (A, C, G, T) per site
        table: Vec<[f64; 4]>,
        /// Site/state pairs that are lethal, on top of `table`
        #[serde(default)]
        lethal: Vec<(usize, Nucleotide)>,
        /// Shuffle each site's values across states
        #[serde(default)]
        permute: bool,
    },
    FrequencyDependent {
        /// Name of a coding feature
        feature: String,
        strength: f64,
        #[serde(default = "default_memory")]
        memory: ExposureMemory,
    },
    Fluctuating {
        strength: f64,
        #[serde(default = "default_dof")]
        dof: f64,
        /// Expected fraction of sites reshuffled per generation
        rate: f64,
        #[serde(default)]
        fittest: FittestConfig,
    },
}

impl FitnessFactorConfig {
    pub fn build<R: Rng + ?Sized>(
        &self,
        reference: &Sequence,
        features: &[Feature],
        rng: &mut R,
    ) -> Result<FitnessFactor, ConfigError> {
        let length = reference.len();
        let factor = match self {
            Self::Purifying {
                strength,
                dof,
                fittest,
            } => {
                let fittest = fittest.resolve(reference)?.resolve(length, rng)?;
                PurifyingFitness::new(&fittest, *strength, *dof, features, rng)?.into()
            }
            Self::Empirical {
                table,
                lethal,
                permute,
            } => {
                if table.len() != length {
                    return Err(ConfigError::Validation(format!(
                        "empirical table has {} rows for a genome of {length} sites",
                        table.len()
                    )));
                }
                let mut values = table.clone();
                for &(site, state) in lethal {
                    let row = values.get_mut(site).ok_or_else(|| {
                        ConfigError::Validation(format!("lethal site {site} is outside the genome"))
                    })?;
                    row[state.idx()] = f64::NEG_INFINITY;
                }
                let factor = EmpiricalFitness::new(values)?;
                if *permute {
                    factor.permuted(rng).into()
                } else {
                    factor.into()
                }
            }
            Self::FrequencyDependent {
                feature,
                strength,
                memory,
            } => {
                let feature = features
                    .iter()
                    .find(|f| f.name() == feature)
                    .ok_or_else(|| ConfigError::UnknownFeature(feature.clone()))?;
                FrequencyDependentFitness::new(feature.clone(), *strength, *memory)?.into()
            }
            Self::Fluctuating {
                strength,
                dof,
                rate,
                fittest,
            } => {
                let fittest = fittest.resolve(reference)?.resolve(length, rng)?;
                FluctuatingFitness::new(&fittest, *strength, *dof, *rate, rng)?.into()
            }
        };
        Ok(factor)
    }
}

/// How offspring are produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ReplicationConfig {
    #[default]
    Clonal,
    Recombinant {
        dual_infection_probability: f64,
        recombination_probability: f64,
        /// Per-boundary template switch probability
        rate: f64,
    },
}

impl ReplicationConfig {
    pub fn build(&self) -> Result<Replicator, RecombinationError> {
        Ok(match *self {
            Self::Clonal => Replicator::Clonal,
            Self::Recombinant {
                dual_infection_probability,
                recombination_probability,
                rate,
            } => Replicator::Recombinant(RecombinationModel::new(
                dual_infection_probability,
                recombination_probability,
                rate,
            )?),
        })
    }
}

/// Configuration for founder sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitializationConfig {
    /// Explicit founder sequences; individuals are assigned to founders
    /// round-robin.
    Sequences {
        founders: Vec<String>,
        #[serde(default)]
        features: Vec<Feature>,
    },
    /// A single founder of uniformly random bases.
    Random {
        length: usize,
        #[serde(default)]
        features: Vec<Feature>,
    },
}

impl InitializationConfig {
    pub fn features(&self) -> &[Feature] {
        match self {
            Self::Sequences { features, .. } | Self::Random { features, .. } => features,
        }
    }

    /// Produce the founder sequences and check every feature against them.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Sequence>, ConfigError> {
        let founders = match self {
            Self::Sequences { founders, .. } => {
                if founders.is_empty() {
                    return Err(ConfigError::Validation(
                        "at least one founder sequence is required".into(),
                    ));
                }
                founders
                    .iter()
                    .map(|s| s.parse::<Sequence>())
                    .collect::<Result<Vec<_>, _>>()?
            }
            Self::Random { length, .. } => {
                if *length == 0 {
                    return Err(ConfigError::Validation(
                        "founder length must be at least 1".into(),
                    ));
                }
                vec![Sequence::random(*length, rng)]
            }
        };
        for founder in &founders {
            for feature in self.features() {
                feature.validate(founder.len())?;
            }
        }
        Ok(founders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Alphabet;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const JSON: &str = r#"{
        "execution": { "population_size": 20, "total_generations": 5, "seed": 7 },
        "evolution": {
            "mutation": {
                "rate": 0.01,
                "substitution": { "TransitionBias": { "kappa": 2.0 } },
                "indel": {
                    "insertion_probability": 0.05,
                    "deletion_probability": 0.05,
                    "length": { "Uniform": { "min": 1, "max": 6 } }
                }
            },
            "fitness": [
                { "Purifying": { "strength": 0.1 } },
                { "FrequencyDependent": { "feature": "epitope", "strength": 1.0,
                                          "memory": { "Decaying": { "decay": 0.9 } } } }
            ],
            "selection": { "Bins": { "bins_per_individual": 10 } },
            "replication": { "Recombinant": {
                "dual_infection_probability": 0.5,
                "recombination_probability": 0.5,
                "rate": 0.01
            } }
        },
        "initialization": { "Sequences": {
            "founders": ["ATGGCCAAAGGGTTT"],
            "features": [
                { "name": "epitope", "alphabet": "AminoAcid",
                  "fragments": [{ "start": 0, "end": 9 }] }
            ]
        } }
    }"#;

    #[test]
    fn test_parse_full_configuration() {
        let config = Configuration::from_json(JSON).unwrap();
        assert_eq!(config.execution.population_size, 20);
        assert_eq!(config.execution.prune_interval, 1);
        assert_eq!(config.execution.max_population_size, None);
        assert_eq!(config.evolution.fitness.len(), 2);
        assert_eq!(
            config.evolution.fitness[0],
            FitnessFactorConfig::Purifying {
                strength: 0.1,
                dof: 1.0,
                fittest: FittestConfig::Founder
            }
        );
        assert_eq!(config.evolution.selection, Selector::Bins { bins_per_individual: 10 });
    }

    #[test]
    fn test_json_roundtrip() {
        let config = Configuration::from_json(JSON).unwrap();
        let back = Configuration::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_build_dynamics() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let config = Configuration::from_json(JSON).unwrap();
        let founders = config.initialization.build(&mut rng).unwrap();
        let dynamics = config
            .evolution
            .build(&founders[0], config.initialization.features(), &mut rng)
            .unwrap();
        assert_eq!(dynamics.fitness.factors().len(), 2);
        assert_eq!(dynamics.replicator.parent_count(), 2);
        assert!(dynamics.mutator.indel_model().is_some());
        // the founder is the fittest sequence of the purifying factor
        assert_eq!(dynamics.fitness.log_fitness(&founders[0]).get(), 0.0);
    }

    #[test]
    fn test_unknown_feature() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let factor = FitnessFactorConfig::FrequencyDependent {
            feature: "missing".into(),
            strength: 1.0,
            memory: ExposureMemory::Current,
        };
        let reference: Sequence = "ACGACG".parse().unwrap();
        assert!(matches!(
            factor.build(&reference, &[], &mut rng),
            Err(ConfigError::UnknownFeature(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_empirical_lethal_sites() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let factor = FitnessFactorConfig::Empirical {
            table: vec![[0.0; 4]; 3],
            lethal: vec![(1, Nucleotide::T)],
            permute: false,
        };
        let reference: Sequence = "AAA".parse().unwrap();
        let built = factor.build(&reference, &[], &mut rng).unwrap();
        assert!(built.log_fitness(&"ATA".parse().unwrap()).is_lethal());
        assert!(!built.log_fitness(&"AAT".parse().unwrap()).is_lethal());

        let short = FitnessFactorConfig::Empirical {
            table: vec![[0.0; 4]; 2],
            lethal: vec![],
            permute: false,
        };
        assert!(matches!(
            short.build(&reference, &[], &mut rng),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Configuration::from_json(JSON).unwrap();
        config.execution.population_size = 0;
        assert!(config.validate().is_err());

        let json = JSON.replace(r#""rate": 0.01,"#, r#""rate": 2.0,"#);
        let config = Configuration::from_json(&json).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let founders = config.initialization.build(&mut rng).unwrap();
        assert!(matches!(
            config.evolution.build(&founders[0], config.initialization.features(), &mut rng),
            Err(ConfigError::Mutation(MutationError::InvalidMutationRate(_)))
        ));
    }

    #[test]
    fn test_max_population_below_initial_size() {
        let mut config = Configuration::from_json(JSON).unwrap();
        config.execution.max_population_size = Some(19);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.execution.max_population_size = Some(0);
        assert!(config.validate().is_err());
        config.execution.max_population_size = Some(20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_features_checked_against_founders() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let init = InitializationConfig::Random {
            length: 6,
            features: vec![Feature::contiguous("orf", Alphabet::AminoAcid, 0..9).unwrap()],
        };
        assert!(matches!(init.build(&mut rng), Err(ConfigError::Sequence(_))));

        let init = InitializationConfig::Random {
            length: 9,
            features: vec![Feature::contiguous("orf", Alphabet::AminoAcid, 0..9).unwrap()],
        };
        assert_eq!(init.build(&mut rng).unwrap()[0].len(), 9);
    }
}
